use std::env;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tokio::fs;

use storefront_domain::{PrimaryDbConfig, RuntimeConfig, SecondaryDbConfig};

pub const CONFIG_ENV: &str = "STOREFRONT_CONFIG";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: Option<u16>,
    pub environment: String,
    pub api_token: Option<String>,
    pub max_body_bytes: u64,
    pub request_timeout_seconds: u64,
    pub log_format: String,
    pub log_dir: Option<String>,
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub db_pool_max: u32,
    pub db_acquire_timeout_ms: u64,
    pub clickhouse_enabled: bool,
    pub clickhouse_url: String,
    pub clickhouse_database: String,
    pub clickhouse_user: Option<String>,
    pub clickhouse_password: Option<String>,
    pub clickhouse_async_insert: bool,
    pub secondary_timeout_ms: u64,
    pub enforce_status_transitions: bool,
    /// Warnings raised while loading, logged once tracing is up.
    #[serde(skip)]
    pub load_warnings: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3003".to_string(),
            port: None,
            environment: "development".to_string(),
            api_token: None,
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 15,
            log_format: "text".to_string(),
            log_dir: None,
            db_host: "127.0.0.1".to_string(),
            db_port: 5432,
            db_name: "storefront".to_string(),
            db_user: "postgres".to_string(),
            db_password: "postgres".to_string(),
            db_pool_max: 20,
            db_acquire_timeout_ms: 2000,
            clickhouse_enabled: true,
            clickhouse_url: "http://127.0.0.1:8123".to_string(),
            clickhouse_database: "analytics".to_string(),
            clickhouse_user: None,
            clickhouse_password: None,
            clickhouse_async_insert: true,
            secondary_timeout_ms: 3000,
            enforce_status_transitions: false,
            load_warnings: Vec::new(),
        }
    }
}

impl AppConfig {
    pub async fn load() -> Result<Self> {
        let path = env::var(CONFIG_ENV).unwrap_or_else(|_| "./config.toml".to_string());
        let mut config = Self::read_file(&path).await?;
        config.apply_env_overrides();
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    async fn read_file(path: &str) -> Result<Self> {
        let file_path = Path::new(path);
        if !file_path.exists() {
            let mut config = AppConfig::default();
            config
                .load_warnings
                .push(format!("{} not found, using defaults", path));
            return Ok(config);
        }
        let content = fs::read_to_string(file_path).await?;
        toml::from_str(&content).map_err(|err| anyhow!("invalid {}: {}", path, err))
    }

    pub fn normalize(&mut self) {
        for value in [
            &mut self.api_token,
            &mut self.log_dir,
            &mut self.clickhouse_user,
            &mut self.clickhouse_password,
        ] {
            if value.as_deref().map(|text| text.trim().is_empty()).unwrap_or(false) {
                *value = None;
            }
        }
        self.environment = self.environment.trim().to_lowercase();
        self.log_format = self.log_format.trim().to_lowercase();
        self.clickhouse_url = self.clickhouse_url.trim().trim_end_matches('/').to_string();
        if let Some(port) = self.port {
            if let Ok(addr) = self.bind_addr.parse::<SocketAddr>() {
                self.bind_addr = SocketAddr::new(addr.ip(), port).to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr
            .parse::<SocketAddr>()
            .map_err(|err| anyhow!("invalid bind_addr: {}", err))?;
        if self.max_body_bytes == 0 {
            return Err(anyhow!("max_body_bytes must be greater than 0"));
        }
        if self.request_timeout_seconds == 0 {
            return Err(anyhow!("request_timeout_seconds must be greater than 0"));
        }
        if self.db_pool_max == 0 {
            return Err(anyhow!("db_pool_max must be greater than 0"));
        }
        if self.secondary_timeout_ms == 0 {
            return Err(anyhow!("secondary_timeout_ms must be greater than 0"));
        }
        if self.db_host.trim().is_empty() || self.db_name.trim().is_empty() {
            return Err(anyhow!("db_host and db_name must not be empty"));
        }
        if self.clickhouse_enabled && self.clickhouse_url.is_empty() {
            return Err(anyhow!("clickhouse_url must not be empty when clickhouse is enabled"));
        }
        if self.log_format != "text" && self.log_format != "json" {
            return Err(anyhow!("log_format must be 'text' or 'json'"));
        }
        Ok(())
    }

    pub fn to_runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            bind_addr: self.bind_addr.clone(),
            environment: self.environment.clone(),
            api_token: self.api_token.clone(),
            max_body_bytes: self.max_body_bytes,
            request_timeout_seconds: self.request_timeout_seconds,
            secondary_timeout_ms: self.secondary_timeout_ms,
            enforce_status_transitions: self.enforce_status_transitions,
        }
    }

    pub fn to_primary_config(&self) -> PrimaryDbConfig {
        PrimaryDbConfig {
            host: self.db_host.clone(),
            port: self.db_port,
            database: self.db_name.clone(),
            user: self.db_user.clone(),
            password: self.db_password.clone(),
            pool_max: self.db_pool_max,
            acquire_timeout_ms: self.db_acquire_timeout_ms,
        }
    }

    pub fn to_secondary_config(&self) -> SecondaryDbConfig {
        SecondaryDbConfig {
            enabled: self.clickhouse_enabled,
            url: self.clickhouse_url.clone(),
            database: self.clickhouse_database.clone(),
            user: self.clickhouse_user.clone(),
            password: self.clickhouse_password.clone(),
            async_insert: self.clickhouse_async_insert,
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("STOREFRONT_BIND_ADDR") {
            self.bind_addr = value;
        }
        if let Some(value) = lookup("STOREFRONT_PORT").or_else(|| lookup("PORT")) {
            self.port = value.trim().parse().ok().or(self.port);
        }
        if let Some(value) = lookup("STOREFRONT_ENV") {
            self.environment = value;
        }
        if let Some(value) = lookup("STOREFRONT_API_TOKEN") {
            self.api_token = Some(value);
        }
        if let Some(value) = lookup("STOREFRONT_MAX_BODY_BYTES") {
            self.max_body_bytes = value.parse().unwrap_or(self.max_body_bytes);
        }
        if let Some(value) = lookup("STOREFRONT_REQUEST_TIMEOUT_SECONDS") {
            self.request_timeout_seconds = value.parse().unwrap_or(self.request_timeout_seconds);
        }
        if let Some(value) = lookup("STOREFRONT_LOG_FORMAT") {
            self.log_format = value;
        }
        if let Some(value) = lookup("STOREFRONT_LOG_DIR") {
            self.log_dir = Some(value);
        }
        if let Some(value) = lookup("STOREFRONT_DB_HOST") {
            self.db_host = value;
        }
        if let Some(value) = lookup("STOREFRONT_DB_PORT") {
            self.db_port = value.parse().unwrap_or(self.db_port);
        }
        if let Some(value) = lookup("STOREFRONT_DB_NAME") {
            self.db_name = value;
        }
        if let Some(value) = lookup("STOREFRONT_DB_USER") {
            self.db_user = value;
        }
        if let Some(value) = lookup("STOREFRONT_DB_PASSWORD") {
            self.db_password = value;
        }
        if let Some(value) = lookup("STOREFRONT_DB_POOL_MAX") {
            self.db_pool_max = value.parse().unwrap_or(self.db_pool_max);
        }
        if let Some(value) = lookup("STOREFRONT_DB_ACQUIRE_TIMEOUT_MS") {
            self.db_acquire_timeout_ms = value.parse().unwrap_or(self.db_acquire_timeout_ms);
        }
        if let Some(value) = lookup("STOREFRONT_CLICKHOUSE_ENABLED") {
            self.clickhouse_enabled = value.parse().unwrap_or(self.clickhouse_enabled);
        }
        if let Some(value) = lookup("STOREFRONT_CLICKHOUSE_URL") {
            self.clickhouse_url = value;
        }
        if let Some(value) = lookup("STOREFRONT_CLICKHOUSE_DATABASE") {
            self.clickhouse_database = value;
        }
        if let Some(value) = lookup("STOREFRONT_CLICKHOUSE_USER") {
            self.clickhouse_user = Some(value);
        }
        if let Some(value) = lookup("STOREFRONT_CLICKHOUSE_PASSWORD") {
            self.clickhouse_password = Some(value);
        }
        if let Some(value) = lookup("STOREFRONT_CLICKHOUSE_ASYNC_INSERT") {
            self.clickhouse_async_insert = value.parse().unwrap_or(self.clickhouse_async_insert);
        }
        if let Some(value) = lookup("STOREFRONT_SECONDARY_TIMEOUT_MS") {
            self.secondary_timeout_ms = value.parse().unwrap_or(self.secondary_timeout_ms);
        }
        if let Some(value) = lookup("STOREFRONT_ENFORCE_STATUS_TRANSITIONS") {
            self.enforce_status_transitions =
                value.parse().unwrap_or(self.enforce_status_transitions);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn overridden(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        let mut config = AppConfig::default();
        config.apply_overrides(|key| vars.get(key).cloned());
        config.normalize();
        config
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.to_runtime_config().secondary_timeout_ms, 3000);
        assert_eq!(config.to_primary_config().pool_max, 20);
    }

    #[test]
    fn port_override_rewrites_bind_addr() {
        let config = overridden(&[("PORT", "8080")]);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn env_overrides_apply_and_blank_secrets_are_dropped() {
        let config = overridden(&[
            ("STOREFRONT_CLICKHOUSE_ENABLED", "false"),
            ("STOREFRONT_CLICKHOUSE_PASSWORD", "  "),
            ("STOREFRONT_ENV", "Production"),
            ("STOREFRONT_DB_POOL_MAX", "not-a-number"),
        ]);
        assert!(!config.clickhouse_enabled);
        assert!(config.clickhouse_password.is_none());
        assert_eq!(config.environment, "production");
        assert_eq!(config.db_pool_max, 20);
        assert!(!config.to_runtime_config().is_development());
    }

    #[test]
    fn file_values_parse_from_toml() {
        let config: AppConfig = toml::from_str(
            r#"
bind_addr = "127.0.0.1:4000"
db_name = "shop"
enforce_status_transitions = true
"#,
        )
        .expect("toml");
        assert_eq!(config.db_name, "shop");
        assert!(config.enforce_status_transitions);
        assert_eq!(config.db_port, 5432);
    }

    #[tokio::test]
    async fn missing_file_is_reported_as_a_warning() {
        let path = std::env::temp_dir().join("storefront-missing-config.toml");
        let config = AppConfig::read_file(&path.to_string_lossy())
            .await
            .expect("defaults");
        assert_eq!(config.load_warnings.len(), 1);
        assert!(config.load_warnings[0].ends_with("not found, using defaults"));
        assert_eq!(config.db_pool_max, 20);
    }

    #[tokio::test]
    async fn present_file_raises_no_warnings() {
        let path = std::env::temp_dir()
            .join(format!("storefront-config-{}.toml", std::process::id()));
        fs::write(&path, "db_name = \"shop\"\n").await.expect("write");
        let config = AppConfig::read_file(&path.to_string_lossy())
            .await
            .expect("parsed");
        fs::remove_file(&path).await.expect("cleanup");
        assert!(config.load_warnings.is_empty());
        assert_eq!(config.db_name, "shop");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = AppConfig::default();
        config.log_format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.bind_addr = "nowhere".to_string();
        assert!(config.validate().is_err());
    }
}
