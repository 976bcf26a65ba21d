// Runtime and store configuration handed to the application layer

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub bind_addr: String,
    pub environment: String,
    pub api_token: Option<String>,
    pub max_body_bytes: u64,
    pub request_timeout_seconds: u64,
    pub secondary_timeout_ms: u64,
    pub enforce_status_transitions: bool,
}

impl RuntimeConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3003".to_string(),
            environment: "development".to_string(),
            api_token: None,
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 15,
            secondary_timeout_ms: 3000,
            enforce_status_transitions: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrimaryDbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub pool_max: u32,
    pub acquire_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SecondaryDbConfig {
    pub enabled: bool,
    pub url: String,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub async_insert: bool,
}
