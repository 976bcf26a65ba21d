use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::warn;

use storefront_application::AppError;

pub const HIDDEN_CAUSE: &str = "Something went wrong";

#[derive(Debug)]
pub enum HttpError {
    Unauthorized,
    Validation {
        missing: Vec<&'static str>,
        required: Vec<&'static str>,
    },
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    /// `error` is the stable string, `message` the cause (or the hidden placeholder).
    Internal { error: String, message: String },
}

impl HttpError {
    /// Maps an application error; the underlying cause is only exposed in development.
    pub fn from_app(err: AppError, development: bool) -> Self {
        match err {
            AppError::Validation { missing, required } => HttpError::Validation { missing, required },
            AppError::BadRequest(msg) => HttpError::BadRequest(msg),
            AppError::NotFound(msg) => HttpError::NotFound(msg),
            AppError::Conflict(msg) => HttpError::Conflict(msg),
            AppError::Primary { context, source } => HttpError::Internal {
                error: context,
                message: if development {
                    format!("{:#}", source)
                } else {
                    HIDDEN_CAUSE.to_string()
                },
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::Unauthorized => StatusCode::UNAUTHORIZED,
            HttpError::Validation { .. } | HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::Conflict(_) => StatusCode::CONFLICT,
            HttpError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn headline(&self) -> String {
        match self {
            HttpError::Unauthorized => "Unauthorized".to_string(),
            HttpError::Validation { .. } => "Missing required fields".to_string(),
            HttpError::BadRequest(msg) | HttpError::NotFound(msg) | HttpError::Conflict(msg) => {
                msg.clone()
            }
            HttpError::Internal { error, .. } => error.clone(),
        }
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("rejected request body: {}", rejection.body_text());
        HttpError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for HttpError {
    fn from(rejection: QueryRejection) -> Self {
        warn!("rejected query string: {}", rejection.body_text());
        HttpError::BadRequest(format!("Invalid query string: {}", rejection.body_text()))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing: Option<Vec<&'static str>>,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.headline();
        let body = match self {
            HttpError::Validation { missing, required } => ErrorBody {
                error,
                message: None,
                required: Some(required),
                missing: Some(missing),
            },
            HttpError::Internal { message, .. } => ErrorBody {
                error,
                message: Some(message),
                required: None,
                missing: None,
            },
            _ => ErrorBody {
                error,
                message: None,
                required: None,
                missing: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Order routes answer errors inside the `{ success, message, ... }` envelope.
#[derive(Debug)]
pub struct OrderError(pub HttpError);

#[derive(Serialize)]
struct OrderErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing: Option<Vec<&'static str>>,
}

impl From<HttpError> for OrderError {
    fn from(value: HttpError) -> Self {
        OrderError(value)
    }
}

impl From<JsonRejection> for OrderError {
    fn from(rejection: JsonRejection) -> Self {
        OrderError(HttpError::from(rejection))
    }
}

impl From<QueryRejection> for OrderError {
    fn from(rejection: QueryRejection) -> Self {
        OrderError(HttpError::from(rejection))
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let message = self.0.headline();
        let body = match self.0 {
            HttpError::Validation { missing, required } => OrderErrorBody {
                success: false,
                message,
                error: None,
                required: Some(required),
                missing: Some(missing),
            },
            HttpError::Internal { message: cause, .. } => OrderErrorBody {
                success: false,
                message,
                error: Some(cause),
                required: None,
                missing: None,
            },
            _ => OrderErrorBody {
                success: false,
                message,
                error: None,
                required: None,
                missing: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
