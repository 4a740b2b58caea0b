use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Unavailable,
    Internal,
}

/// Error body returned by the computation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error bodies come in two shapes: the structured [`ApiError`] and a bare
/// `{"detail": "..."}` object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServiceErrorBody {
    Api(ApiError),
    Detail { detail: serde_json::Value },
}

impl ServiceErrorBody {
    pub fn message(&self) -> String {
        match self {
            ServiceErrorBody::Api(err) => err.message.clone(),
            ServiceErrorBody::Detail { detail } => match detail {
                serde_json::Value::String(text) => text.clone(),
                other => other.to_string(),
            },
        }
    }
}
