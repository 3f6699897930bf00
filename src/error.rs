// Normalized API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use reqwest::header::HeaderMap;
use serde_json::{json, Value};

/// Every failure of the HTTP client, whether it came from `call` or from
/// `upload_file`. Callers can always read `status`, `message` and `data`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backend answered with a non-2xx status.
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        data: Value,
    },

    /// DNS, connection, TLS or timeout failure before a status was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request could not be built (bad endpoint, header or file).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A 2xx body did not match what the caller asked for.
    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Build the normalized error for a non-2xx response.
    ///
    /// `message` prefers a string `message` field of the parsed body, then a
    /// string `detail` field, and finally the HTTP status text.
    pub fn from_status(status: StatusCode, data: Value) -> Self {
        let message = data
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| data.get("detail").and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| status_text(status));

        ApiError::Http {
            status: status.as_u16(),
            message,
            data,
        }
    }

    /// Status code; 0 when the failure happened before any response.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Http { status, .. } => *status,
            _ => 0,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn data(&self) -> &Value {
        match self {
            ApiError::Http { data, .. } => data,
            _ => &Value::Null,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), 401 | 403)
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Http { status, .. } => match *status {
                400 => "BAD_REQUEST",
                401 => "UNAUTHORIZED",
                403 => "FORBIDDEN",
                404 => "NOT_FOUND",
                409 => "CONFLICT",
                422 => "UNPROCESSABLE_ENTITY",
                s if s >= 500 => "UPSTREAM_ERROR",
                _ => "HTTP_ERROR",
            },
            ApiError::Transport(_) => "TRANSPORT_ERROR",
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::Decode(_) => "DECODE_ERROR",
            ApiError::Io(_) => "IO_ERROR",
        }
    }

    /// `{status, message, data}` as seen by callers of the client.
    pub fn to_json(&self) -> Value {
        json!({
            "status": self.status(),
            "message": self.message(),
            "data": self.data(),
        })
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::InvalidRequest(format!("invalid url: {}", err))
    }
}

impl From<crate::session::SessionError> for ApiError {
    fn from(err: crate::session::SessionError) -> Self {
        match err {
            crate::session::SessionError::Io(e) => ApiError::Io(e),
            crate::session::SessionError::Corrupt(e) => ApiError::Decode(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

/// True when the declared Content-Type is JSON.
pub(crate) fn is_json_content(headers: &HeaderMap) -> bool {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false)
}

// Console handlers surface backend failures with the upstream status when
// there is one, and 502 when the backend could not be reached.
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            ApiError::Http { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };

        if status.is_server_error() {
            tracing::error!("Upstream failure: {}", self);
        }

        let body = json!({
            "error": true,
            "status": self.status(),
            "message": self.message(),
            "code": self.error_code(),
        });
        (status, Json(body)).into_response()
    }
}
