//! HTTP error responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use goflex_mailer::SendError;
use serde_json::{Map, Value};

/// A failed request, rendered as `{ "success": false, "error": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body is missing fields or cannot be parsed.
    #[error("{0}")]
    BadRequest(String),

    /// The service lacks credentials or a recipient for this endpoint.
    #[error("{0}")]
    NotConfigured(String),

    /// The relay conversation failed.
    #[error("{error}: {details}")]
    Delivery {
        /// Short summary.
        error: &'static str,
        /// What went wrong.
        details: String,
        /// Extra context, sent as `message`.
        message: Option<String>,
        /// Admin test correlation id, sent as `testId`.
        test_id: Option<String>,
    },
}

impl ApiError {
    /// Wraps a send failure.
    #[must_use]
    pub fn delivery(error: &'static str, err: &SendError) -> Self {
        Self::Delivery {
            error,
            details: err.to_string(),
            message: None,
            test_id: None,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Delivery { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(false));

        match self {
            Self::BadRequest(error) | Self::NotConfigured(error) => {
                body.insert("error".into(), Value::String(error));
            }
            Self::Delivery {
                error,
                details,
                message,
                test_id,
            } => {
                body.insert("error".into(), Value::String(error.to_string()));
                if let Some(message) = message {
                    body.insert("message".into(), Value::String(message));
                }
                body.insert("details".into(), Value::String(details));
                if let Some(test_id) = test_id {
                    body.insert("testId".into(), Value::String(test_id));
                }
            }
        }

        (status, Json(Value::Object(body))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goflex_mailer::SessionState;

    #[test]
    fn statuses() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotConfigured("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );

        let err = SendError::Timeout {
            step: SessionState::Authenticated,
        };
        let api = ApiError::delivery("Failed to send email", &err);
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(api.to_string().contains("timed out"));
    }
}
