use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use aquabot_core::errors::{ApplicationError, InterfaceError};

/// Fresh correlation id for one inbound request.
pub fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// HTTP face of a failed request: status code plus a user-safe body.
#[derive(Debug)]
pub enum ApiError {
    Interface(InterfaceError),
    NotFound { message: &'static str, correlation_id: String },
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    correlation_id: &'a str,
}

impl ApiError {
    pub fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        Self::Interface(error.into_interface(correlation_id))
    }

    pub fn not_found(message: &'static str, correlation_id: &str) -> Self {
        Self::NotFound { message, correlation_id: correlation_id.to_string() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Interface(InterfaceError::BadRequest { .. }) => StatusCode::BAD_REQUEST,
            Self::Interface(InterfaceError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            Self::Interface(InterfaceError::ServiceUnavailable { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Interface(InterfaceError::Internal { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Interface(error) => error.correlation_id(),
            Self::NotFound { correlation_id, .. } => correlation_id,
        }
    }

    fn user_message(&self) -> &'static str {
        match self {
            Self::Interface(error) => error.user_message(),
            Self::NotFound { message, .. } => *message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Interface(error) = &self {
            warn!(
                event_name = "http.request_failed",
                correlation_id = %error.correlation_id(),
                status = status.as_u16(),
                error = %error,
                "request failed"
            );
        }
        let body = ErrorBody { error: self.user_message(), correlation_id: self.correlation_id() };
        (status, Json(body)).into_response()
    }
}
