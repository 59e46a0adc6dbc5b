use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

const INTERNAL_MESSAGE: &str = "An internal server error occurred";

/// JSON body of a failed request.
///
/// Serializes as `{"statusCode": 404, "error": "Not Found", "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub status_code: u16,
    pub error: String,
    pub message: String,
}

/// Marks a response as an error outcome.
///
/// Stored in the response extensions so the friendly error layer can tell a
/// failure apart from a handler that merely returned a 4xx/5xx body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub payload: ErrorPayload,
    pub debug_stack: Option<String>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            payload: ErrorPayload {
                status_code: status.as_u16(),
                error: reason(status),
                message: message.into(),
            },
            debug_stack: None,
        }
    }

    /// An error derived from the status alone, used for responses that
    /// did not come from [`Boom`].
    pub fn from_status(status: StatusCode) -> Self {
        let label = reason(status);
        Self::new(status, label)
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn error_label(&self) -> &str {
        &self.payload.error
    }

    pub fn message(&self) -> &str {
        &self.payload.message
    }
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Unknown")
        .to_string()
}

/// A Boom-style error a handler can return.
///
/// # Example
/// ```
/// use friendly_errors::Boom;
///
/// async fn get_user(id: String) -> Result<String, Boom> {
///     if id == "1" {
///         Ok("Test User".to_string())
///     } else {
///         Err(Boom::not_found("User not found"))
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boom(ErrorResponse);

impl Boom {
    /// Any status; non-error statuses are coerced to 500.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        if status.is_client_error() || status.is_server_error() {
            Self(ErrorResponse::new(status, message))
        } else {
            Self::internal(format!("invalid error status {status}: {}", message.into()))
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// A 500 whose client-facing message is generic. The cause is kept as
    /// the debug stack for server logs.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        let mut error = ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE);
        error.debug_stack = Some(cause.to_string());
        Self(error)
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.0.debug_stack = Some(stack.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.0.status
    }

    pub fn payload(&self) -> &ErrorPayload {
        &self.0.payload
    }

    pub fn into_inner(self) -> ErrorResponse {
        self.0
    }
}

impl std::fmt::Display for Boom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.0.payload.error, self.0.payload.message)
    }
}

impl std::error::Error for Boom {}

impl IntoResponse for Boom {
    fn into_response(self) -> Response {
        let mut response = (self.0.status, Json(&self.0.payload)).into_response();
        response.extensions_mut().insert(self.0);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boom_labels_from_status() {
        let boom = Boom::not_found("not found here");
        assert_eq!(boom.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            boom.payload(),
            &ErrorPayload {
                status_code: 404,
                error: "Not Found".to_string(),
                message: "not found here".to_string(),
            }
        );
        assert_eq!(boom.to_string(), "Not Found: not found here");
    }

    #[test]
    fn test_internal_hides_cause() {
        let error = Boom::internal("connection refused").into_inner();
        assert_eq!(error.status_code(), 500);
        assert_eq!(error.message(), INTERNAL_MESSAGE);
        assert_eq!(error.debug_stack.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_non_error_status_is_coerced() {
        let boom = Boom::new(StatusCode::OK, "fine");
        assert_eq!(boom.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_into_response_marks_error() {
        let response = Boom::forbidden("Not Authorized").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let marker = response.extensions().get::<ErrorResponse>().unwrap();
        assert_eq!(marker.error_label(), "Forbidden");
        assert_eq!(marker.message(), "Not Authorized");
    }

    #[test]
    fn test_from_status_uses_canonical_reason() {
        let error = ErrorResponse::from_status(StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(error.error_label(), "Method Not Allowed");
        assert_eq!(error.message(), "Method Not Allowed");
    }
}
