use thiserror::Error;

pub type Result<T> = std::result::Result<T, FriendlyErrorsError>;

#[derive(Debug, Error)]
pub enum FriendlyErrorsError {
    #[error("Invalid error blacklist pattern `{pattern}`: {source}")]
    InvalidBlacklistPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Extra context key `{key}` collides with a reserved error context key")]
    ReservedContextKey { key: String },

    #[error("Must pass in a view name or a forward url")]
    MissingTarget,

    #[error("View `{view}` is configured but no view renderer was provided")]
    MissingRenderer { view: String },

    #[error("Invalid forward url `{url}`: {message}")]
    InvalidForwardUrl { url: String, message: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to render view `{view}`: {message}")]
    Render { view: String, message: String },

    #[error("Forward to `{url}` failed: {message}")]
    Forward { url: String, message: String },
}

impl FriendlyErrorsError {
    pub fn invalid_value(key: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// True for errors raised while validating configuration at registration.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::Render { .. } | Self::Forward { .. })
    }
}

impl axum::response::IntoResponse for FriendlyErrorsError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(error = %self, "friendly error handling failed");
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
        )
            .into_response()
    }
}
