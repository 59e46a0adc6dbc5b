//! # Friendly Errors
//!
//! Friendly HTML error pages for axum applications.
//!
//! A single tower layer inspects every failed response after it has been
//! handled and before it is sent:
//!
//! - **JSON passthrough**: clients sending `Accept: application/json` keep the
//!   raw JSON error body
//! - **Blacklist**: paths matching a configured pattern are left alone
//! - **Server error logging**: 500s are recorded with method, path, payload and stack
//! - **Forwarding**: errors can be handed to an internal route that formats them,
//!   while the client still sees the original status code
//! - **Views**: otherwise the error is rendered through a template, or a minimal
//!   built-in HTML page
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use friendly_errors::{Boom, FriendlyErrorsConfig, Host, TeraRenderer, register};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let renderer = TeraRenderer::from_glob("templates/**/*.html")?;
//!     let layer = register(
//!         FriendlyErrorsConfig::new()
//!             .view("error")
//!             .context("supportEmail", "help@example.com")
//!             .log_server_errors(true),
//!         Host::new().renderer(renderer),
//!     )?;
//!
//!     // The layer wraps the whole router so forwarded errors reach every route.
//!     let app = layer.wrap(
//!         Router::new().route("/users/{id}", get(|| async { Boom::not_found("User not found") })),
//!     );
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app.into_make_service()).await?;
//!     Ok(())
//! }
//! ```

pub mod common;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod view;

// Re-export core types
pub use common::{Boom, ErrorPayload, ErrorResponse, ForwardedError, RequestContext};
pub use config::{ConfigService, FriendlyErrorsConfig, InterceptorConfig, ReservedKeyPolicy};
pub use error::{FriendlyErrorsError, Result};
pub use interceptor::{
    Classification, Decision, FriendlyErrors, FriendlyErrorsLayer, Host, Outcome, ServerErrorLog,
    ServerErrorRecord, TracingErrorLog, classify, register,
};
pub use view::{TeraRenderer, ViewRenderer, default_html};

// Re-export commonly used types from dependencies
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use friendly_errors::prelude::*;
/// ```
pub mod prelude {
    pub use crate::common::{Boom, ErrorPayload, ErrorResponse, ForwardedError, RequestContext};
    pub use crate::config::{FriendlyErrorsConfig, ReservedKeyPolicy};
    pub use crate::error::{FriendlyErrorsError, Result};
    pub use crate::interceptor::{FriendlyErrorsLayer, Host, ServerErrorLog, register};
    pub use crate::view::{TeraRenderer, ViewRenderer};
    pub use axum::{
        Router,
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    pub use std::sync::Arc;
}
