//! The friendly error pipeline.
//!
//! Every response passes through [`classify`], a pure decision over the
//! error marker, the request and the frozen configuration:
//!
//! ```text
//! 1. not an error             -> pass through
//! 2. Accept: application/json -> pass through
//! 3. path blacklisted         -> pass through
//! 4. 500 and logging enabled  -> record (side effect only)
//! 5. forward url configured   -> self-request, or text fallback on loops
//! 6-7. view configured        -> render the view with the error context
//! 8. otherwise                -> built-in HTML
//! ```
//!
//! [`FriendlyErrors`] then carries out the decision and produces an
//! [`Outcome`], which the layer turns back into an axum response.

use crate::common::{ErrorResponse, RequestContext};
use crate::config::{InterceptorConfig, ReservedKeyPolicy};
use crate::error::{FriendlyErrorsError, Result};
use crate::view::{ViewRenderer, default_html};
use async_trait::async_trait;
use axum::{
    body::{self, Body, Bytes},
    http::{HeaderValue, Method, Request, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Arc, LazyLock};

pub mod layer;
pub mod logging;

pub use layer::{FriendlyErrorsLayer, FriendlyErrorsMiddleware, ServiceInjector, register};
pub use logging::{ServerErrorLog, ServerErrorRecord, TracingErrorLog};

/// Result of an internal self-request.
pub type InterceptorResult = std::result::Result<Response, InterceptorError>;

/// A type-erased error for internal self-requests
pub type InterceptorError = Box<dyn std::error::Error + Send + Sync>;

static JSON_ACCEPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)application/(?:[a-z0-9.+-]*\+)?json").expect("static accept pattern is valid")
});

/// Issues requests against the host's own routes.
#[async_trait]
pub trait Injector: Send {
    async fn inject(&mut self, request: Request<Body>) -> InterceptorResult;
}

/// What the pipeline decided to do with a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    PassThrough,
    /// The forward route itself failed.
    LoopFallback,
    Forward { uri: String },
    Render { view: String, context: Map<String, Value> },
    DefaultHtml { error: String, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub decision: Decision,
    pub log_server_error: bool,
}

impl Classification {
    fn pass_through() -> Self {
        Self {
            decision: Decision::PassThrough,
            log_server_error: false,
        }
    }
}

/// True when the client asked for a JSON media type.
pub fn wants_json(accept: Option<&str>) -> bool {
    accept.is_some_and(|accept| JSON_ACCEPT.is_match(accept))
}

/// Decide how to answer a response. `error` is `None` for successes.
pub fn classify(
    error: Option<&ErrorResponse>,
    request: &RequestContext,
    config: &InterceptorConfig,
) -> Classification {
    let Some(error) = error else {
        return Classification::pass_through();
    };
    if wants_json(request.accept.as_deref()) || config.is_blacklisted(&request.path) {
        return Classification::pass_through();
    }

    let log_server_error =
        config.log_server_errors() && error.status == StatusCode::INTERNAL_SERVER_ERROR;

    let decision = if let Some(forward) = config.forward_url() {
        if request.path == forward.path() {
            Decision::LoopFallback
        } else {
            Decision::Forward {
                uri: forward.with_error_query(error.status_code(), error.error_label(), error.message()),
            }
        }
    } else if let Some(view) = config.view_name() {
        Decision::Render {
            view: view.to_string(),
            context: error_context(error, config),
        }
    } else {
        Decision::DefaultHtml {
            error: error.error_label().to_string(),
            message: error.message().to_string(),
        }
    };

    Classification {
        decision,
        log_server_error,
    }
}

/// `{statusCode, error, message}` merged with the configured extra context.
pub fn error_context(error: &ErrorResponse, config: &InterceptorConfig) -> Map<String, Value> {
    let mut context = Map::new();
    context.insert("statusCode".to_string(), error.status_code().into());
    context.insert("error".to_string(), error.error_label().into());
    context.insert("message".to_string(), error.message().into());

    for (key, value) in config.extra_context() {
        if context.contains_key(key) && config.reserved_keys() == ReservedKeyPolicy::Preserve {
            continue;
        }
        context.insert(key.clone(), value.clone());
    }
    context
}

/// Final shape of the response sent to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    PassThrough,
    Render {
        body: String,
        status: StatusCode,
    },
    Forward {
        body: Bytes,
        content_type: Option<HeaderValue>,
        status: StatusCode,
    },
}

impl Outcome {
    /// `"<status> - <label>"` as plain text.
    pub fn fallback(error: &ErrorResponse) -> Self {
        Self::fallback_as(error, error.status)
    }

    /// The text fallback for `error`, sent with `status`.
    pub fn fallback_as(error: &ErrorResponse, status: StatusCode) -> Self {
        Self::Forward {
            body: Bytes::from(format!("{} - {}", error.status_code(), error.error_label())),
            content_type: Some(HeaderValue::from_static("text/plain; charset=utf-8")),
            status,
        }
    }

    /// Apply to the original response. `error` is re-attached so outer
    /// layers still see the failure.
    pub fn into_response(self, original: Response, error: Option<ErrorResponse>) -> Response {
        let mut response = match self {
            Outcome::PassThrough => return original,
            Outcome::Render { body, status } => (status, Html(body)).into_response(),
            Outcome::Forward {
                body,
                content_type,
                status,
            } => {
                let content_type = content_type
                    .unwrap_or_else(|| HeaderValue::from_static("text/html; charset=utf-8"));
                (status, [(header::CONTENT_TYPE, content_type)], body).into_response()
            }
        };
        if let Some(error) = error {
            response.extensions_mut().insert(error);
        }
        response
    }
}

/// Collaborators the pipeline calls into.
#[derive(Clone)]
pub struct Host {
    renderer: Option<Arc<dyn ViewRenderer>>,
    log: Arc<dyn ServerErrorLog>,
}

impl Default for Host {
    fn default() -> Self {
        Self {
            renderer: None,
            log: Arc::new(TracingErrorLog),
        }
    }
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn renderer(mut self, renderer: impl ViewRenderer) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn log(mut self, log: impl ServerErrorLog) -> Self {
        self.log = Arc::new(log);
        self
    }
}

/// The friendly error interceptor, bound to its configuration.
pub struct FriendlyErrors {
    config: InterceptorConfig,
    host: Host,
}

impl FriendlyErrors {
    pub fn new(config: InterceptorConfig, host: Host) -> Result<Self> {
        if let (Some(view), None, None) = (config.view_name(), config.forward_url(), &host.renderer) {
            return Err(FriendlyErrorsError::MissingRenderer {
                view: view.to_string(),
            });
        }
        Ok(Self { config, host })
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    /// The error marker of `response`, if it is an error outcome.
    pub fn error_for(&self, response: &Response) -> Option<ErrorResponse> {
        if let Some(error) = response.extensions().get::<ErrorResponse>() {
            return Some(error.clone());
        }
        let status = response.status();
        (self.config.intercept_plain_errors() && (status.is_client_error() || status.is_server_error()))
            .then(|| ErrorResponse::from_status(status))
    }

    pub async fn intercept<I: Injector>(
        &self,
        request: &RequestContext,
        response: Response,
        injector: &mut I,
    ) -> Result<Response> {
        let error = self.error_for(&response);
        let outcome = self.resolve(request, error.as_ref(), injector).await?;
        Ok(outcome.into_response(response, error))
    }

    pub async fn resolve<I: Injector>(
        &self,
        request: &RequestContext,
        error: Option<&ErrorResponse>,
        injector: &mut I,
    ) -> Result<Outcome> {
        let Classification {
            decision,
            log_server_error,
        } = classify(error, request, &self.config);
        let Some(error) = error else {
            return Ok(Outcome::PassThrough);
        };

        if log_server_error {
            self.host.log.record(&ServerErrorRecord::new(error, request));
        }

        tracing::debug!(
            path = %request.path,
            status_code = error.status_code(),
            decision = ?decision,
            "friendly error decision"
        );

        match decision {
            Decision::PassThrough => Ok(Outcome::PassThrough),
            Decision::LoopFallback => Ok(Outcome::fallback(error)),
            Decision::Forward { uri } => Ok(self.forward(uri, error, injector).await),
            Decision::Render { view, context } => {
                let renderer = self
                    .host
                    .renderer
                    .as_ref()
                    .ok_or_else(|| FriendlyErrorsError::MissingRenderer { view: view.clone() })?;
                let body = renderer.render(&view, &context)?;
                Ok(Outcome::Render {
                    body,
                    status: error.status,
                })
            }
            Decision::DefaultHtml { error: label, message } => Ok(Outcome::Render {
                body: default_html(&label, &message),
                status: error.status,
            }),
        }
    }

    async fn forward<I: Injector>(&self, uri: String, error: &ErrorResponse, injector: &mut I) -> Outcome {
        let response = match self.inject(&uri, injector).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "error forward failed, answering with fallback");
                return Outcome::fallback(error);
            }
        };

        // A failing error route is answered the way a loop is.
        if let Some(forwarded) = self.error_for(&response) {
            tracing::warn!(
                %uri,
                status_code = forwarded.status_code(),
                "error route failed, answering with fallback"
            );
            return Outcome::fallback_as(&forwarded, error.status);
        }

        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        match body::to_bytes(response.into_body(), usize::MAX).await {
            Ok(body) => Outcome::Forward {
                body,
                content_type,
                status: error.status,
            },
            Err(e) => {
                tracing::warn!(error = %e, %uri, "error route body unreadable, answering with fallback");
                Outcome::fallback(error)
            }
        }
    }

    async fn inject<I: Injector>(&self, uri: &str, injector: &mut I) -> Result<Response> {
        let forward_error = |message: String| FriendlyErrorsError::Forward {
            url: uri.to_string(),
            message,
        };

        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .map_err(|e| forward_error(e.to_string()))?;

        injector
            .inject(request)
            .await
            .map_err(|e| forward_error(e.to_string()))
    }
}
