use crate::common::RequestContext;
use crate::config::FriendlyErrorsConfig;
use crate::error::Result;
use crate::interceptor::{FriendlyErrors, Host, Injector, InterceptorError, InterceptorResult};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
    routing::IntoMakeService,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};

/// Validate `config` once and build the layer that installs the friendly
/// error hook around a router.
///
/// The layer must wrap the whole [`Router`]: forwarded errors are routed
/// through the wrapped service, so it has to see every route.
///
/// ```rust,no_run
/// use axum::{Router, routing::get};
/// use friendly_errors::{Boom, FriendlyErrorsConfig, Host, register};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let layer = register(FriendlyErrorsConfig::new().forward_url("/error"), Host::new())?;
/// let app = layer.wrap(
///     Router::new()
///         .route("/missing", get(|| async { Boom::not_found("nothing here") }))
///         .route("/error", get(|| async { "custom error page" })),
/// );
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
/// axum::serve(listener, app.into_make_service()).await?;
/// # Ok(())
/// # }
/// ```
pub fn register(config: FriendlyErrorsConfig, host: Host) -> Result<FriendlyErrorsLayer> {
    let config = config.validate()?;
    tracing::info!(
        view = config.view_name(),
        forward_url = config.forward_url().map(|url| url.path()),
        log_server_errors = config.log_server_errors(),
        "friendly error handling registered"
    );
    Ok(FriendlyErrorsLayer::new(FriendlyErrors::new(config, host)?))
}

/// Tower Layer installing [`FriendlyErrors`] after request handling
///
/// Only a whole [`Router`] can be wrapped. `Router::layer` would install the
/// hook on every route separately, where a forward to another route cannot
/// be served, so it is rejected at compile time:
///
/// ```rust,compile_fail
/// use axum::{Router, routing::get};
/// use friendly_errors::{FriendlyErrorsConfig, Host, register};
///
/// let layer = register(FriendlyErrorsConfig::new().forward_url("/error"), Host::new()).unwrap();
/// let app: Router = Router::new()
///     .route("/error", get(|| async { "custom error page" }))
///     .layer(layer);
/// ```
#[derive(Clone)]
pub struct FriendlyErrorsLayer {
    core: Arc<FriendlyErrors>,
}

impl FriendlyErrorsLayer {
    pub fn new(core: FriendlyErrors) -> Self {
        Self {
            core: Arc::new(core),
        }
    }

    pub fn core(&self) -> &FriendlyErrors {
        &self.core
    }

    /// Wrap the application router.
    pub fn wrap(&self, router: Router) -> FriendlyErrorsMiddleware<Router> {
        self.layer(router)
    }
}

impl Layer<Router> for FriendlyErrorsLayer {
    type Service = FriendlyErrorsMiddleware<Router>;

    fn layer(&self, inner: Router) -> Self::Service {
        FriendlyErrorsMiddleware {
            inner,
            core: self.core.clone(),
        }
    }
}

#[derive(Clone)]
pub struct FriendlyErrorsMiddleware<S> {
    inner: S,
    core: Arc<FriendlyErrors>,
}

impl FriendlyErrorsMiddleware<Router> {
    /// Make service for `axum::serve`.
    pub fn into_make_service(self) -> IntoMakeService<Self> {
        axum::ServiceExt::<Request<Body>>::into_make_service(self)
    }
}

impl<S> Service<Request<Body>> for FriendlyErrorsMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<InterceptorError> + Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = std::result::Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let core = self.core.clone();

        // The readied service handles this request; a fresh clone serves the
        // forwarded self-requests.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let mut injector = ServiceInjector::new(self.inner.clone());

        Box::pin(async move {
            let payload_limit = core
                .config()
                .log_server_errors()
                .then(|| core.config().payload_limit());
            let (request, context) = RequestContext::capture(request, payload_limit).await;

            let response = inner.call(request).await?;

            Ok(core
                .intercept(&context, response, &mut injector)
                .await
                .unwrap_or_else(IntoResponse::into_response))
        })
    }
}

/// [`Injector`] that routes self-requests through a tower service.
#[derive(Clone)]
pub struct ServiceInjector<S> {
    service: S,
}

impl<S> ServiceInjector<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> Injector for ServiceInjector<S>
where
    S: Service<Request<Body>, Response = Response> + Send + 'static,
    S::Future: Send,
    S::Error: Into<InterceptorError>,
{
    async fn inject(&mut self, request: Request<Body>) -> InterceptorResult {
        let service = self.service.ready().await.map_err(Into::into)?;
        service.call(request).await.map_err(Into::into)
    }
}
