//! Friendly error pages in front of a small axum app.
//!
//! ```text
//! cargo run --example friendly_server
//! curl -i -H 'accept: text/html' localhost:3000/users/42
//! curl -i -H 'accept: application/json' localhost:3000/users/42
//! ```
//!
//! Set `FRIENDLY_ERRORS_URL=/error` to forward errors to the `/error` route
//! instead of rendering the built-in view.

use axum::{Router, extract::Path, response::Html, routing::get};
use friendly_errors::{Boom, ForwardedError, FriendlyErrorsConfig, Host, TeraRenderer, register};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

const ERROR_VIEW: &str = r#"<!doctype html>
<html>
  <head><title>{{ statusCode }} {{ error }}</title></head>
  <body>
    <h1>{{ error }}</h1>
    <p>{{ message }}</p>
    <footer>Contact {{ supportEmail }}</footer>
  </body>
</html>
"#;

async fn get_user(Path(id): Path<u32>) -> Result<String, Boom> {
    match id {
        1 => Ok("Test User".to_string()),
        7 => Err(Boom::internal("user store unavailable")),
        _ => Err(Boom::not_found(format!("User {id} not found"))),
    }
}

async fn error_page(forwarded: ForwardedError) -> Html<String> {
    Html(format!(
        "<h1>{} {}</h1><p>{}</p>",
        forwarded.status.as_u16(),
        tera::escape_html(&forwarded.error),
        tera::escape_html(&forwarded.message)
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,friendly_errors=debug")),
        )
        .init();

    let mut config = FriendlyErrorsConfig::from_env()?.log_server_errors(true);
    if config.forward_url.is_none() && config.view_name.is_none() {
        config = config.view("error");
    }
    if !config.extra_context.contains_key("supportEmail") {
        config = config.context("supportEmail", "help@example.com");
    }

    let renderer = TeraRenderer::from_templates([("error.html", ERROR_VIEW)])?;
    let layer = register(config, Host::new().renderer(renderer))?;

    let router = Router::new()
        .route("/", get(|| async { "Hello" }))
        .route("/users/{id}", get(get_user))
        .route("/error", get(error_page))
        .layer(TraceLayer::new_for_http());
    let app = layer.wrap(router);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
