//! Rendering of friendly error pages.

use crate::error::Result;
use serde_json::{Map, Value};

mod tera;

pub use self::tera::TeraRenderer;

/// Renders a named template against an error context.
///
/// Implementations must be cheap to share; the layer holds one behind an
/// `Arc` for every request.
pub trait ViewRenderer: Send + Sync + 'static {
    fn render(&self, view: &str, context: &Map<String, Value>) -> Result<String>;
}

/// Built-in page used when no view and no forward url are configured.
pub fn default_html(error: &str, message: &str) -> String {
    format!(
        "<h1>There was an error</h1><h2>{}: {}</h2>",
        ::tera::escape_html(error),
        ::tera::escape_html(message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_html() {
        assert_eq!(
            default_html("Not Found", "not found here"),
            "<h1>There was an error</h1><h2>Not Found: not found here</h2>"
        );
    }

    #[test]
    fn test_default_html_escapes_message() {
        let html = default_html("Bad Request", "<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
