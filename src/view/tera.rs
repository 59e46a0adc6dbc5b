use super::ViewRenderer;
use crate::error::{FriendlyErrorsError, Result};
use serde_json::{Map, Value};
use tera::{Context, Tera};

const DEFAULT_EXTENSION: &str = "html";

/// Tera-backed [`ViewRenderer`].
///
/// A view name resolves to a template of that exact name, or failing that to
/// `<name>.<extension>`, so `"error"` finds `error.html`.
pub struct TeraRenderer {
    tera: Tera,
    extension: String,
}

impl TeraRenderer {
    /// Load every template matching `glob`, e.g. `"templates/**/*.html"`.
    pub fn from_glob(glob: &str) -> Result<Self> {
        let tera = Tera::new(glob).map_err(|e| FriendlyErrorsError::Render {
            view: glob.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::new(tera))
    }

    /// Build from in-memory `(name, source)` pairs.
    pub fn from_templates<'a, I>(templates: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut tera = Tera::default();
        for (name, source) in templates {
            tera.add_raw_template(name, source)
                .map_err(|e| FriendlyErrorsError::Render {
                    view: name.to_string(),
                    message: e.to_string(),
                })?;
        }
        Ok(Self::new(tera))
    }

    pub fn new(tera: Tera) -> Self {
        Self {
            tera,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    fn resolve(&self, view: &str) -> Option<String> {
        let mut names = self.tera.get_template_names();
        if names.any(|name| name == view) {
            return Some(view.to_string());
        }
        let with_extension = format!("{}.{}", view, self.extension);
        self.tera
            .get_template_names()
            .any(|name| name == with_extension)
            .then_some(with_extension)
    }
}

impl ViewRenderer for TeraRenderer {
    fn render(&self, view: &str, context: &Map<String, Value>) -> Result<String> {
        let render_error = |message: String| FriendlyErrorsError::Render {
            view: view.to_string(),
            message,
        };

        let name = self
            .resolve(view)
            .ok_or_else(|| render_error("template not found".to_string()))?;
        let context = Context::from_value(Value::Object(context.clone()))
            .map_err(|e| render_error(e.to_string()))?;

        self.tera
            .render(&name, &context)
            .map_err(|e| render_error(format!("{e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Map<String, Value> {
        let mut context = Map::new();
        context.insert("statusCode".into(), 404.into());
        context.insert("error".into(), "Not Found".into());
        context.insert("message".into(), "not found here".into());
        context.insert("someData".into(), "VALUE".into());
        context
    }

    #[test]
    fn test_resolves_view_without_extension() {
        let renderer = TeraRenderer::from_templates([(
            "error.html",
            "<h1>ERROR {{ message }}</h1><p>{{ someData }}</p>",
        )])
        .unwrap();

        let html = renderer.render("error", &context()).unwrap();
        assert_eq!(html, "<h1>ERROR not found here</h1><p>VALUE</p>");
    }

    #[test]
    fn test_exact_name_wins() {
        let renderer = TeraRenderer::from_templates([
            ("error", "plain {{ statusCode }}"),
            ("error.html", "html {{ statusCode }}"),
        ])
        .unwrap();
        assert_eq!(renderer.render("error", &context()).unwrap(), "plain 404");
    }

    #[test]
    fn test_missing_template_is_render_error() {
        let renderer = TeraRenderer::from_templates([]).unwrap();
        let err = renderer.render("error", &context()).unwrap_err();
        assert!(matches!(err, FriendlyErrorsError::Render { ref view, .. } if view == "error"));
    }

    #[test]
    fn test_undefined_variable_is_render_error() {
        let renderer = TeraRenderer::from_templates([("error.html", "{{ nope }}")]).unwrap();
        assert!(renderer.render("error", &context()).is_err());
    }

    #[test]
    fn test_custom_extension() {
        let renderer = TeraRenderer::from_templates([("error.tera", "{{ error }}")])
            .unwrap()
            .with_extension("tera");
        assert_eq!(renderer.render("error", &context()).unwrap(), "Not Found");
    }
}
