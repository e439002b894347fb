//! Server-side HTML rendering.
//!
//! [`Views`] wraps a `minijinja` environment loaded from the template
//! directory at startup. Compiled templates are cached by the engine, so the
//! environment is built once and only read afterwards. Custom filters (the
//! application registers a relative-time `datetime`) are added before the
//! first render.

use std::path::Path;

use minijinja::Environment;
use serde_json::Value;

use crate::error::ViewError;

pub struct Views {
    env: Environment<'static>,
}

impl Views {
    /// An environment backed by a template directory.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(dir.as_ref()));
        Self { env }
    }

    /// An empty environment; templates are added programmatically.
    pub fn empty() -> Self {
        Self { env: Environment::new() }
    }

    /// Direct access for filter and template registration at startup.
    pub fn env_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }

    pub fn render(&self, name: &str, model: &Value) -> Result<String, ViewError> {
        let template = self.env.get_template(name)?;
        Ok(template.render(model)?)
    }
}

impl std::fmt::Debug for Views {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Views")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_model_fields() {
        let mut views = Views::empty();
        views.env_mut().add_template("tpl.html", "x = {{ x }}").unwrap();
        let html = views.render("tpl.html", &json!({"x": 1})).unwrap();
        assert_eq!(html, "x = 1");
    }

    #[test]
    fn missing_template_is_an_error() {
        let views = Views::empty();
        assert!(views.render("absent.html", &json!({})).is_err());
    }

    #[test]
    fn custom_filters_apply() {
        let mut views = Views::empty();
        views.env_mut().add_filter("shout", |value: String| value.to_uppercase());
        views.env_mut().add_template("tpl.html", "{{ word|shout }}").unwrap();
        let html = views.render("tpl.html", &json!({"word": "hi"})).unwrap();
        assert_eq!(html, "HI");
    }
}
