//! Template engine implementation
//!
//! Wraps a minijinja environment configured with Jinja2 whitespace control
//! and the functions in [`crate::functions`].

use crate::functions;
use crate::{Error, Result};
use minijinja::Environment;

/// Template engine for rendering templates
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create a new template engine
    #[must_use]
    pub fn new() -> Self {
        let mut env = Environment::new();

        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);

        env.add_function("env", functions::env);
        env.add_function("os", functions::os);
        env.add_function("arch", functions::arch);
        env.add_function("joinPath", functions::join_path);

        env.add_filter("quote", functions::quote);
        env.add_filter("toJson", functions::to_json);
        env.add_filter("fromJson", functions::from_json);

        Self { env }
    }

    /// Render a template string with a specific name for error messages
    ///
    /// # Examples
    ///
    /// ```
    /// use hearth_template::TemplateEngine;
    ///
    /// let engine = TemplateEngine::new();
    /// let out = engine
    ///     .render_named("greeting", "Hello {{ name }}!", &serde_json::json!({"name": "Ada"}))
    ///     .unwrap();
    /// assert_eq!(out, "Hello Ada!");
    /// ```
    pub fn render_named(
        &self,
        name: &str,
        template: &str,
        context: &serde_json::Value,
    ) -> Result<String> {
        self.env
            .render_named_str(name, template, context)
            .map_err(Error::from)
    }

    /// Render template bytes; the template must be valid UTF-8
    pub fn render_bytes(
        &self,
        name: &str,
        template: &[u8],
        context: &serde_json::Value,
    ) -> Result<Vec<u8>> {
        let template = std::str::from_utf8(template)
            .map_err(|e| Error::Syntax(format!("{name} is not valid UTF-8: {e}")))?;
        self.render_named(name, template, context)
            .map(String::into_bytes)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl hearth_core::TemplateRenderer for TemplateEngine {
    fn render_str(
        &self,
        template: &str,
        context: &serde_json::Value,
    ) -> hearth_core::Result<String> {
        self.render_named("<string>", template, context)
            .map_err(Into::into)
    }

    fn render_named_str(
        &self,
        name: &str,
        template: &str,
        context: &serde_json::Value,
    ) -> hearth_core::Result<String> {
        self.render_named(name, template, context)
            .map_err(Into::into)
    }
}
