use std::{collections::HashMap, sync::Arc};

use crate::{
    collect::{Dependencies, DependencyCollector},
    config::RenderConfig,
    error::{StacheError, StacheResult},
    loader::PartialLoader,
    render::{CancelFlag, RenderVisitor},
    template::Template,
    validate::Validator,
    value::Value,
};

/// `Engine` owns a set of named templates and renders them by name.
///
/// Every registered template is also available to the others as a partial,
/// so `{{>header}}` in one template includes the template added as `header`.
///
/// # Examples
///
/// ```
/// use stachetree::{Engine, Value};
///
/// let mut engine = Engine::new();
/// engine.add_template("header", "<h1>{{title}}</h1>").unwrap();
/// engine.add_template("page", "{{>header}}{{body}}").unwrap();
///
/// let data = Value::map([("title", "Hi"), ("body", "text")]);
/// assert_eq!(engine.render("page", &data).unwrap(), "<h1>Hi</h1>text");
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct Engine {
    templates: HashMap<String, Arc<Template>>,
    config: RenderConfig,
}

impl Engine {
    /// Creates an engine with no templates and the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RenderConfig) -> Self {
        Self {
            templates: HashMap::new(),
            config,
        }
    }

    pub const fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Parses `content` and registers it under `name`.
    ///
    /// # Errors
    ///
    /// * `StacheError::TemplateExists` if `name` is already registered
    /// * `StacheError::Parse` if `content` is not a valid template
    ///
    /// # Examples
    ///
    /// ```
    /// use stachetree::{Engine, StacheError};
    ///
    /// let mut engine = Engine::new();
    /// engine.add_template("greeting", "Hello, {{name}}!").unwrap();
    ///
    /// assert!(matches!(
    ///     engine.add_template("greeting", "again"),
    ///     Err(StacheError::TemplateExists { .. })
    /// ));
    /// ```
    pub fn add_template<N, C>(&mut self, name: N, content: C) -> StacheResult<()>
    where
        N: AsRef<str>,
        C: Into<Arc<str>>,
    {
        let name = name.as_ref();
        if self.templates.contains_key(name) {
            return Err(StacheError::TemplateExists {
                template_name: name.to_string(),
            });
        }

        let template = Template::parse(content)?.with_name(name);
        crate::debug!(template = name, "registered template");
        self.templates.insert(name.to_string(), Arc::new(template));
        Ok(())
    }

    /// Registers an already compiled template, replacing any previous one
    /// under the same name.
    pub fn insert_template<N: Into<String>>(
        &mut self,
        name: N,
        template: Template,
    ) -> Option<Arc<Template>> {
        let name = name.into();
        let template = Arc::new(template.with_name(name.as_str()));
        crate::debug!(template = %name, "inserted template");
        self.templates.insert(name, template)
    }

    /// Re-parses `content` under an existing or new `name`.
    ///
    /// Renders already holding the old tree keep using it until they finish.
    ///
    /// # Errors
    ///
    /// * `StacheError::Parse` if `content` is not a valid template; the
    ///   previous template stays registered
    pub fn reload_template<N, C>(&mut self, name: N, content: C) -> StacheResult<()>
    where
        N: AsRef<str>,
        C: Into<Arc<str>>,
    {
        let name = name.as_ref();
        let template = Template::parse(content)?.with_name(name);
        crate::debug!(template = name, "reloaded template");
        self.templates.insert(name.to_string(), Arc::new(template));
        Ok(())
    }

    pub fn remove_template(&mut self, name: &str) -> Option<Arc<Template>> {
        self.templates.remove(name)
    }

    pub fn get_template(&self, name: &str) -> Option<&Arc<Template>> {
        self.templates.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    fn template(&self, name: &str) -> StacheResult<&Arc<Template>> {
        self.templates
            .get(name)
            .ok_or_else(|| StacheError::MissingTemplate {
                template_name: name.to_string(),
            })
    }

    /// Renders the template registered as `name` against `data`.
    ///
    /// # Errors
    ///
    /// * `StacheError::MissingTemplate` if no template has that name
    /// * Any error raised while rendering (missing partials, cycles, lambda
    ///   failures and so on)
    pub fn render<N: AsRef<str>>(&self, name: N, data: &Value) -> StacheResult<String> {
        self.render_inner(name.as_ref(), data, None)
    }

    /// Like [`Engine::render`], but gives up with `StacheError::Cancelled`
    /// once `flag` is set.
    ///
    /// # Errors
    ///
    /// As for [`Engine::render`], plus `StacheError::Cancelled`.
    pub fn render_with_cancel<N: AsRef<str>>(
        &self,
        name: N,
        data: &Value,
        flag: CancelFlag,
    ) -> StacheResult<String> {
        self.render_inner(name.as_ref(), data, Some(flag))
    }

    fn render_inner(
        &self,
        name: &str,
        data: &Value,
        flag: Option<CancelFlag>,
    ) -> StacheResult<String> {
        let template = self.template(name)?;
        crate::trace!(template = name, "rendering");

        let mut visitor = RenderVisitor::new(data, self, self.config.clone()).with_root_name(name);
        if let Some(flag) = flag {
            visitor = visitor.with_cancel_flag(flag);
        }
        template.accept(&mut visitor)?;
        Ok(visitor.into_output())
    }

    /// Every name `name` depends on, following partials through the engine.
    ///
    /// # Errors
    ///
    /// * `StacheError::MissingTemplate` if no template has that name
    ///
    /// # Examples
    ///
    /// ```
    /// use stachetree::Engine;
    ///
    /// let mut engine = Engine::new();
    /// engine.add_template("greeting", "Hello, {{name}}!").unwrap();
    ///
    /// let deps = engine.dependencies("greeting").unwrap();
    /// assert!(deps.variables.contains("name"));
    /// ```
    pub fn dependencies(&self, name: &str) -> StacheResult<Dependencies> {
        let template = self.template(name)?;
        let mut collector = DependencyCollector::new(Some(self)).with_visited(name);
        template.accept(&mut collector)?;
        Ok(collector.into_dependencies())
    }

    /// Root names `name` uses that `data` does not provide, sorted.
    ///
    /// Returns an empty list for an unknown template.
    pub fn missing_variables(&self, name: &str, data: &Value) -> Vec<String> {
        self.dependencies(name)
            .map(|deps| {
                deps.missing_from(data)
                    .into_iter()
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Checks every branch of `name` for problems a render could hit.
    ///
    /// # Errors
    ///
    /// * `StacheError::MissingTemplate` if no template has that name
    /// * Anything [`Validator::validate`] reports
    pub fn validate(&self, name: &str) -> StacheResult<()> {
        let template = self.template(name)?;
        Validator::new(self, &self.config)
            .with_root_name(name)
            .validate(template)
    }
}

impl PartialLoader for Engine {
    fn load_partial(&self, name: &str) -> StacheResult<Arc<Template>> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| StacheError::PartialNotFound {
                name: name.to_string(),
            })
    }
}
