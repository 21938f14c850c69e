use std::sync::Arc;

use crate::{
    ast::{Delimiters, Node},
    config::RenderConfig,
    error::StacheResult,
    loader::PartialLoader,
    parser::parse,
    render::RenderVisitor,
    value::Value,
    visitor::{Visitor, accept_all},
};

/// A compiled template: the root node list plus the source it came from.
///
/// Templates are immutable once built. Share them behind an [`Arc`] to render
/// the same tree from many places at once.
///
/// # Example
///
/// ```rust
/// use stachetree::{NoPartials, Template, Value};
///
/// let template = Template::parse("Hi {{name}}{{#items}} - {{.}}{{/items}}").unwrap();
///
/// let data = Value::map([
///     ("name", Value::from("Al")),
///     ("items", Value::from(vec!["x", "y"])),
/// ]);
///
/// assert_eq!(template.render(&data, &NoPartials).unwrap(), "Hi Al - x - y");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    name: Option<String>,
    source: Arc<str>,
    nodes: Vec<Node>,
}

#[cfg(feature = "serde")]
impl serde::Serialize for Template {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Template", 2)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("source", &*self.source)?;
        state.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Template {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct TemplateHelper {
            name: Option<String>,
            source: String,
        }

        let helper = TemplateHelper::deserialize(deserializer)?;

        // Only the source is stored, so the tree is rebuilt by parsing.
        let template = Self::parse(helper.source)
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse template: {e}")))?;

        Ok(match helper.name {
            Some(name) => template.with_name(name),
            None => template,
        })
    }
}

impl Template {
    /// Parses `source` with the default `{{ }}` delimiters.
    ///
    /// # Errors
    ///
    /// Returns a `StacheError::Parse` error if the template syntax is invalid.
    pub fn parse<T: Into<Arc<str>>>(source: T) -> StacheResult<Self> {
        Self::parse_with_delimiters(source, Delimiters::default())
    }

    /// Parses `source`, starting with the given delimiters.
    ///
    /// # Errors
    ///
    /// Returns a `StacheError::Parse` error if the template syntax is invalid.
    pub fn parse_with_delimiters<T: Into<Arc<str>>>(
        source: T,
        delimiters: Delimiters,
    ) -> StacheResult<Self> {
        let source: Arc<str> = source.into();
        let nodes = parse(&source, delimiters)?;
        Ok(Self {
            name: None,
            source,
            nodes,
        })
    }

    /// Wraps a tree built by some other front end.
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self {
            name: None,
            source: Arc::from(""),
            nodes,
        }
    }

    #[must_use]
    pub fn with_name<T: Into<String>>(mut self, name: T) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Visits every root node in order.
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> StacheResult<()> {
        accept_all(&self.nodes, visitor)
    }

    /// Renders against `data` with the default [`RenderConfig`].
    ///
    /// # Errors
    ///
    /// Any [`crate::StacheError`] raised while rendering; no partial output is
    /// returned.
    pub fn render<L: PartialLoader + ?Sized>(
        &self,
        data: &Value,
        loader: &L,
    ) -> StacheResult<String> {
        self.render_with(data, loader, RenderConfig::default())
    }

    /// Renders against `data` with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Any [`crate::StacheError`] raised while rendering; no partial output is
    /// returned.
    pub fn render_with<L: PartialLoader + ?Sized>(
        &self,
        data: &Value,
        loader: &L,
        config: RenderConfig,
    ) -> StacheResult<String> {
        let mut visitor = RenderVisitor::new(data, loader, config);
        if let Some(name) = &self.name {
            visitor = visitor.with_root_name(name);
        }
        self.accept(&mut visitor)?;
        Ok(visitor.into_output())
    }
}
