use std::{ops::Range, sync::Arc};

use crate::{error::StacheResult, template::Template, visitor::Visitor};

/// The open and close markers of a tag.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Delimiters {
    pub open: String,
    pub close: String,
}

impl Delimiters {
    pub fn new<O: Into<String>, C: Into<String>>(open: O, close: C) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new("{{", "}}")
    }
}

/// One node of a compiled template.
///
/// Adding a variant here forces every [`Visitor`] to grow a handler, since the
/// trait has no default methods.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(TextNode),
    Variable(VariableTag),
    Section(SectionTag),
    Partial(PartialNode),
    InheritablePartial(InheritablePartialNode),
    InheritableSection(InheritableSection),
}

impl Node {
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> StacheResult<()> {
        match self {
            Self::Text(node) => node.accept(visitor),
            Self::Variable(node) => node.accept(visitor),
            Self::Section(node) => node.accept(visitor),
            Self::Partial(node) => node.accept(visitor),
            Self::InheritablePartial(node) => node.accept(visitor),
            Self::InheritableSection(node) => node.accept(visitor),
        }
    }

    pub fn text<T: Into<String>>(text: T) -> Self {
        Self::Text(TextNode::new(text))
    }

    /// An HTML-escaped variable tag, `{{name}}`.
    pub fn variable<T: Into<String>>(name: T) -> Self {
        Self::Variable(VariableTag::new(name, true))
    }

    /// An unescaped variable tag, `{{{name}}}`.
    pub fn raw_variable<T: Into<String>>(name: T) -> Self {
        Self::Variable(VariableTag::new(name, false))
    }

    pub fn section<T: Into<String>>(name: T, children: Vec<Self>) -> Self {
        Self::Section(SectionTag::new(name, false, children))
    }

    pub fn inverted_section<T: Into<String>>(name: T, children: Vec<Self>) -> Self {
        Self::Section(SectionTag::new(name, true, children))
    }

    pub fn partial<T: Into<String>>(name: T) -> Self {
        Self::Partial(PartialNode::named(name))
    }

    pub fn inheritable_partial<T: Into<String>>(
        name: T,
        overrides: Vec<InheritableSection>,
    ) -> Self {
        Self::InheritablePartial(InheritablePartialNode::new(
            PartialNode::named(name),
            overrides,
        ))
    }

    pub fn block<T: Into<String>>(name: T, children: Vec<Self>) -> Self {
        Self::InheritableSection(InheritableSection::new(name, children))
    }
}

/// Literal output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    pub text: String,
}

impl TextNode {
    pub fn new<T: Into<String>>(text: T) -> Self {
        Self { text: text.into() }
    }

    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> StacheResult<()> {
        visitor.visit_text(self)
    }
}

/// `{{name}}` or `{{{name}}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableTag {
    pub name: String,
    pub escaped: bool,
}

impl VariableTag {
    pub fn new<T: Into<String>>(name: T, escaped: bool) -> Self {
        Self {
            name: name.into(),
            escaped,
        }
    }

    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> StacheResult<()> {
        visitor.visit_variable(self)
    }
}

/// `{{#name}}…{{/name}}` or `{{^name}}…{{/name}}`.
///
/// Besides the parsed children, a section remembers where its unparsed body
/// lives in the template source and which delimiters were active, so lambdas
/// can be handed the raw text and their output re-parsed the same way.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionTag {
    pub name: String,
    pub inverted: bool,
    pub children: Vec<Node>,
    pub source: Arc<str>,
    pub body: Range<usize>,
    pub delimiters: Delimiters,
}

impl SectionTag {
    /// A section without source text, as built by hand rather than parsed.
    pub fn new<T: Into<String>>(name: T, inverted: bool, children: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            inverted,
            children,
            source: Arc::from(""),
            body: 0..0,
            delimiters: Delimiters::default(),
        }
    }

    #[must_use]
    pub fn with_source(
        mut self,
        source: Arc<str>,
        body: Range<usize>,
        delimiters: Delimiters,
    ) -> Self {
        self.source = source;
        self.body = body;
        self.delimiters = delimiters;
        self
    }

    /// The unparsed text between the opening and closing tags.
    pub fn raw_body(&self) -> &str {
        self.source.get(self.body.clone()).unwrap_or_default()
    }

    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> StacheResult<()> {
        visitor.visit_section(self)
    }
}

/// `{{>name}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialNode {
    pub name: String,
    /// Whitespace that preceded a standalone partial tag. Every line of the
    /// included output is prefixed with it.
    pub indent: String,
    /// Resolved ahead of time, or `None` to go through the loader.
    pub target: Option<Arc<Template>>,
}

impl PartialNode {
    pub fn named<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            indent: String::new(),
            target: None,
        }
    }

    pub fn resolved<T: Into<String>>(name: T, template: Arc<Template>) -> Self {
        Self {
            target: Some(template),
            ..Self::named(name)
        }
    }

    #[must_use]
    pub fn with_indent<T: Into<String>>(mut self, indent: T) -> Self {
        self.indent = indent.into();
        self
    }

    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> StacheResult<()> {
        visitor.visit_partial(self)
    }
}

/// `{{<name}}{{$block}}…{{/block}}{{/name}}`: a partial plus the blocks it
/// overrides inside the included template.
#[derive(Debug, Clone, PartialEq)]
pub struct InheritablePartialNode {
    pub partial: PartialNode,
    pub overrides: Vec<Arc<InheritableSection>>,
}

impl InheritablePartialNode {
    pub fn new(partial: PartialNode, overrides: Vec<InheritableSection>) -> Self {
        Self {
            partial,
            overrides: overrides.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.partial.name
    }

    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> StacheResult<()> {
        visitor.visit_inheritable_partial(self)
    }
}

/// `{{$name}}default{{/name}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct InheritableSection {
    pub name: String,
    pub children: Vec<Node>,
}

impl InheritableSection {
    pub fn new<T: Into<String>>(name: T, children: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }

    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> StacheResult<()> {
        visitor.visit_inheritable_section(self)
    }
}
