use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    ast::{
        Delimiters, InheritablePartialNode, InheritableSection, Node, PartialNode, SectionTag,
        TextNode, VariableTag,
    },
    config::{InvertedLambda, RenderConfig},
    context::ContextStack,
    error::{StacheError, StacheResult},
    escape::escape_html_into,
    inheritance::{InclusionPath, OverrideScope, OverrideScopes},
    loader::PartialLoader,
    parser::parse,
    template::Template,
    value::{Lambda, Shape, Value},
    visitor::{Visitor, accept_all},
};

/// A shared flag that aborts a render in progress.
///
/// Every handler checks the flag on entry; once set, the render fails with
/// [`StacheError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The visitor that turns a tree into text.
///
/// All mutable render state lives here, so independent renders of the same
/// template never share anything but the immutable tree.
///
/// # Example
///
/// ```
/// use stachetree::{Node, NoPartials, RenderConfig, RenderVisitor, Template, Value};
///
/// let template = Template::from_nodes(vec![Node::text("Hello, "), Node::variable("name")]);
/// let data = Value::map([("name", "World")]);
///
/// let mut visitor = RenderVisitor::new(&data, &NoPartials, RenderConfig::default());
/// template.accept(&mut visitor).unwrap();
/// assert_eq!(visitor.into_output(), "Hello, World");
/// ```
pub struct RenderVisitor<'a, L: PartialLoader + ?Sized> {
    loader: &'a L,
    config: RenderConfig,
    context: ContextStack<'a>,
    overrides: OverrideScopes,
    inclusions: InclusionPath,
    depth: usize,
    output: String,
    /// Combined indentation of the standalone partials being rendered.
    indent: String,
    /// Whether the next template text begins a line of the current partial.
    line_start: bool,
    cancel: Option<CancelFlag>,
}

impl<'a, L: PartialLoader + ?Sized> RenderVisitor<'a, L> {
    pub fn new(data: &'a Value, loader: &'a L, config: RenderConfig) -> Self {
        Self {
            loader,
            config,
            context: ContextStack::new(data),
            overrides: OverrideScopes::new(),
            inclusions: InclusionPath::new(),
            depth: 0,
            output: String::new(),
            indent: String::new(),
            line_start: true,
            cancel: None,
        }
    }

    /// Puts the template being rendered on the inclusion path, so a partial
    /// that includes it back is reported as a cycle straight away.
    #[must_use]
    pub fn with_root_name(mut self, name: &str) -> Self {
        self.inclusions = InclusionPath::rooted(name);
        self
    }

    #[must_use]
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn into_output(self) -> String {
        self.output
    }

    fn check_cancelled(&self) -> StacheResult<()> {
        match &self.cancel {
            Some(flag) if flag.is_cancelled() => Err(StacheError::Cancelled),
            Some(_) | None => Ok(()),
        }
    }

    /// Runs `f` one nesting level deeper.
    fn descend<F>(&mut self, f: F) -> StacheResult<()>
    where
        F: FnOnce(&mut Self) -> StacheResult<()>,
    {
        if self.depth >= self.config.max_depth {
            crate::debug!(limit = self.config.max_depth, "maximum depth exceeded");
            return Err(StacheError::DepthExceeded {
                limit: self.config.max_depth,
            });
        }
        self.depth = self.depth.saturating_add(1);
        let result = f(self);
        self.depth = self.depth.saturating_sub(1);
        result
    }

    /// Renders `nodes` with `frame` on top of the context stack.
    fn with_frame(&mut self, frame: &'a Value, nodes: &[Node]) -> StacheResult<()> {
        self.context.push(frame);
        let result = self.descend(|this| accept_all(nodes, this));
        self.context.pop();
        result
    }

    /// Runs `f` with its output captured instead of appended.
    fn capture<F>(&mut self, f: F) -> StacheResult<String>
    where
        F: FnOnce(&mut Self) -> StacheResult<()>,
    {
        let outer = std::mem::take(&mut self.output);
        let indent = std::mem::take(&mut self.indent);
        let line_start = self.line_start;
        let result = f(self);
        self.indent = indent;
        self.line_start = line_start;
        let captured = std::mem::replace(&mut self.output, outer);
        result.map(|()| captured)
    }

    /// Parses text a lambda returned and renders it in place, with the same
    /// context, overrides and inclusion path.
    fn render_lambda_output(&mut self, text: String, delimiters: Delimiters) -> StacheResult<()> {
        let source: Arc<str> = Arc::from(text);
        let nodes = parse(&source, delimiters)?;
        self.descend(|this| accept_all(&nodes, this))
    }

    fn invoke(name: &str, lambda: &Lambda, raw: &str) -> StacheResult<String> {
        crate::trace!(lambda = name, "invoking lambda");
        lambda.invoke(raw).map_err(|e| StacheError::Lambda {
            name: name.to_string(),
            message: e.to_string(),
        })
    }

    fn resolve_partial(&self, partial: &PartialNode) -> StacheResult<Arc<Template>> {
        match &partial.target {
            Some(template) => Ok(Arc::clone(template)),
            None => self.loader.load_partial(&partial.name),
        }
    }

    /// Renders the partial's target in place, guarding against cycles.
    fn include(&mut self, partial: &PartialNode) -> StacheResult<()> {
        let template = self.resolve_partial(partial)?;
        self.inclusions.enter(&partial.name)?;
        crate::trace!(partial = %partial.name, depth = self.inclusions.len(), "entering partial");

        let outer_indent = self.indent.len();
        if !partial.indent.is_empty() {
            self.indent.push_str(&partial.indent);
            self.line_start = true;
        }
        let result = self.descend(|this| template.accept(this));
        self.indent.truncate(outer_indent);

        self.inclusions.exit();
        result
    }

    /// Writes the pending partial indentation if `text` opens a line.
    fn indent_if_line_start(&mut self, text: &str) {
        if self.line_start && !text.is_empty() {
            self.output.push_str(&self.indent);
            self.line_start = false;
        }
    }

    /// Appends template text. Inside indented partials, every line the text
    /// starts is indented, blank ones included; interpolated values never are.
    fn write_template_text(&mut self, text: &str) {
        if self.indent.is_empty() {
            self.output.push_str(text);
            return;
        }
        for line in text.split_inclusive('\n') {
            self.indent_if_line_start(line);
            self.output.push_str(line);
            self.line_start = line.ends_with('\n');
        }
    }

    fn render_inverted_lambda(&mut self, section: &SectionTag) -> StacheResult<()> {
        match self.config.inverted_lambda {
            InvertedLambda::Reject => Err(StacheError::UnsupportedInvertedLambda {
                name: section.name.clone(),
            }),
            InvertedLambda::Truthy => Ok(()),
            InvertedLambda::Falsey => self.descend(|this| accept_all(&section.children, this)),
        }
    }
}


impl<L: PartialLoader + ?Sized> Visitor for RenderVisitor<'_, L> {
    fn visit_text(&mut self, text: &TextNode) -> StacheResult<()> {
        self.check_cancelled()?;
        self.write_template_text(&text.text);
        Ok(())
    }

    fn visit_variable(&mut self, variable: &VariableTag) -> StacheResult<()> {
        self.check_cancelled()?;

        let Some(value) = self.context.resolve(&variable.name) else {
            if self.config.strict_variables {
                return Err(StacheError::MissingVariable {
                    variable_name: variable.name.clone(),
                });
            }
            return Ok(());
        };

        let text = match value {
            Value::Lambda(lambda) => {
                let template = Self::invoke(&variable.name, lambda, "")?;
                self.capture(|this| {
                    this.render_lambda_output(template, Delimiters::default())
                })?
            }
            Value::Null
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::String(_)
            | Value::List(_)
            | Value::Map(_) => value.to_text().ok_or_else(|| StacheError::Conversion {
                name: variable.name.clone(),
                found: value.kind(),
            })?,
        };

        self.indent_if_line_start(&text);
        if variable.escaped {
            escape_html_into(&text, &mut self.output);
        } else {
            self.output.push_str(&text);
        }
        Ok(())
    }

    fn visit_section(&mut self, section: &SectionTag) -> StacheResult<()> {
        self.check_cancelled()?;

        let value = self.context.resolve(&section.name);
        let shape = value.map_or(Shape::Falsey, Value::shape);

        if section.inverted {
            return match shape {
                Shape::Falsey => self.descend(|this| accept_all(&section.children, this)),
                Shape::Renderable => self.render_inverted_lambda(section),
                Shape::Scalar | Shape::Sequence => Ok(()),
            };
        }

        let Some(value) = value else {
            return Ok(());
        };
        if shape == Shape::Falsey {
            return Ok(());
        }

        match value {
            Value::List(items) => {
                for item in items {
                    self.with_frame(item, &section.children)?;
                }
                Ok(())
            }
            Value::Lambda(lambda) => {
                let text = Self::invoke(&section.name, lambda, section.raw_body())?;
                self.render_lambda_output(text, section.delimiters.clone())
            }
            Value::Null
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::String(_)
            | Value::Map(_) => self.with_frame(value, &section.children),
        }
    }

    fn visit_partial(&mut self, partial: &PartialNode) -> StacheResult<()> {
        self.check_cancelled()?;
        self.include(partial)
    }

    fn visit_inheritable_partial(&mut self, partial: &InheritablePartialNode) -> StacheResult<()> {
        self.check_cancelled()?;

        self.overrides
            .push(OverrideScope::new(partial.overrides.clone()));
        let result = self.include(&partial.partial);
        self.overrides.pop();
        result
    }

    fn visit_inheritable_section(&mut self, section: &InheritableSection) -> StacheResult<()> {
        self.check_cancelled()?;

        let Some((index, block)) = self.overrides.resolve(&section.name) else {
            return self.descend(|this| accept_all(&section.children, this));
        };

        crate::trace!(block = %section.name, scope = index, "rendering override");
        // The override only sees the scopes enclosing the one it came from,
        // so it can never resolve back to itself.
        let detached = self.overrides.detach_from(index);
        let result = self.descend(|this| accept_all(&block.children, this));
        self.overrides.restore(detached);
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::loader::NoPartials;

    fn render(nodes: Vec<Node>, data: &Value) -> StacheResult<String> {
        Template::from_nodes(nodes).render(data, &NoPartials)
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_section_pushes_scalar_as_frame() {
        let data = Value::map([("name", "Al")]);
        let out = render(
            vec![Node::section(
                "name",
                vec![Node::text("<"), Node::variable("."), Node::text(">")],
            )],
            &data,
        )
        .unwrap();
        assert_eq!(out, "<Al>");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_map_section_scopes_lookups() {
        let data = Value::map([
            ("name", Value::from("outer")),
            ("person", Value::map([("name", "inner")])),
        ]);
        let out = render(
            vec![
                Node::section("person", vec![Node::variable("name")]),
                Node::text(" "),
                Node::variable("name"),
            ],
            &data,
        )
        .unwrap();
        assert_eq!(out, "inner outer");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_inverted_section_over_values() {
        let tree = || vec![Node::inverted_section("x", vec![Node::text("none")])];
        for (value, expected) in [
            (Value::Null, "none"),
            (Value::from(false), "none"),
            (Value::List(vec![]), "none"),
            (Value::from(true), ""),
            (Value::from(vec![1]), ""),
            (Value::map([("a", 1)]), ""),
        ] {
            let data = Value::map([("x", value.clone())]);
            assert_eq!(render(tree(), &data).unwrap(), expected, "value {value:?}");
        }
        assert_eq!(render(tree(), &Value::Null).unwrap(), "none");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_list_in_variable_is_conversion_error() {
        let data = Value::map([("xs", Value::from(vec![1, 2]))]);
        assert_eq!(
            render(vec![Node::variable("xs")], &data).unwrap_err(),
            StacheError::Conversion {
                name: "xs".to_string(),
                found: crate::value::ValueKind::List,
            }
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_strict_variables() {
        let template = Template::from_nodes(vec![Node::variable("missing")]);
        let config = RenderConfig::default().with_strict_variables(true);
        assert_eq!(
            template.render_with(&Value::Null, &NoPartials, config).unwrap_err(),
            StacheError::MissingVariable {
                variable_name: "missing".to_string()
            }
        );
        assert_eq!(template.render(&Value::Null, &NoPartials).unwrap(), "");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_depth_limit() {
        let mut node = Node::text("deep");
        for _ in 0..10 {
            node = Node::inverted_section("missing", vec![node]);
        }
        let template = Template::from_nodes(vec![node]);

        let config = RenderConfig::default().with_max_depth(5);
        assert_eq!(
            template.render_with(&Value::Null, &NoPartials, config).unwrap_err(),
            StacheError::DepthExceeded { limit: 5 }
        );
        assert_eq!(template.render(&Value::Null, &NoPartials).unwrap(), "deep");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_cancelled_render_stops() {
        let flag = CancelFlag::new();
        flag.cancel();
        let data = Value::Null;
        let mut visitor =
            RenderVisitor::new(&data, &NoPartials, RenderConfig::default()).with_cancel_flag(flag);
        let template = Template::from_nodes(vec![Node::text("never")]);
        assert_eq!(template.accept(&mut visitor), Err(StacheError::Cancelled));
        assert_eq!(visitor.output(), "");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_state_released_after_failure() {
        let mut partials = HashMap::new();
        partials.insert(
            "broken".to_string(),
            Arc::new(Template::from_nodes(vec![Node::partial("missing")])),
        );
        let data = Value::Null;
        let mut visitor = RenderVisitor::new(&data, &partials, RenderConfig::default());
        let node = Node::inheritable_partial("broken", vec![InheritableSection::new("a", vec![])]);

        assert!(node.accept(&mut visitor).is_err());
        assert!(visitor.overrides.is_empty());
        assert!(visitor.inclusions.is_empty());
        assert_eq!(visitor.depth, 0);
        assert_eq!(visitor.context.depth(), 1);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_indentation_skips_interpolated_newlines() {
        let mut partials = HashMap::new();
        partials.insert(
            "partial".to_string(),
            Arc::new(Template::parse("|\n{{{content}}}\n|\n").unwrap()),
        );
        let template = Template::parse("\\\n {{>partial}}\n/\n").unwrap();
        let data = Value::map([("content", "<\n->")]);
        assert_eq!(
            template.render(&data, &partials).unwrap(),
            "\\\n |\n <\n->\n |\n/\n"
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_nested_partial_indentation_accumulates() {
        let mut partials = HashMap::new();
        partials.insert(
            "outer".to_string(),
            Arc::new(Template::parse("a\n\n  {{>inner}}\nb\n").unwrap()),
        );
        partials.insert(
            "inner".to_string(),
            Arc::new(Template::parse("x\ny\n").unwrap()),
        );
        let template = Template::parse("  {{>outer}}\nend").unwrap();
        assert_eq!(
            template.render(&Value::Null, &partials).unwrap(),
            "  a\n  \n    x\n    y\n  b\nend"
        );
    }
}
