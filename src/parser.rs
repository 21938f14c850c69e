use std::sync::Arc;

use crate::{
    ast::{
        Delimiters, InheritablePartialNode, InheritableSection, Node, PartialNode, SectionTag,
        VariableTag,
    },
    error::{ParseError, ParseErrorKind},
};

type ParseResult<T> = Result<T, ParseError>;

/// What a tag does, decided by the character after the open delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Variable { escaped: bool },
    Section { inverted: bool },
    Close,
    Comment,
    Partial,
    InheritablePartial,
    Block,
    SetDelimiters,
}

impl TagKind {
    const fn from_sigil(sigil: char) -> Option<Self> {
        Some(match sigil {
            '#' => Self::Section { inverted: false },
            '^' => Self::Section { inverted: true },
            '/' => Self::Close,
            '!' => Self::Comment,
            '>' => Self::Partial,
            '<' => Self::InheritablePartial,
            '$' => Self::Block,
            '&' => Self::Variable { escaped: false },
            '=' => Self::SetDelimiters,
            _ => return None,
        })
    }

    /// Tags that vanish with their whole line when nothing but blanks
    /// surround them. Variables always produce output, so they never do.
    const fn can_stand_alone(self) -> bool {
        !matches!(self, Self::Variable { .. })
    }

    const fn is_named(self) -> bool {
        !matches!(self, Self::Comment | Self::SetDelimiters)
    }
}

struct Tag<'a> {
    kind: TagKind,
    content: &'a str,
}

struct Parser<'a> {
    source: &'a Arc<str>,
    input: &'a str,
    pos: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// The starting location of the current line
    line_start_pos: usize,
    delimiters: Delimiters,
}

impl<'a> Parser<'a> {
    fn new(source: &'a Arc<str>, delimiters: Delimiters) -> Self {
        Parser {
            source,
            input: source,
            pos: 0,
            line: 1,
            line_start_pos: 0,
            delimiters,
        }
    }

    #[inline]
    fn current_column(&self) -> usize {
        self.pos.saturating_sub(self.line_start_pos).saturating_add(1)
    }

    #[inline]
    fn make_error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            line: self.line,
            column: self.current_column(),
            kind,
        }
    }

    /// Builds an error pointing at an earlier byte offset.
    fn error_at(&self, pos: usize, kind: ParseErrorKind) -> ParseError {
        let before = self.input.get(..pos).unwrap_or(self.input);
        let line_start = before.rfind('\n').map_or(0, |i| i.saturating_add(1));
        ParseError {
            line: before.matches('\n').count().saturating_add(1),
            column: pos.saturating_sub(line_start).saturating_add(1),
            kind,
        }
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// The unconsumed input.
    fn rest(&self) -> &'a str {
        self.input.get(self.pos..).unwrap_or_default()
    }

    fn peek(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    /// Moves to `target`, keeping line tracking in step with any newlines
    /// skipped over.
    fn advance_to(&mut self, target: usize) {
        let target = target.min(self.input.len());
        let skipped = self.input.get(self.pos..target).unwrap_or_default();
        for (offset, c) in skipped.char_indices() {
            if c == '\n' {
                self.line = self.line.saturating_add(1);
                self.line_start_pos = self.pos.saturating_add(offset).saturating_add(1);
            }
        }
        self.pos = target;
    }

    fn advance_by(&mut self, len: usize) {
        self.advance_to(self.pos.saturating_add(len));
    }

    /// Consumes everything up to and including `close`, returning the text
    /// before it.
    fn take_until(&mut self, close: &str) -> ParseResult<&'a str> {
        let rest = self.rest();
        let Some(offset) = rest.find(close) else {
            self.advance_to(self.input.len());
            return Err(self.make_error(ParseErrorKind::unexpected_eof(Some(close.to_string()))));
        };
        let content = rest.get(..offset).unwrap_or_default();
        self.advance_by(offset.saturating_add(close.len()));
        Ok(content)
    }

    /// Parses one tag starting at the open delimiter.
    fn parse_tag(&mut self) -> ParseResult<Tag<'a>> {
        let tag_start = self.pos;
        self.advance_by(self.delimiters.open.len());

        if self.delimiters.open == "{{" && self.peek("{") {
            self.advance_by(1);
            let close = format!("}}{}", self.delimiters.close);
            let content = self.take_until(&close)?;
            return self.finish_tag(tag_start, TagKind::Variable { escaped: false }, content);
        }

        let kind = match self.rest().chars().next().and_then(TagKind::from_sigil) {
            Some(kind) => {
                self.advance_by(1);
                kind
            }
            None => TagKind::Variable { escaped: true },
        };

        let close = self.delimiters.close.clone();
        let mut content = self.take_until(&close)?;
        if kind == TagKind::SetDelimiters {
            content = content.strip_suffix('=').ok_or_else(|| {
                self.error_at(
                    tag_start,
                    ParseErrorKind::InvalidDelimiters {
                        content: content.to_string(),
                    },
                )
            })?;
        }
        self.finish_tag(tag_start, kind, content)
    }

    fn finish_tag(
        &self,
        tag_start: usize,
        kind: TagKind,
        content: &'a str,
    ) -> ParseResult<Tag<'a>> {
        let content = content.trim();
        if kind.is_named() {
            if content.is_empty() {
                return Err(self.error_at(
                    tag_start,
                    ParseErrorKind::Expected {
                        description: "identifier".to_string(),
                    },
                ));
            }
            if content.contains(char::is_whitespace) {
                return Err(self.error_at(
                    tag_start,
                    ParseErrorKind::Expected {
                        description: format!("a single name, found '{content}'"),
                    },
                ));
            }
        }
        Ok(Tag { kind, content })
    }

    /// If the tag that began at `tag_start` sits alone on its line, returns
    /// the offset just past that line's end.
    fn standalone_end(&self, line_start: usize, tag_start: usize) -> Option<usize> {
        let prefix = self.input.get(line_start..tag_start)?;
        if !prefix.chars().all(is_blank) {
            return None;
        }

        let rest = self.rest();
        let blanks = rest.len().saturating_sub(rest.trim_start_matches(is_blank).len());
        let after_blanks = self.pos.saturating_add(blanks);
        let tail = rest.get(blanks..)?;
        if tail.is_empty() {
            Some(after_blanks)
        } else if tail.starts_with("\r\n") {
            Some(after_blanks.saturating_add(2))
        } else if tail.starts_with('\n') {
            Some(after_blanks.saturating_add(1))
        } else {
            None
        }
    }

    fn parse_delimiters(&self, tag_start: usize, content: &str) -> ParseResult<Delimiters> {
        let invalid = || {
            self.error_at(
                tag_start,
                ParseErrorKind::InvalidDelimiters {
                    content: content.to_string(),
                },
            )
        };

        let mut parts = content.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(open), Some(close), None) if !open.contains('=') && !close.contains('=') => {
                Ok(Delimiters::new(open, close))
            }
            _ => Err(invalid()),
        }
    }

    /// Parses nodes until the closing tag of `section`, or to the end of
    /// input when `section` is `None`.
    ///
    /// Returns the nodes and the offset where the section's raw body ends.
    fn parse_nodes(&mut self, section: Option<&str>) -> ParseResult<(Vec<Node>, usize)> {
        let mut nodes = Vec::new();
        loop {
            let rest = self.rest();
            let Some(offset) = rest.find(self.delimiters.open.as_str()) else {
                push_text(&mut nodes, rest);
                self.advance_to(self.input.len());
                if let Some(name) = section {
                    return Err(self.make_error(ParseErrorKind::unexpected_eof(Some(format!(
                        "{}/{name}{}",
                        self.delimiters.open, self.delimiters.close
                    )))));
                }
                return Ok((nodes, self.pos));
            };

            push_text(&mut nodes, rest.get(..offset).unwrap_or_default());
            self.advance_by(offset);

            let tag_start = self.pos;
            let tag_line_start = self.line_start_pos;
            let tag = self.parse_tag()?;

            // Standalone tags take their whole line with them.
            let mut indent = "";
            let mut body_end = tag_start;
            if tag.kind.can_stand_alone() {
                // Multi-line comments move the line start; measure from the
                // line the tag opened on.
                if let Some(end) = self.standalone_end(tag_line_start, tag_start) {
                    indent = self.input.get(tag_line_start..tag_start).unwrap_or_default();
                    trim_trailing(&mut nodes, indent.len());
                    body_end = tag_line_start;
                    self.advance_to(end);
                }
            }

            match tag.kind {
                TagKind::Variable { escaped } => {
                    nodes.push(Node::Variable(VariableTag::new(tag.content, escaped)));
                }
                TagKind::Comment => {}
                TagKind::SetDelimiters => {
                    self.delimiters = self.parse_delimiters(tag_start, tag.content)?;
                }
                TagKind::Section { inverted } => {
                    let delimiters = self.delimiters.clone();
                    let body_start = self.pos;
                    let (children, body_end) = self.parse_nodes(Some(tag.content))?;
                    nodes.push(Node::Section(
                        SectionTag::new(tag.content, inverted, children).with_source(
                            Arc::clone(self.source),
                            body_start..body_end,
                            delimiters,
                        ),
                    ));
                }
                TagKind::Block => {
                    let (children, _) = self.parse_nodes(Some(tag.content))?;
                    nodes.push(Node::InheritableSection(InheritableSection::new(
                        tag.content,
                        children,
                    )));
                }
                TagKind::InheritablePartial => {
                    let (children, _) = self.parse_nodes(Some(tag.content))?;
                    // Only blocks mean anything inside an inheritable partial.
                    let overrides = children
                        .into_iter()
                        .filter_map(|child| match child {
                            Node::InheritableSection(block) => Some(block),
                            Node::Text(_)
                            | Node::Variable(_)
                            | Node::Section(_)
                            | Node::Partial(_)
                            | Node::InheritablePartial(_) => None,
                        })
                        .collect();
                    nodes.push(Node::InheritablePartial(InheritablePartialNode::new(
                        PartialNode::named(tag.content),
                        overrides,
                    )));
                }
                TagKind::Partial => {
                    nodes.push(Node::Partial(PartialNode::named(tag.content).with_indent(indent)));
                }
                TagKind::Close => {
                    return match section {
                        Some(open) if open == tag.content => Ok((nodes, body_end)),
                        Some(open) => Err(self.error_at(
                            tag_start,
                            ParseErrorKind::UnexpectedToken {
                                expected: format!("closing tag for '{open}'"),
                                found: format!("closing tag for '{}'", tag.content),
                            },
                        )),
                        None => Err(self.error_at(
                            tag_start,
                            ParseErrorKind::UnexpectedToken {
                                expected: "text or tag".to_string(),
                                found: format!("closing tag for '{}'", tag.content),
                            },
                        )),
                    };
                }
            }
        }
    }
}

const fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Appends text, merging with a preceding text node.
fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(last)) = nodes.last_mut() {
        last.text.push_str(text);
    } else {
        nodes.push(Node::text(text));
    }
}

/// Drops `len` bytes of indentation from the end of the last text node.
fn trim_trailing(nodes: &mut Vec<Node>, len: usize) {
    if len == 0 {
        return;
    }
    if let Some(Node::Text(last)) = nodes.last_mut() {
        let keep = last.text.len().saturating_sub(len);
        last.text.truncate(keep);
        if last.text.is_empty() {
            nodes.pop();
        }
    }
}

pub(crate) fn parse(source: &Arc<str>, delimiters: Delimiters) -> Result<Vec<Node>, ParseError> {
    let valid = |d: &str| !d.is_empty() && !d.contains(char::is_whitespace) && !d.contains('=');
    if !valid(&delimiters.open) || !valid(&delimiters.close) {
        return Err(ParseError {
            line: 1,
            column: 1,
            kind: ParseErrorKind::InvalidDelimiters {
                content: format!("{} {}", delimiters.open, delimiters.close),
            },
        });
    }

    if source.is_empty() {
        return Ok(vec![]);
    }
    let mut parser = Parser::new(source, delimiters);
    let (nodes, _) = parser.parse_nodes(None)?;

    if !parser.eof() {
        return Err(parser.make_error(ParseErrorKind::Message(format!(
            "Parser did not consume entire input. Remaining: '{}'",
            parser.rest()
        ))));
    }

    Ok(nodes)
}
