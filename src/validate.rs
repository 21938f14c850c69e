use std::{collections::HashSet, sync::Arc};

use crate::{
    ast::{
        InheritablePartialNode, InheritableSection, PartialNode, SectionTag, TextNode, VariableTag,
    },
    config::RenderConfig,
    error::{StacheError, StacheResult},
    inheritance::InclusionPath,
    loader::PartialLoader,
    template::Template,
    visitor::{Visitor, accept_all},
};

/// Checks a template ahead of rendering, without any data.
///
/// Unlike a render, every branch is taken, so a missing partial hidden behind
/// a section that happens to be falsey today is still reported.
pub struct Validator<'a, L: PartialLoader + ?Sized> {
    loader: &'a L,
    max_depth: usize,
    depth: usize,
    inclusions: InclusionPath,
}

impl<'a, L: PartialLoader + ?Sized> Validator<'a, L> {
    pub fn new(loader: &'a L, config: &RenderConfig) -> Self {
        Self {
            loader,
            max_depth: config.max_depth,
            depth: 0,
            inclusions: InclusionPath::new(),
        }
    }

    #[must_use]
    pub fn with_root_name(mut self, name: &str) -> Self {
        self.inclusions = InclusionPath::rooted(name);
        self
    }

    /// Walks `template` completely.
    ///
    /// # Errors
    /// - [`StacheError::PartialNotFound`] for any partial the loader lacks.
    /// - [`StacheError::InclusionCycle`] if a partial can include itself.
    /// - [`StacheError::DepthExceeded`] if nesting passes the configured limit.
    /// - [`StacheError::DuplicateBlock`] if one inheritable partial overrides
    ///   the same block twice.
    pub fn validate(mut self, template: &Template) -> StacheResult<()> {
        template.accept(&mut self)
    }

    fn descend<F>(&mut self, f: F) -> StacheResult<()>
    where
        F: FnOnce(&mut Self) -> StacheResult<()>,
    {
        if self.depth >= self.max_depth {
            return Err(StacheError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        self.depth = self.depth.saturating_add(1);
        let result = f(self);
        self.depth = self.depth.saturating_sub(1);
        result
    }

    fn include(&mut self, partial: &PartialNode) -> StacheResult<()> {
        let template: Arc<Template> = match &partial.target {
            Some(template) => Arc::clone(template),
            None => self.loader.load_partial(&partial.name)?,
        };
        self.inclusions.enter(&partial.name)?;
        let result = self.descend(|this| template.accept(this));
        self.inclusions.exit();
        result
    }
}

impl<L: PartialLoader + ?Sized> Visitor for Validator<'_, L> {
    fn visit_text(&mut self, _: &TextNode) -> StacheResult<()> {
        Ok(())
    }

    fn visit_variable(&mut self, _: &VariableTag) -> StacheResult<()> {
        Ok(())
    }

    fn visit_section(&mut self, section: &SectionTag) -> StacheResult<()> {
        self.descend(|this| accept_all(&section.children, this))
    }

    fn visit_partial(&mut self, partial: &PartialNode) -> StacheResult<()> {
        self.include(partial)
    }

    fn visit_inheritable_partial(&mut self, partial: &InheritablePartialNode) -> StacheResult<()> {
        let mut seen = HashSet::new();
        for block in &partial.overrides {
            if !seen.insert(block.name.as_str()) {
                return Err(StacheError::DuplicateBlock {
                    name: block.name.clone(),
                });
            }
            self.descend(|this| block.accept(this))?;
        }
        self.include(&partial.partial)
    }

    fn visit_inheritable_section(&mut self, section: &InheritableSection) -> StacheResult<()> {
        self.descend(|this| accept_all(&section.children, this))
    }
}
