use std::{collections::BTreeSet, sync::Arc};

use crate::{
    ast::{
        InheritablePartialNode, InheritableSection, PartialNode, SectionTag, TextNode, VariableTag,
    },
    error::StacheResult,
    loader::PartialLoader,
    value::Value,
    visitor::{Visitor, accept_all},
};

/// Every name a template depends on, across all branches.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    pub variables: BTreeSet<String>,
    pub sections: BTreeSet<String>,
    pub partials: BTreeSet<String>,
    pub blocks: BTreeSet<String>,
    /// Partials the loader could not resolve.
    pub unresolved_partials: BTreeSet<String>,
    /// Variable and section names used outside of any section, which must
    /// therefore come from the root data.
    pub root_names: BTreeSet<String>,
}

impl Dependencies {
    /// Root names whose first path segment is not a key of `data`.
    ///
    /// Non-map data provides no names, so every root name is reported.
    pub fn missing_from(&self, data: &Value) -> Vec<&str> {
        self.root_names
            .iter()
            .filter(|name| {
                let first = name.split('.').next().unwrap_or_default();
                first != "." && data.get(first).is_none()
            })
            .map(String::as_str)
            .collect()
    }
}

/// Collects [`Dependencies`] without rendering anything.
///
/// Both polarities of every section are walked. With a loader, partials are
/// followed transitively, at most once at the root and once inside a section,
/// so inclusion cycles terminate quietly here; [`crate::Validator`] is the
/// visitor that reports them.
pub struct DependencyCollector<'a, L: PartialLoader + ?Sized> {
    loader: Option<&'a L>,
    section_depth: usize,
    /// Followed partials, keyed by name and whether they were at the root.
    visited: BTreeSet<(String, bool)>,
    dependencies: Dependencies,
}

impl<'a, L: PartialLoader + ?Sized> DependencyCollector<'a, L> {
    pub fn new(loader: Option<&'a L>) -> Self {
        Self {
            loader,
            section_depth: 0,
            visited: BTreeSet::new(),
            dependencies: Dependencies::default(),
        }
    }

    /// Marks `name` as already followed, typically the root template.
    #[must_use]
    pub fn with_visited(mut self, name: &str) -> Self {
        self.visited.insert((name.to_string(), true));
        self.visited.insert((name.to_string(), false));
        self
    }

    pub fn into_dependencies(self) -> Dependencies {
        self.dependencies
    }

    fn record_name(&mut self, name: &str) {
        if self.section_depth == 0 && name != "." {
            self.dependencies.root_names.insert(name.to_string());
        }
    }

    fn follow(&mut self, partial: &PartialNode) -> StacheResult<()> {
        self.dependencies.partials.insert(partial.name.clone());
        let at_root = self.section_depth == 0;
        if !self.visited.insert((partial.name.clone(), at_root)) {
            return Ok(());
        }

        let template = match (&partial.target, self.loader) {
            (Some(template), _) => Arc::clone(template),
            (None, Some(loader)) => match loader.load_partial(&partial.name) {
                Ok(template) => template,
                Err(_) => {
                    self.dependencies
                        .unresolved_partials
                        .insert(partial.name.clone());
                    return Ok(());
                }
            },
            (None, None) => return Ok(()),
        };
        template.accept(self)
    }
}

impl<L: PartialLoader + ?Sized> Visitor for DependencyCollector<'_, L> {
    fn visit_text(&mut self, _: &TextNode) -> StacheResult<()> {
        Ok(())
    }

    fn visit_variable(&mut self, variable: &VariableTag) -> StacheResult<()> {
        self.dependencies.variables.insert(variable.name.clone());
        self.record_name(&variable.name);
        Ok(())
    }

    fn visit_section(&mut self, section: &SectionTag) -> StacheResult<()> {
        self.dependencies.sections.insert(section.name.clone());
        self.record_name(&section.name);

        self.section_depth = self.section_depth.saturating_add(1);
        let result = accept_all(&section.children, self);
        self.section_depth = self.section_depth.saturating_sub(1);
        result
    }

    fn visit_partial(&mut self, partial: &PartialNode) -> StacheResult<()> {
        self.follow(partial)
    }

    fn visit_inheritable_partial(&mut self, partial: &InheritablePartialNode) -> StacheResult<()> {
        for block in &partial.overrides {
            block.accept(self)?;
        }
        self.follow(&partial.partial)
    }

    fn visit_inheritable_section(&mut self, section: &InheritableSection) -> StacheResult<()> {
        self.dependencies.blocks.insert(section.name.clone());
        accept_all(&section.children, self)
    }
}
