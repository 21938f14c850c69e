use std::sync::Arc;

use crate::{
    ast::InheritableSection,
    error::{StacheError, StacheResult},
};

/// The partials currently being rendered, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InclusionPath {
    names: Vec<String>,
}

impl InclusionPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// A path that already contains the root template.
    pub fn rooted<T: Into<String>>(root: T) -> Self {
        Self {
            names: vec![root.into()],
        }
    }

    /// Records entry into `name`, failing if it is already on the path.
    pub fn enter(&mut self, name: &str) -> StacheResult<()> {
        if self.contains(name) {
            let mut path = self.names.clone();
            path.push(name.to_string());
            crate::debug!(partial = name, "inclusion cycle detected");
            return Err(StacheError::InclusionCycle {
                name: name.to_string(),
                path,
            });
        }
        self.names.push(name.to_string());
        Ok(())
    }

    pub fn exit(&mut self) {
        self.names.pop();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// The override blocks declared by one inheritable partial.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideScope {
    blocks: Vec<Arc<InheritableSection>>,
}

impl OverrideScope {
    pub fn new(blocks: Vec<Arc<InheritableSection>>) -> Self {
        Self { blocks }
    }

    /// The first block declared under `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<InheritableSection>> {
        self.blocks.iter().find(|block| block.name == name)
    }
}

/// Override scopes of the enclosing inheritable partials, innermost last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideScopes {
    scopes: Vec<OverrideScope>,
}

impl OverrideScopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scope: OverrideScope) {
        self.scopes.push(scope);
    }

    pub fn pop(&mut self) -> Option<OverrideScope> {
        self.scopes.pop()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Finds the override for `name` in the nearest scope that declares it,
    /// along with that scope's index.
    pub fn resolve(&self, name: &str) -> Option<(usize, Arc<InheritableSection>)> {
        self.scopes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, scope)| scope.get(name).map(|block| (index, Arc::clone(block))))
    }

    /// Detaches every scope from `index` up, so content found at `index` only
    /// sees the scopes enclosing it. Hand the result back to [`Self::restore`].
    pub fn detach_from(&mut self, index: usize) -> Vec<OverrideScope> {
        self.scopes.split_off(index.min(self.scopes.len()))
    }

    pub fn restore(&mut self, detached: Vec<OverrideScope>) {
        self.scopes.extend(detached);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;

    fn scope(blocks: &[(&str, &str)]) -> OverrideScope {
        OverrideScope::new(
            blocks
                .iter()
                .map(|(name, text)| {
                    Arc::new(InheritableSection::new(*name, vec![Node::text(*text)]))
                })
                .collect(),
        )
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_cycle_reports_full_path() {
        let mut path = InclusionPath::rooted("a");
        path.enter("b").unwrap();
        let err = path.enter("a").unwrap_err();
        assert_eq!(
            err,
            StacheError::InclusionCycle {
                name: "a".to_string(),
                path: vec!["a".to_string(), "b".to_string(), "a".to_string()],
            }
        );
        // A failed entry leaves the path untouched.
        assert_eq!(path.names(), ["a", "b"]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_sibling_inclusions_are_not_cycles() {
        let mut path = InclusionPath::new();
        path.enter("p").unwrap();
        path.exit();
        path.enter("p").unwrap();
        assert_eq!(path.len(), 1);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_nearest_scope_wins_and_unknown_names_fall_through() {
        let mut scopes = OverrideScopes::new();
        scopes.push(scope(&[("header", "outer header"), ("footer", "outer footer")]));
        scopes.push(scope(&[("header", "inner header")]));

        let (index, header) = scopes.resolve("header").unwrap();
        assert_eq!(index, 1);
        assert_eq!(header.children, vec![Node::text("inner header")]);

        let (index, footer) = scopes.resolve("footer").unwrap();
        assert_eq!(index, 0);
        assert_eq!(footer.children, vec![Node::text("outer footer")]);

        assert!(scopes.resolve("body").is_none());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_first_declaration_in_scope_wins() {
        let scope = scope(&[("a", "first"), ("a", "second")]);
        assert_eq!(scope.get("a").unwrap().children, vec![Node::text("first")]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_detach_and_restore() {
        let mut scopes = OverrideScopes::new();
        scopes.push(scope(&[("a", "outer")]));
        scopes.push(scope(&[("a", "inner")]));

        let detached = scopes.detach_from(1);
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes.resolve("a").unwrap().0, 0);

        scopes.restore(detached);
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes.resolve("a").unwrap().0, 1);
    }
}
