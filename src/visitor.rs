use crate::{
    ast::{
        InheritablePartialNode, InheritableSection, Node, PartialNode, SectionTag, TextNode,
        VariableTag,
    },
    error::StacheResult,
};

/// One handler per node kind.
///
/// Nodes call these from their `accept` method; don't call them directly.
/// Handlers own recursion: a composite node does not visit its children
/// unless the handler asks it to, usually through [`accept_all`].
pub trait Visitor {
    fn visit_text(&mut self, text: &TextNode) -> StacheResult<()>;

    fn visit_variable(&mut self, variable: &VariableTag) -> StacheResult<()>;

    fn visit_section(&mut self, section: &SectionTag) -> StacheResult<()>;

    fn visit_partial(&mut self, partial: &PartialNode) -> StacheResult<()>;

    fn visit_inheritable_partial(&mut self, partial: &InheritablePartialNode) -> StacheResult<()>;

    fn visit_inheritable_section(&mut self, section: &InheritableSection) -> StacheResult<()>;
}

/// Visits `nodes` in order, stopping at the first failure.
pub fn accept_all<V: Visitor + ?Sized>(nodes: &[Node], visitor: &mut V) -> StacheResult<()> {
    nodes.iter().try_for_each(|node| node.accept(visitor))
}
