//! Trust Tree Node (spec.md §3): an owned tree built by the upward DAG
//! walk. Deliberately has no back-references — see the Design Note in
//! `SPEC_FULL.md` §9 on replacing the source's cyclic object graph with
//! an explicit owned tree.

use crate::statement::EntityStatement;

#[derive(Debug, Clone)]
pub struct TrustTreeNode {
    /// The entity's own self-signed configuration. For the root this is
    /// the starting entity; for a child it is the superior's
    /// configuration reached by following one authority hint.
    pub statement: EntityStatement,
    /// The statement the superior (this node, if not root) issued about
    /// its subordinate — `None` only for the root.
    pub incoming: Option<EntityStatement>,
    pub authority_children: Vec<TrustTreeNode>,
    /// True once resolution determined this node needs no further
    /// upward walk: it is a trust anchor, or no anchor set was given and
    /// it has no further authority hints.
    pub terminal: bool,
}

impl TrustTreeNode {
    /// A node is valid (spec.md §4.6 step 3) iff it is itself terminal,
    /// or at least one child resolved to a valid subtree.
    pub fn is_valid(&self) -> bool {
        self.terminal || !self.authority_children.is_empty()
    }
}
