//! Graph Exporter (spec.md §4.8): a labeled directed graph of either a
//! trust chain set or a federation subtree, serialized as DOT.

use petgraph::graph::DiGraph;

use crate::chain::TrustChain;
use crate::entity_id::EntityId;
use crate::entity_type::EntityType;
use crate::subtree::SubtreeNode;

/// Fixed per-type color palette (spec.md §4.8 "color chosen from entity
/// type"); `None` (unknown/unspecified type) falls back to a neutral gray.
fn color_for(entity_type: Option<EntityType>) -> &'static str {
    match entity_type {
        Some(EntityType::OpenidRelyingParty) => "#4C78A8",
        Some(EntityType::OpenidProvider) => "#F58518",
        Some(EntityType::OauthAuthorizationServer) => "#E45756",
        Some(EntityType::OauthClient) => "#72B7B2",
        Some(EntityType::OauthResourceServer) => "#54A24B",
        Some(EntityType::FederationEntity) => "#B279A2",
        Some(EntityType::TrustMarkIssuer) => "#EECA3B",
        None => "#9D9D9D",
    }
}

#[derive(Debug, Clone)]
struct NodeLabel {
    id: EntityId,
    entity_type: Option<EntityType>,
}

impl NodeLabel {
    fn dot_label(&self) -> String {
        match self.entity_type {
            Some(t) => format!("{} ({t})", self.id),
            None => self.id.to_string(),
        }
    }
}

/// Builds a DOT graph for a set of trust chains: one node per distinct
/// entity, one edge per statement from issuer to subject (spec.md §4.8
/// "for trust trees, edges point from the node's entity to its
/// subordinate statement's subject").
pub fn chains_to_dot(chains: &[TrustChain]) -> String {
    let mut graph: DiGraph<NodeLabel, ()> = DiGraph::new();
    let mut indices = std::collections::HashMap::new();

    let mut node_for = |graph: &mut DiGraph<NodeLabel, ()>, id: &EntityId| {
        *indices.entry(id.clone()).or_insert_with(|| {
            graph.add_node(NodeLabel { id: id.clone(), entity_type: None })
        })
    };

    for chain in chains {
        for statement in chain.statements() {
            let issuer_idx = node_for(&mut graph, &statement.iss);
            let subject_idx = node_for(&mut graph, &statement.sub);
            if statement.is_self_signed() {
                graph[issuer_idx].entity_type = crate::subtree::pick_entity_type(statement);
            }
            if issuer_idx != subject_idx {
                graph.update_edge(issuer_idx, subject_idx, ());
            }
        }
    }

    render(&graph)
}

/// Builds a DOT graph for a federation subtree: one node per entity, one
/// edge per superior-to-subordinate relationship (spec.md §4.8 "for
/// subtrees, edges point from superior to subordinate").
pub fn subtree_to_dot(root: &SubtreeNode) -> String {
    let mut graph: DiGraph<NodeLabel, ()> = DiGraph::new();
    add_subtree(&mut graph, root, None);
    render(&graph)
}

fn add_subtree(
    graph: &mut DiGraph<NodeLabel, ()>,
    node: &SubtreeNode,
    parent: Option<petgraph::graph::NodeIndex>,
) {
    let idx = graph.add_node(NodeLabel { id: node.sub.clone(), entity_type: node.entity_type });
    if let Some(parent) = parent {
        graph.add_edge(parent, idx, ());
    }
    for child in &node.subordinates {
        add_subtree(graph, child, Some(idx));
    }
}

fn render(graph: &DiGraph<NodeLabel, ()>) -> String {
    use std::fmt::Write as _;

    let mut out = String::from("digraph federation {\n");
    for idx in graph.node_indices() {
        let label = &graph[idx];
        let _ = writeln!(
            out,
            "    n{} [label=\"{}\", style=filled, fillcolor=\"{}\"];",
            idx.index(),
            label.dot_label().replace('"', "\\\""),
            color_for(label.entity_type),
        );
    }
    for edge in graph.edge_indices() {
        let (from, to) = graph.edge_endpoints(edge).expect("edge index came from this graph");
        let _ = writeln!(out, "    n{} -> n{};", from.index(), to.index());
    }
    out.push_str("}\n");
    out
}
