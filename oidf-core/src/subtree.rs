//! Federation Subtree Discoverer (spec.md §4.7): a downward walk rooted at
//! an entity, following each node's `federation_list_endpoint`.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::endpoints::{FederationClient, ListFilter};
use crate::entity_id::EntityId;
use crate::entity_type::EntityType;
use crate::error::Result;
use crate::statement::EntityStatement;

/// One node of a discovered subtree. `entity_type` is picked per spec.md
/// §4.7: the non-`federation_entity` type wins when an intermediate
/// authority also advertises a leaf role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtreeNode {
    pub sub: EntityId,
    pub entity_type: Option<EntityType>,
    pub entity_configuration: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subordinates: Vec<SubtreeNode>,
}

impl SubtreeNode {
    /// Every subject in this subtree (including the root) whose metadata
    /// advertises `entity_type` (spec.md §4.7 `get_entities`).
    pub fn get_entities(&self, entity_type: EntityType) -> Vec<EntityId> {
        let mut out = Vec::new();
        self.collect_entities(entity_type, &mut out);
        out
    }

    fn collect_entities(&self, entity_type: EntityType, out: &mut Vec<EntityId>) {
        if self.entity_type == Some(entity_type) {
            out.push(self.sub.clone());
        }
        for child in &self.subordinates {
            child.collect_entities(entity_type, out);
        }
    }
}

pub(crate) fn pick_entity_type(statement: &EntityStatement) -> Option<EntityType> {
    let metadata = statement.metadata();
    let non_federation = metadata.keys().find(|t| t.is_leaf_role()).copied();
    non_federation.or_else(|| metadata.keys().next().copied())
}

#[derive(Debug, Clone)]
pub struct SubtreeDiscoverer {
    federation: FederationClient,
}

impl SubtreeDiscoverer {
    pub fn new(federation: FederationClient) -> Self {
        Self { federation }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn discover(&self, root: &EntityId) -> Result<SubtreeNode> {
        let (jws, statement) = self.federation.get_entity_configuration(root).await?;
        let mut seen = HashSet::new();
        seen.insert(root.clone());
        Ok(self.discover_node(jws, statement, seen).await)
    }

    /// Recursive `async fn`s aren't directly expressible in Rust, so the
    /// recursive call is boxed, mirroring `resolver::resolve_node`.
    fn discover_node<'a>(
        &'a self,
        jws: String,
        statement: EntityStatement,
        seen: HashSet<EntityId>,
    ) -> Pin<Box<dyn Future<Output = SubtreeNode> + Send + 'a>> {
        Box::pin(async move {
            let entity_type = pick_entity_type(&statement);
            let sub = statement.sub.clone();

            let ids = self.federation.list_subordinates(&statement, &ListFilter::default()).await.unwrap_or_default();

            let branches = ids.into_iter().filter_map(|id| {
                if id == sub {
                    tracing::warn!(%sub, "entity lists itself as a subordinate, skipping");
                    return None;
                }
                if seen.contains(&id) {
                    tracing::debug!(%id, "subordinate already visited in this subtree, skipping");
                    return None;
                }
                let mut branch_seen = seen.clone();
                branch_seen.insert(id.clone());
                Some(self.discover_branch(id, branch_seen))
            });

            let subordinates = futures::future::join_all(branches).await.into_iter().flatten().collect();

            SubtreeNode { sub, entity_type, entity_configuration: jws, subordinates }
        })
    }

    async fn discover_branch(&self, id: EntityId, seen: HashSet<EntityId>) -> Option<SubtreeNode> {
        let (jws, statement) = match self.federation.get_entity_configuration(&id).await {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(%id, error = %e, "failed to fetch subordinate configuration, skipping branch");
                return None;
            }
        };
        Some(self.discover_node(jws, statement, seen).await)
    }
}
