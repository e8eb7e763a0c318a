//! Top-level operation facade (spec.md §4.9): the single entry point
//! `oidf-cli` and `oidf-rest` both call. Owns the shared [`Fetcher`] for
//! the lifetime of one invocation (spec.md §5).

use serde_json::{Map, Value};

use crate::chain::TrustChain;
use crate::endpoints::{FederationClient, ListFilter};
use crate::entity_id::EntityId;
use crate::entity_type::EntityType;
use crate::error::{OidfError, Result};
use crate::http::{Fetcher, FetcherConfig};
use crate::jwk::Jwks;
use crate::policy;
use crate::resolver::{ResolverLimits, TrustChainResolver};
use crate::statement::EntityStatement;
use crate::subtree::{SubtreeDiscoverer, SubtreeNode};

#[derive(Debug, Clone)]
pub struct OidfClient {
    federation: FederationClient,
    resolver: TrustChainResolver,
    subtree: SubtreeDiscoverer,
}

impl OidfClient {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        Self::with_limits(config, ResolverLimits::default())
    }

    pub fn with_limits(config: FetcherConfig, limits: ResolverLimits) -> Result<Self> {
        let fetcher = Fetcher::new(&config)?;
        let federation = FederationClient::new(fetcher);
        let resolver = TrustChainResolver::new(federation.clone(), limits);
        let subtree = SubtreeDiscoverer::new(federation.clone());
        Ok(Self { federation, resolver, subtree })
    }

    /// `get entity config` (spec.md §4.9).
    #[tracing::instrument(skip(self))]
    pub async fn get_entity_configuration(&self, entity: &EntityId, verify: bool) -> Result<EntityStatement> {
        let (_, statement) = if verify {
            self.federation.get_entity_configuration(entity).await?
        } else {
            self.federation.get_entity_configuration_unverified(entity).await?
        };
        Ok(statement)
    }

    /// `get entity metadata` (spec.md §4.9).
    #[tracing::instrument(skip(self))]
    pub async fn get_entity_metadata(&self, entity: &EntityId, verify: bool) -> Result<Map<String, Value>> {
        let statement = self.get_entity_configuration(entity, verify).await?;
        Ok(statement.metadata_raw)
    }

    /// `get entity jwks` (spec.md §4.9).
    #[tracing::instrument(skip(self))]
    pub async fn get_entity_jwks(&self, entity: &EntityId) -> Result<Jwks> {
        let statement = self.get_entity_configuration(entity, true).await?;
        statement.jwks.ok_or_else(|| OidfError::MissingClaim("jwks".into()))
    }

    /// `fetch statement` (spec.md §4.9): the subordinate statement
    /// `issuer` has published about `entity`.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_statement(&self, entity: &EntityId, issuer: &EntityId) -> Result<EntityStatement> {
        let (_, issuer_config) = self.federation.get_entity_configuration(issuer).await?;
        let (_, statement) = self.federation.get_subordinate_statement(&issuer_config, entity).await?;
        Ok(statement)
    }

    /// `list subordinates` (spec.md §4.9).
    #[tracing::instrument(skip(self))]
    pub async fn list_subordinates(&self, entity: &EntityId, filter: &ListFilter) -> Result<Vec<EntityId>> {
        let (_, statement) = self.federation.get_entity_configuration(entity).await?;
        self.federation.list_subordinates(&statement, filter).await
    }

    /// `get trust chains` (spec.md §4.9).
    #[tracing::instrument(skip(self))]
    pub async fn get_trust_chains(&self, entity: &EntityId, anchors: &[EntityId]) -> Result<Vec<TrustChain>> {
        self.resolver.get_trust_chains(entity, anchors).await
    }

    /// `subtree` (spec.md §4.9).
    #[tracing::instrument(skip(self))]
    pub async fn subtree(&self, entity: &EntityId) -> Result<SubtreeNode> {
        self.subtree.discover(entity).await
    }

    /// `discover OPs` (spec.md §4.9): every `openid_provider` reachable
    /// below `relying_party`'s trust chains to `anchors`.
    #[tracing::instrument(skip(self))]
    pub async fn discover_ops(&self, relying_party: &EntityId, anchors: &[EntityId]) -> Result<Vec<EntityId>> {
        let chains = self.resolver.get_trust_chains(relying_party, anchors).await?;
        let mut ops = Vec::new();
        for chain in &chains {
            let anchor_id = chain.anchor_id();
            let subtree = self.subtree.discover(anchor_id).await?;
            for id in subtree.get_entities(EntityType::OpenidProvider) {
                if !ops.contains(&id) {
                    ops.push(id);
                }
            }
        }
        Ok(ops)
    }

    /// `resolve entity` (spec.md §4.9): requires exactly one trust anchor;
    /// builds chains to it and applies the policy engine to the shortest.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_entity(
        &self,
        entity: &EntityId,
        anchor: &EntityId,
        entity_type: EntityType,
    ) -> Result<Map<String, Value>> {
        let chains = self.resolver.get_trust_chains(entity, std::slice::from_ref(anchor)).await?;
        let shortest = chains
            .iter()
            .min_by_key(|c| c.statements().len())
            .ok_or_else(|| OidfError::NoChain { subject: entity.clone(), anchor: anchor.clone() })?;

        let combined = policy::gather(shortest, entity_type)?;
        let leaf_metadata = shortest
            .leaf()
            .metadata()
            .get(&entity_type)
            .cloned()
            .unwrap_or_default();
        policy::apply(&leaf_metadata, &combined)
    }
}
