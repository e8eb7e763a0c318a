//! Trust Chain Resolver (spec.md §4.6): the upward DAG walk from a
//! starting entity to a set of trust anchors, and the depth-first
//! enumeration of root-to-terminal paths into [`TrustChain`]s.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use crate::chain::TrustChain;
use crate::endpoints::FederationClient;
use crate::entity_id::EntityId;
use crate::error::Result;
use crate::statement::EntityStatement;
use crate::tree::TrustTreeNode;

/// Safety bounds that have no counterpart in the wire protocol itself —
/// guards against a misbehaving or malicious federation rather than a
/// behavioral feature of trust chain resolution.
#[derive(Debug, Clone)]
pub struct ResolverLimits {
    /// Caps resolution depth regardless of what any one trust anchor's
    /// `constraints.max_path_length` declares; `None` defers entirely to
    /// per-anchor constraints, checked at emission time.
    pub max_path_length: Option<usize>,
    /// Drops authority hints past this count for a single node, after
    /// document-order deduplication.
    pub max_authority_hints_per_node: usize,
}

impl Default for ResolverLimits {
    fn default() -> Self {
        Self { max_path_length: None, max_authority_hints_per_node: 10 }
    }
}

#[derive(Debug, Clone)]
pub struct TrustChainResolver {
    federation: FederationClient,
    limits: ResolverLimits,
}

impl TrustChainResolver {
    pub fn new(federation: FederationClient, limits: ResolverLimits) -> Self {
        Self { federation, limits }
    }

    /// Resolves every Trust Chain from `start` to one of `anchors` (or, if
    /// `anchors` is empty, to any self-terminating entity). Fetch/verify
    /// failures on individual branches are swallowed; only the starting
    /// entity being unreachable is fatal (spec.md §4.6 "Failure semantics").
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_trust_chains(&self, start: &EntityId, anchors: &[EntityId]) -> Result<Vec<TrustChain>> {
        let (_, root_statement) = self.federation.get_entity_configuration(start).await?;
        let anchor_set: HashSet<EntityId> = anchors.iter().cloned().collect();

        let mut seen = HashSet::new();
        seen.insert(start.clone());
        let root = self.resolve_node(root_statement, None, &anchor_set, seen, 0).await;

        let sequences = emit_chains(&root);

        let mut chains = Vec::new();
        let mut signatures = HashSet::new();
        for sequence in sequences {
            if let Some(max_path_length) = sequence.last().and_then(|anchor| {
                anchor.constraints.as_ref().and_then(|c| c.max_path_length)
            }) {
                let intermediary_count = sequence.len().saturating_sub(2);
                if intermediary_count > max_path_length {
                    tracing::debug!(intermediary_count, max_path_length, "chain rejected by anchor's max_path_length");
                    continue;
                }
            }

            let signature = chain_signature(&sequence);
            if !signatures.insert(signature) {
                continue;
            }

            match TrustChain::new(sequence) {
                Ok(chain) => chains.push(chain),
                Err(e) => tracing::debug!(error = %e, "resolver-emitted sequence failed chain validation"),
            }
        }

        Ok(chains)
    }

    /// Resolves one node of the trust tree, carrying a `seen` set to
    /// prevent cycles (spec.md §4.6 step 2). Recursive `async fn`s aren't
    /// directly expressible in Rust, so the recursive call is boxed.
    fn resolve_node<'a>(
        &'a self,
        statement: EntityStatement,
        incoming: Option<EntityStatement>,
        anchors: &'a HashSet<EntityId>,
        seen: HashSet<EntityId>,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = TrustTreeNode> + Send + 'a>> {
        Box::pin(async move {
            let terminal = anchors.contains(&statement.sub)
                || (anchors.is_empty() && statement.authority_hints.is_empty());
            if terminal {
                return TrustTreeNode { statement, incoming, authority_children: Vec::new(), terminal: true };
            }

            if let Some(cap) = self.limits.max_path_length {
                if depth >= cap {
                    tracing::debug!(sub = %statement.sub, depth, "max_path_length safety cap reached, abandoning branch");
                    return TrustTreeNode { statement, incoming, authority_children: Vec::new(), terminal: false };
                }
            }

            let mut hints: Vec<EntityId> = Vec::new();
            for hint in &statement.authority_hints {
                if !hints.contains(hint) {
                    hints.push(hint.clone());
                }
            }
            hints.truncate(self.limits.max_authority_hints_per_node);

            let branches = hints.into_iter().filter(|a| !seen.contains(a)).map(|authority| {
                let mut branch_seen = seen.clone();
                branch_seen.insert(authority.clone());
                self.resolve_branch(statement.sub.clone(), authority, anchors, branch_seen, depth + 1)
            });

            let results = futures::future::join_all(branches).await;
            let authority_children = results.into_iter().flatten().collect();

            TrustTreeNode { statement, incoming, authority_children, terminal: false }
        })
    }

    /// Fetches one authority's configuration and its subordinate statement
    /// about `subject`, verifies the subordinate statement against the
    /// authority's own `jwks`, and recurses. Returns `None` on any fetch or
    /// verification failure, logging at `debug`/`warn` per §4.6's swallow
    /// policy — the caller simply won't append this branch.
    async fn resolve_branch(
        &self,
        subject: EntityId,
        authority: EntityId,
        anchors: &HashSet<EntityId>,
        seen: HashSet<EntityId>,
        depth: usize,
    ) -> Option<TrustTreeNode> {
        let (_, authority_config) = match self.federation.get_entity_configuration(&authority).await {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(%authority, error = %e, "failed to fetch authority configuration, skipping branch");
                return None;
            }
        };

        let (_, subordinate_statement) =
            match self.federation.get_subordinate_statement(&authority_config, &subject).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!(%authority, %subject, error = %e, "failed to fetch subordinate statement, skipping branch");
                    return None;
                }
            };

        let child = self
            .resolve_node(authority_config, Some(subordinate_statement), anchors, seen, depth)
            .await;
        child.is_valid().then_some(child)
    }
}

/// Depth-first emission of root-to-terminal statement sequences (spec.md
/// §4.6 step 4): `[root.entity_statement] + [child.incoming for each edge]
/// + [terminal.entity_statement]`. The root is handled separately from
/// `walk` below so a terminal root (a self-contained one-statement chain)
/// doesn't get its own statement appended twice.
fn emit_chains(root: &TrustTreeNode) -> Vec<Vec<EntityStatement>> {
    let mut out = Vec::new();
    if root.terminal {
        out.push(vec![root.statement.clone()]);
    }
    for child in &root.authority_children {
        let prefix = vec![
            root.statement.clone(),
            child.incoming.clone().expect("non-root child always carries an incoming subordinate statement"),
        ];
        walk(child, prefix, &mut out);
    }
    out
}

fn walk(node: &TrustTreeNode, prefix: Vec<EntityStatement>, out: &mut Vec<Vec<EntityStatement>>) {
    if node.terminal {
        let mut seq = prefix;
        seq.push(node.statement.clone());
        out.push(seq);
        return;
    }
    for child in &node.authority_children {
        let mut next = prefix.clone();
        next.push(child.incoming.clone().expect("non-root child always carries an incoming subordinate statement"));
        walk(child, next, out);
    }
}

fn chain_signature(sequence: &[EntityStatement]) -> String {
    sequence.iter().map(|s| s.raw_jws.as_str()).collect::<Vec<_>>().join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Fetcher, FetcherConfig};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Signs the given claims with the shared test RSA key so the
    /// resolver's own signature verification passes.
    fn sign(claims: serde_json::Value) -> String {
        let key = include_str!("../tests/fixtures/test_rsa_key.pem");
        let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(key.as_bytes()).unwrap();
        let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        header.kid = Some("test-key".to_string());
        jsonwebtoken::encode(&header, &claims, &encoding_key).unwrap()
    }

    fn test_jwks() -> serde_json::Value {
        let n = include_str!("../tests/fixtures/test_rsa_n.b64").trim();
        json!({"keys": [{"kty": "RSA", "kid": "test-key", "n": n, "e": "AQAB"}]})
    }

    async fn serve_entity(server: &MockServer, id: &str, authority_hints: Vec<&str>, anchor: bool) {
        let mut claims = json!({
            "iss": id, "sub": id, "iat": 0, "exp": 9_999_999_999i64,
            "jwks": test_jwks(),
            "authority_hints": authority_hints,
            "metadata": {
                "federation_entity": {
                    "federation_fetch_endpoint": format!("{}/fetch?iss={}", server.uri(), urlencoding(id)),
                }
            }
        });
        if anchor {
            claims["authority_hints"] = json!([]);
        }
        let jws = sign(claims);
        let entity_path = url::Url::parse(id).unwrap().path().to_string();
        Mock::given(method("GET"))
            .and(path(format!("{entity_path}/.well-known/openid-federation")))
            .respond_with(ResponseTemplate::new(200).set_body_string(jws))
            .mount(server)
            .await;
    }

    async fn serve_subordinate(server: &MockServer, issuer: &str, subject: &str) {
        let claims = json!({
            "iss": issuer, "sub": subject, "iat": 0, "exp": 9_999_999_999i64,
            "metadata": {}
        });
        let jws = sign(claims);
        Mock::given(method("GET"))
            .and(path("/fetch"))
            .and(query_param("iss", issuer))
            .and(query_param("sub", subject))
            .respond_with(ResponseTemplate::new(200).set_body_string(jws))
            .mount(server)
            .await;
    }

    fn urlencoding(raw: &str) -> String {
        url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
    }

    async fn resolver_for(_server: &MockServer) -> TrustChainResolver {
        let fetcher = Fetcher::new(&FetcherConfig::default()).unwrap();
        TrustChainResolver::new(FederationClient::new(fetcher), ResolverLimits::default())
    }

    #[tokio::test]
    async fn s1_two_hop_chain_is_found() {
        let server = MockServer::start().await;
        let ta = format!("{}/ta", server.uri());
        let ia = format!("{}/ia", server.uri());
        let rp = format!("{}/rp", server.uri());

        serve_entity(&server, &rp, vec![&ia], false).await;
        serve_entity(&server, &ia, vec![&ta], false).await;
        serve_entity(&server, &ta, vec![], true).await;
        serve_subordinate(&server, &ia, &rp).await;
        serve_subordinate(&server, &ta, &ia).await;

        let resolver = resolver_for(&server).await;
        let anchor = EntityId::parse(&ta).unwrap();
        let chains = resolver
            .get_trust_chains(&EntityId::parse(&rp).unwrap(), std::slice::from_ref(&anchor))
            .await
            .unwrap();

        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].statements().len(), 4);
        assert_eq!(chains[0].anchor_id(), &anchor);
    }

    #[tokio::test]
    async fn s2_unreachable_anchor_returns_empty() {
        let server = MockServer::start().await;
        let ta = format!("{}/ta", server.uri());
        let ia = format!("{}/ia", server.uri());
        let rp = format!("{}/rp", server.uri());
        let other = format!("{}/other", server.uri());

        serve_entity(&server, &rp, vec![&ia], false).await;
        serve_entity(&server, &ia, vec![&ta], false).await;
        serve_entity(&server, &ta, vec![], true).await;
        serve_subordinate(&server, &ia, &rp).await;
        serve_subordinate(&server, &ta, &ia).await;

        let resolver = resolver_for(&server).await;
        let anchor = EntityId::parse(&other).unwrap();
        let chains = resolver
            .get_trust_chains(&EntityId::parse(&rp).unwrap(), std::slice::from_ref(&anchor))
            .await
            .unwrap();

        assert!(chains.is_empty());
    }

    #[tokio::test]
    async fn s3_cycle_returns_empty() {
        let server = MockServer::start().await;
        let a = format!("{}/a", server.uri());
        let b = format!("{}/b", server.uri());

        serve_entity(&server, &a, vec![&b], false).await;
        serve_entity(&server, &b, vec![&a], false).await;
        serve_subordinate(&server, &b, &a).await;
        serve_subordinate(&server, &a, &b).await;

        let resolver = resolver_for(&server).await;
        let chains = resolver.get_trust_chains(&EntityId::parse(&a).unwrap(), &[]).await.unwrap();

        assert!(chains.is_empty());
    }
}
