//! Federation Endpoints Client (spec.md §4.4): well-known entity
//! configuration retrieval, `federation_fetch_endpoint` statements, and
//! `federation_list_endpoint` listings.

use crate::entity_id::EntityId;
use crate::error::{OidfError, Result};
use crate::http::Fetcher;
use crate::metadata::FederationEntityMetadata;
use crate::statement::EntityStatement;

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub entity_type: Option<String>,
    pub trust_marked: Option<bool>,
    pub trust_mark_id: Option<String>,
}

impl ListFilter {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(t) = &self.entity_type {
            pairs.push(("entity_type", t.clone()));
        }
        if let Some(t) = self.trust_marked {
            pairs.push(("trust_marked", t.to_string()));
        }
        if let Some(id) = &self.trust_mark_id {
            pairs.push(("trust_mark_id", id.clone()));
        }
        pairs
    }
}

#[derive(Debug, Clone)]
pub struct FederationClient {
    fetcher: Fetcher,
}

impl FederationClient {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Fetches and decodes an entity's self-signed configuration without
    /// checking claim validity or the signature, for callers that only
    /// want the claims (spec.md §4.9 `get entity config`'s `verify?` input
    /// set to false).
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_entity_configuration_unverified(&self, entity: &EntityId) -> Result<(String, EntityStatement)> {
        let jws = self.fetcher.fetch_first_ok(&entity.well_known_urls()).await?;
        let statement = EntityStatement::from_jws(&jws)?;
        Ok((jws, statement))
    }

    /// Fetches and decodes an entity's self-signed configuration. Returns
    /// the raw JWS alongside the decoded statement, since the JWS string
    /// itself is part of several output contracts (spec.md §6).
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_entity_configuration(&self, entity: &EntityId) -> Result<(String, EntityStatement)> {
        let jws = self.fetcher.fetch_first_ok(&entity.well_known_urls()).await?;
        let statement = EntityStatement::from_jws(&jws)?;
        statement.verify()?;
        if !statement.is_self_signed() {
            return Err(OidfError::Malformed(format!(
                "entity configuration for {entity} is not self-signed (iss={}, sub={})",
                statement.iss, statement.sub
            )));
        }
        let jwks = statement.jwks.as_ref().expect("verify() enforced jwks on self-signed statements");
        crate::jws::verify_signature(&jws, jwks).map_err(|_| OidfError::VerificationFailed {
            issuer: statement.iss.clone(),
            subject: statement.sub.clone(),
            reason: "entity configuration is not validly self-signed".into(),
        })?;
        Ok((jws, statement))
    }

    /// Fetches the subordinate statement `issuer_config` has published
    /// about `subject`, using its `federation_fetch_endpoint`, and verifies
    /// it against `issuer_config`'s own `jwks` before returning it (spec.md
    /// §4.2: subordinate statements are verified using the issuer's
    /// federation keys, found in the issuer's verified self-signed
    /// configuration). `issuer_config` must itself already be a verified
    /// self-signed configuration — callers get that guarantee from
    /// [`Self::get_entity_configuration`].
    #[tracing::instrument(level = "debug", skip(self, issuer_config))]
    pub async fn get_subordinate_statement(
        &self,
        issuer_config: &EntityStatement,
        subject: &EntityId,
    ) -> Result<(String, EntityStatement)> {
        let fe = federation_entity_metadata(issuer_config, "fetch subordinate statement")?;
        let endpoint = fe.federation_fetch_endpoint.ok_or_else(|| OidfError::EndpointMissing {
            entity: issuer_config.sub.clone(),
            endpoint: "federation_fetch_endpoint",
        })?;

        let sep = if endpoint.contains('?') { "&" } else { "?" };
        let url = format!("{endpoint}{sep}sub={}", urlencode(subject.as_str()));
        let jws = self.fetcher.fetch_text(&url).await?;
        let statement = EntityStatement::from_jws(&jws)?;
        statement.verify()?;

        if statement.iss != issuer_config.sub {
            return Err(OidfError::VerificationFailed {
                issuer: issuer_config.sub.clone(),
                subject: subject.clone(),
                reason: "subordinate statement issuer does not match the fetch endpoint's owner".into(),
            });
        }

        let issuer_jwks = issuer_config.jwks.as_ref().ok_or_else(|| OidfError::VerificationFailed {
            issuer: issuer_config.sub.clone(),
            subject: subject.clone(),
            reason: "issuer configuration has no jwks to verify the subordinate statement against".into(),
        })?;
        crate::jws::verify_signature(&jws, issuer_jwks).map_err(|_| OidfError::VerificationFailed {
            issuer: issuer_config.sub.clone(),
            subject: subject.clone(),
            reason: "subordinate statement failed signature verification against issuer's jwks".into(),
        })?;

        Ok((jws, statement))
    }

    /// Lists the subordinates `issuer` advertises via its
    /// `federation_list_endpoint`, optionally filtered (spec.md §4.4).
    #[tracing::instrument(level = "debug", skip(self, issuer_config))]
    pub async fn list_subordinates(
        &self,
        issuer_config: &EntityStatement,
        filter: &ListFilter,
    ) -> Result<Vec<EntityId>> {
        let fe = federation_entity_metadata(issuer_config, "list subordinates")?;
        let endpoint = fe.federation_list_endpoint.ok_or_else(|| OidfError::EndpointMissing {
            entity: issuer_config.sub.clone(),
            endpoint: "federation_list_endpoint",
        })?;

        let mut url = endpoint;
        for (i, (k, v)) in filter.query_pairs().into_iter().enumerate() {
            let sep = if i == 0 && !url.contains('?') { '?' } else { '&' };
            url = format!("{url}{sep}{k}={}", urlencode(&v));
        }

        let body = self.fetcher.fetch_text(&url).await?;
        let ids: Vec<String> = serde_json::from_str(&body)
            .map_err(|e| OidfError::Malformed(format!("invalid subordinate listing: {e}")))?;
        ids.iter().map(|s| EntityId::parse(s)).collect()
    }
}

fn urlencode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// Looks up `issuer_config`'s `federation_entity` metadata, distinguishing
/// why it might be absent (spec.md §4.4): an entity with no `metadata`
/// claim at all has nothing to resolve (`MetadataMissing`), while an
/// entity whose metadata simply has no `federation_entity` block is not
/// acting as a federation entity at all (`NotFederationEntity`) — the
/// caller asked for a list/fetch operation on what is, for this purpose, a
/// leaf.
fn federation_entity_metadata(
    issuer_config: &EntityStatement,
    operation: &'static str,
) -> Result<FederationEntityMetadata> {
    if issuer_config.metadata_raw.is_empty() {
        return Err(OidfError::MetadataMissing(issuer_config.sub.clone()));
    }
    FederationEntityMetadata::from_metadata(&issuer_config.metadata())
        .ok_or_else(|| OidfError::NotFederationEntity { entity: issuer_config.sub.clone(), operation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::FetcherConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn list_subordinates_applies_filter_as_query_param() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .and(query_param("entity_type", "openid_provider"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"["https://op.example"]"#))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&FetcherConfig::default()).unwrap();
        let client = FederationClient::new(fetcher);

        let issuer: EntityStatement = serde_json::from_value(serde_json::json!({
            "iss": "https://ia.example",
            "sub": "https://ia.example",
            "iat": 0,
            "exp": 9_999_999_999i64,
            "jwks": {"keys": []},
            "metadata": {
                "federation_entity": {"federation_list_endpoint": format!("{}/list", server.uri())}
            }
        }))
        .unwrap();

        let filter = ListFilter { entity_type: Some("openid_provider".into()), ..Default::default() };
        let ids = client.list_subordinates(&issuer, &filter).await.unwrap();
        assert_eq!(ids, vec![EntityId::parse("https://op.example").unwrap()]);
    }
}
