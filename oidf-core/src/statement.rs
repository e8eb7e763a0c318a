//! Entity Statement model (spec.md §3–§4.3): a typed view over a decoded
//! JWS payload.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity_id::EntityId;
use crate::error::{OidfError, Result};
use crate::jwk::Jwks;
use crate::metadata::{entity_keyed_map, Metadata, MetadataPolicy};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub max_path_length: Option<usize>,
    #[serde(default)]
    pub naming_constraints: Option<Value>,
}

/// A decoded, not-yet-verified entity statement: a self-signed entity
/// configuration (`iss == sub`) or a subordinate statement (`iss != sub`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityStatement {
    pub iss: EntityId,
    pub sub: EntityId,
    pub iat: i64,
    pub exp: i64,

    #[serde(default)]
    pub jwks: Option<Jwks>,

    #[serde(default)]
    pub authority_hints: Vec<EntityId>,

    #[serde(default, rename = "metadata")]
    pub metadata_raw: Map<String, Value>,

    #[serde(default, rename = "metadata_policy")]
    pub metadata_policy_raw: Map<String, Value>,

    #[serde(default)]
    pub constraints: Option<Constraints>,

    #[serde(default)]
    pub crit: Vec<String>,

    #[serde(default)]
    pub policy_language_crit: Vec<String>,

    #[serde(default)]
    pub trust_marks: Option<Value>,

    /// The raw compact JWS this statement was decoded from, kept for
    /// serialization passthrough (spec.md §4.4's `entity_configuration`
    /// subtree field carries the JWS string, not the decoded claims).
    #[serde(skip)]
    pub raw_jws: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Claim names this core understands and therefore may ignore even when
/// listed in `crit`/`policy_language_crit`.
const KNOWN_CLAIMS: &[&str] = &[
    "iss", "sub", "iat", "exp", "jwks", "authority_hints", "metadata",
    "metadata_policy", "constraints", "crit", "policy_language_crit", "trust_marks",
];

const KNOWN_POLICY_OPERATORS: &[&str] = &[
    "subset_of", "one_of", "superset_of", "add", "value", "default", "essential",
];

impl EntityStatement {
    pub fn from_jws(jws: &str) -> Result<Self> {
        let payload = crate::jws::decode_payload(jws)?;
        let mut statement: EntityStatement = serde_json::from_value(Value::Object(payload))
            .map_err(|e| OidfError::Malformed(format!("invalid entity statement: {e}")))?;
        statement.raw_jws = jws.to_string();
        Ok(statement)
    }

    pub fn is_self_signed(&self) -> bool {
        self.iss == self.sub
    }

    pub fn metadata(&self) -> Metadata {
        entity_keyed_map(&self.metadata_raw)
    }

    pub fn metadata_policy(&self) -> MetadataPolicy {
        entity_keyed_map(&self.metadata_policy_raw)
    }

    /// Enforces presence of required claims and extension criticality
    /// (spec.md §4.3). Does not check the signature — see [`crate::jws`].
    pub fn verify(&self) -> Result<()> {
        if self.is_self_signed() && self.jwks.is_none() {
            return Err(OidfError::MissingClaim("jwks".into()));
        }

        check_crit(&self.crit, &self.extra, KNOWN_CLAIMS)?;

        if !self.policy_language_crit.is_empty() {
            for params in self.metadata_policy_raw.values() {
                let Value::Object(params) = params else { continue };
                for operators in params.values() {
                    let Value::Object(operators) = operators else { continue };
                    let extra: Map<String, Value> = operators.clone();
                    check_crit(&self.policy_language_crit, &extra, KNOWN_POLICY_OPERATORS)?;
                }
            }
        }

        if self.exp <= self.iat {
            return Err(OidfError::Malformed("exp must be after iat".into()));
        }

        Ok(())
    }
}

fn check_crit(crit: &[String], extra: &Map<String, Value>, known: &[&str]) -> Result<()> {
    if crit.is_empty() {
        return Ok(());
    }
    let crit_set: HashSet<&str> = crit.iter().map(String::as_str).collect();
    for name in &crit_set {
        if extra.contains_key(*name) && !known.contains(name) {
            return Err(OidfError::UnknownCriticalExtension((*name).to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_statement() -> Map<String, Value> {
        serde_json::from_value(serde_json::json!({
            "iss": "https://ta.example",
            "sub": "https://ta.example",
            "iat": 1_000,
            "exp": 2_000,
            "jwks": {"keys": []}
        }))
        .unwrap()
    }

    fn parse(v: Map<String, Value>) -> EntityStatement {
        serde_json::from_value(Value::Object(v)).unwrap()
    }

    #[test]
    fn self_signed_requires_jwks() {
        let mut v = base_statement();
        v.remove("jwks");
        let stmt = parse(v);
        assert!(matches!(stmt.verify(), Err(OidfError::MissingClaim(_))));
    }

    #[test]
    fn unknown_critical_extension_fails() {
        let mut v = base_statement();
        v.insert("crit".into(), serde_json::json!(["frobnicate"]));
        v.insert("frobnicate".into(), serde_json::json!(true));
        let stmt = parse(v);
        assert!(matches!(
            stmt.verify(),
            Err(OidfError::UnknownCriticalExtension(name)) if name == "frobnicate"
        ));
    }

    #[test]
    fn known_critical_extension_passes() {
        let mut v = base_statement();
        v.insert("crit".into(), serde_json::json!(["authority_hints"]));
        let stmt = parse(v);
        assert!(stmt.verify().is_ok());
    }

    #[test]
    fn critical_policy_operator_unknown_fails() {
        let mut v = base_statement();
        v.insert(
            "metadata_policy".into(),
            serde_json::json!({"openid_relying_party": {"scope": {"bespoke_op": ["x"]}}}),
        );
        v.insert("policy_language_crit".into(), serde_json::json!(["bespoke_op"]));
        let stmt = parse(v);
        assert!(matches!(
            stmt.verify(),
            Err(OidfError::UnknownCriticalExtension(name)) if name == "bespoke_op"
        ));
    }
}
