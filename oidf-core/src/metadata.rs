//! Metadata and metadata-policy maps (spec.md §3): both are keyed by
//! [`EntityType`] at the outer level, since an entity statement may
//! describe more than one role.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity_type::EntityType;

pub type Metadata = HashMap<EntityType, Map<String, Value>>;

/// Per-parameter policy: operator name -> operand. Operator names outside
/// the known set (spec.md §4.5 table) are preserved verbatim so
/// `policy_language_crit` can be checked against them.
pub type ParameterPolicy = Map<String, Value>;

pub type MetadataPolicy = HashMap<EntityType, HashMap<String, ParameterPolicy>>;

/// Deserializes a `{entity_type: {..}}` JSON object into one of the maps
/// above, skipping entity-type keys this core doesn't recognize rather
/// than failing the whole statement on them — an unrecognized type in a
/// federation this old binary predates is not this binary's problem.
pub fn entity_keyed_map<T>(raw: &Map<String, Value>) -> HashMap<EntityType, T>
where
    T: for<'de> Deserialize<'de>,
{
    raw.iter()
        .filter_map(|(k, v)| {
            let ty: EntityType = k.parse().ok()?;
            let parsed: T = serde_json::from_value(v.clone()).ok()?;
            Some((ty, parsed))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationEntityMetadata {
    #[serde(default)]
    pub federation_fetch_endpoint: Option<String>,
    #[serde(default)]
    pub federation_list_endpoint: Option<String>,
    #[serde(default)]
    pub federation_resolve_endpoint: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FederationEntityMetadata {
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        let raw = metadata.get(&EntityType::FederationEntity)?;
        serde_json::from_value(Value::Object(raw.clone())).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_keyed_map_skips_unknown_types() {
        let raw: Map<String, Value> = serde_json::from_value(serde_json::json!({
            "openid_relying_party": {"client_name": "demo"},
            "some_future_type": {"x": 1}
        }))
        .unwrap();
        let m: Metadata = entity_keyed_map(&raw);
        assert_eq!(m.len(), 1);
        assert!(m.contains_key(&EntityType::OpenidRelyingParty));
    }
}
