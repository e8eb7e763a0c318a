//! Metadata Policy Engine (spec.md §4.5): gathering a combined policy
//! along a chain, and applying it to a metadata block. Both operations
//! are pure — no I/O, no logging side effects (spec.md §4.3's "observable
//! side effects: none" applies equally here).

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::chain::TrustChain;
use crate::entity_type::EntityType;
use crate::error::{OidfError, Result};
use crate::metadata::ParameterPolicy;

pub type CombinedPolicy = HashMap<String, ParameterPolicy>;

/// Folds each statement's `metadata_policy[entity_type]` along the chain,
/// from the trust anchor down to the leaf (spec.md §4.5 "Gather").
pub fn gather(chain: &TrustChain, entity_type: EntityType) -> Result<CombinedPolicy> {
    let mut combined: CombinedPolicy = HashMap::new();
    for statement in chain.statements().iter().rev() {
        let policy_for_type = statement.metadata_policy();
        let Some(params) = policy_for_type.get(&entity_type) else { continue };
        for (parameter, next) in params {
            match combined.get(parameter) {
                Some(prior) => {
                    let merged = combine_parameter(parameter, prior, next)?;
                    combined.insert(parameter.clone(), merged);
                }
                None => {
                    combined.insert(parameter.clone(), next.clone());
                }
            }
        }
    }
    Ok(combined)
}

/// Combines two policy-combination results for the same parameter; used
/// directly by [`gather`] and exposed for the associativity property test
/// (spec.md §8 invariant 6).
pub fn combine_parameter(parameter: &str, prior: &ParameterPolicy, next: &ParameterPolicy) -> Result<ParameterPolicy> {
    let mut result = prior.clone();

    for (op, value) in next {
        match op.as_str() {
            "subset_of" | "one_of" => {
                let merged = match result.get(op) {
                    Some(existing) => intersect(existing, value),
                    None => as_array(value),
                };
                if merged.is_empty() {
                    return Err(OidfError::PolicyConflict {
                        parameter: parameter.to_string(),
                        reason: format!("`{op}` intersection is empty"),
                    });
                }
                result.insert(op.clone(), Value::Array(merged));
            }
            "superset_of" | "add" => {
                let merged = match result.get(op) {
                    Some(existing) => union(existing, value),
                    None => as_array(value),
                };
                result.insert(op.clone(), Value::Array(merged));
            }
            "value" => {
                if let Some(existing) = result.get("value") {
                    if existing != value {
                        return Err(OidfError::PolicyConflict {
                            parameter: parameter.to_string(),
                            reason: "`value` set to conflicting values at different levels".into(),
                        });
                    }
                } else {
                    result.insert("value".to_string(), value.clone());
                }
            }
            "default" => {
                if let Some(existing) = result.get("default") {
                    if existing != value {
                        return Err(OidfError::PolicyConflict {
                            parameter: parameter.to_string(),
                            reason: "`default` set to conflicting values at different levels".into(),
                        });
                    }
                } else {
                    result.insert("default".to_string(), value.clone());
                }
            }
            "essential" => {
                let prior_true = result.get("essential").and_then(Value::as_bool).unwrap_or(false);
                let next_true = value.as_bool().unwrap_or(false);
                result.insert("essential".to_string(), Value::Bool(prior_true || next_true));
            }
            unknown => {
                // Operator not in the known set: carry it through verbatim.
                // `EntityStatement::verify` is responsible for rejecting
                // unrecognized-and-critical operator names.
                result.insert(unknown.to_string(), value.clone());
            }
        }
    }

    if result.contains_key("value") {
        result.remove("default");
    }

    check_value_consistency(parameter, &result)?;
    Ok(result)
}

fn check_value_consistency(parameter: &str, policy: &ParameterPolicy) -> Result<()> {
    for key in ["value", "default"] {
        let Some(fixed) = policy.get(key) else { continue };
        if let Some(subset) = policy.get("subset_of") {
            let allowed = as_array(subset);
            if as_array(fixed).iter().any(|v| !allowed.contains(v)) {
                return Err(OidfError::PolicyConflict {
                    parameter: parameter.to_string(),
                    reason: format!("`{key}` is not consistent with `subset_of`"),
                });
            }
        }
        if let Some(one_of) = policy.get("one_of") {
            let allowed = as_array(one_of);
            if as_array(fixed).iter().any(|v| !allowed.contains(v)) {
                return Err(OidfError::PolicyConflict {
                    parameter: parameter.to_string(),
                    reason: format!("`{key}` is not consistent with `one_of`"),
                });
            }
        }
    }
    Ok(())
}

/// Applies a combined policy to a metadata block, producing effective
/// metadata (spec.md §4.5 "Apply").
pub fn apply(metadata_block: &Map<String, Value>, policy: &CombinedPolicy) -> Result<Map<String, Value>> {
    let mut result = metadata_block.clone();

    for (parameter, p) in policy {
        if let Some(v) = p.get("value") {
            result.insert(parameter.clone(), v.clone());
        } else if !result.contains_key(parameter) {
            if let Some(d) = p.get("default") {
                result.insert(parameter.clone(), d.clone());
            }
        }

        if let Some(add) = p.get("add") {
            let mut list = result.get(parameter).map(as_array).unwrap_or_default();
            for item in as_array(add) {
                if !list.contains(&item) {
                    list.push(item);
                }
            }
            result.insert(parameter.clone(), Value::Array(list));
        }

        if let Some(subset) = p.get("subset_of") {
            let allowed = as_array(subset);
            if let Some(v) = result.get(parameter) {
                if as_array(v).iter().any(|item| !allowed.contains(item)) {
                    return Err(OidfError::PolicyViolation {
                        parameter: parameter.clone(),
                        reason: "value is not a subset of the allowed set".into(),
                    });
                }
            }
        }

        if let Some(one_of) = p.get("one_of") {
            let allowed = as_array(one_of);
            if let Some(v) = result.get(parameter) {
                if as_array(v).iter().any(|item| !allowed.contains(item)) {
                    return Err(OidfError::PolicyViolation {
                        parameter: parameter.clone(),
                        reason: "value is not one of the allowed values".into(),
                    });
                }
            }
        }

        if let Some(superset) = p.get("superset_of") {
            let required = as_array(superset);
            let present = result.get(parameter).map(as_array).unwrap_or_default();
            if required.iter().any(|item| !present.contains(item)) {
                return Err(OidfError::PolicyViolation {
                    parameter: parameter.clone(),
                    reason: "value does not contain all required elements".into(),
                });
            }
        }

        if p.get("essential").and_then(Value::as_bool).unwrap_or(false) && !result.contains_key(parameter) {
            return Err(OidfError::PolicyViolation {
                parameter: parameter.clone(),
                reason: "parameter is essential but absent after policy application".into(),
            });
        }
    }

    Ok(result)
}

fn as_array(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn intersect(a: &Value, b: &Value) -> Vec<Value> {
    let a = as_array(a);
    let b = as_array(b);
    a.into_iter().filter(|v| b.contains(v)).collect()
}

fn union(a: &Value, b: &Value) -> Vec<Value> {
    let mut out = as_array(a);
    for v in as_array(b) {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn policy(ops: Value) -> ParameterPolicy {
        serde_json::from_value(ops).unwrap()
    }

    #[test]
    fn apply_is_idempotent_given_a_consistent_policy() {
        let metadata: Map<String, Value> = serde_json::from_value(json!({
            "grant_types": ["authorization_code", "refresh_token"]
        }))
        .unwrap();
        let mut combined = CombinedPolicy::new();
        combined.insert(
            "grant_types".to_string(),
            policy(json!({"subset_of": ["authorization_code", "refresh_token", "implicit"]})),
        );

        let once = apply(&metadata, &combined).unwrap();
        let twice = apply(&once, &combined).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn combine_is_associative_without_conflicts() {
        let a = policy(json!({"subset_of": ["a", "b", "c", "d"]}));
        let b = policy(json!({"subset_of": ["a", "b", "c"]}));
        let c = policy(json!({"subset_of": ["a", "b"]}));

        let ab = combine_parameter("p", &a, &b).unwrap();
        let ab_c = combine_parameter("p", &ab, &c).unwrap();

        let bc = combine_parameter("p", &b, &c).unwrap();
        let a_bc = combine_parameter("p", &a, &bc).unwrap();

        assert_eq!(ab_c.get("subset_of"), a_bc.get("subset_of"));
    }

    #[test]
    fn s4_policy_violation_on_disallowed_grant_type() {
        // Anchor -> intermediate -> leaf, narrowing subset_of at each hop.
        let anchor = policy(json!({"subset_of": ["authorization_code", "refresh_token", "implicit"]}));
        let intermediate = policy(json!({"subset_of": ["authorization_code", "refresh_token"]}));
        let combined = combine_parameter("grant_types", &anchor, &intermediate).unwrap();

        let mut policy_map = CombinedPolicy::new();
        policy_map.insert("grant_types".to_string(), combined);

        let leaf_metadata: Map<String, Value> = serde_json::from_value(json!({
            "grant_types": ["authorization_code", "client_credentials"]
        }))
        .unwrap();

        let err = apply(&leaf_metadata, &policy_map).unwrap_err();
        assert!(matches!(err, OidfError::PolicyViolation { parameter, .. } if parameter == "grant_types"));
    }

    #[test]
    fn s5_default_applied_when_metadata_omits_parameter() {
        let mut policy_map = CombinedPolicy::new();
        policy_map.insert("scope".to_string(), policy(json!({"default": ["openid"]})));

        let leaf_metadata: Map<String, Value> = Map::new();
        let effective = apply(&leaf_metadata, &policy_map).unwrap();
        assert_eq!(effective.get("scope").unwrap(), &json!(["openid"]));
    }

    #[test]
    fn conflicting_value_at_two_levels_is_a_policy_conflict() {
        let anchor = policy(json!({"value": "fixed-a"}));
        let leaf = policy(json!({"value": "fixed-b"}));
        let err = combine_parameter("p", &anchor, &leaf).unwrap_err();
        assert!(matches!(err, OidfError::PolicyConflict { .. }));
    }

    #[test]
    fn value_removes_default_for_same_parameter() {
        let anchor = policy(json!({"default": ["openid"]}));
        let leaf = policy(json!({"value": ["openid", "profile"]}));
        let combined = combine_parameter("scope", &anchor, &leaf).unwrap();
        assert!(combined.get("default").is_none());
        assert!(combined.get("value").is_some());
    }
}
