//! Trust Chain abstraction (spec.md §3): an ordered, non-empty sequence
//! of entity statements from a leaf's self-signed configuration to a
//! trust anchor's self-signed configuration.

use crate::entity_id::EntityId;
use crate::error::{OidfError, Result};
use crate::statement::EntityStatement;

#[derive(Debug, Clone)]
pub struct TrustChain {
    statements: Vec<EntityStatement>,
}

impl TrustChain {
    /// Builds a chain, checking the invariant from spec.md §3:
    /// `s0.iss == s0.sub`, `sᵢ.iss == sᵢ₊₁.sub` for `0 ≤ i < n`, and
    /// `sn.iss == sn.sub`.
    pub fn new(statements: Vec<EntityStatement>) -> Result<Self> {
        if statements.is_empty() {
            return Err(OidfError::Malformed("a trust chain needs at least one statement".into()));
        }
        let leaf = &statements[0];
        if !leaf.is_self_signed() {
            return Err(OidfError::Malformed("chain leaf is not self-signed".into()));
        }
        let anchor = statements.last().unwrap();
        if !anchor.is_self_signed() {
            return Err(OidfError::Malformed("chain anchor is not self-signed".into()));
        }
        for window in statements.windows(2) {
            if window[0].iss != window[1].sub {
                return Err(OidfError::Malformed(format!(
                    "chain discontinuity: {} issued by {} does not match subject {}",
                    window[0].sub, window[0].iss, window[1].sub
                )));
            }
        }
        Ok(Self { statements })
    }

    pub fn statements(&self) -> &[EntityStatement] {
        &self.statements
    }

    pub fn leaf(&self) -> &EntityStatement {
        &self.statements[0]
    }

    pub fn anchor(&self) -> &EntityStatement {
        self.statements.last().unwrap()
    }

    /// Number of intermediaries between leaf and anchor, i.e. chain
    /// length minus the leaf and the anchor themselves.
    pub fn intermediary_count(&self) -> usize {
        self.statements.len().saturating_sub(2)
    }

    /// `min(sᵢ.exp)` across the whole chain (spec.md §3, §8 invariant 2).
    pub fn expiration(&self) -> i64 {
        self.statements.iter().map(|s| s.exp).min().unwrap_or(0)
    }

    /// `"s0.iss -> s1.iss -> ... -> sn-1.iss"` (spec.md §6).
    pub fn summary(&self) -> String {
        self.statements[..self.statements.len() - 1]
            .iter()
            .map(|s| s.iss.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn anchor_id(&self) -> &EntityId {
        &self.anchor().sub
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn statement(iss: &str, sub: &str, exp: i64) -> EntityStatement {
        serde_json::from_value(json!({
            "iss": iss, "sub": sub, "iat": 0, "exp": exp,
            "jwks": if iss == sub { Some(json!({"keys": []})) } else { None }
        }))
        .unwrap()
    }

    #[test]
    fn s1_two_hop_chain_summary_and_expiration() {
        let rp_cfg = statement("https://rp.example", "https://rp.example", 500);
        let ia_to_rp = statement("https://ia.example", "https://rp.example", 400);
        let ta_to_ia = statement("https://ta.example", "https://ia.example", 300);
        let ta_cfg = statement("https://ta.example", "https://ta.example", 600);

        let chain = TrustChain::new(vec![rp_cfg, ia_to_rp, ta_to_ia, ta_cfg]).unwrap();
        assert_eq!(chain.statements().len(), 4);
        assert_eq!(chain.summary(), "https://rp.example -> https://ia.example -> https://ta.example");
        assert_eq!(chain.expiration(), 300);
    }

    #[test]
    fn rejects_discontinuous_chain() {
        let rp_cfg = statement("https://rp.example", "https://rp.example", 500);
        let unrelated = statement("https://ta.example", "https://someone-else.example", 300);
        assert!(TrustChain::new(vec![rp_cfg, unrelated]).is_err());
    }
}
