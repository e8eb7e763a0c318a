//! JSON Web Key / JWK Set model (RFC 7517), as carried in a self-signed
//! entity configuration's `jwks` claim and used to verify statements it
//! issues (spec.md §4.2).

use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};

use crate::error::{OidfError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default, rename = "use")]
    pub use_: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,

    // RSA
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,

    // EC
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Jwk {
    /// Build a `jsonwebtoken` decoding key plus the set of algorithms this
    /// key is allowed to be used with, from its key material alone.
    pub fn decoding_key(&self) -> Result<(DecodingKey, &'static [jsonwebtoken::Algorithm])> {
        use jsonwebtoken::Algorithm::*;

        match self.kty.as_str() {
            "RSA" => {
                let n = self
                    .n
                    .as_deref()
                    .ok_or_else(|| OidfError::Malformed("RSA jwk missing `n`".into()))?;
                let e = self
                    .e
                    .as_deref()
                    .ok_or_else(|| OidfError::Malformed("RSA jwk missing `e`".into()))?;
                let key = DecodingKey::from_rsa_components(n, e)
                    .map_err(|e| OidfError::Malformed(format!("invalid RSA jwk: {e}")))?;
                Ok((key, &[RS256, RS384, RS512, PS256, PS384, PS512]))
            }
            "EC" => {
                let x = self
                    .x
                    .as_deref()
                    .ok_or_else(|| OidfError::Malformed("EC jwk missing `x`".into()))?;
                let y = self
                    .y
                    .as_deref()
                    .ok_or_else(|| OidfError::Malformed("EC jwk missing `y`".into()))?;
                let key = DecodingKey::from_ec_components(x, y)
                    .map_err(|e| OidfError::Malformed(format!("invalid EC jwk: {e}")))?;
                let algs: &'static [jsonwebtoken::Algorithm] = match self.crv.as_deref() {
                    Some("P-384") => &[ES384],
                    _ => &[ES256],
                };
                Ok((key, algs))
            }
            other => Err(OidfError::Malformed(format!("unsupported key type `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    pub fn find(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(kid) => self.keys.iter().find(|k| k.kid.as_deref() == Some(kid)),
            // RFC 7517 allows an unkeyed JWKS with a single entry.
            None if self.keys.len() == 1 => self.keys.first(),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsa_jwk() -> Jwk {
        serde_json::from_value(serde_json::json!({
            "kty": "RSA",
            "kid": "key-1",
            "n": "ALPFfQ",
            "e": "AQAB"
        }))
        .unwrap()
    }

    #[test]
    fn finds_key_by_kid() {
        let jwks = Jwks { keys: vec![rsa_jwk()] };
        assert!(jwks.find(Some("key-1")).is_some());
        assert!(jwks.find(Some("other")).is_none());
    }

    #[test]
    fn falls_back_to_sole_key_when_no_kid_requested() {
        let jwks = Jwks { keys: vec![rsa_jwk()] };
        assert!(jwks.find(None).is_some());
    }
}
