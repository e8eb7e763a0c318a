//! Compact JWS decoding and verification (spec.md §4.2).
//!
//! `decode_payload` never checks a signature — it only needs to split the
//! compact serialization and base64url-decode the middle segment into
//! JSON. `verify_signature` is the only function here that touches a key.

use base64::Engine;
use jsonwebtoken::{Algorithm, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{OidfError, Result};
use crate::jwk::Jwks;

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::URL_SAFE_NO_PAD;

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// Splits a compact JWS (`header.payload.signature`) and returns its
/// payload as a parsed JSON object. Rejects non-object payloads.
pub fn decode_payload(jws: &str) -> Result<Map<String, Value>> {
    let parts: Vec<&str> = jws.split('.').collect();
    if parts.len() != 3 {
        return Err(OidfError::Malformed("not a compact JWS (expected 3 segments)".into()));
    }

    let payload_bytes = B64
        .decode(parts[1])
        .map_err(|e| OidfError::Malformed(format!("invalid base64url payload: {e}")))?;

    match serde_json::from_slice::<Value>(&payload_bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(OidfError::Malformed("JWS payload is not a JSON object".into())),
        Err(e) => Err(OidfError::Malformed(format!("invalid JSON payload: {e}"))),
    }
}

fn decode_header(jws: &str) -> Result<Header> {
    let header_b64 = jws
        .split('.')
        .next()
        .ok_or_else(|| OidfError::Malformed("not a compact JWS".into()))?;
    let bytes = B64
        .decode(header_b64)
        .map_err(|e| OidfError::Malformed(format!("invalid base64url header: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| OidfError::Malformed(format!("invalid JWS header: {e}")))
}

/// Verifies the signature of a compact JWS against a federation JWKS,
/// selecting the key by the header's `kid` and enforcing the header's
/// `alg` against that key's allowed algorithms (spec.md §4.2).
pub fn verify_signature(jws: &str, jwks: &Jwks) -> Result<()> {
    let header = decode_header(jws)?;

    let alg: Algorithm = header
        .alg
        .parse()
        .map_err(|_| OidfError::Malformed(format!("unsupported alg `{}`", header.alg)))?;

    let jwk = jwks
        .find(header.kid.as_deref())
        .ok_or_else(|| OidfError::Malformed("no matching key for kid".into()))?;

    let (decoding_key, allowed) = jwk.decoding_key()?;
    if !allowed.contains(&alg) {
        return Err(OidfError::Malformed(format!(
            "alg `{}` not permitted for this key",
            header.alg
        )));
    }

    let mut validation = Validation::new(alg);
    // Claim-level checks (exp, iss/sub match) are performed by the entity
    // statement model, not by the JWS layer; disable jsonwebtoken's own
    // claim validation so a signature failure and a claim failure aren't
    // conflated.
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    validation.validate_aud = false;

    jsonwebtoken::decode::<Map<String, Value>>(jws, &decoding_key, &validation)
        .map(|_| ())
        .map_err(|e| OidfError::Malformed(format!("signature verification failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header as EncHeader};

    fn make_jws(claims: &Value, kid: &str) -> (String, Jwks) {
        // RSA test key, PKCS1 DER, generated once for this test file only.
        const PRIV_PEM: &str = include_str!("../tests/fixtures/test_rsa_key.pem");
        let enc_key = EncodingKey::from_rsa_pem(PRIV_PEM.as_bytes()).unwrap();
        let mut header = EncHeader::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let token = encode(&header, claims, &enc_key).unwrap();

        const PUB_N: &str = include_str!("../tests/fixtures/test_rsa_n.b64");
        const PUB_E: &str = "AQAB";
        let jwk = crate::jwk::Jwk {
            kty: "RSA".into(),
            kid: Some(kid.into()),
            use_: Some("sig".into()),
            alg: Some("RS256".into()),
            n: Some(PUB_N.trim().to_string()),
            e: Some(PUB_E.to_string()),
            crv: None,
            x: None,
            y: None,
            extra: Map::new(),
        };
        (token, Jwks { keys: vec![jwk] })
    }

    #[test]
    fn decode_payload_rejects_non_three_segment() {
        assert!(decode_payload("not.a.jws.at.all").is_err());
        assert!(decode_payload("tooshort").is_err());
    }

    #[test]
    fn decode_payload_reads_claims() {
        let (jws, _) = make_jws(&serde_json::json!({"iss": "https://a.example", "sub": "https://a.example"}), "k1");
        let payload = decode_payload(&jws).unwrap();
        assert_eq!(payload.get("iss").unwrap(), "https://a.example");
    }

    #[test]
    fn verify_signature_accepts_matching_key() {
        let (jws, jwks) = make_jws(&serde_json::json!({"sub": "https://a.example"}), "k1");
        verify_signature(&jws, &jwks).unwrap();
    }

    #[test]
    fn verify_signature_rejects_unknown_kid() {
        let (jws, mut jwks) = make_jws(&serde_json::json!({"sub": "https://a.example"}), "k1");
        jwks.keys[0].kid = Some("other".into());
        assert!(verify_signature(&jws, &jwks).is_err());
    }
}
