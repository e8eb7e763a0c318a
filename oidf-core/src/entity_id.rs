//! Entity identifiers (spec.md §3): absolute HTTPS URLs, normalized by
//! stripping trailing path slashes so that two differently-slashed
//! representations of the same entity compare and hash equal. `http` is
//! accepted for loopback hosts only, mirroring the loopback-redirect
//! exception in OAuth native-app profiles (RFC 8252 §7.3) so integration
//! tests can resolve real entities against a local mock server.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OidfError, Result};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    pub fn parse(raw: &str) -> Result<Self> {
        let url = url::Url::parse(raw).map_err(|_| OidfError::InvalidUrl(raw.to_string()))?;
        let is_loopback_http = url.scheme() == "http"
            && matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "::1"));
        if url.scheme() != "https" && !is_loopback_http {
            return Err(OidfError::InvalidUrl(raw.to_string()));
        }
        Ok(Self(normalize(url.as_str())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The two path variants a `.well-known` request may need to try,
    /// preferring the no-trailing-slash form (spec.md §4.4).
    pub fn well_known_urls(&self) -> [String; 2] {
        let base = &self.0;
        [
            format!("{base}/.well-known/openid-federation"),
            format!("{base}/.well-known/openid-federation/"),
        ]
    }
}

fn normalize(s: &str) -> String {
    let trimmed = s.trim_end_matches('/');
    if trimmed.is_empty() {
        s.to_string()
    } else {
        trimmed.to_string()
    }
}

impl TryFrom<String> for EntityId {
    type Error = OidfError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<EntityId> for String {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_slash() {
        let a = EntityId::parse("https://ta.example").unwrap();
        let b = EntityId::parse("https://ta.example/").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "https://ta.example");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = EntityId::parse("https://rp.example///").unwrap();
        let twice = EntityId::parse(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn rejects_non_https() {
        assert!(EntityId::parse("http://rp.example").is_err());
        assert!(EntityId::parse("not a url").is_err());
    }

    #[test]
    fn allows_http_on_loopback_only() {
        assert!(EntityId::parse("http://127.0.0.1:8080/rp").is_ok());
        assert!(EntityId::parse("http://localhost:8080/rp").is_ok());
        assert!(EntityId::parse("http://evil.example").is_err());
    }

    #[test]
    fn well_known_never_produces_double_slash() {
        let id = EntityId::parse("https://rp.example").unwrap();
        for u in id.well_known_urls() {
            assert!(!u.contains("//.well-known"));
        }
    }
}
