//! The closed entity-type tag set (spec.md §3).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    OpenidRelyingParty,
    OpenidProvider,
    OauthAuthorizationServer,
    OauthClient,
    OauthResourceServer,
    FederationEntity,
    TrustMarkIssuer,
}

impl EntityType {
    pub const ALL: [EntityType; 7] = [
        EntityType::OpenidRelyingParty,
        EntityType::OpenidProvider,
        EntityType::OauthAuthorizationServer,
        EntityType::OauthClient,
        EntityType::OauthResourceServer,
        EntityType::FederationEntity,
        EntityType::TrustMarkIssuer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::OpenidRelyingParty => "openid_relying_party",
            EntityType::OpenidProvider => "openid_provider",
            EntityType::OauthAuthorizationServer => "oauth_authorization_server",
            EntityType::OauthClient => "oauth_client",
            EntityType::OauthResourceServer => "oauth_resource_server",
            EntityType::FederationEntity => "federation_entity",
            EntityType::TrustMarkIssuer => "trust_mark_issuer",
        }
    }

    /// True for a type that is a "leaf" role rather than the federation
    /// administration role; used to pick the non-`federation_entity` type
    /// when a subtree node advertises both (spec.md §4.7).
    pub fn is_leaf_role(&self) -> bool {
        !matches!(self, EntityType::FederationEntity)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown entity type `{s}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for t in EntityType::ALL {
            assert_eq!(t, t.as_str().parse().unwrap());
        }
    }

    #[test]
    fn federation_entity_is_not_a_leaf_role() {
        assert!(!EntityType::FederationEntity.is_leaf_role());
        assert!(EntityType::OpenidProvider.is_leaf_role());
    }
}
