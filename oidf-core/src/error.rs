//! Error kinds shared by every component of the core (spec.md §7).
//!
//! Branch-level failures during tree walks are logged and swallowed by the
//! caller (`resolver`, `subtree`); this enum is for errors that are fatal
//! to the operation that raised them.

use crate::entity_id::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum OidfError {
    #[error("not an absolute https URL: {0}")]
    InvalidUrl(String),

    #[error("request to {url} failed with status {status}")]
    HttpFailure { url: String, status: u16 },

    #[error("network error fetching {url}: {source}")]
    NetworkFailure {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("missing required claim `{0}`")]
    MissingClaim(String),

    #[error("entity {0} has no metadata claim")]
    MetadataMissing(EntityId),

    #[error("entity {entity} has no `{endpoint}` endpoint")]
    EndpointMissing { entity: EntityId, endpoint: &'static str },

    #[error("{entity} is not a federation entity, cannot {operation}")]
    NotFederationEntity { entity: EntityId, operation: &'static str },

    #[error("verification failed for statement issued by {issuer} about {subject}: {reason}")]
    VerificationFailed {
        issuer: EntityId,
        subject: EntityId,
        reason: String,
    },

    #[error("unknown critical extension `{0}`")]
    UnknownCriticalExtension(String),

    #[error("metadata policy conflict on parameter `{parameter}`: {reason}")]
    PolicyConflict { parameter: String, reason: String },

    #[error("metadata policy violation on parameter `{parameter}`: {reason}")]
    PolicyViolation { parameter: String, reason: String },

    #[error("cycle detected in federation graph at {0}")]
    Cycle(EntityId),

    #[error("no trust chain found from {subject} to {anchor}")]
    NoChain { subject: EntityId, anchor: EntityId },
}

pub type Result<T> = std::result::Result<T, OidfError>;
