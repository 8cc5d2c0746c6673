use crate::DomainResult;
use crate::identity::ActorIdentity;

/// Validates a bearer credential and yields the identity it belongs to.
///
/// Implementations fail with `DomainError::Unauthenticated` for missing, malformed,
/// expired or revoked credentials, and for credentials whose subject no longer exists.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str) -> crate::ports::BoxFuture<'_, DomainResult<ActorIdentity>>;
}
