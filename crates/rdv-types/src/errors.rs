//! The stable error taxonomy.
//!
//! Every failure the core surfaces to callers is a [`RendezvousError`];
//! each variant carries a stable machine-readable [`ErrorCode`] that outer
//! layers (HTTP, CLI) map verbatim. Validation and protocol-state errors
//! surface as-is; adapter outages on authorization-dependent paths surface
//! as `ServiceUnavailable` (fail-closed), never as a silent open.

use crate::ids::PoolId;
use thiserror::Error;

/// Stable machine-readable error codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ErrorCode {
    PoolNotFound,
    PoolClosed,
    PoolNotInCommitPhase,
    PoolNotInRevealPhase,
    AlreadyRegistered,
    ParticipantNotFound,
    DuplicateNullifier,
    PreferenceLimitExceeded,
    InvalidEligibilityProof,
    CommitmentNotFound,
    CommitmentMismatch,
    InvalidPublicKey,
    InvalidPrivateKey,
    InvalidInput,
    ServiceUnavailable,
    Gone,
    InternalError,
}

impl ErrorCode {
    /// The wire form of the code. Stable; outer layers rely on these.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::PoolNotFound => "POOL_NOT_FOUND",
            ErrorCode::PoolClosed => "POOL_CLOSED",
            ErrorCode::PoolNotInCommitPhase => "POOL_NOT_IN_COMMIT_PHASE",
            ErrorCode::PoolNotInRevealPhase => "POOL_NOT_IN_REVEAL_PHASE",
            ErrorCode::AlreadyRegistered => "ALREADY_REGISTERED",
            ErrorCode::ParticipantNotFound => "PARTICIPANT_NOT_FOUND",
            ErrorCode::DuplicateNullifier => "DUPLICATE_NULLIFIER",
            ErrorCode::PreferenceLimitExceeded => "PREFERENCE_LIMIT_EXCEEDED",
            ErrorCode::InvalidEligibilityProof => "INVALID_ELIGIBILITY_PROOF",
            ErrorCode::CommitmentNotFound => "COMMITMENT_NOT_FOUND",
            ErrorCode::CommitmentMismatch => "COMMITMENT_MISMATCH",
            ErrorCode::InvalidPublicKey => "INVALID_PUBLIC_KEY",
            ErrorCode::InvalidPrivateKey => "INVALID_PRIVATE_KEY",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::Gone => "GONE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// Core error type surfaced by every subsystem.
#[derive(Debug, Error)]
pub enum RendezvousError {
    /// No pool with this id.
    #[error("pool {0} not found")]
    PoolNotFound(PoolId),

    /// The pool is closed; submissions and reveals are permanently refused.
    #[error("pool {0} is closed")]
    PoolClosed(PoolId),

    /// The operation requires the commit phase.
    #[error("pool {0} is not in the commit phase")]
    NotInCommitPhase(PoolId),

    /// The operation requires the reveal (or open) phase.
    #[error("pool {0} is not in the reveal phase")]
    NotInRevealPhase(PoolId),

    /// This agreement key is already registered in the pool.
    #[error("participant already registered")]
    AlreadyRegistered,

    /// No participant with this key in the pool.
    #[error("participant not found")]
    ParticipantNotFound,

    /// A preference set already exists under this (pool, nullifier).
    #[error("duplicate nullifier: a submission already exists for this pool")]
    DuplicateNullifier,

    /// More real tokens than the pool's configured maximum.
    #[error("preference limit exceeded: submitted {submitted}, limit {limit}")]
    PreferenceLimitExceeded {
        /// Configured maximum.
        limit: u32,
        /// Number of real tokens submitted.
        submitted: u32,
    },

    /// The eligibility proof was missing, expired, or failed verification.
    #[error("invalid eligibility proof: {0}")]
    InvalidEligibilityProof(String),

    /// Reveal found no unrevealed commitments under the nullifier.
    #[error("no commitment found to reveal")]
    CommitmentNotFound,

    /// A supplied token hashed to none of the outstanding commitments.
    #[error("commitment mismatch: supplied token does not match any commitment")]
    CommitmentMismatch,

    /// Not a valid public key encoding.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Not a valid private key encoding.
    #[error("invalid private key")]
    InvalidPrivateKey,

    /// Request-level validation failure.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A required external service could not be reached; the operation
    /// fails closed and may be retried.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The addressed resource existed but has expired.
    #[error("gone: {0}")]
    Gone(String),

    /// Unexpected internal failure (storage, serialization).
    #[error("internal error: {0}")]
    Internal(String),
}

impl RendezvousError {
    /// The stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            RendezvousError::PoolNotFound(_) => ErrorCode::PoolNotFound,
            RendezvousError::PoolClosed(_) => ErrorCode::PoolClosed,
            RendezvousError::NotInCommitPhase(_) => ErrorCode::PoolNotInCommitPhase,
            RendezvousError::NotInRevealPhase(_) => ErrorCode::PoolNotInRevealPhase,
            RendezvousError::AlreadyRegistered => ErrorCode::AlreadyRegistered,
            RendezvousError::ParticipantNotFound => ErrorCode::ParticipantNotFound,
            RendezvousError::DuplicateNullifier => ErrorCode::DuplicateNullifier,
            RendezvousError::PreferenceLimitExceeded { .. } => ErrorCode::PreferenceLimitExceeded,
            RendezvousError::InvalidEligibilityProof(_) => ErrorCode::InvalidEligibilityProof,
            RendezvousError::CommitmentNotFound => ErrorCode::CommitmentNotFound,
            RendezvousError::CommitmentMismatch => ErrorCode::CommitmentMismatch,
            RendezvousError::InvalidPublicKey => ErrorCode::InvalidPublicKey,
            RendezvousError::InvalidPrivateKey => ErrorCode::InvalidPrivateKey,
            RendezvousError::InvalidInput(_) => ErrorCode::InvalidInput,
            RendezvousError::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
            RendezvousError::Gone(_) => ErrorCode::Gone,
            RendezvousError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable_strings() {
        assert_eq!(
            RendezvousError::DuplicateNullifier.code().as_str(),
            "DUPLICATE_NULLIFIER"
        );
        assert_eq!(
            RendezvousError::PreferenceLimitExceeded {
                limit: 5,
                submitted: 7
            }
            .code()
            .as_str(),
            "PREFERENCE_LIMIT_EXCEEDED"
        );
        assert_eq!(
            RendezvousError::PoolClosed(PoolId::generate()).code().as_str(),
            "POOL_CLOSED"
        );
    }
}
