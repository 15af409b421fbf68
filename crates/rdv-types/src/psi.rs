//! PSI records: setup, request queue, and response store.
//!
//! The owner-held-key workflow means the server can never run the PSI
//! protocol itself: the server key is sealed to the pool owner, requests
//! queue until the owner polls, and responses expire an hour after they
//! are posted.

use crate::ids::{AgreementPublicKey, PoolId, RequestId};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a posted PSI response stays pollable.
pub const PSI_RESPONSE_TTL_MS: u64 = 60 * 60 * 1_000;

/// Data-structure variant used by the setup message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PsiStructure {
    /// Full encoded elements; exact membership, no false positives.
    RawList,
    /// Truncated encodings bucketed for size; false-positive rate applies.
    Bucketed,
}

/// Tunable PSI parameters recorded with a setup.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PsiParams {
    /// Acceptable false-positive rate (only meaningful for `Bucketed`).
    pub false_positive_rate: f64,
    /// Maximum elements a single client request may carry.
    pub max_client_elements: u32,
    /// Structure variant.
    pub structure: PsiStructure,
}

impl Default for PsiParams {
    fn default() -> Self {
        Self {
            false_positive_rate: 1e-6,
            max_client_elements: 1_024,
            structure: PsiStructure::RawList,
        }
    }
}

/// Owner-created PSI setup for a pool. One per pool.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PsiSetup {
    /// Setup identifier.
    pub id: Uuid,
    /// The pool whose token set the setup encodes.
    pub pool_id: PoolId,
    /// Public setup message clients use to compute intersections.
    pub setup_message: Vec<u8>,
    /// The server secret, sealed to the owner's agreement key. The server
    /// stores this but cannot open it.
    pub sealed_server_key: Vec<u8>,
    /// The owner's agreement public key.
    pub owner_key: AgreementPublicKey,
    /// Parameters the setup was built with.
    pub params: PsiParams,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Queue status of a pending PSI request.
///
/// Transitions are monotone: pending → processing → completed | expired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PsiRequestStatus {
    /// Awaiting owner pickup.
    Pending,
    /// Handed to the owner, response not yet posted.
    Processing,
    /// Response posted.
    Completed,
    /// Timed out before completion.
    Expired,
}

impl PsiRequestStatus {
    /// Whether moving to `next` respects the monotone order.
    pub fn can_transition_to(&self, next: PsiRequestStatus) -> bool {
        use PsiRequestStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Expired)
                | (Processing, Completed)
                | (Processing, Expired)
        )
    }

    /// Stable lowercase name for storage index keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            PsiRequestStatus::Pending => "pending",
            PsiRequestStatus::Processing => "processing",
            PsiRequestStatus::Completed => "completed",
            PsiRequestStatus::Expired => "expired",
        }
    }
}

/// A queued client request awaiting the pool owner.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingPsiRequest {
    /// Request identifier, returned to the client for polling.
    pub id: RequestId,
    /// Target pool.
    pub pool_id: PoolId,
    /// Serialized client request. Opaque to the server.
    pub request: Vec<u8>,
    /// Queue status.
    pub status: PsiRequestStatus,
    /// Enqueue time.
    pub created_at: Timestamp,
    /// Hash of the auth token used, for rate accounting. Never the token.
    pub auth_token_hash: Option<[u8; 32]>,
}

/// A posted response, pollable by request id until it expires.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PsiResponseRecord {
    /// Record identifier.
    pub id: Uuid,
    /// The request this answers. Uniquely keyed.
    pub request_id: RequestId,
    /// The pool the request targeted.
    pub pool_id: PoolId,
    /// Setup message, repeated so clients need only one poll.
    pub setup_message: Vec<u8>,
    /// Serialized owner response.
    pub response: Vec<u8>,
    /// Post time.
    pub created_at: Timestamp,
    /// Expiry; polls after this return gone.
    pub expires_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_are_monotone() {
        use PsiRequestStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Expired));
        assert!(Processing.can_transition_to(Expired));

        // No backward edges.
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Expired.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Expired));
    }

    #[test]
    fn test_default_params() {
        let params = PsiParams::default();
        assert_eq!(params.structure, PsiStructure::RawList);
        assert!(params.max_client_elements >= 1);
    }
}
