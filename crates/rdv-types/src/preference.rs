//! Stored preferences.
//!
//! A preference set is owned by a (pool, nullifier) tuple, never by a
//! participant record. Real tokens and server-injected decoys are
//! indistinguishable at this layer.

use crate::ids::{CommitHash, MatchToken, Nullifier, PoolId, PreferenceId};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// One stored match-token slot under a (pool, nullifier) tuple.
///
/// INVARIANT: a preference is never mutated after insertion except to flip
/// `revealed` to true and, for commit pools, to replace the stored token
/// with the value revealed against the commitment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Preference {
    /// Record identifier (storage-level; carries no protocol meaning).
    pub id: PreferenceId,
    /// Owning pool.
    pub pool_id: PoolId,
    /// Owning nullifier.
    pub nullifier: Nullifier,
    /// The match token. During the commit phase this is the blinded or
    /// committed value until revealed.
    pub token: MatchToken,
    /// Commitment the reveal is checked against; absent on direct
    /// submissions.
    pub commit_hash: Option<CommitHash>,
    /// Whether this token counts toward match detection.
    pub revealed: bool,
    /// Submission time.
    pub submitted_at: Timestamp,
    /// Optional reference to the eligibility proof used at submission.
    pub issuance_proof: Option<Vec<u8>>,
    /// Optional reveal-on-match payload, encrypted under the match token.
    pub encrypted_reveal: Option<Vec<u8>>,
}

impl Preference {
    /// True if this preference still awaits a reveal.
    pub fn awaiting_reveal(&self) -> bool {
        !self.revealed && self.commit_hash.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(revealed: bool, committed: bool) -> Preference {
        Preference {
            id: PreferenceId::generate(),
            pool_id: PoolId::generate(),
            nullifier: Nullifier::from_bytes([1; 32]),
            token: MatchToken::from_bytes([2; 32]),
            commit_hash: committed.then(|| CommitHash::from_bytes([3; 32])),
            revealed,
            submitted_at: Timestamp::from_millis(1),
            issuance_proof: None,
            encrypted_reveal: None,
        }
    }

    #[test]
    fn test_awaiting_reveal() {
        assert!(sample(false, true).awaiting_reveal());
        assert!(!sample(true, true).awaiting_reveal());
        assert!(!sample(false, false).awaiting_reveal());
    }
}
