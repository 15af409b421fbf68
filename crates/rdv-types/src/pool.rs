//! The pool entity, its lifecycle status, and the eligibility-gate tree.
//!
//! Lifecycle:
//!
//! ```text
//! [COMMIT] ──commit deadline──→ [REVEAL] ──reveal deadline──→ [CLOSED]
//! [OPEN]   ─────────────────────reveal deadline─────────────→ [CLOSED]
//! ```
//!
//! `CLOSED` is absorbing: once a pool is closed, no submissions or reveals
//! are accepted, ever. The stored status may lag real time; the effective
//! status is always recomputed from the deadlines (rdv-pools).

use crate::ids::{AgreementPublicKey, PoolId, SigningPublicKey};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored lifecycle status of a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolStatus {
    /// Accepting direct (immediately revealed) submissions.
    Open,
    /// Accepting committed (blinded) submissions.
    Commit,
    /// Accepting reveals of previously committed submissions.
    Reveal,
    /// Accepting nothing. Absorbing.
    Closed,
}

impl PoolStatus {
    /// Stable lowercase name, used in storage index keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolStatus::Open => "open",
            PoolStatus::Commit => "commit",
            PoolStatus::Reveal => "reveal",
            PoolStatus::Closed => "closed",
        }
    }
}

/// Boolean combinator for composite gates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateOp {
    /// Every child must pass. Empty child list fails.
    And,
    /// At least one child must pass. Empty child list fails.
    Or,
}

/// Composable eligibility predicate attached to a pool.
///
/// Extension is by adding a variant, not by subclassing; the single
/// evaluator in rdv-pools dispatches on the tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Gate {
    /// Always eligible.
    Open,
    /// Eligible iff the participant key is in the set.
    AllowList {
        /// The admitted agreement public keys.
        keys: Vec<AgreementPublicKey>,
    },
    /// Eligible iff the context carries a valid unlinkable-token proof
    /// from this issuer.
    Token {
        /// Identifier of the accepted issuer.
        issuer: String,
    },
    /// Logical combination of child gates; short-circuits.
    Composite {
        /// And/Or combinator.
        op: GateOp,
        /// Child predicates.
        children: Vec<Gate>,
    },
}

impl Gate {
    /// Depth of the gate tree. Used to bound validation.
    pub fn depth(&self) -> usize {
        match self {
            Gate::Composite { children, .. } => {
                1 + children.iter().map(Gate::depth).max().unwrap_or(0)
            }
            _ => 1,
        }
    }
}

/// A matching pool.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pool {
    /// Unique identifier.
    pub id: PoolId,
    /// Human-readable name. Non-empty, at most 200 characters.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Creator agreement public key, used by the matching math.
    pub creator_key: AgreementPublicKey,
    /// Creator signing public key for administrative actions. Immutable.
    pub creator_signing_key: SigningPublicKey,
    /// Optional end of the commit phase. Strictly before `reveal_deadline`.
    pub commit_deadline: Option<Timestamp>,
    /// End of the submission window. Required; strictly in the future at
    /// creation.
    pub reveal_deadline: Timestamp,
    /// Eligibility predicate for registration and federated joins.
    pub gate: Gate,
    /// Optional cap on real (non-decoy) tokens per participant.
    pub max_preferences: Option<u32>,
    /// Ephemeral pools delete participant profiles after match detection.
    pub ephemeral: bool,
    /// Whether joining requires passing the gate with an invite proof.
    pub requires_invite: bool,
    /// Stored status. May lag; see module docs.
    pub status: PoolStatus,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last status/metadata update.
    pub updated_at: Timestamp,
    /// Reference to an owner-submitted PSI setup, when one exists.
    pub psi_setup_id: Option<Uuid>,
}

impl Pool {
    /// True once the stored status is the absorbing `Closed`.
    pub fn is_closed(&self) -> bool {
        self.status == PoolStatus::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names_are_stable() {
        assert_eq!(PoolStatus::Open.as_str(), "open");
        assert_eq!(PoolStatus::Commit.as_str(), "commit");
        assert_eq!(PoolStatus::Reveal.as_str(), "reveal");
        assert_eq!(PoolStatus::Closed.as_str(), "closed");
    }

    #[test]
    fn test_gate_depth() {
        assert_eq!(Gate::Open.depth(), 1);
        let nested = Gate::Composite {
            op: GateOp::And,
            children: vec![
                Gate::Open,
                Gate::Composite {
                    op: GateOp::Or,
                    children: vec![Gate::Open],
                },
            ],
        };
        assert_eq!(nested.depth(), 3);
    }
}
