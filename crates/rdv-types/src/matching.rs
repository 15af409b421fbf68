//! Match results, statistics, and timestamp attestations.

use crate::ids::{MatchToken, PoolId};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Result of match detection for one pool. Append-once, immutable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchResult {
    /// The pool this result belongs to.
    pub pool_id: PoolId,
    /// Tokens whose revealed occurrence count was exactly 2.
    pub matched_tokens: Vec<MatchToken>,
    /// Total stored preferences (decoys inflate this).
    pub total_submissions: u64,
    /// Preferences with revealed=true at detection time.
    pub revealed_count: u64,
    /// Distinct nullifiers that submitted.
    pub unique_nullifiers: u64,
    /// Registered participants at detection time.
    pub participant_count: u64,
    /// When detection ran.
    pub detected_at: Timestamp,
    /// Deterministic content hash binding pool, sorted tokens, participant
    /// count, and protocol version.
    pub content_hash: [u8; 32],
    /// External timestamp attestation of `content_hash`, when configured.
    pub attestation: Option<TimestampAttestation>,
}

/// Signature material inside an attestation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttestationSignatures {
    /// One signature per witness.
    Witnesses(Vec<WitnessSignature>),
    /// A single aggregate over the listed signers.
    Aggregate {
        /// The aggregate signature bytes.
        signature: Vec<u8>,
        /// Identifiers of the aggregated signers.
        signer_ids: Vec<String>,
    },
}

/// A single witness signature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WitnessSignature {
    /// Witness identifier.
    pub witness_id: String,
    /// Signature bytes.
    pub signature: Vec<u8>,
}

/// External signed certification binding a hash to a timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimestampAttestation {
    /// The attested 32-byte hash.
    pub hashed: [u8; 32],
    /// Attested time, seconds since epoch.
    pub timestamp_secs: u64,
    /// Attestation network identifier.
    pub network: String,
    /// Sequence number within the network.
    pub sequence: u64,
    /// Witness or aggregate signatures.
    pub signatures: AttestationSignatures,
}

/// Aggregate counters for a pool's submissions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    /// Total stored preferences, decoys included.
    pub total_submissions: u64,
    /// Preferences with revealed=true.
    pub revealed_count: u64,
    /// Matched token count (0 until detection).
    pub matched_count: u64,
    /// Distinct nullifiers.
    pub unique_nullifiers: u64,
}

/// User-visible state of match computation during the privacy delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Pool not yet closed.
    Pending,
    /// Pool closed; detection is waiting out the privacy delay.
    Computing,
    /// A result exists.
    Complete,
}

/// Outcome of recounting a stored result against the preference table.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// True when every check passed.
    pub ok: bool,
    /// Human-readable description of each violation found.
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// A passing report.
    pub fn passing() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
        }
    }

    /// Record a violation, flipping `ok`.
    pub fn push_error(&mut self, error: impl Into<String>) {
        self.ok = false;
        self.errors.push(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_report_flips_on_error() {
        let mut report = IntegrityReport::passing();
        assert!(report.ok);
        report.push_error("count mismatch");
        assert!(!report.ok);
        assert_eq!(report.errors.len(), 1);
    }
}
