//! Decoy padding.
//!
//! Every accepted submission gains a uniformly random number of random
//! tokens so an observer of the preference table cannot read off how many
//! selections a participant really made.

use rand::Rng;
use rdv_types::MatchToken;

/// Fewest decoys added to a submission.
pub const DECOY_MIN: usize = 3;
/// Most decoys added to a submission.
pub const DECOY_MAX: usize = 8;

/// Draw the decoy count, uniform over `[DECOY_MIN, DECOY_MAX]`.
pub fn decoy_count<R: Rng>(rng: &mut R) -> usize {
    rng.gen_range(DECOY_MIN..=DECOY_MAX)
}

/// A uniformly random token. Cannot collide with a real match except with
/// probability ~2⁻²⁵⁶ per pair, so decoys never create false positives.
pub fn random_token<R: Rng>(rng: &mut R) -> MatchToken {
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    MatchToken::from_bytes(bytes)
}
