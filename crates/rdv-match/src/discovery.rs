//! Local, client-side match discovery.
//!
//! These functions run on the participant's device against the published
//! matched-token list. Candidate public keys never reach the server: the
//! participant recomputes each would-be token and intersects locally.

use rdv_crypto::{derive_match_token, AgreementKeyPair};
use rdv_types::{AgreementPublicKey, MatchToken, PoolId};

/// Of `candidates`, the keys whose derived token appears in `matched`.
pub fn discover_matches(
    my_keypair: &AgreementKeyPair,
    pool_id: &PoolId,
    candidates: &[AgreementPublicKey],
    matched: &[MatchToken],
) -> Vec<AgreementPublicKey> {
    candidates
        .iter()
        .filter(|candidate| check_match(my_keypair, pool_id, candidate, matched))
        .copied()
        .collect()
}

/// Whether one candidate is a mutual match.
pub fn check_match(
    my_keypair: &AgreementKeyPair,
    pool_id: &PoolId,
    candidate: &AgreementPublicKey,
    matched: &[MatchToken],
) -> bool {
    let token = derive_match_token(my_keypair, candidate, pool_id);
    matched.contains(&token)
}
