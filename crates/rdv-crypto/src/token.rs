//! # Match Tokens, Nullifiers, Commitments
//!
//! All three derivations are SHA-256 over domain-separated input. The
//! separators are fixed ASCII, disjoint, and baked into the protocol
//! version; changing any of them requires a version bump.
//!
//! Token symmetry is the load-bearing property: `derive_match_token`
//! hashes the X25519 shared secret, which both sides of a mutual
//! selection compute identically.

use crate::keys::AgreementKeyPair;
use rdv_types::{AgreementPublicKey, CommitHash, MatchToken, Nullifier, PoolId};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Domain separator for match-token derivation.
pub const MATCH_DOMAIN: &[u8] = b"rendezvous-match-v1";
/// Domain separator for nullifier derivation.
pub const NULLIFIER_DOMAIN: &[u8] = b"rendezvous-nullifier-v1";

fn sha256_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Derive the match token for selecting `their_public` in `pool_id`.
///
/// `H(x25519(secret, their_public) ‖ pool_id ‖ "rendezvous-match-v1")`.
/// If A selects B and B selects A, both derive the same token.
pub fn derive_match_token(
    keypair: &AgreementKeyPair,
    their_public: &AgreementPublicKey,
    pool_id: &PoolId,
) -> MatchToken {
    let shared = keypair.diffie_hellman(their_public);
    MatchToken::from_bytes(sha256_parts(&[
        &shared,
        pool_id.as_uuid().as_bytes(),
        MATCH_DOMAIN,
    ]))
}

/// Derive the deterministic per-participant, per-pool nullifier.
///
/// `H(secret ‖ pool_id ‖ "rendezvous-nullifier-v1")`. Stable for a given
/// (participant, pool); unlinkable across pools.
pub fn derive_nullifier(keypair: &AgreementKeyPair, pool_id: &PoolId) -> Nullifier {
    Nullifier::from_bytes(sha256_parts(&[
        &keypair.to_bytes(),
        pool_id.as_uuid().as_bytes(),
        NULLIFIER_DOMAIN,
    ]))
}

/// Commit to a match token: `H(token)`.
pub fn commit(token: &MatchToken) -> CommitHash {
    CommitHash::from_bytes(sha256_parts(&[token.as_bytes()]))
}

/// Verify a token against a stored commitment, in constant time.
pub fn verify_commitment(token: &MatchToken, commitment: &CommitHash) -> bool {
    let recomputed = commit(token);
    recomputed
        .as_bytes()
        .ct_eq(commitment.as_bytes())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_token_symmetry() {
        let alice = AgreementKeyPair::generate();
        let bob = AgreementKeyPair::generate();
        let pool = PoolId::generate();

        let from_alice = derive_match_token(&alice, &bob.public_key(), &pool);
        let from_bob = derive_match_token(&bob, &alice.public_key(), &pool);

        assert_eq!(from_alice, from_bob);
    }

    #[test]
    fn test_match_token_pool_separation() {
        let alice = AgreementKeyPair::generate();
        let bob = AgreementKeyPair::generate();
        let pool_a = PoolId::generate();
        let pool_b = PoolId::generate();

        assert_ne!(
            derive_match_token(&alice, &bob.public_key(), &pool_a),
            derive_match_token(&alice, &bob.public_key(), &pool_b)
        );
    }

    #[test]
    fn test_match_token_peer_separation() {
        let alice = AgreementKeyPair::generate();
        let bob = AgreementKeyPair::generate();
        let charlie = AgreementKeyPair::generate();
        let pool = PoolId::generate();

        assert_ne!(
            derive_match_token(&alice, &bob.public_key(), &pool),
            derive_match_token(&alice, &charlie.public_key(), &pool)
        );
    }

    #[test]
    fn test_nullifier_deterministic_and_separated() {
        let alice = AgreementKeyPair::generate();
        let bob = AgreementKeyPair::generate();
        let pool_a = PoolId::generate();
        let pool_b = PoolId::generate();

        assert_eq!(
            derive_nullifier(&alice, &pool_a),
            derive_nullifier(&alice, &pool_a)
        );
        assert_ne!(
            derive_nullifier(&alice, &pool_a),
            derive_nullifier(&alice, &pool_b)
        );
        assert_ne!(
            derive_nullifier(&alice, &pool_a),
            derive_nullifier(&bob, &pool_a)
        );
    }

    #[test]
    fn test_nullifier_and_token_domains_disjoint() {
        // Same key, same pool: the two derivations must never coincide.
        let alice = AgreementKeyPair::generate();
        let pool = PoolId::generate();
        let token = derive_match_token(&alice, &alice.public_key(), &pool);
        let nullifier = derive_nullifier(&alice, &pool);
        assert_ne!(token.as_bytes(), nullifier.as_bytes());
    }

    #[test]
    fn test_commitment_roundtrip() {
        let token = MatchToken::from_bytes([0x42; 32]);
        let c = commit(&token);
        assert!(verify_commitment(&token, &c));

        let other = MatchToken::from_bytes([0x43; 32]);
        assert!(!verify_commitment(&other, &c));
    }

    #[test]
    fn test_commitment_is_sha256_of_token() {
        // Fixed vector: SHA-256 of 32 zero bytes.
        let token = MatchToken::from_bytes([0u8; 32]);
        let expected =
            hex::decode("66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925")
                .unwrap();
        assert_eq!(commit(&token).as_bytes().as_slice(), expected.as_slice());
    }
}
