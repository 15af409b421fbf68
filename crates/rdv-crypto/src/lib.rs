//! # Rendezvous Crypto - Matching Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `keys` | X25519 | Key agreement for match-token derivation |
//! | `token` | SHA-256 | Match tokens, nullifiers, commitments |
//! | `sealed` | X25519 + HKDF-SHA-256 + ChaCha20-Poly1305 | Encrypt-to-public-key envelopes |
//! | `reveal` | AES-256-GCM | Reveal-on-match payloads keyed by match token |
//! | `signing` | Ed25519 | Administrative authentication |
//!
//! ## Security Properties
//!
//! - **Token symmetry**: if A selects B and B selects A, both derive the
//!   same 32-byte token from either side of the Diffie–Hellman exchange.
//! - **Domain separation**: every derivation mixes in a fixed, disjoint
//!   ASCII separator. Changing any separator is a protocol version bump.
//! - **Constant time**: commitments and tags compare in constant time.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod keys;
pub mod reveal;
pub mod sealed;
pub mod signing;
pub mod token;

// Re-exports
pub use errors::CryptoError;
pub use keys::AgreementKeyPair;
pub use reveal::{decrypt_reveal, encrypt_reveal};
pub use sealed::{open, seal};
pub use signing::{
    sign_request, verify_request, verify_signature, SigningKeyPair, MAX_CLOCK_SKEW_MS,
};
pub use token::{commit, derive_match_token, derive_nullifier, verify_commitment};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
