//! # Ed25519 Administrative Signatures
//!
//! Detached signatures with a domain-separated prehash: the signed bytes
//! are `SHA-256("rendezvous-sign-v1" ‖ message)`. Signed request
//! envelopes cover `"action:pool_id:timestamp"` and verify only within a
//! ±5-minute clock-skew window.

use crate::CryptoError;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rdv_types::{PoolId, SignedRequest, SigningPublicKey, Timestamp};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Domain separator mixed into every signed message.
pub const SIGN_DOMAIN: &[u8] = b"rendezvous-sign-v1";

/// Maximum tolerated |now − envelope timestamp|, in milliseconds.
pub const MAX_CLOCK_SKEW_MS: u64 = 5 * 60 * 1_000;

fn prehash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(SIGN_DOMAIN);
    hasher.update(message);
    hasher.finalize().into()
}

/// Ed25519 signing keypair.
pub struct SigningKeyPair {
    signing_key: SigningKey,
}

impl SigningKeyPair {
    /// Generate a random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        Self { signing_key }
    }

    /// Create from a secret seed (32 bytes).
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> SigningPublicKey {
        SigningPublicKey::from_bytes(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message (deterministic; prehashed with the domain separator).
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(&prehash(message)).to_bytes()
    }

    /// Secret seed bytes (for serialization).
    pub fn to_seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Drop for SigningKeyPair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}

/// Verify a detached signature against a public key.
///
/// # Errors
///
/// `InvalidPublicKey` for a malformed key, `InvalidSignatureFormat` for a
/// signature that is not 64 bytes, `SignatureVerificationFailed` otherwise.
pub fn verify_signature(
    public: &SigningPublicKey,
    message: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    let verifying_key =
        VerifyingKey::from_bytes(public.as_bytes()).map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig_bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| CryptoError::InvalidSignatureFormat)?;
    let sig = Signature::from_bytes(&sig_bytes);
    verifying_key
        .verify(&prehash(message), &sig)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}

/// Build a signed administrative request envelope.
pub fn sign_request(
    keypair: &SigningKeyPair,
    action: &str,
    pool_id: PoolId,
    timestamp: Timestamp,
) -> SignedRequest {
    let mut request = SignedRequest {
        action: action.to_string(),
        pool_id,
        timestamp,
        signer: keypair.public_key(),
        signature: Vec::new(),
    };
    request.signature = keypair.sign(request.signing_payload().as_bytes()).to_vec();
    request
}

/// Verify a signed request envelope: signature plus freshness.
///
/// # Errors
///
/// `StaleTimestamp` when the envelope clock differs from `now` by more
/// than [`MAX_CLOCK_SKEW_MS`]; signature errors per [`verify_signature`].
pub fn verify_request(request: &SignedRequest, now: Timestamp) -> Result<(), CryptoError> {
    let skew_ms = now.abs_diff(request.timestamp);
    if skew_ms > MAX_CLOCK_SKEW_MS {
        return Err(CryptoError::StaleTimestamp { skew_ms });
    }
    verify_signature(
        &request.signer,
        request.signing_payload().as_bytes(),
        &request.signature,
    )
}
