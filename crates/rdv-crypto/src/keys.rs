//! # X25519 Key Agreement
//!
//! Montgomery-curve Diffie–Hellman for the matching math. A keypair is a
//! uniformly random 32-byte scalar and its derived public point; two
//! parties reach the same shared secret from either side.

use crate::CryptoError;
use rdv_types::AgreementPublicKey;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

/// X25519 agreement keypair.
pub struct AgreementKeyPair {
    secret: StaticSecret,
}

impl AgreementKeyPair {
    /// Generate a random keypair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        Self { secret }
    }

    /// Create from secret scalar bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            secret: StaticSecret::from(bytes),
        }
    }

    /// Parse from a slice; rejects anything that is not exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self::from_bytes(arr))
    }

    /// Get the public key.
    pub fn public_key(&self) -> AgreementPublicKey {
        AgreementPublicKey::from_bytes(PublicKey::from(&self.secret).to_bytes())
    }

    /// Compute the shared secret with another party's public key.
    pub fn diffie_hellman(&self, their_public: &AgreementPublicKey) -> [u8; 32] {
        let their = PublicKey::from(*their_public.as_bytes());
        self.secret.diffie_hellman(&their).to_bytes()
    }

    /// Secret scalar bytes (for serialization). Handle with care.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }
}

impl Drop for AgreementKeyPair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes = self.secret.to_bytes();
        bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_secret_symmetry() {
        let a = AgreementKeyPair::generate();
        let b = AgreementKeyPair::generate();

        let ab = a.diffie_hellman(&b.public_key());
        let ba = b.diffie_hellman(&a.public_key());

        assert_eq!(ab, ba);
    }

    #[test]
    fn test_different_peers_different_secrets() {
        let a = AgreementKeyPair::generate();
        let b = AgreementKeyPair::generate();
        let c = AgreementKeyPair::generate();

        assert_ne!(
            a.diffie_hellman(&b.public_key()),
            a.diffie_hellman(&c.public_key())
        );
    }

    #[test]
    fn test_roundtrip_bytes() {
        let original = AgreementKeyPair::generate();
        let restored = AgreementKeyPair::from_bytes(original.to_bytes());
        assert_eq!(original.public_key(), restored.public_key());
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(AgreementKeyPair::from_slice(&[0u8; 31]).is_err());
        assert!(AgreementKeyPair::from_slice(&[0u8; 32]).is_ok());
    }
}
