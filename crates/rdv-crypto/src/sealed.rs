//! # Sealed Envelopes
//!
//! Encrypt-to-public-key: ephemeral X25519 keypair, HKDF-SHA-256 key
//! derivation, ChaCha20-Poly1305 AEAD. Wire shape:
//!
//! ```text
//! ephemeral-pk (32) ‖ nonce (12) ‖ ciphertext+tag
//! ```
//!
//! Any bit flip anywhere in the envelope fails decryption. Used for the
//! PSI sealed server key and for federation join payloads.

use crate::keys::AgreementKeyPair;
use crate::CryptoError;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use rdv_types::AgreementPublicKey;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey};

/// Domain separator fed to HKDF as the `info` parameter.
pub const ENCRYPT_DOMAIN: &[u8] = b"rendezvous-encrypt-v1";

const EPHEMERAL_LEN: usize = 32;
const NONCE_LEN: usize = 12;

fn derive_key(shared: &[u8; 32], nonce: &[u8]) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(Some(nonce), shared);
    let mut okm = [0u8; 32];
    // 32-byte output from HKDF-SHA-256 cannot fail.
    hk.expand(ENCRYPT_DOMAIN, &mut okm)
        .expect("HKDF output length within bounds");
    okm
}

/// Seal a plaintext to a recipient's agreement public key.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if the AEAD rejects the input.
pub fn seal(recipient: &AgreementPublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = EphemeralSecret::random_from_rng(rand::rngs::OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral
        .diffie_hellman(&PublicKey::from(*recipient.as_bytes()))
        .to_bytes();

    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let key = derive_key(&shared, &nonce);
    let cipher = ChaCha20Poly1305::new(&key.into());
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut envelope = Vec::with_capacity(EPHEMERAL_LEN + NONCE_LEN + ciphertext.len());
    envelope.extend_from_slice(ephemeral_public.as_bytes());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Open a sealed envelope with the recipient's keypair.
///
/// # Errors
///
/// Returns `CryptoError::DecryptionFailed` on truncation, tampering, or a
/// wrong key.
pub fn open(recipient: &AgreementKeyPair, envelope: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if envelope.len() < EPHEMERAL_LEN + NONCE_LEN {
        return Err(CryptoError::DecryptionFailed(
            "envelope too short".to_string(),
        ));
    }
    let (ephemeral_bytes, rest) = envelope.split_at(EPHEMERAL_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let ephemeral_arr: [u8; 32] = ephemeral_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let shared = recipient.diffie_hellman(&AgreementPublicKey::from_bytes(ephemeral_arr));

    let key = derive_key(&shared, nonce);
    let cipher = ChaCha20Poly1305::new(&key.into());
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}
