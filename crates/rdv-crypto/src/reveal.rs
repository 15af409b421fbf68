//! # Reveal-on-Match Payloads
//!
//! AES-256-GCM envelopes keyed directly by the 32-byte match token.
//! Only a party able to derive the same token — i.e. the mutually
//! matched peer — can decrypt. Wire shape:
//!
//! ```text
//! nonce (12) ‖ ciphertext ‖ tag (16)
//! ```

use crate::CryptoError;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use rdv_types::MatchToken;

const NONCE_LEN: usize = 12;

/// Encrypt a reveal payload under a match token.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if the AEAD rejects the input.
pub fn encrypt_reveal(token: &MatchToken, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let key = Key::<Aes256Gcm>::from_slice(token.as_bytes());
    let cipher = Aes256Gcm::new(key);

    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Decrypt a reveal payload with a (matched) token.
///
/// # Errors
///
/// Returns `CryptoError::DecryptionFailed` on truncation, tampering, or a
/// token that is not the one the payload was sealed under.
pub fn decrypt_reveal(token: &MatchToken, envelope: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if envelope.len() < NONCE_LEN {
        return Err(CryptoError::DecryptionFailed(
            "envelope too short".to_string(),
        ));
    }
    let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);

    let key = Key::<Aes256Gcm>::from_slice(token.as_bytes());
    let cipher = Aes256Gcm::new(key);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reveal_roundtrip() {
        let token = MatchToken::from_bytes([0x11; 32]);
        let envelope = encrypt_reveal(&token, b"my signal handle").unwrap();
        assert_eq!(decrypt_reveal(&token, &envelope).unwrap(), b"my signal handle");
    }

    #[test]
    fn test_wrong_token_fails() {
        let token = MatchToken::from_bytes([0x11; 32]);
        let wrong = MatchToken::from_bytes([0x22; 32]);
        let envelope = encrypt_reveal(&token, b"payload").unwrap();
        assert!(decrypt_reveal(&wrong, &envelope).is_err());
    }

    #[test]
    fn test_tampered_envelope_fails() {
        let token = MatchToken::from_bytes([0x11; 32]);
        let mut envelope = encrypt_reveal(&token, b"payload").unwrap();
        let last = envelope.len() - 1;
        envelope[last] ^= 0xFF;
        assert!(decrypt_reveal(&token, &envelope).is_err());
    }

    #[test]
    fn test_tag_overhead_is_sixteen_bytes() {
        let token = MatchToken::from_bytes([0x11; 32]);
        let envelope = encrypt_reveal(&token, b"1234").unwrap();
        assert_eq!(envelope.len(), NONCE_LEN + 4 + 16);
    }
}
