//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed (wrong key, truncated envelope, or tampering)
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Invalid public key
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Invalid private key
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Invalid signature format
    #[error("Invalid signature format")]
    InvalidSignatureFormat,

    /// Signed envelope timestamp outside the allowed clock-skew window
    #[error("Stale request: timestamp differs from server clock by {skew_ms}ms")]
    StaleTimestamp {
        /// Observed absolute skew in milliseconds
        skew_ms: u64,
    },

    /// Invalid input for a cryptographic operation
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
