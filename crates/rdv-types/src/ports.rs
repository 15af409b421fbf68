//! Outbound ports for external services.
//!
//! These are the interfaces the core requires the host application to
//! implement: the unlinkable-token issuer/verifier and the
//! timestamp-attestation gateway. Both are replaceable and mockable.
//! Network deadlines (verifier 5 s, attestation 10 s) are the adapter's
//! responsibility; a deadline overrun surfaces as [`AdapterError::Timeout`].

use crate::ids::{PoolId, SigningPublicKey};
use crate::matching::TimestampAttestation;
use crate::time::Timestamp;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures raised by external-service adapters.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The service could not be reached.
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// The call exceeded its deadline.
    #[error("service call timed out")]
    Timeout,

    /// The service answered with something the adapter cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// A serialized unlinkable-token proof.
///
/// The envelope is deliberately small and tagged: issuer and expiry are
/// readable locally (expiry is always checked before the verifier is
/// called); the body is opaque to everyone but the verifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenProof {
    /// Issuer identifier the proof claims.
    pub issuer: String,
    /// Expiration, milliseconds since epoch.
    pub expires_at: Timestamp,
    /// Opaque proof body.
    pub body: Vec<u8>,
}

impl TokenProof {
    /// Local expiry check with the protocol's 5-minute clock-skew allowance.
    pub fn is_expired(&self, now: Timestamp, skew_ms: u64) -> bool {
        self.expires_at.plus_millis(skew_ms) < now
    }
}

/// Unlinkable-token issuer/verifier adapter.
#[async_trait]
pub trait TokenAuthority: Send + Sync {
    /// Verify a serialized token proof. Expiry has already been checked
    /// locally; this is the cryptographic verification round-trip.
    async fn verify(&self, proof: &TokenProof) -> Result<bool, AdapterError>;

    /// Request a fresh single-use token for a scope (federation side).
    async fn request_token(&self, scope: &str) -> Result<TokenProof, AdapterError>;
}

/// Timestamp-attestation gateway adapter.
#[async_trait]
pub trait AttestationProvider: Send + Sync {
    /// Attest a 32-byte hash, optionally authorized by an unlinkable proof.
    async fn attest(
        &self,
        hash: &[u8; 32],
        proof: Option<&TokenProof>,
    ) -> Result<TimestampAttestation, AdapterError>;

    /// Verify an attestation against the original hash.
    async fn verify(
        &self,
        attestation: &TimestampAttestation,
        hash: &[u8; 32],
    ) -> Result<bool, AdapterError>;
}

/// A signed administrative request envelope.
///
/// The signature covers the string `"action:pool_id:timestamp"` with a
/// millisecond clock; verification additionally requires
/// |now − timestamp| ≤ 5 minutes. Construction and verification live in
/// rdv-crypto.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedRequest {
    /// The administrative action name, e.g. `"close_pool"`.
    pub action: String,
    /// The pool the action targets.
    pub pool_id: PoolId,
    /// Caller clock at signing time, milliseconds.
    pub timestamp: Timestamp,
    /// Signer public key. Must match the pool's creator signing key for
    /// owner-only actions.
    pub signer: SigningPublicKey,
    /// Detached Ed25519 signature (64 bytes).
    pub signature: Vec<u8>,
}

impl SignedRequest {
    /// The exact byte string the signature covers.
    pub fn signing_payload(&self) -> String {
        format!(
            "{}:{}:{}",
            self.action,
            self.pool_id,
            self.timestamp.as_millis()
        )
    }
}
