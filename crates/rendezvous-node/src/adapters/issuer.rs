//! Token-authority adapter.
//!
//! The real unlinkable-token issuer/verifier is an external service with
//! its own wire protocol; this crate ships an in-process implementation
//! for single-instance deployments, development, and tests. The issued
//! proofs are random single-use bodies remembered until expiry, which
//! preserves the verify/request contract without the external
//! dependency.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::RngCore;
use rdv_types::{AdapterError, TimeSource, Timestamp, TokenAuthority, TokenProof};
use std::collections::HashMap;
use std::sync::Arc;

/// Token lifetime issued by the in-process authority.
const TOKEN_TTL_MS: u64 = 10 * 60 * 1_000;

/// In-process token authority.
///
/// Verification consumes the token: a proof verifies at most once, which
/// mirrors the single-use semantics of the external issuer.
pub struct StaticTokenAuthority {
    issuer: String,
    time: Arc<dyn TimeSource>,
    outstanding: Mutex<HashMap<Vec<u8>, Timestamp>>,
}

impl StaticTokenAuthority {
    /// Create an authority under an issuer name.
    pub fn new(issuer: impl Into<String>, time: Arc<dyn TimeSource>) -> Self {
        Self {
            issuer: issuer.into(),
            time,
            outstanding: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TokenAuthority for StaticTokenAuthority {
    async fn verify(&self, proof: &TokenProof) -> Result<bool, AdapterError> {
        if proof.issuer != self.issuer {
            return Ok(false);
        }
        let mut outstanding = self.outstanding.lock();
        match outstanding.remove(&proof.body) {
            Some(expires_at) => Ok(self.time.now() <= expires_at.plus_millis(0)),
            None => Ok(false),
        }
    }

    async fn request_token(&self, _scope: &str) -> Result<TokenProof, AdapterError> {
        let mut body = vec![0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut body);
        let expires_at = self.time.now().plus_millis(TOKEN_TTL_MS);
        self.outstanding.lock().insert(body.clone(), expires_at);
        Ok(TokenProof {
            issuer: self.issuer.clone(),
            expires_at,
            body,
        })
    }
}
