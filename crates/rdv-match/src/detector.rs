//! Match detection over a closed pool.

use rdv_pools::effective_status;
use rdv_store::PoolStore;
use rdv_types::{
    AttestationProvider, MatchResult, MatchStats, MatchStatus, MatchToken, PoolId, PoolStatus,
    RendezvousError, TimeSource, PROTOCOL_VERSION,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};

/// Canonical content-hash input. Field order is the canonical order.
#[derive(Serialize)]
struct ContentHashInput<'a> {
    pool_id: String,
    matched_tokens: Vec<String>,
    participant_count: u64,
    version: &'a str,
}

/// Deterministic hash binding a result to its pool and token set.
pub fn content_hash(pool_id: &PoolId, matched: &[MatchToken], participant_count: u64) -> [u8; 32] {
    let mut tokens: Vec<String> = matched.iter().map(|t| t.to_hex()).collect();
    tokens.sort();
    let input = ContentHashInput {
        pool_id: pool_id.to_string(),
        matched_tokens: tokens,
        participant_count,
        version: PROTOCOL_VERSION,
    };
    let json = serde_json::to_vec(&input).expect("canonical input serializes");
    let mut hasher = Sha256::new();
    hasher.update(&json);
    hasher.finalize().into()
}

/// Detects and records mutual matches.
pub struct MatchDetector {
    store: Arc<PoolStore>,
    time: Arc<dyn TimeSource>,
    attestor: Option<Arc<dyn AttestationProvider>>,
}

impl MatchDetector {
    /// Create a detector. Without an attestation provider, results carry
    /// no attestation.
    pub fn new(
        store: Arc<PoolStore>,
        time: Arc<dyn TimeSource>,
        attestor: Option<Arc<dyn AttestationProvider>>,
    ) -> Self {
        Self {
            store,
            time,
            attestor,
        }
    }

    /// Run detection for a closed pool.
    ///
    /// Idempotent: when a result already exists it is returned as-is, with
    /// no recount and no second attestation. For an ephemeral pool the
    /// participant profiles are dropped once the result is recorded.
    pub async fn detect(&self, pool_id: &PoolId) -> Result<MatchResult, RendezvousError> {
        let pool = self
            .store
            .pool(pool_id)?
            .ok_or(RendezvousError::PoolNotFound(*pool_id))?;
        let now = self.time.now();
        if effective_status(&pool, now) != PoolStatus::Closed {
            return Err(RendezvousError::InvalidInput(
                "match detection requires a closed pool".to_string(),
            ));
        }

        if let Some(existing) = self.store.match_result(pool_id)? {
            return Ok(existing);
        }

        let counts = self.store.count_token_occurrences(pool_id)?;
        let mut matched: Vec<MatchToken> = counts
            .iter()
            .filter(|(_, count)| **count == 2)
            .map(|(token, _)| *token)
            .collect();
        matched.sort();

        let preferences = self.store.preferences(pool_id)?;
        let total_submissions = preferences.len() as u64;
        let revealed_count = preferences.iter().filter(|p| p.revealed).count() as u64;
        let unique_nullifiers = self.store.count_unique_nullifiers(pool_id)?;
        let participant_count = self.store.participant_count(pool_id)?;

        let hash = content_hash(pool_id, &matched, participant_count);
        let attestation = match &self.attestor {
            Some(attestor) => match attestor.attest(&hash, None).await {
                Ok(attestation) => Some(attestation),
                Err(err) => {
                    // The result is still recorded; the attestation is an
                    // enhancement, not a gate.
                    warn!(pool_id = %pool_id, error = %err, "attestation failed");
                    None
                }
            },
            None => None,
        };

        let result = MatchResult {
            pool_id: *pool_id,
            matched_tokens: matched,
            total_submissions,
            revealed_count,
            unique_nullifiers,
            participant_count,
            detected_at: now,
            content_hash: hash,
            attestation,
        };
        self.store.upsert_match_result(&result)?;
        info!(
            pool_id = %pool_id,
            matched = result.matched_tokens.len(),
            submissions = total_submissions,
            "match detection complete"
        );

        if pool.ephemeral {
            let dropped = self.store.delete_participants(pool_id)?;
            info!(pool_id = %pool_id, dropped, "ephemeral pool profiles deleted");
        }

        Ok(result)
    }

    /// The stored result, if detection has run.
    pub fn result(&self, pool_id: &PoolId) -> Result<Option<MatchResult>, RendezvousError> {
        Ok(self.store.match_result(pool_id)?)
    }

    /// User-visible computation state for the privacy-delay window.
    pub fn status(&self, pool_id: &PoolId) -> Result<MatchStatus, RendezvousError> {
        if self.store.match_result(pool_id)?.is_some() {
            return Ok(MatchStatus::Complete);
        }
        let pool = self
            .store
            .pool(pool_id)?
            .ok_or(RendezvousError::PoolNotFound(*pool_id))?;
        if effective_status(&pool, self.time.now()) == PoolStatus::Closed {
            Ok(MatchStatus::Computing)
        } else {
            Ok(MatchStatus::Pending)
        }
    }

    /// Aggregate counters, valid at any phase.
    pub fn stats(&self, pool_id: &PoolId) -> Result<MatchStats, RendezvousError> {
        let preferences = self.store.preferences(pool_id)?;
        let matched_count = self
            .store
            .match_result(pool_id)?
            .map(|r| r.matched_tokens.len() as u64)
            .unwrap_or(0);
        Ok(MatchStats {
            total_submissions: preferences.len() as u64,
            revealed_count: preferences.iter().filter(|p| p.revealed).count() as u64,
            matched_count,
            unique_nullifiers: self.store.count_unique_nullifiers(pool_id)?,
        })
    }
}
