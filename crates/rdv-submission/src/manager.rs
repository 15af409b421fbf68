//! Submission and reveal handling.

use crate::decoy::{decoy_count, random_token};
use rdv_crypto::{commit, verify_commitment};
use rdv_pools::effective_status;
use rdv_store::PoolStore;
use rdv_types::{
    CommitHash, MatchToken, Nullifier, Pool, PoolId, PoolStatus, Preference, PreferenceId,
    RendezvousError, TimeSource,
};
use std::sync::Arc;
use tracing::{debug, info};

/// One reveal-on-match payload, addressed by its token.
#[derive(Clone, Debug)]
pub struct RevealEntry {
    /// The real token this payload belongs to.
    pub match_token: MatchToken,
    /// AES-256-GCM envelope keyed by the token.
    pub encrypted_reveal: Vec<u8>,
}

/// A validated submission request.
#[derive(Clone, Debug)]
pub struct SubmitRequest {
    /// Target pool.
    pub pool_id: PoolId,
    /// Real match tokens (during the commit phase, blinded or real values
    /// the commits cover).
    pub tokens: Vec<MatchToken>,
    /// Client-supplied commitments, parallel to `tokens`. When absent in
    /// the commit phase the server recomputes them (see crate docs for
    /// the threat-model caveat).
    pub commits: Option<Vec<CommitHash>>,
    /// The submitter's nullifier for this pool.
    pub nullifier: Nullifier,
    /// Optional reveal-on-match payloads.
    pub reveal_data: Vec<RevealEntry>,
    /// Optional eligibility-proof reference stored with the preferences.
    pub issuance_proof: Option<Vec<u8>>,
}

/// What the caller learns about an accepted submission.
///
/// Deliberately excludes anything about decoys.
#[derive(Clone, Copy, Debug)]
pub struct SubmissionOutcome {
    /// The pool submitted to.
    pub pool_id: PoolId,
    /// Number of real tokens stored.
    pub accepted_tokens: u32,
    /// The phase the submission landed in.
    pub phase: PoolStatus,
}

/// What the caller learns about a reveal.
#[derive(Clone, Copy, Debug)]
pub struct RevealOutcome {
    /// The pool revealed in.
    pub pool_id: PoolId,
    /// Total preferences flipped to revealed, decoys included, so the
    /// number does not leak the real selection count.
    pub revealed: u32,
}

/// Validates and stores submissions and reveals.
pub struct SubmissionManager {
    store: Arc<PoolStore>,
    time: Arc<dyn TimeSource>,
}

impl SubmissionManager {
    /// Create a manager over a store and a clock.
    pub fn new(store: Arc<PoolStore>, time: Arc<dyn TimeSource>) -> Self {
        Self { store, time }
    }

    /// Submit a preference set.
    ///
    /// # Errors
    ///
    /// `POOL_NOT_FOUND`, `POOL_CLOSED`, `DUPLICATE_NULLIFIER`,
    /// `PREFERENCE_LIMIT_EXCEEDED`, or `INVALID_INPUT` per the protocol
    /// rules.
    pub fn submit(&self, request: SubmitRequest) -> Result<SubmissionOutcome, RendezvousError> {
        let pool = self.load_pool(&request.pool_id)?;
        let now = self.time.now();
        let phase = effective_status(&pool, now);
        if phase == PoolStatus::Closed {
            return Err(RendezvousError::PoolClosed(pool.id));
        }

        if request.tokens.is_empty() {
            return Err(RendezvousError::InvalidInput(
                "submission carries no tokens".to_string(),
            ));
        }
        if let Some(commits) = &request.commits {
            if commits.len() != request.tokens.len() {
                return Err(RendezvousError::InvalidInput(
                    "commit list length does not match token list".to_string(),
                ));
            }
        }
        if let Some(limit) = pool.max_preferences {
            let submitted = request.tokens.len() as u32;
            if submitted > limit {
                return Err(RendezvousError::PreferenceLimitExceeded { limit, submitted });
            }
        }

        let committing = phase == PoolStatus::Commit;
        let mut preferences =
            self.build_real_preferences(&pool, &request, committing, now)?;

        // Decoy padding: same nullifier, same phase shape, random tokens.
        let mut rng = rand::thread_rng();
        let decoys = decoy_count(&mut rng);
        for _ in 0..decoys {
            let token = random_token(&mut rng);
            preferences.push(Preference {
                id: PreferenceId::generate(),
                pool_id: pool.id,
                nullifier: request.nullifier,
                token,
                commit_hash: committing.then(|| commit(&token)),
                revealed: !committing,
                submitted_at: now,
                issuance_proof: None,
                encrypted_reveal: None,
            });
        }

        let inserted = self
            .store
            .insert_preferences_if_absent(&pool.id, &request.nullifier, &preferences)?;
        if !inserted {
            return Err(RendezvousError::DuplicateNullifier);
        }

        info!(
            pool_id = %pool.id,
            phase = phase.as_str(),
            accepted = request.tokens.len(),
            "submission accepted"
        );
        Ok(SubmissionOutcome {
            pool_id: pool.id,
            accepted_tokens: request.tokens.len() as u32,
            phase,
        })
    }

    /// Reveal previously committed tokens.
    ///
    /// Each supplied token is consumed by exactly one commitment. Decoys
    /// auto-reveal by self-verification. The call pre-validates: if any
    /// supplied token matches no outstanding commitment, nothing is
    /// mutated and the call fails with `COMMITMENT_MISMATCH`.
    pub fn reveal(
        &self,
        pool_id: &PoolId,
        tokens: &[MatchToken],
        nullifier: &Nullifier,
    ) -> Result<RevealOutcome, RendezvousError> {
        let pool = self.load_pool(pool_id)?;
        let now = self.time.now();
        match effective_status(&pool, now) {
            PoolStatus::Reveal => {}
            PoolStatus::Closed => return Err(RendezvousError::PoolClosed(pool.id)),
            _ => return Err(RendezvousError::NotInRevealPhase(pool.id)),
        }

        let preferences = self.store.preference_set(pool_id, nullifier)?;
        let pending: Vec<&Preference> =
            preferences.iter().filter(|p| p.awaiting_reveal()).collect();
        if pending.is_empty() {
            return Err(RendezvousError::CommitmentNotFound);
        }

        // Pass 1: bind each supplied token to one commitment, or fail
        // before any mutation.
        let mut unbound: Vec<MatchToken> = tokens.to_vec();
        let mut bindings: Vec<(PreferenceId, MatchToken)> = Vec::new();
        let mut auto_reveals: Vec<PreferenceId> = Vec::new();
        for pref in &pending {
            let Some(commitment) = pref.commit_hash.as_ref() else {
                continue;
            };
            if let Some(pos) = unbound.iter().position(|t| verify_commitment(t, commitment)) {
                bindings.push((pref.id, unbound.remove(pos)));
            } else if verify_commitment(&pref.token, commitment) {
                // Stored token self-verifies: a decoy (or a direct-path
                // recomputed commit). Reveal with the stored value.
                auto_reveals.push(pref.id);
            }
        }
        if !unbound.is_empty() {
            return Err(RendezvousError::CommitmentMismatch);
        }

        // Pass 2: apply.
        let mut revealed = 0u32;
        for mut pref in preferences {
            if let Some((_, token)) = bindings.iter().find(|(id, _)| *id == pref.id) {
                pref.token = *token;
                pref.revealed = true;
                self.store.update_preference(&pref)?;
                revealed += 1;
            } else if auto_reveals.contains(&pref.id) {
                pref.revealed = true;
                self.store.update_preference(&pref)?;
                revealed += 1;
            }
        }

        debug!(pool_id = %pool.id, revealed, "reveal applied");
        Ok(RevealOutcome {
            pool_id: pool.id,
            revealed,
        })
    }

    fn load_pool(&self, id: &PoolId) -> Result<Pool, RendezvousError> {
        self.store.pool(id)?.ok_or(RendezvousError::PoolNotFound(*id))
    }

    fn build_real_preferences(
        &self,
        pool: &Pool,
        request: &SubmitRequest,
        committing: bool,
        now: rdv_types::Timestamp,
    ) -> Result<Vec<Preference>, RendezvousError> {
        // Reveal payloads must address a submitted token.
        for entry in &request.reveal_data {
            if !request.tokens.contains(&entry.match_token) {
                return Err(RendezvousError::InvalidInput(
                    "reveal payload addresses a token not in this submission".to_string(),
                ));
            }
        }

        let mut preferences = Vec::with_capacity(request.tokens.len());
        for (i, token) in request.tokens.iter().enumerate() {
            let commit_hash = if committing {
                Some(match &request.commits {
                    Some(commits) => commits[i],
                    // Server-side recomputation; see crate docs.
                    None => commit(token),
                })
            } else {
                None
            };
            let encrypted_reveal = request
                .reveal_data
                .iter()
                .find(|e| e.match_token == *token)
                .map(|e| e.encrypted_reveal.clone());
            preferences.push(Preference {
                id: PreferenceId::generate(),
                pool_id: pool.id,
                nullifier: request.nullifier,
                token: *token,
                commit_hash,
                revealed: !committing,
                submitted_at: now,
                issuance_proof: request.issuance_proof.clone(),
                encrypted_reveal,
            });
        }
        Ok(preferences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdv_store::MemoryKv;
    use rdv_types::{
        AgreementPublicKey, ErrorCode, Gate, SigningPublicKey, Timestamp,
    };
    use std::sync::atomic::{AtomicU64, Ordering};

    struct ControllableTimeSource {
        millis: AtomicU64,
    }

    impl ControllableTimeSource {
        fn new(initial: u64) -> Arc<Self> {
            Arc::new(Self {
                millis: AtomicU64::new(initial),
            })
        }

        fn advance(&self, ms: u64) {
            self.millis.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl TimeSource for ControllableTimeSource {
        fn now(&self) -> Timestamp {
            Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
        }
    }

    struct Fixture {
        store: Arc<PoolStore>,
        manager: SubmissionManager,
        time: Arc<ControllableTimeSource>,
    }

    fn fixture() -> Fixture {
        let time = ControllableTimeSource::new(1_000);
        let store = Arc::new(PoolStore::new(Arc::new(MemoryKv::new())));
        let manager = SubmissionManager::new(store.clone(), time.clone());
        Fixture {
            store,
            manager,
            time,
        }
    }

    fn insert_pool(
        store: &PoolStore,
        commit_deadline: Option<u64>,
        max_preferences: Option<u32>,
    ) -> Pool {
        let pool = Pool {
            id: PoolId::generate(),
            name: "pool".to_string(),
            description: None,
            creator_key: AgreementPublicKey::from_bytes([1; 32]),
            creator_signing_key: SigningPublicKey::from_bytes([2; 32]),
            commit_deadline: commit_deadline.map(Timestamp::from_millis),
            reveal_deadline: Timestamp::from_millis(100_000),
            gate: Gate::Open,
            max_preferences,
            ephemeral: false,
            requires_invite: false,
            status: if commit_deadline.is_some() {
                PoolStatus::Commit
            } else {
                PoolStatus::Open
            },
            created_at: Timestamp::from_millis(1_000),
            updated_at: Timestamp::from_millis(1_000),
            psi_setup_id: None,
        };
        store.insert_pool(&pool).unwrap();
        pool
    }

    fn token(byte: u8) -> MatchToken {
        MatchToken::from_bytes([byte; 32])
    }

    fn nullifier(byte: u8) -> Nullifier {
        Nullifier::from_bytes([byte; 32])
    }

    fn submit_req(pool: &Pool, tokens: Vec<MatchToken>, n: u8) -> SubmitRequest {
        SubmitRequest {
            pool_id: pool.id,
            tokens,
            commits: None,
            nullifier: nullifier(n),
            reveal_data: vec![],
            issuance_proof: None,
        }
    }

    #[test]
    fn test_direct_submission_stores_revealed_tokens_plus_decoys() {
        let f = fixture();
        let pool = insert_pool(&f.store, None, None);

        f.manager
            .submit(submit_req(&pool, vec![token(0xAA), token(0xBB)], 1))
            .unwrap();

        let stored = f.store.preference_set(&pool.id, &nullifier(1)).unwrap();
        let extra = stored.len() - 2;
        assert!((3..=8).contains(&extra), "decoy count {extra} out of range");
        assert!(stored.iter().all(|p| p.revealed));
        assert!(stored.iter().all(|p| p.commit_hash.is_none()));
    }

    #[test]
    fn test_duplicate_nullifier_second_submission_fails() {
        let f = fixture();
        let pool = insert_pool(&f.store, None, None);

        f.manager
            .submit(submit_req(&pool, vec![token(0xAA)], 1))
            .unwrap();
        let err = f
            .manager
            .submit(submit_req(&pool, vec![token(0xCC)], 1))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateNullifier);

        // First submission persists unchanged.
        let stored = f.store.preference_set(&pool.id, &nullifier(1)).unwrap();
        assert!(stored.iter().any(|p| p.token == token(0xAA)));
        assert!(!stored.iter().any(|p| p.token == token(0xCC)));
    }

    #[test]
    fn test_preference_limit_excludes_decoys() {
        let f = fixture();
        let pool = insert_pool(&f.store, None, Some(2));

        let err = f
            .manager
            .submit(submit_req(&pool, vec![token(1), token(2), token(3)], 1))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PreferenceLimitExceeded);

        // At the limit: accepted, and decoys still land on top.
        f.manager
            .submit(submit_req(&pool, vec![token(1), token(2)], 2))
            .unwrap();
        let stored = f.store.preference_set(&pool.id, &nullifier(2)).unwrap();
        assert!(stored.len() > 2);
    }

    #[test]
    fn test_closed_pool_rejects_submissions() {
        let f = fixture();
        let pool = insert_pool(&f.store, None, None);
        f.time.advance(200_000);

        let err = f
            .manager
            .submit(submit_req(&pool, vec![token(1)], 1))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PoolClosed);
    }

    #[test]
    fn test_commit_phase_stores_commitments_for_decoys_too() {
        let f = fixture();
        let pool = insert_pool(&f.store, Some(50_000), None);

        f.manager
            .submit(submit_req(&pool, vec![token(0xAA)], 1))
            .unwrap();

        let stored = f.store.preference_set(&pool.id, &nullifier(1)).unwrap();
        assert!(stored.len() >= 4);
        for pref in &stored {
            assert!(!pref.revealed);
            let commitment = pref.commit_hash.expect("commit phase stores a commitment");
            // Self-consistent: the stored value verifies against its own
            // commitment (for real tokens with server-side recomputation
            // and for every decoy).
            assert!(verify_commitment(&pref.token, &commitment));
        }
    }

    #[test]
    fn test_reveal_consumes_each_token_once_and_auto_reveals_decoys() {
        let f = fixture();
        let pool = insert_pool(&f.store, Some(50_000), None);

        f.manager
            .submit(submit_req(&pool, vec![token(0xAA), token(0xBB)], 1))
            .unwrap();

        // Reveal only works inside the reveal window.
        let err = f
            .manager
            .reveal(&pool.id, &[token(0xAA)], &nullifier(1))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PoolNotInRevealPhase);

        f.time.advance(60_000); // into the reveal window
        let outcome = f
            .manager
            .reveal(&pool.id, &[token(0xAA), token(0xBB)], &nullifier(1))
            .unwrap();

        let stored = f.store.preference_set(&pool.id, &nullifier(1)).unwrap();
        // Everything revealed: two real tokens plus every decoy.
        assert_eq!(outcome.revealed as usize, stored.len());
        assert!(stored.iter().all(|p| p.revealed));
        assert!(stored.iter().any(|p| p.token == token(0xAA)));
        assert!(stored.iter().any(|p| p.token == token(0xBB)));
    }

    #[test]
    fn test_reveal_mismatch_mutates_nothing() {
        let f = fixture();
        let pool = insert_pool(&f.store, Some(50_000), None);

        f.manager
            .submit(submit_req(&pool, vec![token(0xAA)], 1))
            .unwrap();
        f.time.advance(60_000);

        let err = f
            .manager
            .reveal(&pool.id, &[token(0xEE)], &nullifier(1))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CommitmentMismatch);

        let stored = f.store.preference_set(&pool.id, &nullifier(1)).unwrap();
        assert!(stored.iter().all(|p| !p.revealed));
    }

    #[test]
    fn test_reveal_without_commitments_is_not_found() {
        let f = fixture();
        let pool = insert_pool(&f.store, Some(50_000), None);
        f.time.advance(60_000);

        let err = f
            .manager
            .reveal(&pool.id, &[token(0xAA)], &nullifier(9))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CommitmentNotFound);
    }

    #[test]
    fn test_reveal_payload_stored_against_matching_token() {
        let f = fixture();
        let pool = insert_pool(&f.store, None, None);

        let mut request = submit_req(&pool, vec![token(0xAA)], 1);
        request.reveal_data = vec![RevealEntry {
            match_token: token(0xAA),
            encrypted_reveal: vec![9, 9, 9],
        }];
        f.manager.submit(request).unwrap();

        let stored = f.store.preference_set(&pool.id, &nullifier(1)).unwrap();
        let real = stored.iter().find(|p| p.token == token(0xAA)).unwrap();
        assert_eq!(real.encrypted_reveal, Some(vec![9, 9, 9]));
        // Decoys never carry payloads.
        assert!(stored
            .iter()
            .filter(|p| p.token != token(0xAA))
            .all(|p| p.encrypted_reveal.is_none()));
    }

    #[test]
    fn test_reveal_payload_for_unknown_token_is_invalid() {
        let f = fixture();
        let pool = insert_pool(&f.store, None, None);

        let mut request = submit_req(&pool, vec![token(0xAA)], 1);
        request.reveal_data = vec![RevealEntry {
            match_token: token(0xDD),
            encrypted_reveal: vec![1],
        }];
        let err = f.manager.submit(request).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
    }
}
