//! Typed store over the key-value engine.
//!
//! `PoolStore` is the only mutable shared state in the system. Single-key
//! operations inherit linearizability from the engine; read-modify-write
//! sequences (the insert-if-absent family) additionally serialize under an
//! internal writer lock so that, per (pool, nullifier), the first accepted
//! submission wins and every retry observes the duplicate.

use crate::codec::{decode, encode};
use crate::keys;
use crate::kv::{BatchOperation, KeyValueStore};
use crate::StoreError;
use parking_lot::Mutex;
use rdv_types::{
    AgreementPublicKey, MatchResult, MatchToken, Nullifier, Participant, PendingPsiRequest, Pool,
    PoolId, PoolStatus, Preference, PsiRequestStatus, PsiResponseRecord, PsiSetup, RequestId,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const ALL_STATUSES: [PoolStatus; 4] = [
    PoolStatus::Open,
    PoolStatus::Commit,
    PoolStatus::Reveal,
    PoolStatus::Closed,
];

/// Typed, transactional store for every Rendezvous entity.
pub struct PoolStore {
    kv: Arc<dyn KeyValueStore>,
    // Serializes read-check-write sequences (insert-if-absent).
    writer: Mutex<()>,
}

impl PoolStore {
    /// Wrap a key-value engine.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            writer: Mutex::new(()),
        }
    }

    // =========================================================================
    // POOLS
    // =========================================================================

    /// Insert a freshly created pool with its index entries.
    pub fn insert_pool(&self, pool: &Pool) -> Result<(), StoreError> {
        let _guard = self.writer.lock();
        self.kv.atomic_batch_write(vec![
            BatchOperation::put(keys::pool(&pool.id), encode(pool)?),
            BatchOperation::put(keys::pool_status(pool.status, &pool.id), Vec::new()),
            BatchOperation::put(keys::pool_creator(&pool.creator_key, &pool.id), Vec::new()),
        ])
    }

    /// Rewrite a pool, moving its status index entry if needed.
    pub fn update_pool(&self, pool: &Pool) -> Result<(), StoreError> {
        let _guard = self.writer.lock();
        let mut ops: Vec<BatchOperation> = ALL_STATUSES
            .iter()
            .filter(|s| **s != pool.status)
            .map(|s| BatchOperation::delete(keys::pool_status(*s, &pool.id)))
            .collect();
        ops.push(BatchOperation::put(keys::pool(&pool.id), encode(pool)?));
        ops.push(BatchOperation::put(
            keys::pool_status(pool.status, &pool.id),
            Vec::new(),
        ));
        self.kv.atomic_batch_write(ops)
    }

    /// Look up a pool.
    pub fn pool(&self, id: &PoolId) -> Result<Option<Pool>, StoreError> {
        self.kv.get(&keys::pool(id))?.map(|b| decode(&b)).transpose()
    }

    /// All pools, in key order.
    pub fn list_pools(&self) -> Result<Vec<Pool>, StoreError> {
        self.kv
            .prefix_scan(&keys::pool_prefix())?
            .iter()
            .map(|(_, v)| decode(v))
            .collect()
    }

    /// Pools whose stored status matches.
    pub fn pools_by_status(&self, status: PoolStatus) -> Result<Vec<Pool>, StoreError> {
        let mut pools = Vec::new();
        for (key, _) in self.kv.prefix_scan(&keys::pool_status_prefix(status))? {
            // Index key tail is the pool UUID simple form.
            if let Some(id) = parse_trailing_uuid(&key) {
                if let Some(pool) = self.pool(&PoolId::from_uuid(id))? {
                    pools.push(pool);
                }
            }
        }
        Ok(pools)
    }

    /// Pools created by this agreement key.
    pub fn pools_by_creator(
        &self,
        creator: &AgreementPublicKey,
    ) -> Result<Vec<Pool>, StoreError> {
        let mut pools = Vec::new();
        for (key, _) in self.kv.prefix_scan(&keys::pool_creator_prefix(creator))? {
            if let Some(id) = parse_trailing_uuid(&key) {
                if let Some(pool) = self.pool(&PoolId::from_uuid(id))? {
                    pools.push(pool);
                }
            }
        }
        Ok(pools)
    }

    // =========================================================================
    // PARTICIPANTS
    // =========================================================================

    /// Register a participant unless the (pool, key) slot is taken.
    ///
    /// Returns false when a registration already exists.
    pub fn insert_participant_if_absent(
        &self,
        participant: &Participant,
    ) -> Result<bool, StoreError> {
        let _guard = self.writer.lock();
        let key = keys::participant(&participant.pool_id, &participant.public_key);
        if self.kv.exists(&key)? {
            return Ok(false);
        }
        self.kv.put(&key, &encode(participant)?)?;
        Ok(true)
    }

    /// Look up one registration.
    pub fn participant(
        &self,
        pool: &PoolId,
        key: &AgreementPublicKey,
    ) -> Result<Option<Participant>, StoreError> {
        self.kv
            .get(&keys::participant(pool, key))?
            .map(|b| decode(&b))
            .transpose()
    }

    /// All registrations in a pool.
    pub fn participants(&self, pool: &PoolId) -> Result<Vec<Participant>, StoreError> {
        self.kv
            .prefix_scan(&keys::participant_prefix(pool))?
            .iter()
            .map(|(_, v)| decode(v))
            .collect()
    }

    /// Number of registrations in a pool.
    pub fn participant_count(&self, pool: &PoolId) -> Result<u64, StoreError> {
        Ok(self.kv.prefix_scan(&keys::participant_prefix(pool))?.len() as u64)
    }

    /// Drop every participant profile in a pool (ephemeral cleanup).
    ///
    /// Preferences and the match result survive; only profiles go.
    pub fn delete_participants(&self, pool: &PoolId) -> Result<u64, StoreError> {
        let _guard = self.writer.lock();
        let hits = self.kv.prefix_scan(&keys::participant_prefix(pool))?;
        let count = hits.len() as u64;
        self.kv.atomic_batch_write(
            hits.into_iter()
                .map(|(k, _)| BatchOperation::delete(k))
                .collect(),
        )?;
        Ok(count)
    }

    // =========================================================================
    // PREFERENCES
    // =========================================================================

    /// Insert a full preference set unless (pool, nullifier) already has
    /// one. Serializable: concurrent submissions race here and exactly one
    /// wins.
    pub fn insert_preferences_if_absent(
        &self,
        pool: &PoolId,
        nullifier: &Nullifier,
        preferences: &[Preference],
    ) -> Result<bool, StoreError> {
        let _guard = self.writer.lock();
        let existing = self
            .kv
            .prefix_scan(&keys::preference_set_prefix(pool, nullifier))?;
        if !existing.is_empty() {
            return Ok(false);
        }
        let mut ops = Vec::with_capacity(preferences.len());
        for pref in preferences {
            ops.push(BatchOperation::put(
                keys::preference(pool, nullifier, &pref.id),
                encode(pref)?,
            ));
        }
        self.kv.atomic_batch_write(ops)?;
        Ok(true)
    }

    /// The preference set under one (pool, nullifier).
    pub fn preference_set(
        &self,
        pool: &PoolId,
        nullifier: &Nullifier,
    ) -> Result<Vec<Preference>, StoreError> {
        self.kv
            .prefix_scan(&keys::preference_set_prefix(pool, nullifier))?
            .iter()
            .map(|(_, v)| decode(v))
            .collect()
    }

    /// Every preference in a pool, decoys included.
    pub fn preferences(&self, pool: &PoolId) -> Result<Vec<Preference>, StoreError> {
        self.kv
            .prefix_scan(&keys::preference_prefix(pool))?
            .iter()
            .map(|(_, v)| decode(v))
            .collect()
    }

    /// Rewrite one preference record (reveal flips, commit-phase token
    /// replacement).
    pub fn update_preference(&self, preference: &Preference) -> Result<(), StoreError> {
        self.kv.put(
            &keys::preference(&preference.pool_id, &preference.nullifier, &preference.id),
            &encode(preference)?,
        )
    }

    /// Map token → number of revealed preferences carrying it.
    pub fn count_token_occurrences(
        &self,
        pool: &PoolId,
    ) -> Result<BTreeMap<MatchToken, u64>, StoreError> {
        let mut counts = BTreeMap::new();
        for pref in self.preferences(pool)? {
            if pref.revealed {
                *counts.entry(pref.token).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    /// Number of distinct nullifiers that submitted to a pool.
    pub fn count_unique_nullifiers(&self, pool: &PoolId) -> Result<u64, StoreError> {
        let mut nullifiers = BTreeSet::new();
        for pref in self.preferences(pool)? {
            nullifiers.insert(pref.nullifier);
        }
        Ok(nullifiers.len() as u64)
    }

    // =========================================================================
    // MATCH RESULTS
    // =========================================================================

    /// Upsert the pool's match result. Idempotent on pool id.
    pub fn upsert_match_result(&self, result: &MatchResult) -> Result<(), StoreError> {
        self.kv
            .put(&keys::match_result(&result.pool_id), &encode(result)?)
    }

    /// Look up the pool's match result.
    pub fn match_result(&self, pool: &PoolId) -> Result<Option<MatchResult>, StoreError> {
        self.kv
            .get(&keys::match_result(pool))?
            .map(|b| decode(&b))
            .transpose()
    }

    // =========================================================================
    // PSI
    // =========================================================================

    /// Store a PSI setup unless the pool already has one.
    pub fn insert_psi_setup_if_absent(&self, setup: &PsiSetup) -> Result<bool, StoreError> {
        let _guard = self.writer.lock();
        let key = keys::psi_setup(&setup.pool_id);
        if self.kv.exists(&key)? {
            return Ok(false);
        }
        self.kv.put(&key, &encode(setup)?)?;
        Ok(true)
    }

    /// Look up the pool's PSI setup.
    pub fn psi_setup(&self, pool: &PoolId) -> Result<Option<PsiSetup>, StoreError> {
        self.kv
            .get(&keys::psi_setup(pool))?
            .map(|b| decode(&b))
            .transpose()
    }

    /// Enqueue a pending PSI request.
    pub fn insert_psi_request(&self, request: &PendingPsiRequest) -> Result<(), StoreError> {
        let _guard = self.writer.lock();
        self.kv.atomic_batch_write(vec![
            BatchOperation::put(keys::psi_request(&request.id), encode(request)?),
            BatchOperation::put(
                keys::psi_request_idx(&request.pool_id, request.status, &request.id),
                Vec::new(),
            ),
        ])
    }

    /// Look up a queued request.
    pub fn psi_request(&self, id: &RequestId) -> Result<Option<PendingPsiRequest>, StoreError> {
        self.kv
            .get(&keys::psi_request(id))?
            .map(|b| decode(&b))
            .transpose()
    }

    /// Move a request to a new status bucket, returning the updated record.
    ///
    /// Returns Ok(None) when the request does not exist. Transition
    /// legality is the service's concern; the store is mechanical.
    pub fn set_psi_request_status(
        &self,
        id: &RequestId,
        status: PsiRequestStatus,
    ) -> Result<Option<PendingPsiRequest>, StoreError> {
        let _guard = self.writer.lock();
        let Some(mut request) = self
            .kv
            .get(&keys::psi_request(id))?
            .map(|b| decode::<PendingPsiRequest>(&b))
            .transpose()?
        else {
            return Ok(None);
        };
        let old_status = request.status;
        request.status = status;
        self.kv.atomic_batch_write(vec![
            BatchOperation::delete(keys::psi_request_idx(&request.pool_id, old_status, id)),
            BatchOperation::put(
                keys::psi_request_idx(&request.pool_id, status, id),
                Vec::new(),
            ),
            BatchOperation::put(keys::psi_request(id), encode(&request)?),
        ])?;
        Ok(Some(request))
    }

    /// The pool's queue bucket for one status.
    pub fn psi_requests_by_status(
        &self,
        pool: &PoolId,
        status: PsiRequestStatus,
    ) -> Result<Vec<PendingPsiRequest>, StoreError> {
        let mut requests = Vec::new();
        for (key, _) in self
            .kv
            .prefix_scan(&keys::psi_request_idx_prefix(pool, status))?
        {
            if let Some(id) = parse_trailing_uuid(&key) {
                if let Some(request) = self.psi_request(&RequestId::from_uuid(id))? {
                    requests.push(request);
                }
            }
        }
        Ok(requests)
    }

    /// Store a response unless one already exists for the request.
    pub fn insert_psi_response_if_absent(
        &self,
        record: &PsiResponseRecord,
    ) -> Result<bool, StoreError> {
        let _guard = self.writer.lock();
        let key = keys::psi_response(&record.request_id);
        if self.kv.exists(&key)? {
            return Ok(false);
        }
        self.kv.put(&key, &encode(record)?)?;
        Ok(true)
    }

    /// Look up the response for a request.
    pub fn psi_response(
        &self,
        request: &RequestId,
    ) -> Result<Option<PsiResponseRecord>, StoreError> {
        self.kv
            .get(&keys::psi_response(request))?
            .map(|b| decode(&b))
            .transpose()
    }
}

/// Pull the final slash-delimited segment of an index key as a UUID.
fn parse_trailing_uuid(key: &[u8]) -> Option<uuid::Uuid> {
    let text = std::str::from_utf8(key).ok()?;
    let tail = text.rsplit('/').next()?;
    uuid::Uuid::parse_str(tail).ok()
}
