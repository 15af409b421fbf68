//! Shared test fixtures.

use rdv_match::MatchDetector;
use rdv_pools::{CreatePoolRequest, PoolManager};
use rdv_store::{MemoryKv, PoolStore};
use rdv_submission::SubmissionManager;
use rdv_types::{TimeSource, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Thread-safe clock the tests can advance. Lets phase transitions happen
/// without sleeping.
pub struct ControllableTimeSource {
    millis: AtomicU64,
}

impl ControllableTimeSource {
    /// Start the clock at an absolute millisecond value.
    pub fn new(initial_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            millis: AtomicU64::new(initial_ms),
        })
    }

    /// Advance by a number of milliseconds.
    pub fn advance(&self, ms: u64) {
        self.millis.fetch_add(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ControllableTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

/// One in-memory service stack under a controllable clock.
pub struct Harness {
    /// The shared store.
    pub store: Arc<PoolStore>,
    /// The controllable clock.
    pub time: Arc<ControllableTimeSource>,
    /// Pool lifecycle manager.
    pub pools: PoolManager,
    /// Submission manager.
    pub submissions: SubmissionManager,
    /// Match detector (no attestation).
    pub detector: MatchDetector,
}

impl Harness {
    /// Build a harness with the clock at T = 1_000_000 ms.
    pub fn new() -> Self {
        let time = ControllableTimeSource::new(1_000_000);
        let store = Arc::new(PoolStore::new(Arc::new(MemoryKv::new())));
        Self {
            pools: PoolManager::new(store.clone(), time.clone()),
            submissions: SubmissionManager::new(store.clone(), time.clone()),
            detector: MatchDetector::new(store.clone(), time.clone(), None),
            store,
            time,
        }
    }

    /// A create request with deadlines relative to the current clock.
    pub fn pool_request(
        &self,
        creator_key: rdv_types::AgreementPublicKey,
        creator_signing_key: rdv_types::SigningPublicKey,
        commit_in_ms: Option<u64>,
        reveal_in_ms: u64,
    ) -> CreatePoolRequest {
        let now = self.time.now();
        CreatePoolRequest {
            name: "scenario pool".to_string(),
            description: None,
            creator_key,
            creator_signing_key,
            commit_deadline: commit_in_ms.map(|ms| now.plus_millis(ms)),
            reveal_deadline: now.plus_millis(reveal_in_ms),
            gate: Some(rdv_types::Gate::Open),
            max_preferences: None,
            ephemeral: false,
            requires_invite: false,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
