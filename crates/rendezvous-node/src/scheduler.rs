//! The deadline-driven scheduler.
//!
//! Every scan interval, pools whose reveal deadline has passed (and
//! owner-closed pools without a result) are picked up, held for a
//! uniformly random privacy delay, then closed and detected. The delay
//! decorrelates submission timing from result publication.
//!
//! A per-process in-flight set guarantees at most one delayed-close job
//! per pool, even when a scan fires while an earlier job still sleeps.

use parking_lot::Mutex;
use rand::Rng;
use rdv_match::MatchDetector;
use rdv_pools::PoolManager;
use rdv_types::{PoolId, PoolStatus};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Scheduler timing parameters.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Scan cadence.
    pub scan_interval: Duration,
    /// Privacy-delay bounds in milliseconds (min, max).
    pub privacy_delay_ms: (u64, u64),
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(60),
            privacy_delay_ms: (30_000, 180_000),
        }
    }
}

impl SchedulerConfig {
    /// Immediate detection. Tests only.
    pub fn for_testing() -> Self {
        Self {
            scan_interval: Duration::from_millis(25),
            privacy_delay_ms: (0, 0),
        }
    }
}

fn privacy_delay(bounds: (u64, u64)) -> Duration {
    let (min, max) = bounds;
    if max == 0 || max < min {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}

/// Drives deadline closes and delayed match detection.
pub struct Scheduler {
    pools: Arc<PoolManager>,
    detector: Arc<MatchDetector>,
    config: SchedulerConfig,
    in_flight: Arc<Mutex<HashSet<PoolId>>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler. Idle until [`Scheduler::start`].
    pub fn new(
        pools: Arc<PoolManager>,
        detector: Arc<MatchDetector>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            pools,
            detector,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            ticker: Mutex::new(None),
        }
    }

    /// Start the periodic scan task.
    pub fn start(self: &Arc<Self>) {
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.config.scan_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                scheduler.scan();
            }
        });
        *self.ticker.lock() = Some(handle);
    }

    /// Stop the scan task. In-flight delayed jobs run to completion.
    pub fn stop(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
    }

    /// One scan pass: schedule every pool that is due.
    pub fn scan(self: &Arc<Self>) {
        let due = match self.pools.list_by_effective_status(PoolStatus::Closed) {
            Ok(pools) => pools,
            Err(err) => {
                error!(error = %err, "deadline scan failed");
                return;
            }
        };
        for pool in due {
            let needs_close = pool.status != PoolStatus::Closed;
            let needs_detect = match self.detector.result(&pool.id) {
                Ok(result) => result.is_none(),
                Err(err) => {
                    error!(pool_id = %pool.id, error = %err, "result lookup failed");
                    continue;
                }
            };
            if needs_close || needs_detect {
                self.schedule(pool.id);
            }
        }
    }

    /// Schedule one pool's delayed close-and-detect, unless a job for it
    /// is already in flight.
    pub fn schedule(self: &Arc<Self>, pool_id: PoolId) {
        if !self.in_flight.lock().insert(pool_id) {
            return;
        }
        debug!(pool_id = %pool_id, "privacy-delay job scheduled");
        let scheduler = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(privacy_delay(scheduler.config.privacy_delay_ms)).await;

            if let Err(err) = scheduler.pools.close(&pool_id) {
                error!(pool_id = %pool_id, error = %err, "auto-close failed");
            } else {
                match scheduler.detector.detect(&pool_id).await {
                    Ok(result) => info!(
                        pool_id = %pool_id,
                        matched = result.matched_tokens.len(),
                        "auto-close complete"
                    ),
                    Err(err) => error!(pool_id = %pool_id, error = %err, "detection failed"),
                }
            }
            scheduler.in_flight.lock().remove(&pool_id);
        });
    }
}
