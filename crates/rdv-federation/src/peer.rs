//! Per-peer connection state.

use rdv_types::{InstanceRecord, Timestamp};
use std::time::Duration;

/// Reconnect backoff floor.
const BACKOFF_BASE_MS: u64 = 1_000;
/// Reconnect backoff ceiling.
const BACKOFF_CAP_MS: u64 = 60_000;

/// What the manager tracks about one peer.
#[derive(Clone, Debug, Default)]
pub struct PeerState {
    /// The peer's record, known after its handshake.
    pub instance: Option<InstanceRecord>,
    /// Whether the stream is currently up.
    pub connected: bool,
    /// Last pong (or any frame) observed.
    pub last_ping: Option<Timestamp>,
    /// Consecutive failed connection attempts.
    pub retry_count: u32,
    /// Document version last synced to this peer.
    pub synced_version: u64,
}

/// Delay before the next reconnect attempt: doubles per retry, capped.
pub fn backoff_delay(retry_count: u32) -> Duration {
    let exp = retry_count.min(16);
    let ms = BACKOFF_BASE_MS.saturating_mul(1u64 << exp).min(BACKOFF_CAP_MS);
    Duration::from_millis(ms)
}
