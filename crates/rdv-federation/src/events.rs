//! Typed event channels.
//!
//! One tokio broadcast channel per event kind; subscribers receive
//! immutable snapshots. Lagging subscribers lose the oldest events, they
//! never block the federation tasks.

use crate::document::FederationDocument;
use crate::messages::JoinPayload;
use rdv_types::{AgreementPublicKey, FederatedPoolMetadata, InstanceRecord, Nullifier, PoolId};
use tokio::sync::broadcast;

/// Buffered events per subscriber before the oldest are dropped.
const CHANNEL_CAPACITY: usize = 256;

/// A verified anonymous join request, post-decryption.
#[derive(Clone, Debug)]
pub struct JoinRequestEvent {
    /// Target pool.
    pub pool_id: PoolId,
    /// The requester's agreement key.
    pub public_key: AgreementPublicKey,
    /// The decrypted payload.
    pub payload: JoinPayload,
    /// Whether registration succeeded locally.
    pub accepted: bool,
}

/// A verified anonymous token relay.
#[derive(Clone, Debug)]
pub struct TokensRelayedEvent {
    /// Target pool.
    pub pool_id: PoolId,
    /// How many tokens the relay carried.
    pub token_count: usize,
    /// The nullifier it submitted under.
    pub nullifier: Nullifier,
}

/// A result notification from a peer.
#[derive(Clone, Debug)]
pub struct ResultNotifyEvent {
    /// The pool whose matches were computed.
    pub pool_id: PoolId,
    /// Number of mutual matches.
    pub matched_count: u64,
}

/// All federation event channels.
pub struct FederationEvents {
    peer_connected: broadcast::Sender<InstanceRecord>,
    pool_announced: broadcast::Sender<FederatedPoolMetadata>,
    join_request_received: broadcast::Sender<JoinRequestEvent>,
    tokens_relayed: broadcast::Sender<TokensRelayedEvent>,
    results_received: broadcast::Sender<ResultNotifyEvent>,
    state_changed: broadcast::Sender<FederationDocument>,
}

impl Default for FederationEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl FederationEvents {
    /// Create the channel set.
    pub fn new() -> Self {
        Self {
            peer_connected: broadcast::channel(CHANNEL_CAPACITY).0,
            pool_announced: broadcast::channel(CHANNEL_CAPACITY).0,
            join_request_received: broadcast::channel(CHANNEL_CAPACITY).0,
            tokens_relayed: broadcast::channel(CHANNEL_CAPACITY).0,
            results_received: broadcast::channel(CHANNEL_CAPACITY).0,
            state_changed: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Subscribe to peer handshakes.
    pub fn subscribe_peer_connected(&self) -> broadcast::Receiver<InstanceRecord> {
        self.peer_connected.subscribe()
    }

    /// Subscribe to pool announcements (local and remote).
    pub fn subscribe_pool_announced(&self) -> broadcast::Receiver<FederatedPoolMetadata> {
        self.pool_announced.subscribe()
    }

    /// Subscribe to verified join requests.
    pub fn subscribe_join_request_received(&self) -> broadcast::Receiver<JoinRequestEvent> {
        self.join_request_received.subscribe()
    }

    /// Subscribe to verified token relays.
    pub fn subscribe_tokens_relayed(&self) -> broadcast::Receiver<TokensRelayedEvent> {
        self.tokens_relayed.subscribe()
    }

    /// Subscribe to peer result notifications.
    pub fn subscribe_results_received(&self) -> broadcast::Receiver<ResultNotifyEvent> {
        self.results_received.subscribe()
    }

    /// Subscribe to replicated-document changes.
    pub fn subscribe_state_changed(&self) -> broadcast::Receiver<FederationDocument> {
        self.state_changed.subscribe()
    }

    pub(crate) fn emit_peer_connected(&self, record: InstanceRecord) {
        let _ = self.peer_connected.send(record);
    }

    pub(crate) fn emit_pool_announced(&self, meta: FederatedPoolMetadata) {
        let _ = self.pool_announced.send(meta);
    }

    pub(crate) fn emit_join_request_received(&self, event: JoinRequestEvent) {
        let _ = self.join_request_received.send(event);
    }

    pub(crate) fn emit_tokens_relayed(&self, event: TokensRelayedEvent) {
        let _ = self.tokens_relayed.send(event);
    }

    pub(crate) fn emit_results_received(&self, event: ResultNotifyEvent) {
        let _ = self.results_received.send(event);
    }

    pub(crate) fn emit_state_changed(&self, snapshot: FederationDocument) {
        let _ = self.state_changed.send(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_snapshots() {
        let events = FederationEvents::new();
        let mut rx = events.subscribe_results_received();
        events.emit_results_received(ResultNotifyEvent {
            pool_id: PoolId::generate(),
            matched_count: 3,
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.matched_count, 3);
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let events = FederationEvents::new();
        events.emit_tokens_relayed(TokensRelayedEvent {
            pool_id: PoolId::generate(),
            token_count: 2,
            nullifier: Nullifier::from_bytes([1; 32]),
        });
    }
}
