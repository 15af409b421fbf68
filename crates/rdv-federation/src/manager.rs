//! The federation manager: peer lifecycle, document replication, and the
//! anonymous relay flows.

use crate::document::FederationDocument;
use crate::events::{FederationEvents, JoinRequestEvent, ResultNotifyEvent, TokensRelayedEvent};
use crate::messages::{FederationMessage, Frame, JoinPayload};
use crate::peer::PeerState;
use crate::transport::PeerTransport;
use crate::FederationError;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use rdv_crypto::{open, seal, AgreementKeyPair};
use rdv_types::{
    AgreementPublicKey, FederatedPoolMetadata, InstanceId, InstanceRecord, MatchToken, MessageId,
    Nullifier, PoolId, RendezvousError, TimeSource, TokenAuthority, TokenProof,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Clock-skew allowance for auth-token expirations, in milliseconds.
const TOKEN_SKEW_MS: u64 = 5 * 60 * 1_000;

/// Timing and correlation parameters.
#[derive(Clone, Debug)]
pub struct FederationConfig {
    /// Periodic full-sync interval.
    pub sync_interval: Duration,
    /// How long a join request waits for its response.
    pub join_timeout: Duration,
    /// Base jitter added to every peer send, milliseconds (min, max).
    pub base_jitter_ms: (u64, u64),
    /// Extra jitter before a token relay, milliseconds (min, max).
    pub relay_jitter_ms: (u64, u64),
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(30),
            join_timeout: Duration::from_secs(30),
            base_jitter_ms: (100, 2_000),
            relay_jitter_ms: (5_000, 60_000),
        }
    }
}

impl FederationConfig {
    /// Zero jitter, short intervals. Tests only.
    pub fn for_testing() -> Self {
        Self {
            sync_interval: Duration::from_millis(50),
            join_timeout: Duration::from_secs(1),
            base_jitter_ms: (0, 0),
            relay_jitter_ms: (0, 0),
        }
    }
}

fn jitter(range: (u64, u64)) -> Duration {
    let (min, max) = range;
    if max == 0 || max < min {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}

/// What the host instance does with verified anonymous messages.
///
/// Implemented by the node facade: relays feed the local submission
/// manager, join requests go through the eligibility gate and register.
#[async_trait]
pub trait FederationHandler: Send + Sync {
    /// Submit relayed tokens locally.
    async fn handle_token_relay(
        &self,
        pool_id: PoolId,
        match_tokens: Vec<MatchToken>,
        nullifier: Nullifier,
    ) -> Result<(), RendezvousError>;

    /// Check eligibility and register a remote participant.
    async fn handle_join_request(
        &self,
        pool_id: PoolId,
        public_key: AgreementPublicKey,
        payload: JoinPayload,
    ) -> Result<(), RendezvousError>;
}

struct PeerLink {
    transport: Arc<dyn PeerTransport>,
    state: Mutex<PeerState>,
}

struct Inner {
    local: InstanceRecord,
    agreement: AgreementKeyPair,
    document: RwLock<FederationDocument>,
    peers: RwLock<HashMap<InstanceId, Arc<PeerLink>>>,
    events: FederationEvents,
    authority: Arc<dyn TokenAuthority>,
    handler: Arc<dyn FederationHandler>,
    time: Arc<dyn TimeSource>,
    config: FederationConfig,
    pending_joins: Mutex<HashMap<MessageId, oneshot::Sender<(bool, Option<String>)>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Replicates the federation document and relays anonymous messages.
pub struct FederationManager {
    inner: Arc<Inner>,
}

impl FederationManager {
    /// Create a manager for this instance.
    ///
    /// `agreement` is the instance's key; join payloads addressed to this
    /// instance are sealed to its public half, which must match
    /// `local.public_key`.
    pub fn new(
        local: InstanceRecord,
        agreement: AgreementKeyPair,
        authority: Arc<dyn TokenAuthority>,
        handler: Arc<dyn FederationHandler>,
        time: Arc<dyn TimeSource>,
        config: FederationConfig,
    ) -> Self {
        let mut document = FederationDocument::new();
        let now = time.now();
        document.upsert_instance(local.clone(), now, local.id);
        Self {
            inner: Arc::new(Inner {
                local,
                agreement,
                document: RwLock::new(document),
                peers: RwLock::new(HashMap::new()),
                events: FederationEvents::new(),
                authority,
                handler,
                time,
                config,
                pending_joins: Mutex::new(HashMap::new()),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// This instance's id.
    pub fn local_id(&self) -> InstanceId {
        self.inner.local.id
    }

    /// The event channels.
    pub fn events(&self) -> &FederationEvents {
        &self.inner.events
    }

    /// A snapshot of the replicated document.
    pub fn document(&self) -> FederationDocument {
        self.inner.document.read().clone()
    }

    /// Start the periodic sync ticker.
    pub fn start(&self) {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.sync_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                Inner::broadcast_sync(&inner);
            }
        });
        self.inner.tasks.lock().push(handle);
    }

    /// Stop every background task. Peer streams close when their
    /// transports drop.
    pub fn shutdown(&self) {
        for task in self.inner.tasks.lock().drain(..) {
            task.abort();
        }
    }

    /// Adopt an established peer stream: send our handshake and start the
    /// reader task. The peer becomes addressable after its handshake
    /// arrives.
    pub fn attach_peer(&self, transport: Arc<dyn PeerTransport>) {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            // Handshake goes out immediately, before any jitter discipline.
            let hello = Frame::new(FederationMessage::Handshake {
                instance: inner.local.clone(),
            });
            if let Err(err) = transport.send(hello).await {
                warn!(error = %err, "handshake send failed");
                return;
            }
            loop {
                match transport.recv().await {
                    Ok(Some(frame)) => Inner::handle_frame(&inner, &transport, frame).await,
                    Ok(None) => break,
                    Err(err) => {
                        warn!(error = %err, "peer stream error");
                        break;
                    }
                }
            }
            Inner::mark_disconnected(&inner, &transport);
        });
        self.inner.tasks.lock().push(handle);
    }

    /// Announce a local pool to the federation.
    pub fn announce_pool(&self, meta: FederatedPoolMetadata) {
        let now = self.inner.time.now();
        {
            let mut doc = self.inner.document.write();
            doc.upsert_pool(meta.clone(), now, self.inner.local.id);
        }
        self.inner.events.emit_pool_announced(meta.clone());
        self.inner
            .events
            .emit_state_changed(self.inner.document.read().clone());
        Inner::broadcast(
            &self.inner,
            FederationMessage::PoolAnnounce {
                sender: self.inner.local.id,
                pool: meta,
            },
        );
    }

    /// Push updated metadata for an already-announced pool.
    pub fn update_pool(&self, meta: FederatedPoolMetadata) {
        let now = self.inner.time.now();
        {
            let mut doc = self.inner.document.write();
            doc.upsert_pool(meta.clone(), now, self.inner.local.id);
        }
        self.inner
            .events
            .emit_state_changed(self.inner.document.read().clone());
        Inner::broadcast(
            &self.inner,
            FederationMessage::PoolUpdate {
                sender: self.inner.local.id,
                pool: meta,
            },
        );
    }

    /// Tell peers a pool's matches are computed.
    pub fn notify_result(&self, pool_id: PoolId, matched_count: u64) {
        Inner::broadcast(
            &self.inner,
            FederationMessage::ResultNotify {
                sender: self.inner.local.id,
                pool_id,
                matched_count,
            },
        );
    }

    /// Join a pool owned by another instance, anonymously.
    ///
    /// Fetches a fresh auth token, seals the payload to the owner
    /// instance's key, and waits (up to the configured timeout) for the
    /// correlated response. The local instance id is never transmitted.
    pub async fn request_join(
        &self,
        pool_id: PoolId,
        public_key: AgreementPublicKey,
        payload: JoinPayload,
    ) -> Result<bool, FederationError> {
        let (owner_instance, owner_key) = {
            let doc = self.inner.document.read();
            let meta = doc
                .pool(&pool_id)
                .ok_or_else(|| FederationError::UnknownPeer(format!("pool {pool_id}")))?;
            (meta.owner_instance, meta.owner_key)
        };

        if owner_instance == self.inner.local.id {
            // Local pool: no network round-trip to ourselves.
            let accepted = self
                .inner
                .handler
                .handle_join_request(pool_id, public_key, payload)
                .await
                .is_ok();
            return Ok(accepted);
        }

        let link = Inner::peer_link(&self.inner, &owner_instance)?;
        let auth_token = self
            .inner
            .authority
            .request_token("federation:join")
            .await
            .map_err(|e| FederationError::TokenIssuance(e.to_string()))?;

        let sealed = seal(
            &owner_key,
            &bincode::serialize(&payload).map_err(|e| FederationError::Codec(e.to_string()))?,
        )
        .map_err(|e| FederationError::Codec(e.to_string()))?;

        let frame = Frame::new(FederationMessage::JoinRequest {
            auth_token,
            pool_id,
            public_key,
            encrypted_payload: sealed,
        });

        let frame_id = frame.id;
        let (tx, rx) = oneshot::channel();
        self.inner.pending_joins.lock().insert(frame_id, tx);
        Inner::spawn_send(&self.inner, link.transport.clone(), frame, Duration::ZERO);

        let timeout = self.inner.config.join_timeout;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok((accepted, _reason))) => Ok(accepted),
            Ok(Err(_)) => Err(FederationError::Transport(
                "join correlation dropped".to_string(),
            )),
            Err(_) => {
                self.inner.pending_joins.lock().remove(&frame_id);
                Err(FederationError::Timeout(timeout.as_millis() as u64))
            }
        }
    }

    /// Relay match tokens to the instance owning a pool, anonymously.
    ///
    /// Schedules the send (fresh token, then a 5–60 s jitter on top of
    /// the base jitter) and returns once queued. Relays to a locally
    /// owned pool are a no-op.
    pub fn relay_tokens(
        &self,
        pool_id: PoolId,
        match_tokens: Vec<MatchToken>,
        nullifier: Nullifier,
    ) -> Result<(), FederationError> {
        let owner_instance = {
            let doc = self.inner.document.read();
            doc.pool(&pool_id)
                .ok_or_else(|| FederationError::UnknownPeer(format!("pool {pool_id}")))?
                .owner_instance
        };
        if owner_instance == self.inner.local.id {
            return Ok(());
        }
        let link = Inner::peer_link(&self.inner, &owner_instance)?;

        let inner = self.inner.clone();
        let transport = link.transport.clone();
        tokio::spawn(async move {
            let auth_token = match inner.authority.request_token("federation:relay").await {
                Ok(token) => token,
                Err(err) => {
                    warn!(error = %err, "token issuance failed; relay dropped");
                    return;
                }
            };
            tokio::time::sleep(jitter(inner.config.relay_jitter_ms)).await;
            let frame = Frame::new(FederationMessage::TokenRelay {
                auth_token,
                pool_id,
                match_tokens,
                nullifier,
            });
            Inner::spawn_send(&inner, transport, frame, Duration::ZERO);
        });
        Ok(())
    }
}

impl Inner {
    fn peer_link(inner: &Arc<Inner>, id: &InstanceId) -> Result<Arc<PeerLink>, FederationError> {
        inner
            .peers
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| FederationError::UnknownPeer(id.to_string()))
    }

    /// Queue a frame to one peer with the base send jitter.
    /// Fire-and-forget: send failures are logged and dropped; the CRDT
    /// sync reconciles any resulting divergence.
    fn spawn_send(
        inner: &Arc<Inner>,
        transport: Arc<dyn PeerTransport>,
        frame: Frame,
        extra: Duration,
    ) {
        let delay = jitter(inner.config.base_jitter_ms) + extra;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Err(err) = transport.send(frame).await {
                debug!(error = %err, "peer send failed; message dropped");
            }
        });
    }

    fn broadcast(inner: &Arc<Inner>, message: FederationMessage) {
        let peers: Vec<Arc<PeerLink>> = inner.peers.read().values().cloned().collect();
        for link in peers {
            if link.state.lock().connected {
                Self::spawn_send(
                    inner,
                    link.transport.clone(),
                    Frame::new(message.clone()),
                    Duration::ZERO,
                );
            }
        }
    }

    fn broadcast_sync(inner: &Arc<Inner>) {
        let document = inner.document.read().clone();
        Self::broadcast(
            inner,
            FederationMessage::Sync {
                sender: inner.local.id,
                document,
            },
        );
    }

    fn mark_disconnected(inner: &Arc<Inner>, transport: &Arc<dyn PeerTransport>) {
        let peers = inner.peers.read();
        for link in peers.values() {
            if Arc::ptr_eq(&link.transport, transport) {
                let mut state = link.state.lock();
                state.connected = false;
                state.retry_count += 1;
            }
        }
    }

    async fn verify_anonymous_token(inner: &Arc<Inner>, proof: &TokenProof) -> bool {
        if proof.is_expired(inner.time.now(), TOKEN_SKEW_MS) {
            return false;
        }
        matches!(inner.authority.verify(proof).await, Ok(true))
    }

    async fn handle_frame(inner: &Arc<Inner>, transport: &Arc<dyn PeerTransport>, frame: Frame) {
        let now = inner.time.now();
        match frame.payload {
            FederationMessage::Handshake { instance } => {
                info!(peer = %instance.id, endpoint = %instance.endpoint, "peer connected");
                {
                    let mut doc = inner.document.write();
                    doc.upsert_instance(instance.clone(), now, inner.local.id);
                }
                let link = Arc::new(PeerLink {
                    transport: transport.clone(),
                    state: Mutex::new(PeerState {
                        instance: Some(instance.clone()),
                        connected: true,
                        last_ping: Some(now),
                        retry_count: 0,
                        synced_version: 0,
                    }),
                });
                inner.peers.write().insert(instance.id, link);
                inner.events.emit_peer_connected(instance);
                // Initial sync goes out immediately on connection.
                let sync = Frame::new(FederationMessage::Sync {
                    sender: inner.local.id,
                    document: inner.document.read().clone(),
                });
                if let Err(err) = transport.send(sync).await {
                    debug!(error = %err, "initial sync failed");
                }
            }

            FederationMessage::Sync { document, .. } => {
                let changed = inner.document.write().merge(&document);
                if changed {
                    inner
                        .events
                        .emit_state_changed(inner.document.read().clone());
                }
            }

            FederationMessage::PoolAnnounce { sender, pool }
            | FederationMessage::PoolUpdate { sender, pool } => {
                {
                    let mut doc = inner.document.write();
                    doc.upsert_pool(pool.clone(), now, sender);
                }
                inner.events.emit_pool_announced(pool);
                inner
                    .events
                    .emit_state_changed(inner.document.read().clone());
            }

            FederationMessage::ResultNotify {
                pool_id,
                matched_count,
                ..
            } => {
                inner.events.emit_results_received(ResultNotifyEvent {
                    pool_id,
                    matched_count,
                });
            }

            FederationMessage::Ping { at, .. } => {
                Self::touch_peer(inner, transport, now);
                Self::spawn_send(
                    inner,
                    transport.clone(),
                    Frame::new(FederationMessage::Pong {
                        sender: inner.local.id,
                        at,
                    }),
                    Duration::ZERO,
                );
            }

            FederationMessage::Pong { .. } => {
                Self::touch_peer(inner, transport, now);
            }

            FederationMessage::JoinResponse {
                reply_to,
                accepted,
                reason,
                ..
            } => {
                if let Some(tx) = inner.pending_joins.lock().remove(&reply_to) {
                    let _ = tx.send((accepted, reason));
                }
            }

            FederationMessage::TokenRelay {
                auth_token,
                pool_id,
                match_tokens,
                nullifier,
            } => {
                if !Self::verify_anonymous_token(inner, &auth_token).await {
                    debug!(pool_id = %pool_id, "token relay dropped: bad auth token");
                    return;
                }
                let token_count = match_tokens.len();
                match inner
                    .handler
                    .handle_token_relay(pool_id, match_tokens, nullifier)
                    .await
                {
                    Ok(()) => inner.events.emit_tokens_relayed(TokensRelayedEvent {
                        pool_id,
                        token_count,
                        nullifier,
                    }),
                    Err(err) => debug!(pool_id = %pool_id, error = %err, "relayed submission failed"),
                }
            }

            FederationMessage::JoinRequest {
                auth_token,
                pool_id,
                public_key,
                encrypted_payload,
            } => {
                if !Self::verify_anonymous_token(inner, &auth_token).await {
                    debug!(pool_id = %pool_id, "join request dropped: bad auth token");
                    return;
                }
                let payload: JoinPayload = match open(&inner.agreement, &encrypted_payload)
                    .ok()
                    .and_then(|bytes| bincode::deserialize(&bytes).ok())
                {
                    Some(payload) => payload,
                    None => {
                        debug!(pool_id = %pool_id, "join request dropped: undecryptable payload");
                        return;
                    }
                };
                let result = inner
                    .handler
                    .handle_join_request(pool_id, public_key, payload.clone())
                    .await;
                let accepted = result.is_ok();
                inner.events.emit_join_request_received(JoinRequestEvent {
                    pool_id,
                    public_key,
                    payload,
                    accepted,
                });
                Self::spawn_send(
                    inner,
                    transport.clone(),
                    Frame::new(FederationMessage::JoinResponse {
                        sender: inner.local.id,
                        reply_to: frame.id,
                        accepted,
                        reason: result.err().map(|e| e.to_string()),
                    }),
                    Duration::ZERO,
                );
            }
        }
    }

    fn touch_peer(inner: &Arc<Inner>, transport: &Arc<dyn PeerTransport>, now: rdv_types::Timestamp) {
        let peers = inner.peers.read();
        for link in peers.values() {
            if Arc::ptr_eq(&link.transport, transport) {
                link.state.lock().last_ping = Some(now);
            }
        }
    }
}
