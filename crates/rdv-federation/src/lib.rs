//! # Federation Subsystem
//!
//! Replicates pool metadata across instances as a last-writer-wins CRDT
//! and relays anonymous cross-instance messages authorized by unlinkable
//! tokens.
//!
//! ## Message Shapes
//!
//! | Kind | Carries | Examples |
//! |------|---------|----------|
//! | Identified | sender instance id | sync, pool_announce, pool_update, result_notify, ping/pong, join_response |
//! | Anonymous | auth token, no sender | token_relay, join_request |
//!
//! Every anonymous message is dropped silently when its token fails
//! verification. Every anonymous send fetches a fresh token: one token,
//! one message, maximum unlinkability.
//!
//! ## Timing Discipline
//!
//! All peer sends add a 100–2000 ms base jitter; token relays add a
//! further uniform 5–60 s; the sync ticker fires every 30 s; join
//! requests time out after 30 s. Tests zero the jitters via
//! [`FederationConfig::for_testing`].
//!
//! ## Event Channels
//!
//! Subscribers receive immutable snapshots over one typed broadcast
//! channel per event kind; there is no callback registry.

pub mod document;
pub mod errors;
pub mod events;
pub mod manager;
pub mod messages;
pub mod peer;
pub mod transport;

pub use document::{FederationDocument, PoolEntry, Stamp};
pub use errors::FederationError;
pub use events::{FederationEvents, JoinRequestEvent, ResultNotifyEvent, TokensRelayedEvent};
pub use manager::{FederationConfig, FederationHandler, FederationManager};
pub use messages::{Frame, FederationMessage, JoinPayload};
pub use peer::{backoff_delay, PeerState};
pub use transport::{memory_pair, MemoryTransport, PeerTransport};
