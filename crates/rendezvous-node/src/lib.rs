//! # Rendezvous Node
//!
//! The facade: one object composed of crypto, store, pool manager,
//! submission manager, match detector, gate evaluator, PSI service, and
//! the optional issuer/attestation adapters.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     OUTER LAYER (not here)                   │
//! │         HTTP surface, CLI, response-padding middleware       │
//! └──────────────────────────────────────────────────────────────┘
//!                          ↑ calls ↑
//! ┌──────────────────────────────────────────────────────────────┐
//! │  node.rs       - RendezvousNode: the programmatic contract   │
//! │  scheduler.rs  - deadline scan, privacy delay, auto-close    │
//! │  config.rs     - NodeConfig (env only touches the binary)    │
//! └──────────────────────────────────────────────────────────────┘
//!                          ↑ wires ↑
//! ┌──────────────────────────────────────────────────────────────┐
//! │  adapters/     - RocksDB engine, token authority,            │
//! │                  attestation provider                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lifecycle: construct → [`RendezvousNode::serve`] → [`RendezvousNode::close`].

pub mod adapters;
pub mod config;
pub mod node;
pub mod scheduler;

pub use config::NodeConfig;
pub use node::{NodeDeps, RegisterRequest, RendezvousNode};
pub use scheduler::{Scheduler, SchedulerConfig};
