//! # Storage Subsystem
//!
//! A narrow transactional contract the rest of the core programs against.
//!
//! ## Module Structure
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  store.rs   - PoolStore: typed operations per entity      │
//! └───────────────────────────────────────────────────────────┘
//!                        ↑ uses ↑
//! ┌───────────────────────────────────────────────────────────┐
//! │  kv.rs      - KeyValueStore trait, BatchOperation,        │
//! │               MemoryKv (testing / single-process)         │
//! │  keys.rs    - key-space layout and secondary indexes      │
//! │  codec.rs   - bincode record encoding                     │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The production RocksDB adapter lives in `rendezvous-node`; this crate
//! only fixes the contract.
//!
//! ## Guarantees
//!
//! - Single-key operations are linearizable.
//! - `insert_preferences_if_absent` is a serializable insert-if-absent on
//!   (pool, nullifier): at most one preference set per participant per
//!   pool, even across concurrent submissions.
//! - `upsert_match_result` is idempotent on pool id.

pub mod codec;
pub mod errors;
pub mod keys;
pub mod kv;
pub mod store;

pub use errors::StoreError;
pub use kv::{BatchOperation, KeyValueStore, MemoryKv};
pub use store::PoolStore;
