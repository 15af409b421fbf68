//! Production adapters for the core's outbound ports.

pub mod attestation;
pub mod issuer;
#[cfg(feature = "rocksdb")]
pub mod storage;

pub use attestation::LocalAttestor;
pub use issuer::StaticTokenAuthority;
#[cfg(feature = "rocksdb")]
pub use storage::{RocksDbConfig, RocksDbKv};
