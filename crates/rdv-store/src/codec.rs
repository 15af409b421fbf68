//! Record encoding.
//!
//! All persisted entities serialize with bincode. Encoding failures are
//! surfaced as [`StoreError::Codec`]; they indicate a bug or corrupted
//! data, never a caller mistake.

use crate::StoreError;
use serde::{de::DeserializeOwned, Serialize};

/// Encode a record.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(value).map_err(|e| StoreError::Codec(e.to_string()))
}

/// Decode a record.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Codec(e.to_string()))
}
