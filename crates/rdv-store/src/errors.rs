//! Storage error types.

use rdv_types::RendezvousError;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying engine failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A record could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
}

impl From<StoreError> for RendezvousError {
    fn from(err: StoreError) -> Self {
        RendezvousError::Internal(err.to_string())
    }
}
