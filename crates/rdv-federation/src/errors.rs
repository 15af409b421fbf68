//! Federation error types.

use thiserror::Error;

/// Federation layer errors.
#[derive(Debug, Error)]
pub enum FederationError {
    /// The peer stream is closed or refused the frame.
    #[error("transport error: {0}")]
    Transport(String),

    /// A frame failed to (de)serialize.
    #[error("codec error: {0}")]
    Codec(String),

    /// No route to the instance that owns the target resource.
    #[error("unknown peer instance: {0}")]
    UnknownPeer(String),

    /// The token authority could not issue a fresh token.
    #[error("token issuance failed: {0}")]
    TokenIssuance(String),

    /// A request/response correlation timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),
}
