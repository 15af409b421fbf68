//! Federation wire messages.
//!
//! Two shapes: identified messages carry their sender's instance id;
//! anonymous messages carry an auth token instead and reveal nothing
//! about the sending instance. Frames serialize with bincode.

use crate::document::FederationDocument;
use crate::FederationError;
use rdv_types::{
    AgreementPublicKey, InstanceId, InstanceRecord, MatchToken, MessageId, Nullifier, PoolId,
    FederatedPoolMetadata, Timestamp, TokenProof,
};
use serde::{Deserialize, Serialize};

/// A framed federation message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Frame {
    /// Message id, used for request/response correlation.
    pub id: MessageId,
    /// The payload.
    pub payload: FederationMessage,
}

impl Frame {
    /// Wrap a payload with a fresh message id.
    pub fn new(payload: FederationMessage) -> Self {
        Self {
            id: MessageId::generate(),
            payload,
        }
    }

    /// Serialize for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FederationError> {
        bincode::serialize(self).map_err(|e| FederationError::Codec(e.to_string()))
    }

    /// Parse from the wire.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FederationError> {
        bincode::deserialize(bytes).map_err(|e| FederationError::Codec(e.to_string()))
    }
}

/// The decrypted join payload a requester seals to the pool owner's
/// instance key. Everything here is opaque to intermediaries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoinPayload {
    /// Display name for the registration.
    pub display_name: String,
    /// Optional bio.
    pub bio: Option<String>,
    /// Optional invite proof for gated pools.
    pub issuance_proof: Option<TokenProof>,
}

/// All federation messages.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FederationMessage {
    /// First frame on every connection, both directions.
    Handshake {
        /// The sender's instance record.
        instance: InstanceRecord,
    },
    /// Replicated-document exchange.
    Sync {
        /// Sender instance.
        sender: InstanceId,
        /// The sender's current document.
        document: FederationDocument,
    },
    /// A new pool is visible to the federation.
    PoolAnnounce {
        /// Sender instance.
        sender: InstanceId,
        /// The announced pool.
        pool: FederatedPoolMetadata,
    },
    /// Metadata changed for an already-announced pool.
    PoolUpdate {
        /// Sender instance.
        sender: InstanceId,
        /// The updated pool.
        pool: FederatedPoolMetadata,
    },
    /// Match detection finished on the owning instance.
    ResultNotify {
        /// Sender instance.
        sender: InstanceId,
        /// The pool.
        pool_id: PoolId,
        /// How many mutual matches were found.
        matched_count: u64,
    },
    /// Liveness probe.
    Ping {
        /// Sender instance.
        sender: InstanceId,
        /// Sender clock.
        at: Timestamp,
    },
    /// Liveness reply.
    Pong {
        /// Sender instance.
        sender: InstanceId,
        /// Clock echoed from the ping.
        at: Timestamp,
    },
    /// Answer to a join request, correlated by message id.
    JoinResponse {
        /// Sender instance (the pool owner's).
        sender: InstanceId,
        /// The join request frame this answers.
        reply_to: MessageId,
        /// Whether registration succeeded.
        accepted: bool,
        /// Failure reason, when not accepted.
        reason: Option<String>,
    },
    /// Anonymous: relay match tokens to the owning instance.
    TokenRelay {
        /// Fresh single-use authorization.
        auth_token: TokenProof,
        /// Target pool.
        pool_id: PoolId,
        /// The tokens to submit.
        match_tokens: Vec<MatchToken>,
        /// The submitter's nullifier.
        nullifier: Nullifier,
    },
    /// Anonymous: ask the owning instance to register a participant.
    JoinRequest {
        /// Fresh single-use authorization.
        auth_token: TokenProof,
        /// Target pool.
        pool_id: PoolId,
        /// Cleartext because eligibility and routing need it.
        public_key: AgreementPublicKey,
        /// [`JoinPayload`] sealed to the owner instance's key.
        encrypted_payload: Vec<u8>,
    },
}

impl FederationMessage {
    /// The sender, for identified messages.
    pub fn sender(&self) -> Option<InstanceId> {
        match self {
            FederationMessage::Sync { sender, .. }
            | FederationMessage::PoolAnnounce { sender, .. }
            | FederationMessage::PoolUpdate { sender, .. }
            | FederationMessage::ResultNotify { sender, .. }
            | FederationMessage::Ping { sender, .. }
            | FederationMessage::Pong { sender, .. }
            | FederationMessage::JoinResponse { sender, .. } => Some(*sender),
            _ => None,
        }
    }

    /// True for messages that carry an auth token instead of a sender.
    pub fn is_anonymous(&self) -> bool {
        matches!(
            self,
            FederationMessage::TokenRelay { .. } | FederationMessage::JoinRequest { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let frame = Frame::new(FederationMessage::Ping {
            sender: InstanceId::generate(),
            at: Timestamp::from_millis(42),
        });
        let parsed = Frame::from_bytes(&frame.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.id, frame.id);
        assert!(!parsed.payload.is_anonymous());
    }

    #[test]
    fn test_anonymous_messages_have_no_sender() {
        let relay = FederationMessage::TokenRelay {
            auth_token: TokenProof {
                issuer: "issuer".to_string(),
                expires_at: Timestamp::from_millis(1),
                body: vec![],
            },
            pool_id: PoolId::generate(),
            match_tokens: vec![],
            nullifier: Nullifier::from_bytes([1; 32]),
        };
        assert!(relay.is_anonymous());
        assert!(relay.sender().is_none());
    }
}
