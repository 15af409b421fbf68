//! Federation records replicated across instances.

use crate::ids::{AgreementPublicKey, InstanceId, PoolId};
use crate::pool::PoolStatus;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// A federated instance known to the replicated document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Stable instance identifier.
    pub id: InstanceId,
    /// Human-readable name.
    pub name: String,
    /// Network endpoint peers dial.
    pub endpoint: String,
    /// Instance public key (agreement), used to seal payloads to this
    /// instance.
    pub public_key: AgreementPublicKey,
}

/// Pool summary replicated to peers.
///
/// Carries the owner's agreement key so that any participant on any
/// instance can encrypt join payloads for the owner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FederatedPoolMetadata {
    /// The pool.
    pub pool_id: PoolId,
    /// Pool name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Last known status.
    pub status: PoolStatus,
    /// Optional commit deadline.
    pub commit_deadline: Option<Timestamp>,
    /// Reveal deadline.
    pub reveal_deadline: Timestamp,
    /// Instance that owns the pool.
    pub owner_instance: InstanceId,
    /// Owner agreement public key for sealing payloads.
    pub owner_key: AgreementPublicKey,
    /// Whether joining requires an invite proof.
    pub requires_invite: bool,
}
