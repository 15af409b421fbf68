//! # Shared Types Crate
//!
//! This crate contains all domain entities, identifiers, and adapter port
//! traits shared across the Rendezvous subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Opaque Identifiers**: Protocol identifiers are fixed-width byte
//!   strings. Hex and base64 are encodings at the edges, never semantics.
//! - **Stable Error Codes**: Every failure surfaces as a [`RendezvousError`]
//!   with a machine-readable code that outer layers can rely on.

pub mod errors;
pub mod federation;
pub mod ids;
pub mod matching;
pub mod participant;
pub mod pool;
pub mod ports;
pub mod preference;
pub mod psi;
pub mod time;

pub use errors::{ErrorCode, RendezvousError};
pub use federation::{FederatedPoolMetadata, InstanceRecord};
pub use ids::{
    AgreementPublicKey, CommitHash, InstanceId, MatchToken, MessageId, Nullifier, PoolId,
    PreferenceId, RequestId, SigningPublicKey,
};
pub use matching::{
    AttestationSignatures, IntegrityReport, MatchResult, MatchStats, MatchStatus,
    TimestampAttestation, WitnessSignature,
};
pub use participant::Participant;
pub use pool::{Gate, GateOp, Pool, PoolStatus};
pub use ports::{AdapterError, AttestationProvider, SignedRequest, TokenAuthority, TokenProof};
pub use preference::Preference;
pub use psi::{
    PendingPsiRequest, PsiParams, PsiRequestStatus, PsiResponseRecord, PsiSetup, PsiStructure,
    PSI_RESPONSE_TTL_MS,
};
pub use time::{SystemTimeSource, TimeSource, Timestamp};

/// Protocol version baked into content hashes and domain separation.
///
/// Changing any domain separator or wire shape requires bumping this.
pub const PROTOCOL_VERSION: &str = "rendezvous-v1";
