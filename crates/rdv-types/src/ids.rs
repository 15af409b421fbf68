//! Opaque identifiers used throughout the protocol.
//!
//! UUID newtypes identify records (pools, requests, instances, messages);
//! 32-byte newtypes carry cryptographic material (keys, tokens, nullifiers,
//! commitments). The byte newtypes parse strictly: exactly 32 bytes, or
//! exactly 64 hex characters at the encoding edge.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// The underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parse from the canonical hyphenated form.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Identifies a matching pool.
    PoolId
);
uuid_id!(
    /// Identifies a queued PSI request.
    RequestId
);
uuid_id!(
    /// Identifies a stored preference record.
    PreferenceId
);
uuid_id!(
    /// Stable identifier of a federated instance.
    InstanceId
);
uuid_id!(
    /// Correlates federation requests with responses.
    MessageId
);

/// Length in bytes of every protocol-level byte identifier.
pub const ID_BYTES: usize = 32;

macro_rules! bytes32_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name([u8; ID_BYTES]);

        impl $name {
            /// Wrap raw bytes.
            pub fn from_bytes(bytes: [u8; ID_BYTES]) -> Self {
                Self(bytes)
            }

            /// Parse from a slice; rejects anything that is not exactly 32 bytes.
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                let arr: [u8; ID_BYTES] = bytes.try_into().ok()?;
                Some(Self(arr))
            }

            /// Parse from a 64-character hex string.
            pub fn from_hex(s: &str) -> Option<Self> {
                if s.len() != ID_BYTES * 2 {
                    return None;
                }
                let bytes = hex::decode(s).ok()?;
                Self::from_slice(&bytes)
            }

            /// Raw bytes.
            pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
                &self.0
            }

            /// Hex encoding (lowercase, 64 chars).
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Abbreviated so key material never lands in logs in full.
                write!(f, concat!(stringify!($name), "({}..)"), hex::encode(&self.0[..4]))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}..", hex::encode(&self.0[..4]))
            }
        }
    };
}

bytes32_id!(
    /// X25519 public key used for the matching math.
    AgreementPublicKey
);
bytes32_id!(
    /// Ed25519 public key used for administrative authentication.
    SigningPublicKey
);
bytes32_id!(
    /// A 32-byte value two parties derive identically when each selects
    /// the other in a given pool.
    MatchToken
);
bytes32_id!(
    /// Deterministic per-participant, per-pool duplicate-submission guard.
    Nullifier
);
bytes32_id!(
    /// SHA-256 commitment to a match token.
    CommitHash
);
