//! Participant profiles.

use crate::ids::{AgreementPublicKey, PoolId};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of arbitrary profile fields.
pub const MAX_PROFILE_FIELDS: usize = 16;
/// Maximum length of a profile field key, in bytes.
pub const MAX_PROFILE_KEY_LEN: usize = 64;
/// Maximum length of a profile field value, in bytes.
pub const MAX_PROFILE_VALUE_LEN: usize = 512;

/// A registered participant.
///
/// (pool, agreement key) is unique. Preferences are deliberately NOT
/// linkable to this record; they are keyed by nullifier instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Participant {
    /// The pool this registration belongs to.
    pub pool_id: PoolId,
    /// The participant's agreement public key.
    pub public_key: AgreementPublicKey,
    /// Display name shown to other pool members.
    pub display_name: String,
    /// Optional short bio.
    pub bio: Option<String>,
    /// Small arbitrary profile fields, bounded by the limits above.
    pub profile: BTreeMap<String, String>,
    /// Registration time.
    pub registered_at: Timestamp,
}

impl Participant {
    /// Validate profile-field bounds.
    pub fn profile_within_bounds(profile: &BTreeMap<String, String>) -> bool {
        profile.len() <= MAX_PROFILE_FIELDS
            && profile.iter().all(|(k, v)| {
                k.len() <= MAX_PROFILE_KEY_LEN && v.len() <= MAX_PROFILE_VALUE_LEN
            })
    }
}
