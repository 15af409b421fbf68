//! Key-space layout.
//!
//! One flat byte keyspace with slash-delimited prefixes, mirroring a
//! column-family split without requiring engine support for it:
//!
//! ```text
//! pool/{pool}                     Pool
//! pool_status/{status}/{pool}     index: pools by stored status
//! pool_creator/{key}/{pool}       index: pools by creator agreement key
//! part/{pool}/{key}               Participant
//! pref/{pool}/{nullifier}/{id}    Preference
//! match/{pool}                    MatchResult
//! psi_setup/{pool}                PsiSetup
//! psi_req/{request}               PendingPsiRequest
//! psi_req_idx/{pool}/{status}/{request}   index: PSI queue by (pool, status)
//! psi_resp/{request}              PsiResponseRecord
//! ```
//!
//! UUID segments render as the 32-char simple form; byte identifiers as
//! lowercase hex, so prefix scans stay aligned on delimiter boundaries.

use rdv_types::{
    AgreementPublicKey, Nullifier, PoolId, PoolStatus, PreferenceId, PsiRequestStatus, RequestId,
};

fn uuid_seg(u: &uuid::Uuid) -> String {
    u.simple().to_string()
}

/// `pool/{pool}`
pub fn pool(id: &PoolId) -> Vec<u8> {
    format!("pool/{}", uuid_seg(id.as_uuid())).into_bytes()
}

/// Prefix over all pools.
pub fn pool_prefix() -> Vec<u8> {
    b"pool/".to_vec()
}

/// `pool_status/{status}/{pool}`
pub fn pool_status(status: PoolStatus, id: &PoolId) -> Vec<u8> {
    format!("pool_status/{}/{}", status.as_str(), uuid_seg(id.as_uuid())).into_bytes()
}

/// Prefix over one status bucket.
pub fn pool_status_prefix(status: PoolStatus) -> Vec<u8> {
    format!("pool_status/{}/", status.as_str()).into_bytes()
}

/// `pool_creator/{key}/{pool}`
pub fn pool_creator(key: &AgreementPublicKey, id: &PoolId) -> Vec<u8> {
    format!("pool_creator/{}/{}", key.to_hex(), uuid_seg(id.as_uuid())).into_bytes()
}

/// Prefix over one creator's pools.
pub fn pool_creator_prefix(key: &AgreementPublicKey) -> Vec<u8> {
    format!("pool_creator/{}/", key.to_hex()).into_bytes()
}

/// `part/{pool}/{key}`
pub fn participant(pool: &PoolId, key: &AgreementPublicKey) -> Vec<u8> {
    format!("part/{}/{}", uuid_seg(pool.as_uuid()), key.to_hex()).into_bytes()
}

/// Prefix over a pool's participants.
pub fn participant_prefix(pool: &PoolId) -> Vec<u8> {
    format!("part/{}/", uuid_seg(pool.as_uuid())).into_bytes()
}

/// `pref/{pool}/{nullifier}/{id}`
pub fn preference(pool: &PoolId, nullifier: &Nullifier, id: &PreferenceId) -> Vec<u8> {
    format!(
        "pref/{}/{}/{}",
        uuid_seg(pool.as_uuid()),
        nullifier.to_hex(),
        uuid_seg(id.as_uuid())
    )
    .into_bytes()
}

/// Prefix over one (pool, nullifier) preference set.
pub fn preference_set_prefix(pool: &PoolId, nullifier: &Nullifier) -> Vec<u8> {
    format!("pref/{}/{}/", uuid_seg(pool.as_uuid()), nullifier.to_hex()).into_bytes()
}

/// Prefix over all of a pool's preferences.
pub fn preference_prefix(pool: &PoolId) -> Vec<u8> {
    format!("pref/{}/", uuid_seg(pool.as_uuid())).into_bytes()
}

/// `match/{pool}`
pub fn match_result(pool: &PoolId) -> Vec<u8> {
    format!("match/{}", uuid_seg(pool.as_uuid())).into_bytes()
}

/// `psi_setup/{pool}`
pub fn psi_setup(pool: &PoolId) -> Vec<u8> {
    format!("psi_setup/{}", uuid_seg(pool.as_uuid())).into_bytes()
}

/// `psi_req/{request}`
pub fn psi_request(id: &RequestId) -> Vec<u8> {
    format!("psi_req/{}", uuid_seg(id.as_uuid())).into_bytes()
}

/// `psi_req_idx/{pool}/{status}/{request}`
pub fn psi_request_idx(pool: &PoolId, status: PsiRequestStatus, id: &RequestId) -> Vec<u8> {
    format!(
        "psi_req_idx/{}/{}/{}",
        uuid_seg(pool.as_uuid()),
        status.as_str(),
        uuid_seg(id.as_uuid())
    )
    .into_bytes()
}

/// Prefix over a pool's PSI queue bucket.
pub fn psi_request_idx_prefix(pool: &PoolId, status: PsiRequestStatus) -> Vec<u8> {
    format!(
        "psi_req_idx/{}/{}/",
        uuid_seg(pool.as_uuid()),
        status.as_str()
    )
    .into_bytes()
}

/// `psi_resp/{request}`
pub fn psi_response(request: &RequestId) -> Vec<u8> {
    format!("psi_resp/{}", uuid_seg(request.as_uuid())).into_bytes()
}
