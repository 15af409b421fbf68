//! The owner-held-key PSI pipeline.
//!
//! Queue lifecycle (monotone): pending → processing → completed | expired.
//! The owner authenticates every poll and response post with a signed
//! request envelope; clients authenticate nothing — their requests are
//! opaque blobs plus an optional auth-token hash for rate accounting.

use crate::primitive::{server_setup, ClientRequest, ServerKey};
use rdv_crypto::{seal, verify_request};
use rdv_pools::effective_status;
use rdv_store::PoolStore;
use rdv_types::{
    AgreementPublicKey, PendingPsiRequest, Pool, PoolId, PoolStatus, PsiParams, PsiRequestStatus,
    PsiResponseRecord, PsiSetup, RendezvousError, RequestId, SignedRequest, TimeSource,
    PSI_RESPONSE_TTL_MS,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pending/processing requests older than this are expired at poll time.
const REQUEST_TTL_MS: u64 = 24 * 60 * 60 * 1_000;

/// Per-item outcome of a response batch. Item failures never fail the
/// batch.
#[derive(Clone, Debug)]
pub struct PsiBatchOutcome {
    /// The request the item addressed.
    pub request_id: RequestId,
    /// None on success; a human-readable reason otherwise.
    pub error: Option<String>,
}

/// The queued PSI request/response service.
pub struct PsiService {
    store: Arc<PoolStore>,
    time: Arc<dyn TimeSource>,
}

impl PsiService {
    /// Create a service over a store and a clock.
    pub fn new(store: Arc<PoolStore>, time: Arc<dyn TimeSource>) -> Self {
        Self { store, time }
    }

    /// Create the pool's PSI setup from its revealed token set.
    ///
    /// Generates a fresh server key, seals it to the owner's agreement
    /// key, and stores the setup. The plaintext key never persists; after
    /// this call only the owner can process queries.
    pub fn create_setup(
        &self,
        pool_id: &PoolId,
        owner_key: &AgreementPublicKey,
        params: PsiParams,
    ) -> Result<PsiSetup, RendezvousError> {
        let mut pool = self.load_closed_pool(pool_id)?;

        let tokens: Vec<Vec<u8>> = self
            .store
            .count_token_occurrences(pool_id)?
            .keys()
            .map(|t| t.as_bytes().to_vec())
            .collect();

        let key = ServerKey::generate();
        let setup_message = server_setup(&key, &tokens, params)
            .to_bytes()
            .map_err(|e| RendezvousError::Internal(e.to_string()))?;
        let sealed_server_key = seal(owner_key, &key.to_bytes())
            .map_err(|e| RendezvousError::Internal(e.to_string()))?;

        let setup = PsiSetup {
            id: Uuid::new_v4(),
            pool_id: *pool_id,
            setup_message,
            sealed_server_key,
            owner_key: *owner_key,
            params,
            created_at: self.time.now(),
        };
        if !self.store.insert_psi_setup_if_absent(&setup)? {
            return Err(RendezvousError::InvalidInput(
                "pool already has a PSI setup".to_string(),
            ));
        }
        pool.psi_setup_id = Some(setup.id);
        self.store.update_pool(&pool)?;
        info!(pool_id = %pool_id, elements = tokens.len(), "PSI setup created");
        Ok(setup)
    }

    /// Enqueue a client request. The server never parses beyond a size
    /// check; the content stays opaque.
    pub fn submit_request(
        &self,
        pool_id: &PoolId,
        request: Vec<u8>,
        auth_token: Option<&[u8]>,
    ) -> Result<RequestId, RendezvousError> {
        self.load_closed_pool(pool_id)?;
        let setup = self
            .store
            .psi_setup(pool_id)?
            .ok_or_else(|| {
                RendezvousError::InvalidInput("pool has no PSI setup".to_string())
            })?;

        let parsed = ClientRequest::from_bytes(&request)
            .map_err(|e| RendezvousError::InvalidInput(e.to_string()))?;
        if parsed.blinded.len() > setup.params.max_client_elements as usize {
            return Err(RendezvousError::InvalidInput(format!(
                "request exceeds {} elements",
                setup.params.max_client_elements
            )));
        }

        let record = PendingPsiRequest {
            id: RequestId::generate(),
            pool_id: *pool_id,
            request,
            status: PsiRequestStatus::Pending,
            created_at: self.time.now(),
            auth_token_hash: auth_token.map(|t| Sha256::digest(t).into()),
        };
        self.store.insert_psi_request(&record)?;
        debug!(pool_id = %pool_id, request_id = %record.id, "PSI request queued");
        Ok(record.id)
    }

    /// Owner poll: hand over the pending queue, marking each request
    /// processing. Authenticated by a signed envelope over the pool.
    pub fn pending_requests(
        &self,
        envelope: &SignedRequest,
    ) -> Result<Vec<PendingPsiRequest>, RendezvousError> {
        let pool = self.authenticate_owner(envelope, "psi_poll")?;

        self.expire_stale(&pool.id)?;

        let pending = self
            .store
            .psi_requests_by_status(&pool.id, PsiRequestStatus::Pending)?;
        let mut handed = Vec::with_capacity(pending.len());
        for request in pending {
            if let Some(updated) = self
                .store
                .set_psi_request_status(&request.id, PsiRequestStatus::Processing)?
            {
                handed.push(updated);
            }
        }
        debug!(pool_id = %pool.id, count = handed.len(), "PSI queue handed to owner");
        Ok(handed)
    }

    /// Owner posts a batch of responses. Items for completed or missing
    /// requests are reported as per-item errors, never as a failure of
    /// the batch.
    pub fn submit_responses(
        &self,
        envelope: &SignedRequest,
        responses: Vec<(RequestId, Vec<u8>)>,
    ) -> Result<Vec<PsiBatchOutcome>, RendezvousError> {
        let pool = self.authenticate_owner(envelope, "psi_respond")?;
        let setup = self
            .store
            .psi_setup(&pool.id)?
            .ok_or_else(|| {
                RendezvousError::InvalidInput("pool has no PSI setup".to_string())
            })?;

        let now = self.time.now();
        let mut outcomes = Vec::with_capacity(responses.len());
        for (request_id, response) in responses {
            let error = self.apply_response(&pool, &setup, request_id, response, now);
            if let Some(reason) = &error {
                warn!(request_id = %request_id, reason, "PSI response item rejected");
            }
            outcomes.push(PsiBatchOutcome { request_id, error });
        }
        Ok(outcomes)
    }

    /// Client poll by request id.
    ///
    /// `Ok(None)` while the owner has not responded yet; `GONE` once the
    /// response has expired.
    pub fn poll_response(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<PsiResponseRecord>, RendezvousError> {
        let Some(request) = self.store.psi_request(request_id)? else {
            return Err(RendezvousError::InvalidInput(
                "unknown PSI request".to_string(),
            ));
        };
        if let Some(record) = self.store.psi_response(request_id)? {
            if self.time.now() >= record.expires_at {
                return Err(RendezvousError::Gone(
                    "PSI response has expired".to_string(),
                ));
            }
            return Ok(Some(record));
        }
        match request.status {
            PsiRequestStatus::Expired => Err(RendezvousError::Gone(
                "PSI request expired before processing".to_string(),
            )),
            _ => Ok(None),
        }
    }

    /// Trivial server-held path: plaintext intersection against the
    /// pool's revealed token set.
    pub fn trivial_intersection(
        &self,
        pool_id: &PoolId,
        client_tokens: &[rdv_types::MatchToken],
    ) -> Result<Vec<rdv_types::MatchToken>, RendezvousError> {
        self.load_closed_pool(pool_id)?;
        let counts = self.store.count_token_occurrences(pool_id)?;
        Ok(client_tokens
            .iter()
            .filter(|t| counts.contains_key(t))
            .copied()
            .collect())
    }

    fn apply_response(
        &self,
        pool: &Pool,
        setup: &PsiSetup,
        request_id: RequestId,
        response: Vec<u8>,
        now: rdv_types::Timestamp,
    ) -> Option<String> {
        let request = match self.store.psi_request(&request_id) {
            Ok(Some(request)) => request,
            Ok(None) => return Some("no such request".to_string()),
            Err(e) => return Some(e.to_string()),
        };
        if request.pool_id != pool.id {
            return Some("request belongs to another pool".to_string());
        }
        if !request
            .status
            .can_transition_to(PsiRequestStatus::Completed)
        {
            return Some(format!(
                "request is {}, cannot complete",
                request.status.as_str()
            ));
        }

        let record = PsiResponseRecord {
            id: Uuid::new_v4(),
            request_id,
            pool_id: pool.id,
            setup_message: setup.setup_message.clone(),
            response,
            created_at: now,
            expires_at: now.plus_millis(PSI_RESPONSE_TTL_MS),
        };
        match self.store.insert_psi_response_if_absent(&record) {
            Ok(true) => {}
            Ok(false) => return Some("response already recorded".to_string()),
            Err(e) => return Some(e.to_string()),
        }
        if let Err(e) = self
            .store
            .set_psi_request_status(&request_id, PsiRequestStatus::Completed)
        {
            return Some(e.to_string());
        }
        None
    }

    fn expire_stale(&self, pool_id: &PoolId) -> Result<(), RendezvousError> {
        let cutoff = self.time.now().minus_millis(REQUEST_TTL_MS);
        for status in [PsiRequestStatus::Pending, PsiRequestStatus::Processing] {
            for request in self.store.psi_requests_by_status(pool_id, status)? {
                if request.created_at < cutoff {
                    self.store
                        .set_psi_request_status(&request.id, PsiRequestStatus::Expired)?;
                }
            }
        }
        Ok(())
    }

    fn authenticate_owner(
        &self,
        envelope: &SignedRequest,
        action: &str,
    ) -> Result<Pool, RendezvousError> {
        if envelope.action != action {
            return Err(RendezvousError::InvalidInput(format!(
                "unexpected action {:?}",
                envelope.action
            )));
        }
        let pool = self
            .store
            .pool(&envelope.pool_id)?
            .ok_or(RendezvousError::PoolNotFound(envelope.pool_id))?;
        if envelope.signer != pool.creator_signing_key {
            return Err(RendezvousError::InvalidEligibilityProof(
                "signer is not the pool owner".to_string(),
            ));
        }
        verify_request(envelope, self.time.now())
            .map_err(|e| RendezvousError::InvalidEligibilityProof(e.to_string()))?;
        Ok(pool)
    }

    fn load_closed_pool(&self, pool_id: &PoolId) -> Result<Pool, RendezvousError> {
        let pool = self
            .store
            .pool(pool_id)?
            .ok_or(RendezvousError::PoolNotFound(*pool_id))?;
        if effective_status(&pool, self.time.now()) != PoolStatus::Closed {
            return Err(RendezvousError::InvalidInput(
                "PSI requires a closed pool".to_string(),
            ));
        }
        Ok(pool)
    }
}
