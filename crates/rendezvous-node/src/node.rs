//! The node facade.

use crate::config::NodeConfig;
use crate::scheduler::{Scheduler, SchedulerConfig};
use async_trait::async_trait;
use rdv_crypto::AgreementKeyPair;
use rdv_federation::{
    FederationConfig, FederationHandler, FederationManager, JoinPayload, PeerTransport,
};
use rdv_match::{discover_matches, verify_integrity, MatchDetector};
use rdv_pools::{effective_status, CreatePoolRequest, GateContext, GateEvaluator, PoolManager};
use rdv_psi::PsiService;
use rdv_store::{KeyValueStore, MemoryKv, PoolStore};
use rdv_submission::{RevealOutcome, SubmissionManager, SubmissionOutcome, SubmitRequest};
use rdv_types::{
    AgreementPublicKey, AttestationProvider, FederatedPoolMetadata, InstanceId, InstanceRecord,
    IntegrityReport, MatchResult, MatchStats, MatchStatus, MatchToken, Nullifier, Participant,
    Pool, PoolId, PoolStatus, RendezvousError, SignedRequest, SystemTimeSource, TimeSource,
    TokenAuthority, TokenProof,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// External dependencies injected into the node.
pub struct NodeDeps {
    /// The storage engine.
    pub kv: Arc<dyn KeyValueStore>,
    /// The clock.
    pub time: Arc<dyn TimeSource>,
    /// Unlinkable-token issuer/verifier, when configured.
    pub issuer: Option<Arc<dyn TokenAuthority>>,
    /// Timestamp-attestation gateway, when configured.
    pub attestor: Option<Arc<dyn AttestationProvider>>,
}

impl NodeDeps {
    /// In-memory storage, system clock, no external services.
    pub fn in_memory() -> Self {
        Self {
            kv: Arc::new(MemoryKv::new()),
            time: Arc::new(SystemTimeSource),
            issuer: None,
            attestor: None,
        }
    }
}

/// A participant registration request.
#[derive(Clone, Debug)]
pub struct RegisterRequest {
    /// Target pool.
    pub pool_id: PoolId,
    /// The participant's agreement key.
    pub public_key: AgreementPublicKey,
    /// Display name.
    pub display_name: String,
    /// Optional bio.
    pub bio: Option<String>,
    /// Small arbitrary profile fields.
    pub profile: BTreeMap<String, String>,
    /// Optional eligibility proof.
    pub token_proof: Option<TokenProof>,
}

/// The composed Rendezvous service.
pub struct RendezvousNode {
    config: NodeConfig,
    store: Arc<PoolStore>,
    time: Arc<dyn TimeSource>,
    pools: Arc<PoolManager>,
    submissions: Arc<SubmissionManager>,
    detector: Arc<MatchDetector>,
    gates: Arc<GateEvaluator>,
    psi: Arc<PsiService>,
    scheduler: Arc<Scheduler>,
    federation: parking_lot::Mutex<Option<Arc<FederationManager>>>,
}

impl RendezvousNode {
    /// Wire the subsystems together.
    pub fn new(config: NodeConfig, deps: NodeDeps) -> Self {
        let store = Arc::new(PoolStore::new(deps.kv));
        let time = deps.time;
        let pools = Arc::new(PoolManager::new(store.clone(), time.clone()));
        let submissions = Arc::new(SubmissionManager::new(store.clone(), time.clone()));
        let detector = Arc::new(MatchDetector::new(
            store.clone(),
            time.clone(),
            deps.attestor,
        ));
        let gates = Arc::new(GateEvaluator::new(deps.issuer, time.clone()));
        let psi = Arc::new(PsiService::new(store.clone(), time.clone()));
        let scheduler = Arc::new(Scheduler::new(
            pools.clone(),
            detector.clone(),
            SchedulerConfig {
                scan_interval: config.scan_interval,
                privacy_delay_ms: config.privacy_delay_ms,
            },
        ));
        Self {
            config,
            store,
            time,
            pools,
            submissions,
            detector,
            gates,
            psi,
            scheduler,
            federation: parking_lot::Mutex::new(None),
        }
    }

    /// An in-memory node with testing timings. Tests and demos.
    pub fn in_memory_for_testing() -> Self {
        Self::new(NodeConfig::for_testing(), NodeDeps::in_memory())
    }

    /// Start background work (deadline scheduler, federation ticker).
    pub fn serve(&self) {
        self.scheduler.start();
        if let Some(federation) = self.federation.lock().as_ref() {
            federation.start();
        }
        info!(data_dir = %self.config.data_dir.display(), "node serving");
    }

    /// Stop background work and release the store.
    pub fn close(&self) {
        self.scheduler.stop();
        if let Some(federation) = self.federation.lock().take() {
            federation.shutdown();
        }
        info!("node closed");
    }

    // =========================================================================
    // POOLS
    // =========================================================================

    /// Create a pool.
    pub fn create_pool(&self, request: CreatePoolRequest) -> Result<Pool, RendezvousError> {
        let pool = self.pools.create(request)?;
        if let Some(federation) = self.federation.lock().as_ref() {
            federation.announce_pool(self.federated_metadata(&pool, federation.local_id()));
        }
        Ok(pool)
    }

    /// Look up a pool.
    pub fn pool(&self, id: &PoolId) -> Result<Pool, RendezvousError> {
        self.pools.get(id)
    }

    /// All pools, or those matching one effective status.
    pub fn list_pools(&self, status: Option<PoolStatus>) -> Result<Vec<Pool>, RendezvousError> {
        match status {
            Some(status) => self.pools.list_by_effective_status(status),
            None => self.pools.list(),
        }
    }

    /// Owner-authenticated close. Detection still waits out the privacy
    /// delay.
    pub fn close_pool(&self, request: &SignedRequest) -> Result<Pool, RendezvousError> {
        let pool = self.pools.close_signed(request)?;
        self.scheduler.schedule(pool.id);
        Ok(pool)
    }

    /// The pool's effective status right now.
    pub fn effective_status(&self, id: &PoolId) -> Result<PoolStatus, RendezvousError> {
        let pool = self.pools.get(id)?;
        Ok(effective_status(&pool, self.time.now()))
    }

    // =========================================================================
    // PARTICIPANTS
    // =========================================================================

    /// Gate-check and register a participant.
    pub async fn register_participant(
        &self,
        request: RegisterRequest,
    ) -> Result<Participant, RendezvousError> {
        let pool = self.pools.get(&request.pool_id)?;
        if pool.is_closed() {
            return Err(RendezvousError::PoolClosed(pool.id));
        }
        if request.display_name.trim().is_empty() {
            return Err(RendezvousError::InvalidInput(
                "display name must not be empty".to_string(),
            ));
        }
        if !Participant::profile_within_bounds(&request.profile) {
            return Err(RendezvousError::InvalidInput(
                "profile fields exceed size bounds".to_string(),
            ));
        }

        let outcome = self
            .gates
            .evaluate(
                &pool.gate,
                &GateContext {
                    participant_key: Some(request.public_key),
                    token_proof: request.token_proof.clone(),
                    pool_id: Some(pool.id),
                },
            )
            .await;
        if !outcome.eligible {
            // Fail closed: an unreachable verifier is a transient service
            // error, not a denial the caller should treat as final.
            if outcome.reason == "verification_failed" {
                return Err(RendezvousError::ServiceUnavailable(
                    outcome.detail.unwrap_or(outcome.reason),
                ));
            }
            return Err(RendezvousError::InvalidEligibilityProof(outcome.reason));
        }

        let participant = Participant {
            pool_id: pool.id,
            public_key: request.public_key,
            display_name: request.display_name,
            bio: request.bio,
            profile: request.profile,
            registered_at: self.time.now(),
        };
        if !self.store.insert_participant_if_absent(&participant)? {
            return Err(RendezvousError::AlreadyRegistered);
        }
        Ok(participant)
    }

    /// One registration.
    pub fn participant(
        &self,
        pool_id: &PoolId,
        key: &AgreementPublicKey,
    ) -> Result<Participant, RendezvousError> {
        self.store
            .participant(pool_id, key)?
            .ok_or(RendezvousError::ParticipantNotFound)
    }

    /// All registrations in a pool.
    pub fn participants(&self, pool_id: &PoolId) -> Result<Vec<Participant>, RendezvousError> {
        self.pools.get(pool_id)?;
        Ok(self.store.participants(pool_id)?)
    }

    // =========================================================================
    // SUBMISSIONS
    // =========================================================================

    /// Submit a preference set.
    pub fn submit(&self, request: SubmitRequest) -> Result<SubmissionOutcome, RendezvousError> {
        self.submissions.submit(request)
    }

    /// Reveal committed tokens.
    pub fn reveal(
        &self,
        pool_id: &PoolId,
        tokens: &[MatchToken],
        nullifier: &Nullifier,
    ) -> Result<RevealOutcome, RendezvousError> {
        self.submissions.reveal(pool_id, tokens, nullifier)
    }

    // =========================================================================
    // MATCHES
    // =========================================================================

    /// Run (or fetch) match detection for a closed pool.
    pub async fn detect_matches(&self, pool_id: &PoolId) -> Result<MatchResult, RendezvousError> {
        let result = self.detector.detect(pool_id).await?;
        if let Some(federation) = self.federation.lock().as_ref() {
            federation.notify_result(*pool_id, result.matched_tokens.len() as u64);
        }
        Ok(result)
    }

    /// The stored result, if any.
    pub fn match_result(&self, pool_id: &PoolId) -> Result<Option<MatchResult>, RendezvousError> {
        self.detector.result(pool_id)
    }

    /// Pending / computing / complete.
    pub fn match_status(&self, pool_id: &PoolId) -> Result<MatchStatus, RendezvousError> {
        self.detector.status(pool_id)
    }

    /// Aggregate counters.
    pub fn match_stats(&self, pool_id: &PoolId) -> Result<MatchStats, RendezvousError> {
        self.detector.stats(pool_id)
    }

    /// Recount and audit the stored result.
    pub fn verify_match_integrity(
        &self,
        pool_id: &PoolId,
    ) -> Result<IntegrityReport, RendezvousError> {
        verify_integrity(&self.store, pool_id)
    }

    /// Local discovery against the stored result. The candidate keys are
    /// supplied by the caller and never persisted.
    pub fn discover_matches(
        &self,
        pool_id: &PoolId,
        my_keypair: &AgreementKeyPair,
        candidates: &[AgreementPublicKey],
    ) -> Result<Vec<AgreementPublicKey>, RendezvousError> {
        let result = self
            .detector
            .result(pool_id)?
            .ok_or_else(|| {
                RendezvousError::InvalidInput("matches not yet computed for this pool".to_string())
            })?;
        Ok(discover_matches(
            my_keypair,
            pool_id,
            candidates,
            &result.matched_tokens,
        ))
    }

    // =========================================================================
    // ELIGIBILITY / PSI / FEDERATION
    // =========================================================================

    /// Evaluate a pool's gate against a context.
    pub async fn check_eligibility(
        &self,
        pool_id: &PoolId,
        context: &GateContext,
    ) -> Result<rdv_pools::GateOutcome, RendezvousError> {
        let pool = self.pools.get(pool_id)?;
        Ok(self.gates.evaluate(&pool.gate, context).await)
    }

    /// The PSI service, for the outer PSI endpoints.
    pub fn psi(&self) -> &Arc<PsiService> {
        &self.psi
    }

    /// Direct store access for outer layers that persist adjacent state.
    pub fn store(&self) -> &Arc<PoolStore> {
        &self.store
    }

    /// Enable federation with this instance's identity and key.
    ///
    /// Returns the manager; attach peer transports to it and call
    /// [`RendezvousNode::serve`] (or `start` on the manager) afterwards.
    pub fn enable_federation(
        &self,
        instance_name: String,
        endpoint: String,
        agreement: AgreementKeyPair,
        authority: Arc<dyn TokenAuthority>,
        config: FederationConfig,
    ) -> Arc<FederationManager> {
        let local = InstanceRecord {
            id: InstanceId::generate(),
            name: instance_name,
            endpoint,
            public_key: agreement.public_key(),
        };
        let handler = Arc::new(NodeFederationHandler {
            store: self.store.clone(),
            pools: self.pools.clone(),
            submissions: self.submissions.clone(),
            gates: self.gates.clone(),
            time: self.time.clone(),
        });
        let manager = Arc::new(FederationManager::new(
            local,
            agreement,
            authority,
            handler,
            self.time.clone(),
            config,
        ));
        *self.federation.lock() = Some(manager.clone());
        manager
    }

    /// Attach an established peer stream to the federation layer.
    pub fn attach_peer(&self, transport: Arc<dyn PeerTransport>) -> Result<(), RendezvousError> {
        let guard = self.federation.lock();
        let federation = guard.as_ref().ok_or_else(|| {
            RendezvousError::InvalidInput("federation is not enabled".to_string())
        })?;
        federation.attach_peer(transport);
        Ok(())
    }

    fn federated_metadata(&self, pool: &Pool, owner: InstanceId) -> FederatedPoolMetadata {
        FederatedPoolMetadata {
            pool_id: pool.id,
            name: pool.name.clone(),
            description: pool.description.clone(),
            status: pool.status,
            commit_deadline: pool.commit_deadline,
            reveal_deadline: pool.reveal_deadline,
            owner_instance: owner,
            owner_key: pool.creator_key,
            requires_invite: pool.requires_invite,
        }
    }
}

/// Feeds verified anonymous federation messages into the local managers.
struct NodeFederationHandler {
    store: Arc<PoolStore>,
    pools: Arc<PoolManager>,
    submissions: Arc<SubmissionManager>,
    gates: Arc<GateEvaluator>,
    time: Arc<dyn TimeSource>,
}

#[async_trait]
impl FederationHandler for NodeFederationHandler {
    async fn handle_token_relay(
        &self,
        pool_id: PoolId,
        match_tokens: Vec<MatchToken>,
        nullifier: Nullifier,
    ) -> Result<(), RendezvousError> {
        self.submissions.submit(SubmitRequest {
            pool_id,
            tokens: match_tokens,
            commits: None,
            nullifier,
            reveal_data: vec![],
            issuance_proof: None,
        })?;
        Ok(())
    }

    async fn handle_join_request(
        &self,
        pool_id: PoolId,
        public_key: AgreementPublicKey,
        payload: JoinPayload,
    ) -> Result<(), RendezvousError> {
        let pool = self.pools.get(&pool_id)?;
        if pool.is_closed() {
            return Err(RendezvousError::PoolClosed(pool_id));
        }
        let outcome = self
            .gates
            .evaluate(
                &pool.gate,
                &GateContext {
                    participant_key: Some(public_key),
                    token_proof: payload.issuance_proof.clone(),
                    pool_id: Some(pool_id),
                },
            )
            .await;
        if !outcome.eligible {
            return Err(RendezvousError::InvalidEligibilityProof(outcome.reason));
        }
        let participant = Participant {
            pool_id,
            public_key,
            display_name: payload.display_name,
            bio: payload.bio,
            profile: BTreeMap::new(),
            registered_at: self.time.now(),
        };
        if !self.store.insert_participant_if_absent(&participant)? {
            return Err(RendezvousError::AlreadyRegistered);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdv_crypto::{derive_match_token, derive_nullifier};
    use rdv_types::Gate;

    fn open_pool_request(creator: &AgreementKeyPair, reveal_in_ms: u64) -> CreatePoolRequest {
        CreatePoolRequest {
            name: "facade pool".to_string(),
            description: None,
            creator_key: creator.public_key(),
            creator_signing_key: rdv_crypto::SigningKeyPair::generate().public_key(),
            commit_deadline: None,
            reveal_deadline: SystemTimeSource.now().plus_millis(reveal_in_ms),
            gate: Some(Gate::Open),
            max_preferences: None,
            ephemeral: false,
            requires_invite: false,
        }
    }

    #[tokio::test]
    async fn test_register_then_duplicate_fails() {
        let node = RendezvousNode::in_memory_for_testing();
        let creator = AgreementKeyPair::generate();
        let pool = node.create_pool(open_pool_request(&creator, 60_000)).unwrap();

        let alice = AgreementKeyPair::generate();
        let request = RegisterRequest {
            pool_id: pool.id,
            public_key: alice.public_key(),
            display_name: "alice".to_string(),
            bio: None,
            profile: BTreeMap::new(),
            token_proof: None,
        };
        node.register_participant(request.clone()).await.unwrap();
        let err = node.register_participant(request).await.unwrap_err();
        assert_eq!(err.code(), rdv_types::ErrorCode::AlreadyRegistered);
    }

    #[tokio::test]
    async fn test_allow_list_gate_blocks_strangers() {
        let node = RendezvousNode::in_memory_for_testing();
        let creator = AgreementKeyPair::generate();
        let mut request = open_pool_request(&creator, 60_000);
        request.gate = None; // defaults to allow-list{creator}
        let pool = node.create_pool(request).unwrap();

        let stranger = AgreementKeyPair::generate();
        let err = node
            .register_participant(RegisterRequest {
                pool_id: pool.id,
                public_key: stranger.public_key(),
                display_name: "mallory".to_string(),
                bio: None,
                profile: BTreeMap::new(),
                token_proof: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), rdv_types::ErrorCode::InvalidEligibilityProof);
    }

    #[tokio::test]
    async fn test_end_to_end_mutual_match_through_facade() {
        let node = RendezvousNode::in_memory_for_testing();
        let creator = AgreementKeyPair::generate();
        let pool = node.create_pool(open_pool_request(&creator, 150)).unwrap();

        let alice = AgreementKeyPair::generate();
        let bob = AgreementKeyPair::generate();

        node.submit(SubmitRequest {
            pool_id: pool.id,
            tokens: vec![derive_match_token(&alice, &bob.public_key(), &pool.id)],
            commits: None,
            nullifier: derive_nullifier(&alice, &pool.id),
            reveal_data: vec![],
            issuance_proof: None,
        })
        .unwrap();
        node.submit(SubmitRequest {
            pool_id: pool.id,
            tokens: vec![derive_match_token(&bob, &alice.public_key(), &pool.id)],
            commits: None,
            nullifier: derive_nullifier(&bob, &pool.id),
            reveal_data: vec![],
            issuance_proof: None,
        })
        .unwrap();

        node.serve();
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
        node.close();

        assert_eq!(node.match_status(&pool.id).unwrap(), MatchStatus::Complete);
        let found = node
            .discover_matches(&pool.id, &alice, &[bob.public_key()])
            .unwrap();
        assert_eq!(found, vec![bob.public_key()]);
        let report = node.verify_match_integrity(&pool.id).unwrap();
        assert!(report.ok);
    }
}
