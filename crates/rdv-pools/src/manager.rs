//! Pool creation, lookup, and lifecycle transitions.

use crate::status::effective_status;
use rdv_crypto::verify_request;
use rdv_store::PoolStore;
use rdv_types::{
    Gate, Pool, PoolId, PoolStatus, RendezvousError, SignedRequest, TimeSource, Timestamp,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Maximum pool name length, in characters.
const MAX_NAME_CHARS: usize = 200;
/// Gate trees deeper than this are rejected at creation.
const MAX_GATE_DEPTH: usize = 16;

/// Validated inputs for creating a pool.
#[derive(Clone, Debug)]
pub struct CreatePoolRequest {
    /// Pool name. Non-empty, at most 200 characters.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Creator agreement key.
    pub creator_key: rdv_types::AgreementPublicKey,
    /// Creator signing key for administrative actions.
    pub creator_signing_key: rdv_types::SigningPublicKey,
    /// Optional commit-phase deadline.
    pub commit_deadline: Option<Timestamp>,
    /// Required reveal deadline.
    pub reveal_deadline: Timestamp,
    /// Eligibility gate; defaults to an allow-list holding the creator.
    pub gate: Option<Gate>,
    /// Optional cap on real tokens per participant.
    pub max_preferences: Option<u32>,
    /// Delete participant profiles after detection.
    pub ephemeral: bool,
    /// Require an invite proof to join.
    pub requires_invite: bool,
}

/// Creates pools and drives their lifecycle.
pub struct PoolManager {
    store: Arc<PoolStore>,
    time: Arc<dyn TimeSource>,
}

impl PoolManager {
    /// Create a manager over a store and a clock.
    pub fn new(store: Arc<PoolStore>, time: Arc<dyn TimeSource>) -> Self {
        Self { store, time }
    }

    /// Validate and persist a new pool.
    pub fn create(&self, request: CreatePoolRequest) -> Result<Pool, RendezvousError> {
        let now = self.time.now();
        validate_name(&request.name)?;
        validate_deadlines(request.commit_deadline, request.reveal_deadline, now)?;
        if let Some(max) = request.max_preferences {
            if max < 1 {
                return Err(RendezvousError::InvalidInput(
                    "max_preferences must be at least 1".to_string(),
                ));
            }
        }

        let gate = match request.gate {
            Some(gate) => {
                validate_gate(&gate)?;
                gate
            }
            None => Gate::AllowList {
                keys: vec![request.creator_key],
            },
        };

        let status = if request.commit_deadline.is_some() {
            PoolStatus::Commit
        } else {
            PoolStatus::Open
        };

        let pool = Pool {
            id: PoolId::generate(),
            name: request.name,
            description: request.description,
            creator_key: request.creator_key,
            creator_signing_key: request.creator_signing_key,
            commit_deadline: request.commit_deadline,
            reveal_deadline: request.reveal_deadline,
            gate,
            max_preferences: request.max_preferences,
            ephemeral: request.ephemeral,
            requires_invite: request.requires_invite,
            status,
            created_at: now,
            updated_at: now,
            psi_setup_id: None,
        };
        self.store.insert_pool(&pool)?;
        info!(pool_id = %pool.id, status = pool.status.as_str(), "pool created");
        Ok(pool)
    }

    /// Look up a pool or fail with POOL_NOT_FOUND.
    pub fn get(&self, id: &PoolId) -> Result<Pool, RendezvousError> {
        self.store
            .pool(id)?
            .ok_or(RendezvousError::PoolNotFound(*id))
    }

    /// All pools.
    pub fn list(&self) -> Result<Vec<Pool>, RendezvousError> {
        Ok(self.store.list_pools()?)
    }

    /// Pools whose effective status matches, regardless of stored lag.
    pub fn list_by_effective_status(
        &self,
        status: PoolStatus,
    ) -> Result<Vec<Pool>, RendezvousError> {
        let now = self.time.now();
        Ok(self
            .store
            .list_pools()?
            .into_iter()
            .filter(|p| effective_status(p, now) == status)
            .collect())
    }

    /// The pool's effective status right now.
    pub fn effective(&self, pool: &Pool) -> PoolStatus {
        effective_status(pool, self.time.now())
    }

    /// Persist the effective status if it diverges from the stored one.
    pub fn update_status(&self, id: &PoolId) -> Result<Pool, RendezvousError> {
        let mut pool = self.get(id)?;
        let effective = self.effective(&pool);
        if effective != pool.status {
            debug!(
                pool_id = %pool.id,
                from = pool.status.as_str(),
                to = effective.as_str(),
                "persisting status transition"
            );
            pool.status = effective;
            pool.updated_at = self.time.now();
            self.store.update_pool(&pool)?;
        }
        Ok(pool)
    }

    /// Force a pool closed (administrative / scheduler).
    pub fn close(&self, id: &PoolId) -> Result<Pool, RendezvousError> {
        let mut pool = self.get(id)?;
        if pool.status != PoolStatus::Closed {
            pool.status = PoolStatus::Closed;
            pool.updated_at = self.time.now();
            self.store.update_pool(&pool)?;
            info!(pool_id = %pool.id, "pool closed");
        }
        Ok(pool)
    }

    /// Owner-authenticated close: verifies the signed envelope and that
    /// the signer is the pool's creator signing key.
    pub fn close_signed(&self, request: &SignedRequest) -> Result<Pool, RendezvousError> {
        if request.action != "close_pool" {
            return Err(RendezvousError::InvalidInput(format!(
                "unexpected action {:?}",
                request.action
            )));
        }
        let pool = self.get(&request.pool_id)?;
        if request.signer != pool.creator_signing_key {
            return Err(RendezvousError::InvalidEligibilityProof(
                "signer is not the pool owner".to_string(),
            ));
        }
        verify_request(request, self.time.now())
            .map_err(|e| RendezvousError::InvalidEligibilityProof(e.to_string()))?;
        self.close(&request.pool_id)
    }
}

fn validate_name(name: &str) -> Result<(), RendezvousError> {
    if name.trim().is_empty() {
        return Err(RendezvousError::InvalidInput(
            "pool name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(RendezvousError::InvalidInput(format!(
            "pool name exceeds {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_deadlines(
    commit: Option<Timestamp>,
    reveal: Timestamp,
    now: Timestamp,
) -> Result<(), RendezvousError> {
    if reveal <= now {
        return Err(RendezvousError::InvalidInput(
            "reveal deadline must be in the future".to_string(),
        ));
    }
    if let Some(commit) = commit {
        if commit <= now {
            return Err(RendezvousError::InvalidInput(
                "commit deadline must be in the future".to_string(),
            ));
        }
        if commit >= reveal {
            return Err(RendezvousError::InvalidInput(
                "commit deadline must be strictly before the reveal deadline".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_gate(gate: &Gate) -> Result<(), RendezvousError> {
    if gate.depth() > MAX_GATE_DEPTH {
        return Err(RendezvousError::InvalidInput(format!(
            "gate tree deeper than {MAX_GATE_DEPTH}"
        )));
    }
    validate_gate_node(gate)
}

fn validate_gate_node(gate: &Gate) -> Result<(), RendezvousError> {
    match gate {
        Gate::Open => Ok(()),
        Gate::AllowList { keys } => {
            if keys.is_empty() {
                return Err(RendezvousError::InvalidInput(
                    "allow-list gate must not be empty".to_string(),
                ));
            }
            Ok(())
        }
        Gate::Token { issuer } => {
            if issuer.is_empty() {
                return Err(RendezvousError::InvalidInput(
                    "token gate requires an issuer".to_string(),
                ));
            }
            Ok(())
        }
        Gate::Composite { children, .. } => {
            if children.is_empty() {
                return Err(RendezvousError::InvalidInput(
                    "composite gate must have children".to_string(),
                ));
            }
            children.iter().try_for_each(validate_gate_node)
        }
    }
}
