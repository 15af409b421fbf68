//! Eligibility gate evaluation.
//!
//! Gates are a sum type ([`rdv_types::Gate`]); this module provides the
//! single evaluator that dispatches by tag. A "no" is a [`GateOutcome`]
//! with `eligible = false`, never an error.
//!
//! Token proofs are verified once, up front, before per-node evaluation,
//! so a composite containing several token gates costs one verifier
//! round-trip. Fail-closed: an unreachable verifier makes every token
//! gate report "verification failed" rather than passing anyone through.

use rdv_types::{
    AgreementPublicKey, Gate, GateOp, PoolId, TimeSource, TokenAuthority, TokenProof,
};
use std::sync::Arc;
use tracing::warn;

/// Clock-skew allowance applied to proof expirations, in milliseconds.
const PROOF_SKEW_MS: u64 = 5 * 60 * 1_000;

/// Evaluation context: who is asking, with what proof, for which pool.
#[derive(Clone, Debug, Default)]
pub struct GateContext {
    /// The participant's agreement key, when known.
    pub participant_key: Option<AgreementPublicKey>,
    /// An unlinkable-token proof, when supplied.
    pub token_proof: Option<TokenProof>,
    /// The pool being evaluated, for logging only.
    pub pool_id: Option<PoolId>,
}

/// Result of evaluating a gate tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GateOutcome {
    /// Whether the context passes the gate.
    pub eligible: bool,
    /// Short machine-friendly reason, e.g. `"not_on_allow_list"`.
    pub reason: String,
    /// Optional human detail.
    pub detail: Option<String>,
}

impl GateOutcome {
    fn pass(reason: &str) -> Self {
        Self {
            eligible: true,
            reason: reason.to_string(),
            detail: None,
        }
    }

    fn fail(reason: &str) -> Self {
        Self {
            eligible: false,
            reason: reason.to_string(),
            detail: None,
        }
    }

    fn fail_with(reason: &str, detail: impl Into<String>) -> Self {
        Self {
            eligible: false,
            reason: reason.to_string(),
            detail: Some(detail.into()),
        }
    }
}

/// Outcome of the single up-front proof verification.
enum ProofCheck {
    Valid,
    Invalid(String),
    /// Verifier unreachable; token gates fail closed.
    Unavailable(String),
}

/// Evaluates gate trees against contexts.
pub struct GateEvaluator {
    verifier: Option<Arc<dyn TokenAuthority>>,
    time: Arc<dyn TimeSource>,
}

impl GateEvaluator {
    /// Create an evaluator. Without a verifier, every token gate fails
    /// closed.
    pub fn new(verifier: Option<Arc<dyn TokenAuthority>>, time: Arc<dyn TimeSource>) -> Self {
        Self { verifier, time }
    }

    /// Evaluate a gate tree against a context.
    pub async fn evaluate(&self, gate: &Gate, ctx: &GateContext) -> GateOutcome {
        // Pre-verify: one round-trip regardless of tree shape.
        let proof_check = match &ctx.token_proof {
            Some(proof) => Some(self.check_proof(proof).await),
            None => None,
        };
        self.eval_node(gate, ctx, proof_check.as_ref())
    }

    async fn check_proof(&self, proof: &TokenProof) -> ProofCheck {
        if proof.is_expired(self.time.now(), PROOF_SKEW_MS) {
            return ProofCheck::Invalid("proof expired".to_string());
        }
        let Some(verifier) = &self.verifier else {
            return ProofCheck::Unavailable("no verifier configured".to_string());
        };
        match verifier.verify(proof).await {
            Ok(true) => ProofCheck::Valid,
            Ok(false) => ProofCheck::Invalid("verifier rejected proof".to_string()),
            Err(err) => {
                warn!(error = %err, "token verifier unreachable; failing closed");
                ProofCheck::Unavailable(err.to_string())
            }
        }
    }

    fn eval_node(
        &self,
        gate: &Gate,
        ctx: &GateContext,
        proof_check: Option<&ProofCheck>,
    ) -> GateOutcome {
        match gate {
            Gate::Open => GateOutcome::pass("open"),

            Gate::AllowList { keys } => match &ctx.participant_key {
                Some(key) if keys.contains(key) => GateOutcome::pass("allow_list"),
                Some(_) => GateOutcome::fail("not_on_allow_list"),
                None => GateOutcome::fail("participant_key_required"),
            },

            Gate::Token { issuer } => {
                let Some(proof) = &ctx.token_proof else {
                    return GateOutcome::fail("token_proof_required");
                };
                if &proof.issuer != issuer {
                    return GateOutcome::fail_with(
                        "wrong_issuer",
                        format!("expected {issuer}, proof names {}", proof.issuer),
                    );
                }
                match proof_check {
                    Some(ProofCheck::Valid) => GateOutcome::pass("token"),
                    Some(ProofCheck::Invalid(detail)) => {
                        GateOutcome::fail_with("invalid_proof", detail.clone())
                    }
                    Some(ProofCheck::Unavailable(detail)) => {
                        GateOutcome::fail_with("verification_failed", detail.clone())
                    }
                    None => GateOutcome::fail("token_proof_required"),
                }
            }

            Gate::Composite { op, children } => {
                if children.is_empty() {
                    return GateOutcome::fail("empty_composite");
                }
                match op {
                    GateOp::And => {
                        for child in children {
                            let outcome = self.eval_node(child, ctx, proof_check);
                            if !outcome.eligible {
                                return outcome;
                            }
                        }
                        GateOutcome::pass("all_of")
                    }
                    GateOp::Or => {
                        let mut last = GateOutcome::fail("none_of");
                        for child in children {
                            let outcome = self.eval_node(child, ctx, proof_check);
                            if outcome.eligible {
                                return outcome;
                            }
                            last = outcome;
                        }
                        last
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rdv_types::{AdapterError, SystemTimeSource, Timestamp};

    struct FixedVerifier {
        answer: Result<bool, ()>,
    }

    #[async_trait]
    impl TokenAuthority for FixedVerifier {
        async fn verify(&self, _proof: &TokenProof) -> Result<bool, AdapterError> {
            self.answer
                .map_err(|_| AdapterError::Unreachable("verifier down".to_string()))
        }

        async fn request_token(&self, _scope: &str) -> Result<TokenProof, AdapterError> {
            Err(AdapterError::Protocol("not an issuer".to_string()))
        }
    }

    fn evaluator(answer: Result<bool, ()>) -> GateEvaluator {
        GateEvaluator::new(
            Some(Arc::new(FixedVerifier { answer })),
            Arc::new(SystemTimeSource),
        )
    }

    fn proof(issuer: &str) -> TokenProof {
        TokenProof {
            issuer: issuer.to_string(),
            expires_at: SystemTimeSource.now().plus_millis(60_000),
            body: vec![1],
        }
    }

    fn key(byte: u8) -> AgreementPublicKey {
        AgreementPublicKey::from_bytes([byte; 32])
    }

    #[tokio::test]
    async fn test_open_gate_always_passes() {
        let outcome = evaluator(Ok(true))
            .evaluate(&Gate::Open, &GateContext::default())
            .await;
        assert!(outcome.eligible);
    }

    #[tokio::test]
    async fn test_allow_list() {
        let gate = Gate::AllowList {
            keys: vec![key(1), key(2)],
        };
        let eval = evaluator(Ok(true));

        let on_list = GateContext {
            participant_key: Some(key(1)),
            ..Default::default()
        };
        assert!(eval.evaluate(&gate, &on_list).await.eligible);

        let off_list = GateContext {
            participant_key: Some(key(9)),
            ..Default::default()
        };
        let outcome = eval.evaluate(&gate, &off_list).await;
        assert!(!outcome.eligible);
        assert_eq!(outcome.reason, "not_on_allow_list");

        assert!(!eval.evaluate(&gate, &GateContext::default()).await.eligible);
    }

    #[tokio::test]
    async fn test_token_gate_happy_path() {
        let gate = Gate::Token {
            issuer: "issuer-a".to_string(),
        };
        let ctx = GateContext {
            token_proof: Some(proof("issuer-a")),
            ..Default::default()
        };
        assert!(evaluator(Ok(true)).evaluate(&gate, &ctx).await.eligible);
    }

    #[tokio::test]
    async fn test_token_gate_wrong_issuer() {
        let gate = Gate::Token {
            issuer: "issuer-a".to_string(),
        };
        let ctx = GateContext {
            token_proof: Some(proof("issuer-b")),
            ..Default::default()
        };
        let outcome = evaluator(Ok(true)).evaluate(&gate, &ctx).await;
        assert!(!outcome.eligible);
        assert_eq!(outcome.reason, "wrong_issuer");
    }

    #[tokio::test]
    async fn test_token_gate_expired_proof() {
        let gate = Gate::Token {
            issuer: "issuer-a".to_string(),
        };
        let stale = TokenProof {
            issuer: "issuer-a".to_string(),
            // Past even the 5-minute skew allowance.
            expires_at: Timestamp::from_millis(0),
            body: vec![1],
        };
        let ctx = GateContext {
            token_proof: Some(stale),
            ..Default::default()
        };
        let outcome = evaluator(Ok(true)).evaluate(&gate, &ctx).await;
        assert!(!outcome.eligible);
        assert_eq!(outcome.reason, "invalid_proof");
    }

    #[tokio::test]
    async fn test_token_gate_fails_closed_when_verifier_down() {
        let gate = Gate::Token {
            issuer: "issuer-a".to_string(),
        };
        let ctx = GateContext {
            token_proof: Some(proof("issuer-a")),
            ..Default::default()
        };
        let outcome = evaluator(Err(())).evaluate(&gate, &ctx).await;
        assert!(!outcome.eligible);
        assert_eq!(outcome.reason, "verification_failed");
    }

    #[tokio::test]
    async fn test_composite_truth_table() {
        let eval = evaluator(Ok(true));
        let ctx = GateContext {
            participant_key: Some(key(1)),
            ..Default::default()
        };
        let pass = || Gate::AllowList { keys: vec![key(1)] };
        let fail = || Gate::AllowList { keys: vec![key(2)] };

        let and = |children| Gate::Composite {
            op: GateOp::And,
            children,
        };
        let or = |children| Gate::Composite {
            op: GateOp::Or,
            children,
        };

        assert!(!eval.evaluate(&and(vec![pass(), pass(), fail()]), &ctx).await.eligible);
        assert!(eval.evaluate(&and(vec![pass(), pass()]), &ctx).await.eligible);
        assert!(eval.evaluate(&or(vec![fail(), pass()]), &ctx).await.eligible);
        assert!(!eval.evaluate(&or(vec![fail(), fail()]), &ctx).await.eligible);
        assert!(!eval.evaluate(&and(vec![]), &ctx).await.eligible);
        assert!(!eval.evaluate(&or(vec![]), &ctx).await.eligible);
    }
}
