//! # Submission Subsystem
//!
//! Validates submissions, enforces nullifier uniqueness and preference
//! limits, injects decoy padding, stores commitments or direct tokens,
//! and matches reveals to commitments.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | One preference set per (pool, nullifier) | store insert-if-absent; retries observe DUPLICATE_NULLIFIER |
//! | Real-token count within the pool limit | `manager.rs` `submit()`; decoys exempt |
//! | Every accepted submission gains 3..=8 decoys | `decoy.rs` |
//! | Decoys indistinguishable in storage | same record shape, same phase flags |
//! | A reveal token is consumed by exactly one commitment | `manager.rs` `reveal()` |
//!
//! ## Threat-model caveats
//!
//! A commit-phase client may omit its commit hashes, in which case the
//! server recomputes them from the submitted tokens. This keeps wire
//! compatibility but means an adversarial server sees the token before
//! the reveal phase; clients wanting the full commit-reveal guarantee
//! must supply their own hashes over blinded values.
//!
//! Decoys auto-reveal by self-verifying the stored token against its own
//! commitment. A decoy could only shadow a real reveal if a random
//! 32-byte decoy token collided with a token a caller later reveals; with
//! n tokens in a pool the probability is bounded by n²·2⁻²⁵⁶.

pub mod decoy;
pub mod manager;

pub use decoy::{DECOY_MAX, DECOY_MIN};
pub use manager::{RevealEntry, RevealOutcome, SubmissionManager, SubmissionOutcome, SubmitRequest};
