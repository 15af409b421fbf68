//! # Private Set Intersection Subsystem
//!
//! Wraps a Diffie–Hellman PSI primitive (ristretto255) with two pathways:
//!
//! - **Owner-held key** (the designed core): the server key needed to
//!   process queries is sealed to the pool owner at setup time. Client
//!   requests queue; the owner polls under a signed envelope, decrypts
//!   the key locally, processes, and posts responses; clients poll for
//!   responses and intersect locally. The server never sees a client's
//!   plaintext input set and cannot run the protocol itself.
//! - **Trivial** (optional): plaintext intersection against the pool's
//!   revealed token set via occurrence counting.
//!
//! ## Protocol
//!
//! ```text
//! setup:    S = { H(x)^k : x ∈ server set }          (k = server key)
//! request:  C = { H(y)^r : y ∈ client set }          (r = client blind)
//! response: R = { c^k    : c ∈ C }                   (order preserved)
//! finish:   y matched  ⇔  R[i]^(1/r) ∈ S
//! ```
//!
//! The `{setup-message, sealed-server-key, client-request,
//! server-response}` shapes are fixed wire contracts; the group arithmetic
//! behind them is an implementation detail.

pub mod primitive;
pub mod service;

pub use primitive::{
    client_intersect, client_request, process_request, server_setup, ClientRequest, ClientSession,
    PsiError, ServerKey, ServerResponse, SetupMessage,
};
pub use service::{PsiBatchOutcome, PsiService};
