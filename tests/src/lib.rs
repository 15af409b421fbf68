//! # Rendezvous Test Suite
//!
//! Unified test crate containing the cross-subsystem scenarios:
//!
//! ```text
//! tests/src/
//! ├── support.rs        # Controllable clock, fixtures
//! └── integration/      # End-to-end protocol scenarios
//!     ├── matching_flows.rs   # mutual, unilateral, triangle, large pool,
//!     │                       # commit–reveal
//!     ├── psi_flow.rs         # owner-held-key pipeline
//!     └── federation_flow.rs  # CRDT sync + anonymous join/relay
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p rdv-tests
//! cargo test -p rdv-tests integration::
//! ```

#![allow(dead_code)]

pub mod integration;
pub mod support;
