//! Cross-subsystem protocol scenarios.

pub mod federation_flow;
pub mod matching_flows;
pub mod psi_flow;
