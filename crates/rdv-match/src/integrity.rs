//! Match-result integrity verification.
//!
//! Recounts the preference table and checks it against the stored result.
//! Violations are reported, never thrown: the caller decides what a
//! failed audit means.

use rdv_store::PoolStore;
use rdv_types::{IntegrityReport, PoolId, RendezvousError};

/// Recount and audit a pool's stored match result.
///
/// Checks:
/// - every matched token has a revealed count of exactly 2,
/// - no token anywhere has a count above 2,
/// - every token with count 2 appears in the matched list.
pub fn verify_integrity(store: &PoolStore, pool_id: &PoolId) -> Result<IntegrityReport, RendezvousError> {
    let Some(result) = store.match_result(pool_id)? else {
        let mut report = IntegrityReport::passing();
        report.push_error("no match result recorded for this pool");
        return Ok(report);
    };

    let counts = store.count_token_occurrences(pool_id)?;
    let mut report = IntegrityReport::passing();

    for token in &result.matched_tokens {
        match counts.get(token) {
            Some(2) => {}
            Some(count) => report.push_error(format!(
                "matched token {token} has count {count}, expected exactly 2"
            )),
            None => report.push_error(format!("matched token {token} has no revealed occurrences")),
        }
    }

    for (token, count) in &counts {
        if *count > 2 {
            report.push_error(format!("token {token} occurs {count} times (over-count)"));
        }
        if *count == 2 && !result.matched_tokens.contains(token) {
            report.push_error(format!("token {token} has count 2 but is missing from the result"));
        }
    }

    Ok(report)
}
