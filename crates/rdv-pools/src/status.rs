//! Effective lifecycle status.
//!
//! ```text
//! closed  if stored == Closed or now >= reveal_deadline
//! reveal  if commit_deadline set and commit_deadline <= now < reveal_deadline
//! commit  if commit_deadline set and now < commit_deadline
//! open    otherwise
//! ```

use rdv_types::{Pool, PoolStatus, Timestamp};

/// Compute the pool's effective status at `now`. Pure.
pub fn effective_status(pool: &Pool, now: Timestamp) -> PoolStatus {
    if pool.status == PoolStatus::Closed || now >= pool.reveal_deadline {
        return PoolStatus::Closed;
    }
    match pool.commit_deadline {
        Some(commit) if now < commit => PoolStatus::Commit,
        Some(_) => PoolStatus::Reveal,
        None => PoolStatus::Open,
    }
}

/// Commits are accepted only during the commit phase.
pub fn accepts_commits(pool: &Pool, now: Timestamp) -> bool {
    effective_status(pool, now) == PoolStatus::Commit
}

/// Reveals (and direct submissions) are accepted while open or revealing.
pub fn accepts_reveals(pool: &Pool, now: Timestamp) -> bool {
    matches!(
        effective_status(pool, now),
        PoolStatus::Open | PoolStatus::Reveal
    )
}
