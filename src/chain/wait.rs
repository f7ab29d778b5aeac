//! Block-height wait loop.
//!
//! Cooperative suspension until the chain reaches a trigger height. The
//! loop blocks indefinitely — no backoff, no maximum wait — and checks a
//! cancellation flag between poll iterations: an in-flight height query is
//! never interrupted, only the next iteration is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

use super::ChainClock;
use crate::types::{BlockHeight, BotError};

/// Polling and reporting cadence for a wait.
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    /// Minimum spacing between two height queries.
    pub poll_interval: Duration,
    /// Emit a progress line each time the height advances this many blocks.
    pub report_interval: u64,
}

/// Suspend until the chain height reaches `target`, or `cancel` is set.
///
/// Returns the first observed height `>= target` — the caller acts on that
/// reading, which may already be past the trigger if the chain outpaced the
/// poll. The sleep sits between queries, so two round-trips are never
/// closer than `poll_interval`.
pub async fn wait_for_height(
    clock: &dyn ChainClock,
    target: BlockHeight,
    opts: &WaitOptions,
    cancel: &AtomicBool,
    label: &str,
) -> Result<BlockHeight, BotError> {
    if cancel.load(Ordering::SeqCst) {
        return Err(BotError::Interrupted);
    }

    let mut current = clock.current_height().await?;
    if current >= target {
        return Ok(current);
    }

    info!(
        label,
        current_block = current,
        target_block = target,
        remaining = target - current,
        "Waiting for block height"
    );

    let mut last_reported = current;
    loop {
        tokio::time::sleep(opts.poll_interval).await;
        if cancel.load(Ordering::SeqCst) {
            return Err(BotError::Interrupted);
        }
        current = clock.current_height().await?;
        if current >= target {
            return Ok(current);
        }
        if current.saturating_sub(last_reported) >= opts.report_interval {
            last_reported = current;
            info!(
                label,
                current_block = current,
                target_block = target,
                remaining = target - current,
                "Still waiting"
            );
        }
    }
}
