//! Mock chain and executor for integration testing.
//!
//! Provides a deterministic `ChainClock` whose height advances a fixed
//! number of blocks per query, and a `StakeExecutor` that records every
//! extrinsic it is asked to submit — all in-memory with no external
//! dependencies.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use epochbot::chain::ChainClock;
use epochbot::executor::StakeExecutor;
use epochbot::types::{BlockHeight, BotError, StakeCall, StakeReceipt, Tempo};

/// A chain whose height advances `step` blocks on every query.
///
/// The tempo map is fixed at construction. A forced error, when set,
/// makes both queries fail until cleared.
pub struct ScriptedChain {
    start: BlockHeight,
    step: u64,
    queries: AtomicU64,
    tempos: HashMap<u16, Tempo>,
    force_error: Mutex<Option<String>>,
}

impl ScriptedChain {
    /// One block per query — the usual cadence for wait-loop tests.
    pub fn new(start: BlockHeight, tempos: &[(u16, Tempo)]) -> Self {
        Self::with_step(start, 1, tempos)
    }

    /// Custom blocks-per-query, for simulating a chain that outpaces
    /// the scheduler.
    pub fn with_step(start: BlockHeight, step: u64, tempos: &[(u16, Tempo)]) -> Self {
        Self {
            start,
            step,
            queries: AtomicU64::new(0),
            tempos: tempos.iter().copied().collect(),
            force_error: Mutex::new(None),
        }
    }

    /// Force all subsequent queries to fail.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Clear any forced error.
    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    /// Number of height queries observed so far.
    pub fn height_queries(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    fn check_error(&self) -> Result<(), BotError> {
        if let Some(msg) = self.force_error.lock().unwrap().as_ref() {
            return Err(BotError::ChainUnavailable(msg.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClock for ScriptedChain {
    async fn current_height(&self) -> Result<BlockHeight, BotError> {
        self.check_error()?;
        let n = self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.start + n * self.step)
    }

    async fn tempo_map(&self) -> Result<HashMap<u16, Tempo>, BotError> {
        self.check_error()?;
        Ok(self.tempos.clone())
    }
}

/// One extrinsic the executor was asked to submit, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub call: StakeCall,
    pub netuid: u16,
    pub amount_rao: u64,
}

/// Records extrinsics instead of submitting them, with an optional
/// forced failure for the next deposit.
pub struct RecordingExecutor {
    calls: Mutex<Vec<RecordedCall>>,
    fail_add: Mutex<Option<String>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_add: Mutex::new(None),
        }
    }

    /// Make every subsequent `add_stake` fail with this message.
    pub fn fail_deposits(&self, msg: &str) {
        *self.fail_add.lock().unwrap() = Some(msg.to_string());
    }

    /// All extrinsics recorded so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: StakeCall, netuid: u16, amount_rao: u64) -> StakeReceipt {
        self.calls.lock().unwrap().push(RecordedCall {
            call,
            netuid,
            amount_rao,
        });
        StakeReceipt {
            extrinsic_id: format!("sim-{}", Uuid::new_v4()),
            call,
            netuid,
            amount_rao,
            block_observed: None,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
impl StakeExecutor for RecordingExecutor {
    async fn add_stake(&self, netuid: u16, amount_rao: u64) -> Result<StakeReceipt, BotError> {
        if let Some(msg) = self.fail_add.lock().unwrap().as_ref() {
            return Err(BotError::ActionFailed {
                call: StakeCall::AddStake,
                netuid,
                message: msg.clone(),
            });
        }
        Ok(self.record(StakeCall::AddStake, netuid, amount_rao))
    }

    async fn remove_stake(&self, netuid: u16, amount_rao: u64) -> Result<StakeReceipt, BotError> {
        Ok(self.record(StakeCall::RemoveStake, netuid, amount_rao))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_chain_advances_per_query() {
        let chain = ScriptedChain::new(1000, &[(8, 99)]);
        assert_eq!(chain.current_height().await.unwrap(), 1000);
        assert_eq!(chain.current_height().await.unwrap(), 1001);
        assert_eq!(chain.current_height().await.unwrap(), 1002);
        assert_eq!(chain.height_queries(), 3);
    }

    #[tokio::test]
    async fn test_scripted_chain_custom_step() {
        let chain = ScriptedChain::with_step(500, 3, &[]);
        assert_eq!(chain.current_height().await.unwrap(), 500);
        assert_eq!(chain.current_height().await.unwrap(), 503);
    }

    #[tokio::test]
    async fn test_scripted_chain_tempo_map() {
        let chain = ScriptedChain::new(0, &[(8, 99), (19, 360)]);
        let tempos = chain.tempo_map().await.unwrap();
        assert_eq!(tempos.get(&8), Some(&99));
        assert_eq!(tempos.get(&19), Some(&360));
        assert_eq!(tempos.len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_chain_forced_error() {
        let chain = ScriptedChain::new(1000, &[(8, 99)]);
        chain.set_error("simulated node outage");

        assert!(chain.current_height().await.is_err());
        assert!(chain.tempo_map().await.is_err());

        chain.clear_error();
        assert!(chain.current_height().await.is_ok());
    }

    #[tokio::test]
    async fn test_recording_executor_tracks_calls() {
        let exec = RecordingExecutor::new();
        exec.add_stake(8, 500_000_000).await.unwrap();
        exec.remove_stake(8, 500_000_000).await.unwrap();

        let calls = exec.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].call, StakeCall::AddStake);
        assert_eq!(calls[1].call, StakeCall::RemoveStake);
        assert_eq!(calls[0].netuid, 8);
    }

    #[tokio::test]
    async fn test_recording_executor_forced_deposit_failure() {
        let exec = RecordingExecutor::new();
        exec.fail_deposits("signer rejected");

        let err = exec.add_stake(8, 1).await.unwrap_err();
        assert!(matches!(err, BotError::ActionFailed { .. }));
        assert!(exec.calls().is_empty());
    }
}
