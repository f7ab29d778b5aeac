//! End-to-end scheduler simulation.
//!
//! Drives the real scheduler against the scripted chain and recording
//! executor: ranking, window selection, cooldown fallback, the block
//! waits, and the deposit→withdrawal sequence all run for real — only
//! the chain and the signer are simulated.

use rust_decimal_macros::dec;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use epochbot::chain::wait::WaitOptions;
use epochbot::config::WindowConfig;
use epochbot::executor::StakeExecutor;
use epochbot::scheduler::Scheduler;
use epochbot::types::{BotError, CycleOutcome, StakeCall, Target};

use crate::mock_chain::{RecordingExecutor, ScriptedChain};

fn window() -> WindowConfig {
    WindowConfig {
        min_blocks_to_epoch: 2,
        max_blocks_to_epoch: 10,
        stake_lead_blocks: 3,
        unstake_lag_blocks: 1,
        cooldown_blocks: 100,
    }
}

fn fast_wait() -> WaitOptions {
    WaitOptions {
        poll_interval: Duration::from_millis(1),
        report_interval: 10,
    }
}

fn scheduler(
    chain: ScriptedChain,
    executor: Arc<RecordingExecutor>,
    targets: Vec<Target>,
) -> Scheduler {
    let exec: Arc<dyn StakeExecutor> = executor;
    Scheduler::new(
        Arc::new(chain),
        exec,
        targets,
        window(),
        fast_wait(),
        Arc::new(AtomicBool::new(false)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_full_cycle_stakes_then_unstakes() {
    // netuid 91, tempo 99: boundary at 1007 seen from height 1000, so the
    // deposit fires at 1004 and the withdrawal at 1008. The chain gains
    // one block per query.
    let chain = ScriptedChain::new(1000, &[(91, 99)]);
    let executor = Arc::new(RecordingExecutor::new());
    let mut sched = scheduler(chain, executor.clone(), vec![Target::new(91, dec!(0.5))]);

    let outcome = sched.run_once().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Completed { netuid: 91 });

    let calls = executor.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].call, StakeCall::AddStake);
    assert_eq!(calls[0].netuid, 91);
    assert_eq!(calls[0].amount_rao, 500_000_000);
    assert_eq!(calls[1].call, StakeCall::RemoveStake);
    assert_eq!(calls[1].amount_rao, 500_000_000);

    // Stamped with the height observed when the withdrawal wait returned
    assert_eq!(sched.targets()[0].last_processed, Some(1008));
}

#[tokio::test]
async fn test_prefers_closest_subnet_and_respects_cooldown() {
    // netuid 95 is 3 blocks from its boundary, netuid 91 is 7 blocks out,
    // but 95 was processed 50 blocks ago — the pass falls back to 91.
    let chain = ScriptedChain::new(1000, &[(95, 99), (91, 99)]);
    let executor = Arc::new(RecordingExecutor::new());

    let mut hot = Target::new(95, dec!(0.5));
    hot.mark_processed(950);
    let mut sched = scheduler(
        chain,
        executor.clone(),
        vec![hot, Target::new(91, dec!(1.0))],
    );

    let outcome = sched.run_once().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Completed { netuid: 91 });

    let calls = executor.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.netuid == 91));
    assert!(calls.iter().all(|c| c.amount_rao == 1_000_000_000));

    let targets = sched.targets();
    assert_eq!(targets[0].last_processed, Some(950));
    assert!(targets[1].last_processed.is_some());
}

#[tokio::test]
async fn test_no_target_near_boundary_is_a_quiet_pass() {
    // netuid 1, tempo 99 at height 1000: boundary 97 blocks out.
    let chain = ScriptedChain::new(1000, &[(1, 99)]);
    let executor = Arc::new(RecordingExecutor::new());
    let chain_ref = Arc::new(chain);

    let mut sched = Scheduler::new(
        chain_ref.clone(),
        executor.clone() as Arc<dyn StakeExecutor>,
        vec![Target::new(1, dec!(0.5))],
        window(),
        fast_wait(),
        Arc::new(AtomicBool::new(false)),
    )
    .unwrap();

    let outcome = sched.run_once().await.unwrap();
    assert_eq!(outcome, CycleOutcome::NoneInWindow);
    assert!(executor.calls().is_empty());
    // Ranking alone needs a single height reading
    assert_eq!(chain_ref.height_queries(), 1);
}

#[tokio::test]
async fn test_fast_chain_misses_window() {
    // Three blocks per query: by the time the cycle re-checks the chain it
    // is already past the stake trigger, so the pass aborts untouched.
    let chain = ScriptedChain::with_step(1000, 3, &[(91, 99)]);
    let executor = Arc::new(RecordingExecutor::new());
    let mut sched = scheduler(chain, executor.clone(), vec![Target::new(91, dec!(0.5))]);

    let outcome = sched.run_once().await.unwrap();
    assert_eq!(outcome, CycleOutcome::MissedWindow { netuid: 91 });
    assert!(executor.calls().is_empty());
    assert!(sched.targets()[0].last_processed.is_none());
}

#[tokio::test]
async fn test_failed_deposit_keeps_target_retryable() {
    let chain = ScriptedChain::new(1000, &[(91, 99)]);
    let executor = Arc::new(RecordingExecutor::new());
    executor.fail_deposits("signer rejected");

    let mut sched = scheduler(chain, executor.clone(), vec![Target::new(91, dec!(0.5))]);

    let err = sched.run_once().await.unwrap_err();
    assert!(matches!(err, BotError::ActionFailed { .. }));
    assert!(executor.calls().is_empty());
    assert!(sched.targets()[0].last_processed.is_none());
}

#[tokio::test]
async fn test_chain_outage_surfaces_as_error() {
    let chain = ScriptedChain::new(1000, &[(91, 99)]);
    chain.set_error("connection refused");
    let executor = Arc::new(RecordingExecutor::new());
    let mut sched = scheduler(chain, executor.clone(), vec![Target::new(91, dec!(0.5))]);

    let err = sched.run_once().await.unwrap_err();
    assert!(matches!(err, BotError::ChainUnavailable(_)));
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn test_second_pass_after_completion_goes_idle() {
    // After a completed cycle the boundary has rolled over a full interval,
    // so the immediate next pass finds nothing inside the window.
    let chain = ScriptedChain::new(1000, &[(91, 99)]);
    let executor = Arc::new(RecordingExecutor::new());
    let mut sched = scheduler(chain, executor.clone(), vec![Target::new(91, dec!(0.5))]);

    assert_eq!(
        sched.run_once().await.unwrap(),
        CycleOutcome::Completed { netuid: 91 }
    );
    assert_eq!(
        sched.run_once().await.unwrap(),
        CycleOutcome::NoneInWindow
    );
    // Still just the one deposit/withdrawal pair
    assert_eq!(executor.calls().len(), 2);
}
