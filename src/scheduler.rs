//! Target scheduler — the core state machine.
//!
//! Each pass: rank every configured subnet by proximity to its next epoch
//! boundary, pick the closest one whose window is reachable and whose
//! cooldown has lapsed, then drive the stake→unstake sequence through the
//! wait loop. One target at a time, strictly sequentially — while a cycle
//! is in flight no other target's window is evaluated, so a window that
//! opens meanwhile may be missed (known capacity limitation).
//!
//! Every transient failure surfaces as an error from `run_once` and is
//! handled at the cycle boundary by the caller; nothing here retries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::chain::wait::{wait_for_height, WaitOptions};
use crate::chain::{tempo_of, ChainClock};
use crate::config::WindowConfig;
use crate::epoch;
use crate::executor::StakeExecutor;
use crate::types::{
    to_rao, ActionWindow, BotError, CycleOutcome, EpochStanding, Target,
};

pub struct Scheduler {
    clock: Arc<dyn ChainClock>,
    executor: Arc<dyn StakeExecutor>,
    /// Owned exclusively by the scheduler; never shared with collaborators.
    targets: Vec<Target>,
    window: WindowConfig,
    wait: WaitOptions,
    /// Set externally on shutdown. Honoured before ranking and during the
    /// stake wait; once a deposit has been placed the cycle always runs
    /// through to the matching withdrawal.
    shutdown: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(
        clock: Arc<dyn ChainClock>,
        executor: Arc<dyn StakeExecutor>,
        targets: Vec<Target>,
        window: WindowConfig,
        wait: WaitOptions,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self, BotError> {
        if targets.is_empty() {
            return Err(BotError::Config("no targets configured".to_string()));
        }
        Ok(Self {
            clock,
            executor,
            targets,
            window,
            wait,
            shutdown,
        })
    }

    /// The target list with its per-target processing history.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// One full Idle→…→Idle scheduling pass.
    pub async fn run_once(&mut self) -> Result<CycleOutcome, BotError> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(BotError::Interrupted);
        }
        let ranked = self.rank_targets().await?;

        let eligible: Vec<&EpochStanding> = ranked
            .iter()
            .filter(|s| self.in_window(s.blocks_to_epoch))
            .collect();
        if eligible.is_empty() {
            info!("No subnet approaching its epoch within the window");
            return Ok(CycleOutcome::NoneInWindow);
        }

        // Fresh height for the cooldown decision — ranking may be stale by now.
        let current = self.clock.current_height().await?;
        let pick = eligible.iter().find(|s| {
            let cooling = self.is_cooling(s.netuid, current);
            if cooling {
                info!(netuid = s.netuid, "Recently processed, skipping");
            }
            !cooling
        });

        let pick = match pick {
            Some(s) => (*s).clone(),
            None => {
                return Ok(CycleOutcome::CoolingDown {
                    netuid: eligible[0].netuid,
                })
            }
        };

        info!(
            netuid = pick.netuid,
            blocks_to_epoch = pick.blocks_to_epoch,
            "Executing cycle for subnet"
        );
        match self.execute_cycle(&pick).await {
            Ok(()) => Ok(CycleOutcome::Completed { netuid: pick.netuid }),
            Err(BotError::WindowMissed {
                netuid,
                stake_at,
                current,
            }) => {
                warn!(netuid, stake_at, current, "Already past staking point");
                Ok(CycleOutcome::MissedWindow { netuid })
            }
            Err(e) => Err(e),
        }
    }

    /// Rank all targets by ascending distance to their next epoch boundary.
    ///
    /// One fresh height reading and one fresh tempo map per pass, shared by
    /// every target in the pass so the ranking is internally consistent.
    /// Targets whose tempo cannot be determined are skipped with a warning.
    async fn rank_targets(&self) -> Result<Vec<EpochStanding>, BotError> {
        let current = self.clock.current_height().await?;
        let tempos = self.clock.tempo_map().await?;

        let mut ranked = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let tempo = match tempo_of(&tempos, target.netuid) {
                Ok(t) => t,
                Err(e) => {
                    warn!(netuid = target.netuid, error = %e, "Skipping target");
                    continue;
                }
            };
            if tempo == 0 {
                warn!(netuid = target.netuid, "Tempo of zero on chain, skipping");
                continue;
            }

            let next_epoch = epoch::next_epoch(current, tempo, target.netuid);
            let standing = EpochStanding {
                netuid: target.netuid,
                stake_amount: target.stake_amount,
                tempo,
                next_epoch,
                blocks_to_epoch: next_epoch - current,
            };
            info!(%standing, "Ranked subnet");
            ranked.push(standing);
        }

        ranked.sort_by_key(|s| s.blocks_to_epoch);
        Ok(ranked)
    }

    /// The window must be reachable but not already upon us.
    fn in_window(&self, blocks_to_epoch: u64) -> bool {
        blocks_to_epoch >= self.window.min_blocks_to_epoch
            && blocks_to_epoch <= self.window.max_blocks_to_epoch
    }

    fn is_cooling(&self, netuid: u16, current: u64) -> bool {
        self.targets
            .iter()
            .find(|t| t.netuid == netuid)
            .is_some_and(|t| t.in_cooldown(current, self.window.cooldown_blocks))
    }

    /// Drive one stake→unstake sequence for the selected subnet.
    ///
    /// Recomputes the boundary from a fresh height first — the chain has
    /// advanced since ranking. `last_processed` is written only after the
    /// withdrawal lands; any failure before that leaves the target
    /// retryable on a later cycle.
    async fn execute_cycle(&mut self, pick: &EpochStanding) -> Result<(), BotError> {
        let current = self.clock.current_height().await?;
        let next_epoch = epoch::next_epoch(current, pick.tempo, pick.netuid);
        let window = ActionWindow::around(
            next_epoch,
            self.window.stake_lead_blocks,
            self.window.unstake_lag_blocks,
        );

        if current > window.stake_at {
            return Err(BotError::WindowMissed {
                netuid: pick.netuid,
                stake_at: window.stake_at,
                current,
            });
        }

        info!(
            netuid = pick.netuid,
            next_epoch,
            %window,
            "Window computed, waiting for stake trigger"
        );

        let amount_rao = to_rao(pick.stake_amount)?;

        let at_block = wait_for_height(
            &*self.clock,
            window.stake_at,
            &self.wait,
            &self.shutdown,
            "stake",
        )
        .await?;
        info!(
            netuid = pick.netuid,
            amount = %pick.stake_amount,
            amount_rao,
            block = at_block,
            "Staking"
        );
        let receipt = self.executor.add_stake(pick.netuid, amount_rao).await?;
        info!(%receipt, "Stake placed");

        // Stake is on the books now; this wait must run to completion even
        // if shutdown was requested, so it gets a flag that is never set.
        let no_cancel = AtomicBool::new(false);
        let settled = wait_for_height(
            &*self.clock,
            window.unstake_at,
            &self.wait,
            &no_cancel,
            "unstake",
        )
        .await?;
        info!(netuid = pick.netuid, amount_rao, block = settled, "Unstaking");
        let receipt = self.executor.remove_stake(pick.netuid, amount_rao).await?;
        info!(%receipt, "Stake removed");

        if let Some(target) = self.targets.iter_mut().find(|t| t.netuid == pick.netuid) {
            target.mark_processed(settled);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
