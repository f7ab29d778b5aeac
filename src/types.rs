//! Shared types for the epochbot scheduler.
//!
//! These types form the data model used across all modules: block heights,
//! subnet targets, derived epoch standings, action windows, and the error
//! taxonomy. Chain and executor modules depend on them without circular
//! references.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A block number as observed from the chain. Monotonically non-decreasing;
/// always freshly queried, never owned or advanced by the scheduler.
pub type BlockHeight = u64;

/// Epoch length of a subnet in blocks, as stored on-chain.
pub type Tempo = u16;

/// Smallest on-chain unit: 1 TAO = 10^9 RAO.
pub const RAO_PER_TAO: u64 = 1_000_000_000;

// ---------------------------------------------------------------------------
// Amount conversion
// ---------------------------------------------------------------------------

/// Convert a decimal TAO amount to integer RAO.
///
/// Fractions below one RAO truncate toward zero. Negative or absurdly large
/// amounts are rejected rather than wrapped.
pub fn to_rao(amount: Decimal) -> Result<u64, BotError> {
    if amount.is_sign_negative() {
        return Err(BotError::Config(format!(
            "stake amount must be non-negative, got {amount}"
        )));
    }
    let rao = amount
        .checked_mul(Decimal::from(RAO_PER_TAO))
        .ok_or_else(|| {
            BotError::Config(format!("stake amount {amount} TAO does not fit in u64 RAO"))
        })?
        .trunc();
    rao.to_u64().ok_or_else(|| {
        BotError::Config(format!("stake amount {amount} TAO does not fit in u64 RAO"))
    })
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// A subnet the bot stakes and unstakes around each epoch boundary.
///
/// Built from static configuration at startup; `last_processed` is the only
/// mutable field and is written exclusively by the scheduler after a
/// completed stake+unstake cycle. It is in-memory only — a restart forgets
/// cooldown history.
#[derive(Debug, Clone)]
pub struct Target {
    pub netuid: u16,
    /// Amount to move per cycle, in TAO.
    pub stake_amount: Decimal,
    /// Height observed after the last completed cycle, if any.
    pub last_processed: Option<BlockHeight>,
}

impl Target {
    pub fn new(netuid: u16, stake_amount: Decimal) -> Self {
        Self {
            netuid,
            stake_amount,
            last_processed: None,
        }
    }

    /// Whether this target was processed too recently to act on again.
    ///
    /// Guards against re-triggering inside the same or an adjacent epoch due
    /// to polling jitter. A target processed at height H becomes eligible
    /// again at exactly `H + cooldown_blocks`.
    pub fn in_cooldown(&self, current: BlockHeight, cooldown_blocks: u64) -> bool {
        match self.last_processed {
            Some(last) => current.saturating_sub(last) < cooldown_blocks,
            None => false,
        }
    }

    /// Record a completed cycle at the given height.
    pub fn mark_processed(&mut self, height: BlockHeight) {
        self.last_processed = Some(height);
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last_processed {
            Some(h) => write!(
                f,
                "netuid {} ({} TAO, last processed at {})",
                self.netuid, self.stake_amount, h
            ),
            None => write!(f, "netuid {} ({} TAO)", self.netuid, self.stake_amount),
        }
    }
}

// ---------------------------------------------------------------------------
// Derived scheduling values
// ---------------------------------------------------------------------------

/// One row of a ranking pass: a target together with its freshly computed
/// epoch standing. Recomputed every cycle — height and tempo may both have
/// changed since the last pass, so nothing here is ever cached.
#[derive(Debug, Clone)]
pub struct EpochStanding {
    pub netuid: u16,
    pub stake_amount: Decimal,
    pub tempo: Tempo,
    pub next_epoch: BlockHeight,
    pub blocks_to_epoch: u64,
}

impl fmt::Display for EpochStanding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "netuid {}: next epoch at block {} ({} blocks away, tempo {})",
            self.netuid, self.next_epoch, self.blocks_to_epoch, self.tempo
        )
    }
}

/// The pair of trigger heights bracketing an epoch boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionWindow {
    /// Height at which the deposit fires (before the boundary).
    pub stake_at: BlockHeight,
    /// Height at which the withdrawal fires (after the boundary).
    pub unstake_at: BlockHeight,
}

impl ActionWindow {
    /// Derive the window around an epoch boundary with the configured
    /// stake-lead and unstake-lag offsets.
    pub fn around(next_epoch: BlockHeight, stake_lead: u64, unstake_lag: u64) -> Self {
        Self {
            stake_at: next_epoch.saturating_sub(stake_lead),
            unstake_at: next_epoch + unstake_lag,
        }
    }
}

impl fmt::Display for ActionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stake at {}, unstake at {}", self.stake_at, self.unstake_at)
    }
}

// ---------------------------------------------------------------------------
// Executor types
// ---------------------------------------------------------------------------

/// Which of the two staking calls an executor performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeCall {
    AddStake,
    RemoveStake,
}

impl fmt::Display for StakeCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakeCall::AddStake => write!(f, "add_stake"),
            StakeCall::RemoveStake => write!(f, "remove_stake"),
        }
    }
}

/// Receipt returned after an executor call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeReceipt {
    pub extrinsic_id: String,
    pub call: StakeCall,
    pub netuid: u16,
    pub amount_rao: u64,
    /// Block the submitter observed the extrinsic in, when known.
    pub block_observed: Option<BlockHeight>,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for StakeReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} netuid {} amount {} RAO [{}]",
            self.call, self.netuid, self.amount_rao, self.extrinsic_id,
        )
    }
}

// ---------------------------------------------------------------------------
// Cycle outcome
// ---------------------------------------------------------------------------

/// What a single scheduling pass ended with. Drives the inter-cycle sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Stake and unstake both completed for this target.
    Completed { netuid: u16 },
    /// No target's epoch falls inside the eligibility window right now.
    NoneInWindow,
    /// Every target inside the window was processed too recently.
    CoolingDown { netuid: u16 },
    /// The selected target's stake trigger passed before we could act.
    MissedWindow { netuid: u16 },
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Completed { netuid } => write!(f, "completed netuid {netuid}"),
            CycleOutcome::NoneInWindow => write!(f, "no target in window"),
            CycleOutcome::CoolingDown { netuid } => write!(f, "netuid {netuid} cooling down"),
            CycleOutcome::MissedWindow { netuid } => {
                write!(f, "stake window missed for netuid {netuid}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error taxonomy.
///
/// Everything except `Config` is recoverable at the cycle boundary: the main
/// loop logs it and sleeps before the next pass. `Config` errors are fatal
/// at startup only.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Transport failure talking to the chain — retry after backoff.
    #[error("Chain unavailable: {0}")]
    ChainUnavailable(String),

    /// The netuid is absent from the queried tempo map — skip target, continue.
    #[error("Tempo not found for netuid {0}")]
    TempoNotFound(u16),

    /// The action point passed before we could act — abort the cycle with no
    /// partial action taken.
    #[error("Stake window missed for netuid {netuid}: trigger was block {stake_at}, current block {current}")]
    WindowMissed {
        netuid: u16,
        stake_at: BlockHeight,
        current: BlockHeight,
    },

    /// A deposit or withdrawal call failed. `last_processed` is not updated,
    /// so the target may be retried on a later cycle.
    #[error("{call} failed for netuid {netuid}: {message}")]
    ActionFailed {
        call: StakeCall,
        netuid: u16,
        message: String,
    },

    /// Shutdown was requested while waiting for a trigger height. Never
    /// raised between a deposit and its matching withdrawal.
    #[error("Interrupted by shutdown")]
    Interrupted,

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
