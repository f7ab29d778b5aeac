//! Chain query surface.
//!
//! Defines the `ChainClock` trait — the bot's only view of the ledger's
//! clock — and provides:
//! - `sidecar` — HTTP implementation against a Substrate API sidecar
//! - `wait` — the polling/suspension primitive for block-height waits
//!
//! Every call is a fresh network round-trip. Nothing at this layer caches:
//! staleness feeds straight into the epoch arithmetic, so callers re-query
//! at each decision point.

pub mod sidecar;
pub mod wait;

use async_trait::async_trait;
use std::collections::HashMap;

#[cfg(test)]
use mockall::automock;

use crate::types::{BlockHeight, BotError, Tempo};

/// Abstraction over "what is the current block height" and "what is the
/// tempo of subnet N".
///
/// Implementors perform a network round-trip per call. The tempo map may be
/// incomplete; a missing netuid is a recoverable condition at the lookup
/// site, never fatal.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainClock: Send + Sync {
    /// The chain's current best block height.
    async fn current_height(&self) -> Result<BlockHeight, BotError>;

    /// The on-chain `Tempo` storage map, keyed by netuid.
    async fn tempo_map(&self) -> Result<HashMap<u16, Tempo>, BotError>;
}

/// Look up one subnet's tempo in a freshly queried map.
pub fn tempo_of(map: &HashMap<u16, Tempo>, netuid: u16) -> Result<Tempo, BotError> {
    map.get(&netuid)
        .copied()
        .ok_or(BotError::TempoNotFound(netuid))
}
