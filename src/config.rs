//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the signer auth token) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`. Every scheduling
//! constant — poll interval, report interval, eligibility window bounds,
//! cooldown, and the stake-lead/unstake-lag offsets — comes from here, not
//! from hard-coded values.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::types::{to_rao, BotError, Target};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub chain: ChainConfig,
    pub window: WindowConfig,
    pub executor: ExecutorConfig,
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    pub name: String,
    /// Sleep between scheduling passes that did work.
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,
    /// Debounce sleep when no target is inside the eligibility window.
    #[serde(default = "default_idle_sleep")]
    pub idle_sleep_secs: u64,
    /// Backoff after a failed cycle.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    /// Base URL of the Substrate API sidecar fronting the chain node.
    pub sidecar_url: String,
    /// Minimum spacing between two height queries while waiting.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Emit a progress line every this many observed blocks.
    #[serde(default = "default_report_interval")]
    pub report_interval_blocks: u64,
}

impl ChainConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Action-window policy around each epoch boundary.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct WindowConfig {
    /// A target closer than this is already too late to set up.
    #[serde(default = "default_min_blocks")]
    pub min_blocks_to_epoch: u64,
    /// A target farther than this is not worth parking on yet.
    #[serde(default = "default_max_blocks")]
    pub max_blocks_to_epoch: u64,
    /// Stake this many blocks before the boundary.
    #[serde(default = "default_stake_lead")]
    pub stake_lead_blocks: u64,
    /// Unstake this many blocks after the boundary.
    #[serde(default = "default_unstake_lag")]
    pub unstake_lag_blocks: u64,
    /// Skip a target processed within this many blocks.
    #[serde(default = "default_cooldown")]
    pub cooldown_blocks: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExecutorConfig {
    /// Log would-be extrinsics instead of submitting them.
    #[serde(default)]
    pub dry_run: bool,
    /// Remote signer endpoint; required unless dry_run.
    #[serde(default)]
    pub signer_url: Option<String>,
    /// Name of the env var holding the signer bearer token.
    #[serde(default)]
    pub auth_token_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TargetConfig {
    pub netuid: u16,
    pub stake_amount: Decimal,
}

fn default_cycle_interval() -> u64 {
    2
}
fn default_idle_sleep() -> u64 {
    10
}
fn default_retry_backoff() -> u64 {
    60
}
fn default_poll_interval_ms() -> u64 {
    250
}
fn default_report_interval() -> u64 {
    10
}
fn default_min_blocks() -> u64 {
    2
}
fn default_max_blocks() -> u64 {
    10
}
fn default_stake_lead() -> u64 {
    3
}
fn default_unstake_lag() -> u64 {
    1
}
fn default_cooldown() -> u64 {
    100
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string (used by tests).
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Startup validation. Violations here are the only fatal errors in the
    /// process — everything later recovers at the cycle boundary.
    fn validate(&self) -> Result<(), BotError> {
        if self.targets.is_empty() {
            return Err(BotError::Config("no targets configured".to_string()));
        }
        for t in &self.targets {
            if t.stake_amount <= Decimal::ZERO {
                return Err(BotError::Config(format!(
                    "netuid {}: stake_amount must be positive, got {}",
                    t.netuid, t.stake_amount
                )));
            }
            // Amounts that cannot convert to RAO fail here, at startup,
            // not mid-cycle.
            to_rao(t.stake_amount)?;
        }
        if self.window.min_blocks_to_epoch > self.window.max_blocks_to_epoch {
            return Err(BotError::Config(format!(
                "window floor {} exceeds ceiling {}",
                self.window.min_blocks_to_epoch, self.window.max_blocks_to_epoch
            )));
        }
        if self.window.cooldown_blocks == 0 {
            return Err(BotError::Config("cooldown_blocks must be non-zero".to_string()));
        }
        if self.chain.poll_interval_ms == 0 {
            return Err(BotError::Config("poll_interval_ms must be non-zero".to_string()));
        }
        if !self.executor.dry_run && self.executor.signer_url.is_none() {
            return Err(BotError::Config(
                "signer_url is required unless executor.dry_run is set".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the in-memory target list the scheduler owns.
    pub fn build_targets(&self) -> Vec<Target> {
        self.targets
            .iter()
            .map(|t| Target::new(t.netuid, t.stake_amount))
            .collect()
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
