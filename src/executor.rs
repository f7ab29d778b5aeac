//! Stake executors.
//!
//! The scheduler decides *when* and *on which subnet* to move stake; these
//! implementations own *how*. Wallet and key material never enter this
//! process — the live path hands the call to a remote signer service, and
//! the dry-run path just logs what it would have submitted.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

#[cfg(test)]
use mockall::automock;

use crate::types::{BotError, StakeCall, StakeReceipt};

/// Performs the deposit and withdrawal extrinsics.
///
/// Amounts are in RAO (the chain's smallest unit); callers convert from
/// decimal TAO before reaching this boundary.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StakeExecutor: Send + Sync {
    async fn add_stake(&self, netuid: u16, amount_rao: u64) -> Result<StakeReceipt, BotError>;
    async fn remove_stake(&self, netuid: u16, amount_rao: u64) -> Result<StakeReceipt, BotError>;
}

// ---------------------------------------------------------------------------
// Dry run
// ---------------------------------------------------------------------------

/// Logs would-be extrinsics without touching the chain.
///
/// Lets the full scheduler — ranking, waiting, windows, cooldown — run
/// against a live chain with no key material configured.
pub struct DryRunExecutor;

impl DryRunExecutor {
    fn receipt(call: StakeCall, netuid: u16, amount_rao: u64) -> StakeReceipt {
        StakeReceipt {
            extrinsic_id: format!("dry-run-{}", uuid::Uuid::new_v4()),
            call,
            netuid,
            amount_rao,
            block_observed: None,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
impl StakeExecutor for DryRunExecutor {
    async fn add_stake(&self, netuid: u16, amount_rao: u64) -> Result<StakeReceipt, BotError> {
        info!(netuid, amount_rao, "[DRY RUN] Would add stake");
        Ok(Self::receipt(StakeCall::AddStake, netuid, amount_rao))
    }

    async fn remove_stake(&self, netuid: u16, amount_rao: u64) -> Result<StakeReceipt, BotError> {
        info!(netuid, amount_rao, "[DRY RUN] Would remove stake");
        Ok(Self::receipt(StakeCall::RemoveStake, netuid, amount_rao))
    }
}

// ---------------------------------------------------------------------------
// Remote signer
// ---------------------------------------------------------------------------

/// Per-call timeout. Extrinsic submission waits for inclusion, so this is
/// generous compared to the chain query timeout.
const SIGNER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct SignerRequest {
    netuid: u16,
    amount_rao: u64,
}

#[derive(Debug, Deserialize)]
struct SignerResponse {
    extrinsic_id: String,
    #[serde(default)]
    block: Option<u64>,
}

/// Submits staking calls through a remote signer service that holds the
/// wallet. Authenticated with a bearer token resolved from the environment
/// at startup.
pub struct SignerClient {
    http: Client,
    base_url: String,
    auth_token: Option<SecretString>,
}

impl SignerClient {
    pub fn new(base_url: &str, auth_token: Option<String>) -> Result<Self, BotError> {
        let http = Client::builder()
            .timeout(SIGNER_TIMEOUT)
            .build()
            .map_err(|e| BotError::Config(format!("failed to build signer client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.map(SecretString::new),
        })
    }

    async fn submit(
        &self,
        call: StakeCall,
        netuid: u16,
        amount_rao: u64,
    ) -> Result<StakeReceipt, BotError> {
        let path = match call {
            StakeCall::AddStake => "stake/add",
            StakeCall::RemoveStake => "stake/remove",
        };
        let url = format!("{}/{path}", self.base_url);

        let mut req = self
            .http
            .post(&url)
            .json(&SignerRequest { netuid, amount_rao });
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token.expose_secret());
        }

        let fail = |message: String| BotError::ActionFailed {
            call,
            netuid,
            message,
        };

        let resp = req.send().await.map_err(|e| fail(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(fail(format!("signer returned HTTP {status}: {body}")));
        }

        let signed: SignerResponse = resp
            .json()
            .await
            .map_err(|e| fail(format!("bad signer response: {e}")))?;

        let receipt = StakeReceipt {
            extrinsic_id: signed.extrinsic_id,
            call,
            netuid,
            amount_rao,
            block_observed: signed.block,
            timestamp: Utc::now(),
        };
        info!(%receipt, "Extrinsic submitted");
        Ok(receipt)
    }
}

#[async_trait]
impl StakeExecutor for SignerClient {
    async fn add_stake(&self, netuid: u16, amount_rao: u64) -> Result<StakeReceipt, BotError> {
        self.submit(StakeCall::AddStake, netuid, amount_rao).await
    }

    async fn remove_stake(&self, netuid: u16, amount_rao: u64) -> Result<StakeReceipt, BotError> {
        self.submit(StakeCall::RemoveStake, netuid, amount_rao).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
