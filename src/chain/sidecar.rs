//! Substrate API sidecar integration.
//!
//! Talks to a sidecar instance fronting the chain node:
//! - `GET /blocks/head` for the current best height
//! - `GET /pallets/SubtensorModule/storage/Tempo?keys[]={netuid}` per
//!   configured subnet for the tempo map
//!
//! Transport-level retry policy is deliberately absent here — the
//! scheduler's cycle-boundary backoff covers transient outages, and a
//! per-request timeout keeps a stalled node from wedging the wait loop.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::ChainClock;
use crate::types::{BlockHeight, BotError, Tempo};

const PALLET: &str = "SubtensorModule";
const STORAGE_ITEM: &str = "Tempo";

/// Per-request timeout. Comfortably above sidecar latency, well below the
/// block time, so a hung request cannot blur two poll ticks together.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SidecarClient {
    http: Client,
    base_url: String,
    /// Netuids whose tempo we assemble the map from. The on-chain map is
    /// only reachable key-by-key through the sidecar.
    netuids: Vec<u16>,
}

impl SidecarClient {
    pub fn new(base_url: &str, netuids: Vec<u16>) -> Result<Self, BotError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BotError::ChainUnavailable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            netuids,
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value, BotError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| BotError::ChainUnavailable(format!("GET {url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(BotError::ChainUnavailable(format!(
                "GET {url}: HTTP {}",
                resp.status()
            )));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| BotError::ChainUnavailable(format!("GET {url}: bad JSON: {e}")))
    }
}

/// Extract the block number from a `/blocks/head` response.
/// Sidecar encodes numbers as decimal strings.
fn parse_block_number(body: &Value) -> Result<BlockHeight, BotError> {
    let number = &body["number"];
    match number {
        Value::String(s) => s
            .parse::<u64>()
            .map_err(|e| BotError::ChainUnavailable(format!("bad block number {s:?}: {e}"))),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| BotError::ChainUnavailable(format!("bad block number {n}"))),
        other => Err(BotError::ChainUnavailable(format!(
            "missing block number in head response: {other}"
        ))),
    }
}

/// Extract a tempo from a storage query response. `None` when the key has
/// no value on chain (subnet not registered).
fn parse_tempo_value(body: &Value) -> Result<Option<Tempo>, BotError> {
    match &body["value"] {
        Value::Null => Ok(None),
        Value::String(s) => s
            .parse::<u16>()
            .map(Some)
            .map_err(|e| BotError::ChainUnavailable(format!("bad tempo value {s:?}: {e}"))),
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u16::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| BotError::ChainUnavailable(format!("bad tempo value {n}"))),
        other => Err(BotError::ChainUnavailable(format!(
            "unexpected tempo storage value: {other}"
        ))),
    }
}

#[async_trait]
impl ChainClock for SidecarClient {
    async fn current_height(&self) -> Result<BlockHeight, BotError> {
        let url = format!("{}/blocks/head", self.base_url);
        let body = self.get_json(&url).await?;
        let height = parse_block_number(&body)?;
        debug!(height, "Queried chain head");
        Ok(height)
    }

    async fn tempo_map(&self) -> Result<HashMap<u16, Tempo>, BotError> {
        let mut map = HashMap::with_capacity(self.netuids.len());
        for &netuid in &self.netuids {
            let url = format!(
                "{}/pallets/{PALLET}/storage/{STORAGE_ITEM}?keys[]={netuid}",
                self.base_url
            );
            let body = self.get_json(&url).await?;
            match parse_tempo_value(&body)? {
                Some(tempo) => {
                    map.insert(netuid, tempo);
                }
                None => {
                    warn!(netuid, "No tempo on chain for subnet");
                }
            }
        }
        Ok(map)
    }
}
