/// DexScreener API client for market cap and volume lookups

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::types::MarketSnapshot;
use crate::error::FetchError;

pub const DEXSCREENER_API: &str = "https://api.dexscreener.com/latest/dex/tokens";

/// Market-data lookup by token address.
///
/// `None` covers both "no pair listed yet" and transient failures; callers keep
/// polling rather than treating it as final.
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    async fn fetch(&self, mint: &str) -> Option<MarketSnapshot>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexScreenerResponse {
    pub pairs: Option<Vec<TokenPair>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    #[serde(rename = "marketCap", default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub volume: Option<Volume>,
    #[serde(rename = "pairCreatedAt", default)]
    pub pair_created_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Volume {
    #[serde(default)]
    pub h1: f64,
}

impl DexScreenerResponse {
    /// First listed pair, if the token has been paired yet
    pub fn into_snapshot(self) -> Option<MarketSnapshot> {
        let pair = self.pairs?.into_iter().next()?;
        Some(MarketSnapshot {
            market_cap: pair.market_cap.unwrap_or(0.0),
            volume_h1: pair.volume.map(|v| v.h1).unwrap_or(0.0),
            pair_created_at: pair.pair_created_at,
        })
    }
}

pub struct DexScreenerClient {
    client: Client,
    base_url: String,
}

impl DexScreenerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn get_market_data(&self, mint: &str) -> Result<Option<MarketSnapshot>, FetchError> {
        let url = format!("{}/{}", self.base_url, mint);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url,
                status: response.status(),
            });
        }

        let body = response.text().await?;
        let data: DexScreenerResponse = serde_json::from_str(&body)?;
        Ok(data.into_snapshot())
    }
}

#[async_trait]
impl MarketDataClient for DexScreenerClient {
    async fn fetch(&self, mint: &str) -> Option<MarketSnapshot> {
        match self.get_market_data(mint).await {
            Ok(Some(snapshot)) => {
                debug!(
                    mint = %mint,
                    market_cap = snapshot.market_cap,
                    volume_h1 = snapshot.volume_h1,
                    "DexScreener data"
                );
                Some(snapshot)
            }
            Ok(None) => {
                debug!(mint = %mint, "No DexScreener pair yet");
                None
            }
            Err(e) => {
                warn!(mint = %mint, error = %e, "DexScreener lookup failed");
                None
            }
        }
    }
}
