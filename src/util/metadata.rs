/// Off-chain token metadata lookups (IPFS / arweave JSON documents)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::core::types::TokenMetadata;
use crate::error::FetchError;

/// Resolves a creation event's metadata reference. `None` means the document could
/// not be obtained, and link/description checks must then fail closed.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> Option<TokenMetadata>;
}

pub struct HttpMetadataFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpMetadataFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            timeout,
        })
    }

    pub async fn get_metadata(&self, uri: &str) -> Result<TokenMetadata, FetchError> {
        let request = async {
            let response = self.client.get(uri).send().await?;
            if !response.status().is_success() {
                return Err(FetchError::Status {
                    url: uri.to_string(),
                    status: response.status(),
                });
            }
            let body = response.text().await?;
            Ok(serde_json::from_str::<TokenMetadata>(&body)?)
        };

        // The client timeout covers the request; this also bounds slow body streaming.
        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, uri: &str) -> Option<TokenMetadata> {
        match self.get_metadata(uri).await {
            Ok(metadata) => {
                debug!(uri = %uri, "Fetched token metadata");
                Some(metadata)
            }
            Err(e) => {
                warn!(uri = %uri, error = %e, "Metadata fetch failed");
                None
            }
        }
    }
}
