/// PumpPortal launch feed: connection, subscription and message parsing

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, instrument, warn};

use crate::core::types::CreationEvent;
use crate::error::FeedError;

pub const PUMPPORTAL_WEBSOCKET: &str = "wss://pumpportal.fun/api/data";

/// Text frames of one live feed connection. Ends when the connection closes.
pub type FeedStream = Pin<Box<dyn Stream<Item = Result<String, FeedError>> + Send>>;

/// Opens a subscribed feed connection
#[async_trait]
pub trait FeedConnector: Send + Sync {
    async fn connect(&self) -> Result<FeedStream, FeedError>;
}

/// Receives creation events pulled off the feed. Must not block.
pub trait CreationHandler: Send + Sync {
    fn on_creation(&self, event: CreationEvent);
}

pub struct PumpPortalConnector {
    url: String,
    connect_timeout: Duration,
}

impl PumpPortalConnector {
    pub fn new(url: &str, connect_timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl FeedConnector for PumpPortalConnector {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn connect(&self) -> Result<FeedStream, FeedError> {
        let (mut ws_stream, _response) = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| FeedError::ConnectTimeout(self.connect_timeout))?
            .map_err(FeedError::Connect)?;

        let subscribe = serde_json::json!({ "method": "subscribeNewToken" });
        ws_stream
            .send(Message::Text(subscribe.to_string()))
            .await
            .map_err(FeedError::Subscribe)?;
        info!("Subscribed to new token launches");

        let frames = ws_stream.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    info!(frame = ?frame, "Feed closed by server");
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(FeedError::Transport(e))),
            }
        });
        Ok(Box::pin(frames))
    }
}

#[derive(Debug, Deserialize)]
struct PumpPortalMessage {
    #[serde(rename = "txType", default)]
    tx_type: Option<String>,
    #[serde(default)]
    mint: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    uri: Option<String>,
    #[serde(rename = "solAmount", default)]
    sol_amount: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("unparsable feed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("creation event without mint")]
    MissingMint,
}

/// Parses one feed message. `Ok(None)` for anything that is not a token creation.
pub fn parse_message(raw: &str) -> Result<Option<CreationEvent>, MessageError> {
    let message: PumpPortalMessage = serde_json::from_str(raw)?;

    if message.tx_type.as_deref() != Some("create") {
        if let Some(text) = message.message {
            debug!(message = %text, "Feed system message");
        }
        return Ok(None);
    }

    let mint = message
        .mint
        .filter(|m| !m.trim().is_empty())
        .ok_or(MessageError::MissingMint)?;

    Ok(Some(CreationEvent {
        mint,
        name: message.name.filter(|n| !n.is_empty()).unwrap_or_else(|| "Unknown".to_string()),
        symbol: message.symbol.filter(|s| !s.is_empty()).unwrap_or_else(|| "N/A".to_string()),
        uri: message.uri.filter(|u| !u.trim().is_empty()),
        initial_buy_sol: message.sol_amount.unwrap_or(0.0),
    }))
}

/// Reads one feed connection and hands creation events to the admission pipeline
pub struct StreamIngestor {
    handler: Arc<dyn CreationHandler>,
    messages_received: AtomicU64,
    malformed_messages: AtomicU64,
}

impl StreamIngestor {
    pub fn new(handler: Arc<dyn CreationHandler>) -> Self {
        Self {
            handler,
            messages_received: AtomicU64::new(0),
            malformed_messages: AtomicU64::new(0),
        }
    }

    /// Consumes the connection until it closes. A transport error ends the
    /// connection; a bad message never does.
    pub async fn run(&self, mut stream: FeedStream) -> Result<(), FeedError> {
        while let Some(frame) = stream.next().await {
            let text = frame?;
            self.on_message(&text);
        }
        Ok(())
    }

    pub fn on_message(&self, raw: &str) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        match parse_message(raw) {
            Ok(Some(event)) => {
                debug!(mint = %event.mint, symbol = %event.symbol, sol_amount = event.initial_buy_sol, "Token created");
                self.handler.on_creation(event);
            }
            Ok(None) => {}
            Err(e) => {
                self.malformed_messages.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, raw = %truncate(raw, 200), "Discarding malformed feed message");
            }
        }
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn malformed_messages(&self) -> u64 {
        self.malformed_messages.load(Ordering::Relaxed)
    }
}

fn truncate(raw: &str, max_chars: usize) -> &str {
    match raw.char_indices().nth(max_chars) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}
