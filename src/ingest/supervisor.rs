use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};

use crate::ingest::pump_portal::{FeedConnector, StreamIngestor};

/// Connection state for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Statistics for monitoring feed health
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub state: ConnectionState,
    pub connection_attempts: u32,
    pub successful_connections: u32,
    pub reconnects_scheduled: u32,
    pub connected_since: Option<Instant>,
}

impl Default for ConnectionStats {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            connection_attempts: 0,
            successful_connections: 0,
            reconnects_scheduled: 0,
            connected_since: None,
        }
    }
}

/// Keeps the feed connected while monitoring is on.
///
/// A single supervisor task owns the connect → read → wait → reconnect cycle, so at
/// most one reconnect is ever pending and a close can never schedule two.
pub struct ConnectionSupervisor {
    connector: Arc<dyn FeedConnector>,
    ingestor: Arc<StreamIngestor>,
    reconnect_delay: Duration,
    stats: Arc<RwLock<ConnectionStats>>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionSupervisor {
    pub fn new(connector: Arc<dyn FeedConnector>, ingestor: Arc<StreamIngestor>, reconnect_delay: Duration) -> Self {
        Self {
            connector,
            ingestor,
            reconnect_delay,
            stats: Arc::new(RwLock::new(ConnectionStats::default())),
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// No effect if already running
    pub fn start(&mut self) {
        if self.task.is_some() {
            debug!("Connection supervisor already running");
            return;
        }

        let connector = Arc::clone(&self.connector);
        let ingestor = Arc::clone(&self.ingestor);
        let stats = Arc::clone(&self.stats);
        let delay = self.reconnect_delay;
        self.task = Some(tokio::spawn(async move {
            supervise(connector, ingestor, stats, delay).await;
        }));
    }

    /// Closes the connection and cancels any pending reconnect. Idempotent.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            info!("Feed connection closed");
        }

        let mut stats = self.stats.write().await;
        stats.state = ConnectionState::Disconnected;
        stats.connected_since = None;
    }

    pub async fn state(&self) -> ConnectionState {
        self.stats.read().await.state
    }

    pub async fn stats(&self) -> ConnectionStats {
        self.stats.read().await.clone()
    }
}

async fn supervise(
    connector: Arc<dyn FeedConnector>,
    ingestor: Arc<StreamIngestor>,
    stats: Arc<RwLock<ConnectionStats>>,
    reconnect_delay: Duration,
) {
    loop {
        {
            let mut s = stats.write().await;
            s.state = ConnectionState::Connecting;
            s.connection_attempts += 1;
            info!(attempt = s.connection_attempts, "Connecting to launch feed");
        }

        match connector.connect().await {
            Ok(stream) => {
                {
                    let mut s = stats.write().await;
                    s.state = ConnectionState::Connected;
                    s.successful_connections += 1;
                    s.connected_since = Some(Instant::now());
                }
                info!("Launch feed connected");

                match ingestor.run(stream).await {
                    Ok(()) => warn!("Launch feed disconnected"),
                    Err(e) => warn!(error = %e, "Launch feed connection error"),
                }
            }
            Err(e) => warn!(error = %e, "Failed to connect to launch feed"),
        }

        // Still monitoring: the next attempt is already committed
        {
            let mut s = stats.write().await;
            s.state = ConnectionState::Connecting;
            s.connected_since = None;
            s.reconnects_scheduled += 1;
        }
        info!(delay_secs = reconnect_delay.as_secs(), "Reconnecting to launch feed after delay");
        sleep(reconnect_delay).await;
    }
}
