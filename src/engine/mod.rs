/// Admission engine: feed → filters → watches → result set, under one start/stop control

pub mod refresh;
pub mod store;
pub mod watch;

use std::sync::{Arc, RwLock};

use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument};

use crate::config::settings::{validate_filters, Settings};
use crate::core::types::{CreationEvent, FilterConfig, PendingEntry, TokenMetadata};
use crate::error::ConfigError;
use crate::ingest::pump_portal::{CreationHandler, FeedConnector, PumpPortalConnector, StreamIngestor};
use crate::ingest::supervisor::{ConnectionState, ConnectionSupervisor};
use crate::scout::filter::FilterEngine;
use crate::transport::result_bus::{ResultBus, ResultChanged};
use crate::util::dexscreener::{DexScreenerClient, MarketDataClient};
use crate::util::metadata::{HttpMetadataFetcher, MetadataFetcher};

pub use refresh::RefreshScheduler;
pub use store::ResultStore;
pub use watch::{WatchScheduler, WatchSettings, WatchStatus};

/// Creation events enter here. The initial-buy check and dedup run inline on the
/// feed reader; the metadata fetch and the remaining checks run in a tracked task
/// so a slow metadata host never stalls ingestion.
pub struct Admission {
    filters: Arc<RwLock<FilterConfig>>,
    metadata: Arc<dyn MetadataFetcher>,
    watcher: Arc<WatchScheduler>,
    sol_price_usd: f64,
    metadata_timeout: Duration,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Admission {
    async fn admit(
        event: CreationEvent,
        config: FilterConfig,
        fetcher: Arc<dyn MetadataFetcher>,
        watcher: Arc<WatchScheduler>,
        sol_price_usd: f64,
        metadata_timeout: Duration,
    ) {
        let metadata: Option<TokenMetadata> = match event.uri.as_deref() {
            Some(uri) => tokio::time::timeout(metadata_timeout, fetcher.fetch(uri))
                .await
                .unwrap_or_else(|_| {
                    debug!(mint = %event.mint, uri = %uri, "Metadata fetch timed out");
                    None
                }),
            None => None,
        };

        if !FilterEngine::passes_description(metadata.as_ref(), &config) {
            debug!(mint = %event.mint, symbol = %event.symbol, "Rejected: description does not match tags");
            return;
        }
        if !FilterEngine::passes_required_links(metadata.as_ref(), &config) {
            info!(mint = %event.mint, symbol = %event.symbol, "Rejected: missing required links");
            return;
        }

        let pending = PendingEntry::from_event(&event, metadata.as_ref(), sol_price_usd);
        watcher.watch(pending, config.min_market_cap);
    }
}

impl CreationHandler for Admission {
    fn on_creation(&self, event: CreationEvent) {
        if self.shutdown.is_cancelled() {
            return;
        }

        let config = read_filters(&self.filters);
        if !FilterEngine::passes_initial_buy(&event, &config) {
            debug!(
                mint = %event.mint,
                sol_amount = event.initial_buy_sol,
                max = ?config.max_initial_buy,
                "Rejected: initial buy above ceiling"
            );
            return;
        }
        if self.watcher.is_known(&event.mint) {
            debug!(mint = %event.mint, "Already watched or accepted");
            return;
        }

        let shutdown = self.shutdown.clone();
        let admit = Self::admit(
            event,
            config,
            Arc::clone(&self.metadata),
            Arc::clone(&self.watcher),
            self.sol_price_usd,
            self.metadata_timeout,
        );
        self.tracker.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = admit => {}
            }
        });
    }
}

fn read_filters(filters: &RwLock<FilterConfig>) -> FilterConfig {
    filters.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
}

/// Resources that only exist while monitoring is on
struct Running {
    supervisor: ConnectionSupervisor,
    admission: Arc<Admission>,
    refresh: JoinHandle<()>,
}

pub struct Engine {
    settings: Settings,
    filters: Arc<RwLock<FilterConfig>>,
    bus: ResultBus,
    store: Arc<ResultStore>,
    market: Arc<dyn MarketDataClient>,
    metadata: Arc<dyn MetadataFetcher>,
    connector: Arc<dyn FeedConnector>,
    watcher: Arc<WatchScheduler>,
    running: tokio::sync::Mutex<Option<Running>>,
}

impl Engine {
    pub fn new(
        settings: Settings,
        market: Arc<dyn MarketDataClient>,
        metadata: Arc<dyn MetadataFetcher>,
        connector: Arc<dyn FeedConnector>,
    ) -> Self {
        let bus = ResultBus::new(256);
        let store = Arc::new(ResultStore::new(settings.store.capacity, bus.clone()));
        let watcher = Arc::new(WatchScheduler::new(
            Arc::clone(&store),
            Arc::clone(&market),
            WatchSettings {
                poll_interval: settings.poll_interval(),
                timeout: settings.watch_timeout(),
            },
        ));

        Self {
            filters: Arc::new(RwLock::new(settings.filters.clone())),
            settings,
            bus,
            store,
            market,
            metadata,
            connector,
            watcher,
            running: tokio::sync::Mutex::new(None),
        }
    }

    /// Engine wired to PumpPortal, DexScreener and HTTP metadata hosts
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let market = Arc::new(DexScreenerClient::new(&settings.market.dexscreener_url, settings.request_timeout())?);
        let metadata = Arc::new(HttpMetadataFetcher::new(settings.metadata_timeout())?);
        let connector = Arc::new(PumpPortalConnector::new(&settings.feed.url, settings.connect_timeout()));
        Ok(Self::new(settings, market, metadata, connector))
    }

    /// Starts monitoring. No effect if already started.
    #[instrument(skip(self))]
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("Engine already running");
            return;
        }

        let admission = Arc::new(Admission {
            filters: Arc::clone(&self.filters),
            metadata: Arc::clone(&self.metadata),
            watcher: Arc::clone(&self.watcher),
            sol_price_usd: self.settings.display.sol_price_usd,
            metadata_timeout: self.settings.metadata_timeout(),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        });
        let ingestor = Arc::new(StreamIngestor::new(admission.clone()));

        let mut supervisor = ConnectionSupervisor::new(
            Arc::clone(&self.connector),
            ingestor,
            self.settings.reconnect_delay(),
        );
        supervisor.start();

        let refresh = Arc::new(RefreshScheduler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.market),
            self.settings.refresh_interval(),
            self.settings.stale_after(),
        ))
        .spawn();

        *running = Some(Running {
            supervisor,
            admission,
            refresh,
        });
        info!("🚀 Monitoring started");
    }

    /// Stops monitoring: closes the feed, cancels in-flight admissions, every watch
    /// and the refresh timer. Nothing touches the result set once this returns.
    /// Idempotent.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let mut guard = self.running.lock().await;
        let Some(mut running) = guard.take() else {
            debug!("Engine not running");
            return;
        };

        let feed = running.supervisor.stats().await;
        running.supervisor.stop().await;
        info!(
            connection_attempts = feed.connection_attempts,
            successful_connections = feed.successful_connections,
            reconnects_scheduled = feed.reconnects_scheduled,
            "Launch feed closed"
        );

        running.admission.shutdown.cancel();
        running.admission.tracker.close();
        running.admission.tracker.wait().await;

        self.watcher.cancel_all().await;

        running.refresh.abort();
        let _ = running.refresh.await;

        info!("🛑 Monitoring stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        match self.running.lock().await.as_ref() {
            Some(running) => running.supervisor.state().await,
            None => ConnectionState::Disconnected,
        }
    }

    /// Replaces the filters. Only events processed afterwards see the new values;
    /// candidates already under watch keep the threshold they were admitted with.
    pub fn set_filter_config(&self, config: FilterConfig) -> Result<(), ConfigError> {
        validate_filters(&config)?;
        let mut filters = self.filters.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        info!(
            min_market_cap = config.min_market_cap,
            max_initial_buy = ?config.max_initial_buy,
            tags = %config.tags,
            "Filter config updated"
        );
        *filters = config;
        Ok(())
    }

    pub fn filter_config(&self) -> FilterConfig {
        read_filters(&self.filters)
    }

    /// Receiver for a notification after every result-set mutation
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ResultChanged> {
        self.bus.subscribe()
    }

    pub fn snapshot(&self) -> Vec<crate::core::types::AcceptedEntry> {
        self.store.snapshot()
    }

    pub fn clear_results(&self) {
        self.store.clear();
    }

    pub fn active_watches(&self) -> usize {
        self.watcher.active_count()
    }

    pub fn is_watching(&self, mint: &str) -> bool {
        self.watcher.is_watching(mint)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
