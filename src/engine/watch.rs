use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument};

use crate::core::types::PendingEntry;
use crate::engine::store::ResultStore;
use crate::util::dexscreener::MarketDataClient;

/// How a watch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchStatus {
    Accepted,
    TimedOut,
    /// Engine stopped while the candidate was still being watched
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct WatchSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Registry record for one candidate under watch
#[derive(Debug)]
struct WatchTask {
    id: u64,
    symbol: String,
    started_at: Instant,
    handle: JoinHandle<()>,
}

/// Owns one polling task per candidate. The registry lock is the single point that
/// guards "one watch per address" and, together with the store check, keeps watched
/// and accepted addresses disjoint.
pub struct WatchScheduler {
    registry: Mutex<HashMap<String, WatchTask>>,
    next_id: AtomicU64,
    store: Arc<ResultStore>,
    market: Arc<dyn MarketDataClient>,
    settings: WatchSettings,
}

impl WatchScheduler {
    pub fn new(store: Arc<ResultStore>, market: Arc<dyn MarketDataClient>, settings: WatchSettings) -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            store,
            market,
            settings,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, WatchTask>> {
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// True if the address is already watched or already accepted
    pub fn is_known(&self, mint: &str) -> bool {
        let registry = self.lock();
        registry.contains_key(mint) || self.store.contains(mint)
    }

    pub fn is_watching(&self, mint: &str) -> bool {
        self.lock().contains_key(mint)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    /// Start watching a candidate that passed every filter. `min_market_cap` is the
    /// threshold in force when the candidate was admitted. Returns false when the
    /// address is already watched or accepted.
    #[instrument(skip(self, pending), fields(mint = %pending.mint, symbol = %pending.symbol))]
    pub fn watch(self: &Arc<Self>, pending: PendingEntry, min_market_cap: f64) -> bool {
        let mut registry = self.lock();
        if registry.contains_key(&pending.mint) || self.store.contains(&pending.mint) {
            debug!("Already watched or accepted, ignoring");
            return false;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mint = pending.mint.clone();
        let symbol = pending.symbol.clone();
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            scheduler.run(id, pending, min_market_cap).await;
        });

        registry.insert(
            mint,
            WatchTask {
                id,
                symbol,
                started_at: Instant::now(),
                handle,
            },
        );
        info!(min_market_cap = min_market_cap, active = registry.len(), "Started watching token");
        true
    }

    async fn run(&self, id: u64, pending: PendingEntry, min_market_cap: f64) {
        let mint = pending.mint.clone();
        let symbol = pending.symbol.clone();

        let status = match tokio::time::timeout(
            self.settings.timeout,
            self.poll_until_accepted(id, pending, min_market_cap),
        )
        .await
        {
            Ok(status) => status,
            Err(_) => {
                if self.release(&mint, id) {
                    WatchStatus::TimedOut
                } else {
                    WatchStatus::Cancelled
                }
            }
        };

        match status {
            WatchStatus::Accepted => info!(mint = %mint, symbol = %symbol, "Token reached market cap, added to results"),
            WatchStatus::TimedOut => info!(
                mint = %mint,
                symbol = %symbol,
                timeout_secs = self.settings.timeout.as_secs(),
                "Stopped watching token after timeout"
            ),
            WatchStatus::Cancelled => debug!(mint = %mint, symbol = %symbol, "Watch cancelled"),
        }
    }

    async fn poll_until_accepted(&self, id: u64, pending: PendingEntry, min_market_cap: f64) -> WatchStatus {
        let period = self.settings.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut tick: u64 = 0;
        loop {
            ticker.tick().await;
            tick += 1;

            let Some(market) = self.market.fetch(&pending.mint).await else {
                continue;
            };
            debug!(
                mint = %pending.mint,
                tick = tick,
                market_cap = market.market_cap,
                required = min_market_cap,
                "Watch poll"
            );
            if market.market_cap < min_market_cap {
                continue;
            }

            let mut registry = self.lock();
            if registry.get(&pending.mint).map(|task| task.id) != Some(id) {
                return WatchStatus::Cancelled;
            }
            registry.remove(&pending.mint);
            self.store.insert(pending.accept(&market, Utc::now()));
            return WatchStatus::Accepted;
        }
    }

    /// Drops the registry record if it still belongs to watch `id`
    fn release(&self, mint: &str, id: u64) -> bool {
        let mut registry = self.lock();
        if registry.get(mint).map(|task| task.id) == Some(id) {
            registry.remove(mint);
            true
        } else {
            false
        }
    }

    /// Cancels every outstanding watch and waits until none of them can run again
    pub async fn cancel_all(&self) {
        let drained: Vec<(String, WatchTask)> = self.lock().drain().collect();
        if drained.is_empty() {
            return;
        }

        info!(count = drained.len(), "Cancelling active watches");
        for (mint, task) in drained {
            task.handle.abort();
            let _ = task.handle.await;
            debug!(
                mint = %mint,
                symbol = %task.symbol,
                watched_secs = task.started_at.elapsed().as_secs(),
                "Stopped watching token"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MarketSnapshot;
    use crate::transport::result_bus::ResultBus;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Returns the scripted market caps in order, repeating the last one
    struct ScriptedMarket {
        caps: Vec<Option<f64>>,
        calls: AtomicUsize,
    }

    impl ScriptedMarket {
        fn new(caps: Vec<Option<f64>>) -> Arc<Self> {
            Arc::new(Self {
                caps,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketDataClient for ScriptedMarket {
        async fn fetch(&self, _mint: &str) -> Option<MarketSnapshot> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let cap = self.caps[call.min(self.caps.len() - 1)]?;
            Some(MarketSnapshot {
                market_cap: cap,
                volume_h1: 100.0,
                pair_created_at: None,
            })
        }
    }

    fn pending(mint: &str) -> PendingEntry {
        PendingEntry {
            mint: mint.to_string(),
            name: "Frog".to_string(),
            symbol: "FRG".to_string(),
            initial_buy_usd: 208.4,
            twitter: None,
            telegram: None,
            website: None,
        }
    }

    fn scheduler(market: Arc<ScriptedMarket>) -> (Arc<WatchScheduler>, Arc<ResultStore>) {
        let store = Arc::new(ResultStore::new(100, ResultBus::new(64)));
        let scheduler = Arc::new(WatchScheduler::new(
            Arc::clone(&store),
            market,
            WatchSettings::default(),
        ));
        (scheduler, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepts_on_first_tick_over_threshold() {
        let market = ScriptedMarket::new(vec![Some(30_000.0), None, Some(50_000.0)]);
        let (scheduler, store) = scheduler(Arc::clone(&market));

        assert!(scheduler.watch(pending("mintA"), 40_000.0));

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(market.calls(), 2);
        assert!(store.is_empty());
        assert!(scheduler.is_watching("mintA"));

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(market.calls(), 3);
        assert!(!scheduler.is_watching("mintA"));

        let entries = store.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].market_cap, 50_000.0);
        assert!(entries[0].market_cap >= 40_000.0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(market.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_insert() {
        let market = ScriptedMarket::new(vec![Some(10_000.0)]);
        let (scheduler, store) = scheduler(Arc::clone(&market));

        scheduler.watch(pending("mintB"), 40_000.0);

        tokio::time::sleep(Duration::from_secs(599)).await;
        assert!(scheduler.is_watching("mintB"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!scheduler.is_watching("mintB"));
        assert_eq!(scheduler.active_count(), 0);
        assert!(store.is_empty());

        let calls = market.calls();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(market.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_watch_ignored() {
        let market = ScriptedMarket::new(vec![None]);
        let (scheduler, _store) = scheduler(market);

        assert!(scheduler.watch(pending("mintC"), 1.0));
        assert!(!scheduler.watch(pending("mintC"), 1.0));
        assert_eq!(scheduler.active_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_address_not_watched_again() {
        let market = ScriptedMarket::new(vec![Some(99_000.0)]);
        let (scheduler, store) = scheduler(market);

        scheduler.watch(pending("mintD"), 1.0);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(store.contains("mintD"));

        assert!(scheduler.is_known("mintD"));
        assert!(!scheduler.watch(pending("mintD"), 1.0));
        assert_eq!(scheduler.active_count(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_stops_polling() {
        let market = ScriptedMarket::new(vec![Some(1.0)]);
        let (scheduler, store) = scheduler(Arc::clone(&market));

        scheduler.watch(pending("m1"), 40_000.0);
        scheduler.watch(pending("m2"), 40_000.0);
        tokio::time::sleep(Duration::from_secs(3)).await;

        scheduler.cancel_all().await;
        assert_eq!(scheduler.active_count(), 0);

        let calls = market.calls();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(market.calls(), calls);
        assert!(store.is_empty());
    }
}
