use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::engine::store::ResultStore;
use crate::util::dexscreener::MarketDataClient;

/// Periodically re-polls market data for accepted entries
pub struct RefreshScheduler {
    store: Arc<ResultStore>,
    market: Arc<dyn MarketDataClient>,
    interval: Duration,
    stale_after: Duration,
}

impl RefreshScheduler {
    pub fn new(
        store: Arc<ResultStore>,
        market: Arc<dyn MarketDataClient>,
        interval: Duration,
        stale_after: Duration,
    ) -> Self {
        Self {
            store,
            market,
            interval,
            stale_after,
        }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.refresh_once().await;
            }
        })
    }

    /// One refresh cycle. Entries are fetched concurrently; a failed fetch only
    /// leaves that entry's previous values in place. Returns the number updated.
    pub async fn refresh_once(&self) -> usize {
        let stale_after = chrono::Duration::from_std(self.stale_after).unwrap_or_else(|_| chrono::Duration::zero());
        let stale = self.store.stale_addresses(Utc::now() - stale_after);
        if stale.is_empty() {
            return 0;
        }

        debug!(count = stale.len(), "Refreshing result entries");
        let updates = stale.iter().map(|mint| async move {
            match self.market.fetch(mint).await {
                Some(market) => self.store.apply_market_data(mint, &market, Utc::now()),
                None => false,
            }
        });

        let updated = join_all(updates).await.into_iter().filter(|changed| *changed).count();
        if updated > 0 {
            info!(updated = updated, checked = stale.len(), "Result entries refreshed");
        }
        updated
    }
}
