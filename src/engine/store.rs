use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::core::types::{AcceptedEntry, EntryPatch, MarketSnapshot};
use crate::transport::result_bus::{ChangeKind, ResultBus};

/// Bounded, insertion-ordered result set with unique addresses.
///
/// Every mutation happens under one lock and publishes the resulting snapshot before
/// the lock is released, so subscribers observe changes in mutation order.
#[derive(Debug)]
pub struct ResultStore {
    entries: Mutex<VecDeque<AcceptedEntry>>,
    capacity: usize,
    bus: ResultBus,
}

impl ResultStore {
    pub fn new(capacity: usize, bus: ResultBus) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            bus,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AcceptedEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends the entry, evicting the oldest once over capacity.
    /// Returns false (and changes nothing) if the address is already present.
    pub fn insert(&self, entry: AcceptedEntry) -> bool {
        let mut entries = self.lock();
        if entries.iter().any(|e| e.mint == entry.mint) {
            debug!(mint = %entry.mint, "Duplicate result entry ignored");
            return false;
        }

        entries.push_back(entry);
        while entries.len() > self.capacity {
            if let Some(evicted) = entries.pop_front() {
                debug!(mint = %evicted.mint, symbol = %evicted.symbol, "Evicted oldest result entry");
            }
        }

        self.bus.publish(ChangeKind::Inserted, entries.iter().cloned().collect());
        true
    }

    /// In-place update of the mutable fields. Absent address is a no-op.
    pub fn update(&self, mint: &str, patch: EntryPatch) -> bool {
        let mut entries = self.lock();
        self.patch_locked(&mut entries, mint, patch)
    }

    /// Compare-and-update: applies the market data only when market cap or volume
    /// differ from the stored values. An evicted entry is silently skipped.
    pub fn apply_market_data(&self, mint: &str, market: &MarketSnapshot, now: DateTime<Utc>) -> bool {
        let mut entries = self.lock();
        let unchanged = match entries.iter().find(|e| e.mint == mint) {
            Some(entry) => entry.market_cap == market.market_cap && entry.volume_h1 == market.volume_h1,
            None => return false,
        };
        if unchanged {
            return false;
        }

        let patch = EntryPatch {
            market_cap: market.market_cap,
            volume_h1: market.volume_h1,
            last_refresh: now,
        };
        self.patch_locked(&mut entries, mint, patch)
    }

    fn patch_locked(&self, entries: &mut VecDeque<AcceptedEntry>, mint: &str, patch: EntryPatch) -> bool {
        let Some(entry) = entries.iter_mut().find(|e| e.mint == mint) else {
            return false;
        };

        entry.market_cap = patch.market_cap;
        entry.volume_h1 = patch.volume_h1;
        entry.last_refresh = patch.last_refresh;

        self.bus.publish(ChangeKind::Updated, entries.iter().cloned().collect());
        true
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        let removed = entries.len();
        entries.clear();
        info!(removed = removed, "Result set cleared");
        self.bus.publish(ChangeKind::Cleared, Vec::new());
    }

    pub fn snapshot(&self) -> Vec<AcceptedEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn contains(&self, mint: &str) -> bool {
        self.lock().iter().any(|e| e.mint == mint)
    }

    /// Addresses whose last refresh happened before `cutoff`
    pub fn stale_addresses(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|e| e.last_refresh < cutoff)
            .map(|e| e.mint.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn entry(mint: &str) -> AcceptedEntry {
        AcceptedEntry {
            mint: mint.to_string(),
            name: format!("Token {}", mint),
            symbol: "TKN".to_string(),
            initial_buy_usd: 104.2,
            market_cap: 45_000.0,
            volume_h1: 500.0,
            creation_date: "N/A".to_string(),
            created_at: None,
            twitter: None,
            telegram: None,
            website: None,
            last_refresh: Utc::now(),
        }
    }

    fn store(capacity: usize) -> ResultStore {
        ResultStore::new(capacity, ResultBus::new(1024))
    }

    #[test]
    fn test_insert_keeps_order() {
        let store = store(100);
        assert!(store.insert(entry("a")));
        assert!(store.insert(entry("b")));

        let mints: Vec<_> = store.snapshot().into_iter().map(|e| e.mint).collect();
        assert_eq!(mints, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let store = store(100);
        assert!(store.insert(entry("a")));
        assert!(!store.insert(entry("a")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_101st_insert_evicts_oldest() {
        let store = store(100);
        for i in 1..=101 {
            assert!(store.insert(entry(&format!("mint{}", i))));
            assert!(store.len() <= 100);
        }

        assert_eq!(store.len(), 100);
        assert!(!store.contains("mint1"));
        assert!(store.contains("mint2"));
        assert!(store.contains("mint101"));
        assert_eq!(store.snapshot().first().unwrap().mint, "mint2");
    }

    #[test]
    fn test_update_missing_address_is_noop() {
        let store = store(10);
        let patch = EntryPatch {
            market_cap: 1.0,
            volume_h1: 1.0,
            last_refresh: Utc::now(),
        };
        assert!(!store.update("gone", patch));
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_changes_only_mutable_fields() {
        let store = store(10);
        let original = entry("a");
        store.insert(original.clone());

        let later = Utc::now() + Duration::seconds(40);
        assert!(store.update(
            "a",
            EntryPatch {
                market_cap: 90_000.0,
                volume_h1: 7_000.0,
                last_refresh: later,
            }
        ));

        let updated = &store.snapshot()[0];
        assert_eq!(updated.market_cap, 90_000.0);
        assert_eq!(updated.volume_h1, 7_000.0);
        assert_eq!(updated.last_refresh, later);
        assert_eq!(updated.name, original.name);
        assert_eq!(updated.initial_buy_usd, original.initial_buy_usd);
    }

    #[test]
    fn test_apply_market_data_skips_unchanged_values() {
        let store = store(10);
        let original = entry("a");
        store.insert(original.clone());

        let same = MarketSnapshot {
            market_cap: original.market_cap,
            volume_h1: original.volume_h1,
            pair_created_at: None,
        };
        let later = original.last_refresh + Duration::seconds(31);
        assert!(!store.apply_market_data("a", &same, later));
        assert_eq!(store.snapshot()[0].last_refresh, original.last_refresh);

        let moved = MarketSnapshot {
            volume_h1: 999.0,
            ..same
        };
        assert!(store.apply_market_data("a", &moved, later));
        assert_eq!(store.snapshot()[0].last_refresh, later);
    }

    #[test]
    fn test_stale_addresses() {
        let store = store(10);
        let now = Utc::now();
        let mut old = entry("old");
        old.last_refresh = now - Duration::seconds(60);
        store.insert(old);
        store.insert(entry("fresh"));

        assert_eq!(store.stale_addresses(now - Duration::seconds(30)), vec!["old".to_string()]);
    }

    #[tokio::test]
    async fn test_every_mutation_notifies() {
        let bus = ResultBus::new(16);
        let mut rx = bus.subscribe();
        let store = ResultStore::new(10, bus);

        store.insert(entry("a"));
        store.apply_market_data(
            "a",
            &MarketSnapshot {
                market_cap: 1.0,
                volume_h1: 2.0,
                pair_created_at: None,
            },
            Utc::now(),
        );
        store.clear();

        let kinds: Vec<_> = [rx.recv().await, rx.recv().await, rx.recv().await]
            .into_iter()
            .map(|event| event.unwrap().kind)
            .collect();
        assert_eq!(kinds, vec![ChangeKind::Inserted, ChangeKind::Updated, ChangeKind::Cleared]);
    }

    #[test]
    fn test_concurrent_inserts_for_one_address() {
        let store = Arc::new(store(100));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.insert(entry("same")))
            })
            .collect();

        let inserted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(inserted, 1);
        assert_eq!(store.len(), 1);
    }
}
