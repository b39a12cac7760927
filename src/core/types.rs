use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token creation pulled off the launch feed
#[derive(Debug, Clone, PartialEq)]
pub struct CreationEvent {
    pub mint: String,
    pub name: String,
    pub symbol: String,
    /// Off-chain metadata document reference
    pub uri: Option<String>,
    /// Creator's initial buy, in SOL
    pub initial_buy_sol: f64,
}

/// Off-chain metadata document published alongside a token
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TokenMetadata {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub telegram: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

/// Market data for one token as reported by the market-data provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketSnapshot {
    pub market_cap: f64,
    pub volume_h1: f64,
    /// Pair creation time in unix milliseconds
    pub pair_created_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RequiredLinks {
    pub twitter: bool,
    pub telegram: bool,
    pub website: bool,
}

/// User admission criteria. Replaced wholesale on every change.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Minimum market cap (USD) a watched token must reach
    pub min_market_cap: f64,
    /// Maximum creator initial buy (SOL); `None` means no ceiling
    pub max_initial_buy: Option<f64>,
    /// Comma separated description terms, any one of which must match
    pub tags: String,
    pub required_links: RequiredLinks,
}

impl FilterConfig {
    /// Lowercased, trimmed tag terms with empty entries dropped
    pub fn tag_terms(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect()
    }
}

/// Entry fields captured when a candidate starts being watched
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub mint: String,
    pub name: String,
    pub symbol: String,
    pub initial_buy_usd: f64,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub website: Option<String>,
}

impl PendingEntry {
    pub fn from_event(event: &CreationEvent, metadata: Option<&TokenMetadata>, sol_price_usd: f64) -> Self {
        let link = |pick: fn(&TokenMetadata) -> &Option<String>| {
            metadata
                .and_then(|m| pick(m).as_deref())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Self {
            mint: event.mint.clone(),
            name: event.name.clone(),
            symbol: event.symbol.clone(),
            initial_buy_usd: event.initial_buy_sol * sol_price_usd,
            twitter: link(|m| &m.twitter),
            telegram: link(|m| &m.telegram),
            website: link(|m| &m.website),
        }
    }

    /// Promote to an accepted entry using the market data that satisfied the threshold
    pub fn accept(self, market: &MarketSnapshot, now: DateTime<Utc>) -> AcceptedEntry {
        let created_at = market
            .pair_created_at
            .and_then(DateTime::<Utc>::from_timestamp_millis);

        AcceptedEntry {
            mint: self.mint,
            name: self.name,
            symbol: self.symbol,
            initial_buy_usd: self.initial_buy_usd,
            market_cap: market.market_cap,
            volume_h1: market.volume_h1,
            creation_date: crate::util::display::format_creation_date(created_at),
            created_at,
            twitter: self.twitter,
            telegram: self.telegram,
            website: self.website,
            last_refresh: now,
        }
    }
}

/// A token admitted into the result set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceptedEntry {
    pub mint: String,
    pub name: String,
    pub symbol: String,
    pub initial_buy_usd: f64,
    pub market_cap: f64,
    pub volume_h1: f64,
    pub creation_date: String,
    pub created_at: Option<DateTime<Utc>>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub website: Option<String>,
    pub last_refresh: DateTime<Utc>,
}

/// Fields the refresh cycle is allowed to touch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryPatch {
    pub market_cap: f64,
    pub volume_h1: f64,
    pub last_refresh: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> CreationEvent {
        CreationEvent {
            mint: "Mint1111".to_string(),
            name: "Frog".to_string(),
            symbol: "FRG".to_string(),
            uri: Some("https://ipfs.io/ipfs/frog".to_string()),
            initial_buy_sol: 2.0,
        }
    }

    #[test]
    fn test_tag_terms_split_and_normalize() {
        let config = FilterConfig {
            tags: " MEME, Ai ,,".to_string(),
            ..Default::default()
        };
        assert_eq!(config.tag_terms(), vec!["meme".to_string(), "ai".to_string()]);
    }

    #[test]
    fn test_pending_entry_converts_initial_buy_and_drops_blank_links() {
        let metadata = TokenMetadata {
            twitter: Some("https://x.com/frog".to_string()),
            telegram: Some("   ".to_string()),
            ..Default::default()
        };
        let pending = PendingEntry::from_event(&event(), Some(&metadata), 100.0);

        assert_eq!(pending.initial_buy_usd, 200.0);
        assert_eq!(pending.twitter.as_deref(), Some("https://x.com/frog"));
        assert!(pending.telegram.is_none());
        assert!(pending.website.is_none());
    }

    #[test]
    fn test_accept_carries_market_data() {
        let pending = PendingEntry::from_event(&event(), None, 100.0);
        let now = Utc::now();
        let market = MarketSnapshot {
            market_cap: 50_000.0,
            volume_h1: 1_200.0,
            pair_created_at: Some(1_700_000_000_000),
        };

        let entry = pending.accept(&market, now);
        assert_eq!(entry.market_cap, 50_000.0);
        assert_eq!(entry.volume_h1, 1_200.0);
        assert_eq!(entry.last_refresh, now);
        assert_eq!(entry.creation_date, "14/11/2023 22:13:20");
    }
}
