/// Engine settings structures

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::types::FilterConfig;
use crate::error::ConfigError;
use crate::ingest::pump_portal::PUMPPORTAL_WEBSOCKET;
use crate::util::dexscreener::DEXSCREENER_API;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub feed: Feed,
    pub market: Market,
    pub watch: Watch,
    pub refresh: Refresh,
    pub store: Store,
    pub display: Display,
    pub filters: FilterConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Feed {
    pub url: String,
    pub reconnect_delay_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for Feed {
    fn default() -> Self {
        Self {
            url: PUMPPORTAL_WEBSOCKET.to_string(),
            reconnect_delay_secs: 5,
            connect_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Market {
    pub dexscreener_url: String,
    pub request_timeout_secs: u64,
    pub metadata_timeout_secs: u64,
}

impl Default for Market {
    fn default() -> Self {
        Self {
            dexscreener_url: DEXSCREENER_API.to_string(),
            request_timeout_secs: 15,
            metadata_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Watch {
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for Watch {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Refresh {
    pub interval_secs: u64,
    pub stale_after_secs: u64,
}

impl Default for Refresh {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            stale_after_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Store {
    pub capacity: usize,
}

impl Default for Store {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Display {
    /// SOL/USD rate used to show the creator's initial buy in dollars
    pub sol_price_usd: f64,
}

impl Default for Display {
    fn default() -> Self {
        Self { sol_price_usd: 104.20 }
    }
}

impl Settings {
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.feed.url).map_err(|_| invalid("feed.url", &self.feed.url))?;
        url::Url::parse(&self.market.dexscreener_url)
            .map_err(|_| invalid("market.dexscreener_url", &self.market.dexscreener_url))?;

        let non_zero = [
            ("feed.reconnect_delay_secs", self.feed.reconnect_delay_secs),
            ("feed.connect_timeout_secs", self.feed.connect_timeout_secs),
            ("market.request_timeout_secs", self.market.request_timeout_secs),
            ("market.metadata_timeout_secs", self.market.metadata_timeout_secs),
            ("watch.poll_interval_secs", self.watch.poll_interval_secs),
            ("watch.timeout_secs", self.watch.timeout_secs),
            ("refresh.interval_secs", self.refresh.interval_secs),
            ("store.capacity", self.store.capacity as u64),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(invalid(field, &value));
            }
        }

        if !(self.display.sol_price_usd > 0.0) {
            return Err(invalid("display.sol_price_usd", &self.display.sol_price_usd));
        }
        validate_filters(&self.filters)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.feed.reconnect_delay_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.feed.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.market.request_timeout_secs)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.market.metadata_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.watch.poll_interval_secs)
    }

    pub fn watch_timeout(&self) -> Duration {
        Duration::from_secs(self.watch.timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.refresh.stale_after_secs)
    }
}

pub fn validate_filters(filters: &FilterConfig) -> Result<(), ConfigError> {
    if !(filters.min_market_cap >= 0.0) {
        return Err(invalid("filters.min_market_cap", &filters.min_market_cap));
    }
    if let Some(max) = filters.max_initial_buy {
        if !(max >= 0.0) {
            return Err(invalid("filters.max_initial_buy", &max));
        }
    }
    Ok(())
}

fn invalid(field: &'static str, value: &dyn std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        field,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.feed.url, "wss://pumpportal.fun/api/data");
        assert_eq!(settings.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(settings.poll_interval(), Duration::from_secs(2));
        assert_eq!(settings.watch_timeout(), Duration::from_secs(600));
        assert_eq!(settings.refresh_interval(), Duration::from_secs(30));
        assert_eq!(settings.store.capacity, 100);
        assert!(settings.filters.max_initial_buy.is_none());
    }

    #[test]
    fn test_filters_section_parsed() {
        let settings = Settings::from_toml(
            r#"
            [filters]
            min_market_cap = 40000.0
            max_initial_buy = 10.0
            tags = "MEME,AI"

            [filters.required_links]
            twitter = true
            "#,
        )
        .unwrap();

        assert_eq!(settings.filters.min_market_cap, 40_000.0);
        assert_eq!(settings.filters.max_initial_buy, Some(10.0));
        assert_eq!(settings.filters.tags, "MEME,AI");
        assert!(settings.filters.required_links.twitter);
        assert!(!settings.filters.required_links.website);
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let settings = Settings::from_toml(include_str!("../../pumpradar.toml")).unwrap();
        assert_eq!(settings.filters.tag_terms(), vec!["meme".to_string(), "ai".to_string()]);
        assert_eq!(settings.display.sol_price_usd, 104.20);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = Settings::from_toml("[store]\ncapacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "store.capacity", .. }));
    }

    #[test]
    fn test_rejects_zero_reconnect_delay() {
        let err = Settings::from_toml("[feed]\nreconnect_delay_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "feed.reconnect_delay_secs", .. }));
    }

    #[test]
    fn test_rejects_negative_initial_buy_ceiling() {
        let err = Settings::from_toml("[filters]\nmax_initial_buy = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "filters.max_initial_buy", .. }));
    }
}
