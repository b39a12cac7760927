pub mod dexscreener;
pub mod display;
pub mod metadata;

pub use dexscreener::{DexScreenerClient, MarketDataClient};
pub use metadata::{HttpMetadataFetcher, MetadataFetcher};
