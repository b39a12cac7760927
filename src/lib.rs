// Core data model
pub mod core;
pub mod error;

// Configuration
pub mod config;

// Launch feed ingestion
pub mod ingest;

// Filters, lookups and the admission engine
pub mod scout;
pub mod util;
pub mod transport;
pub mod engine;

// Re-export commonly used types for convenience
pub use crate::core::*;
pub use engine::Engine;
pub use config::{ConfigManager, Settings};
