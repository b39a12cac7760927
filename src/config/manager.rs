/// Configuration manager with hot-reload of the filter section

use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, warn};

use super::Settings;
use crate::core::types::FilterConfig;
use crate::engine::Engine;
use crate::error::ConfigError;

pub struct ConfigManager {
    config_path: String,
    current_config: RwLock<Settings>,
    last_modified: RwLock<SystemTime>,
}

impl ConfigManager {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Settings::load_from_file(path)?;
        let last_modified = modified_at(path)?;

        Ok(Self {
            config_path: path.to_string(),
            current_config: RwLock::new(config),
            last_modified: RwLock::new(last_modified),
        })
    }

    pub fn get_settings(&self) -> Settings {
        self.current_config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Reloads the file if it changed on disk. Returns the new filters when the
    /// `[filters]` section differs from what was loaded before. A file that fails to
    /// load leaves the current settings in place.
    pub fn reload_if_changed(&self) -> Result<Option<FilterConfig>, ConfigError> {
        let modified = modified_at(&self.config_path)?;
        {
            let last = self.last_modified.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            if modified <= *last {
                return Ok(None);
            }
        }

        // Record the mtime first so a broken file is reported once, not every tick.
        *self.last_modified.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = modified;
        let new_config = Settings::load_from_file(&self.config_path)?;

        let mut current = self.current_config.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let filters_changed = current.filters != new_config.filters;
        *current = new_config;
        info!(path = %self.config_path, "🔄 Configuration reloaded successfully");

        Ok(filters_changed.then(|| current.filters.clone()))
    }

    /// Polls the file and pushes changed filters into the engine
    pub fn start_hot_reload(self: Arc<Self>, engine: Arc<Engine>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut reload_timer = interval(every);
            loop {
                reload_timer.tick().await;
                match self.reload_if_changed() {
                    Ok(Some(filters)) => {
                        if let Err(e) = engine.set_filter_config(filters) {
                            warn!(error = %e, "⚠️ Reloaded filters rejected - keeping current");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "⚠️ Failed to reload configuration - keeping current"),
                }
            }
        })
    }
}

fn modified_at(path: &str) -> Result<SystemTime, ConfigError> {
    std::fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })
}
