use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pumpradar::core::types::AcceptedEntry;
use pumpradar::transport::result_bus::ResultChanged;
use pumpradar::util::display::{coin_url, format_usd, truncate_address};
use pumpradar::{ConfigManager, Engine, Settings};

const DEFAULT_CONFIG_PATH: &str = "pumpradar.toml";

fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    // Create logs directory if it doesn't exist
    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::daily("logs", "pumpradar.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_level(true)
        .compact();

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .json()
        .with_current_span(false)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    Ok(guard)
}

fn print_results(change: &ResultChanged) {
    println!("\n{} {} ({:?})", "📊".bright_blue(), "ACCEPTED TOKENS".bright_green().bold(), change.kind);
    println!("{}", "=".repeat(100).green());
    if change.snapshot.is_empty() {
        println!("{}", "   no tokens yet".dimmed());
    }
    for entry in change.snapshot.iter() {
        print_entry(entry);
    }
    println!("{}", "=".repeat(100).green());
}

fn print_entry(entry: &AcceptedEntry) {
    let link = |present: bool, label: &str| {
        if present {
            label.bright_cyan().bold()
        } else {
            label.dimmed()
        }
    };

    println!(
        "{:<18} {:<10} buy {:>10} | mcap {:>10} | vol 1h {:>10} | {} | {} {} {} | {} {}",
        entry.name.bright_white().bold(),
        entry.symbol.yellow(),
        format_usd(entry.initial_buy_usd),
        format_usd(entry.market_cap).green(),
        format_usd(entry.volume_h1),
        entry.creation_date.cyan(),
        link(entry.twitter.is_some(), "X"),
        link(entry.telegram.is_some(), "TG"),
        link(entry.website.is_some(), "WEB"),
        truncate_address(&entry.mint).blue(),
        coin_url(&entry.mint).underline(),
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_tracing()?;

    info!("📡 Pump Radar - launch monitor");
    info!("======================================");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config_manager = if Path::new(&config_path).exists() {
        Some(Arc::new(ConfigManager::new(&config_path)?))
    } else {
        warn!(path = %config_path, "Config file not found, using defaults");
        None
    };
    let settings = match &config_manager {
        Some(manager) => manager.get_settings(),
        None => Settings::default(),
    };

    let engine = Arc::new(Engine::from_settings(settings)?);

    let mut results = engine.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match results.recv().await {
                Ok(change) => print_results(&change),
                Err(RecvError::Lagged(skipped)) => warn!(skipped = skipped, "Result printer lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let reload = config_manager
        .map(|manager| manager.start_hot_reload(Arc::clone(&engine), Duration::from_secs(5)));

    engine.start().await;
    info!("Press Ctrl+C to stop monitoring");

    match signal::ctrl_c().await {
        Ok(()) => info!("🛑 Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    if let Some(reload) = reload {
        reload.abort();
    }
    engine.stop().await;
    printer.abort();

    info!("👋 Pump Radar shutdown complete");
    Ok(())
}
