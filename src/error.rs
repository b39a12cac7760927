use thiserror::Error;

/// Failures talking to the market-data provider or a metadata host
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: reqwest::StatusCode },

    #[error("Malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Failures on the launch feed connection
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Feed connection failed: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("Feed connection timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    #[error("Subscription request failed: {0}")]
    Subscribe(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("Feed transport error: {0}")]
    Transport(#[source] tokio_tungstenite::tungstenite::Error),
}

/// Invalid or unreadable engine settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {field} = {value}")]
    Invalid { field: &'static str, value: String },
}
