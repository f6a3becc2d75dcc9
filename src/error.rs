use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Feed error: {0}")]
    FeedError(String),

    #[error("Malformed report: {0}")]
    MalformedReport(String),

    #[error("Unrecognized report tag: {0}")]
    UnrecognizedTag(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("No log entry with index {0}")]
    NoSuchEntry(u64),
}
