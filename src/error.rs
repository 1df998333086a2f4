use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Malformed response envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Response does not contain a ledger table")]
    MissingTable,

    #[error("Data source reported an error: {0}")]
    SourceError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Refresh #{ticket} was superseded by refresh #{applied}")]
    SupersededRefresh { ticket: u64, applied: u64 },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "remote")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
