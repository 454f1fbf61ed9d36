use thiserror::Error;

/// Error taxonomy for a [`crate::provider::MarketDataProvider`] (spec §4.4).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("not connected")]
    NotConnected,

    #[error("authentication failed")]
    AuthFailed,

    #[error("transient network error: {0}")]
    Transient(String),

    #[error("fatal: reconnect attempts exhausted")]
    Fatal,

    #[error("csv error: {0}")]
    Csv(String),
}
