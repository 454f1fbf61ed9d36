//! Central error aggregation for the core crate.

use crate::bus::BusError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("task join error: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Join(format!("{value:?}"))
    }
}
