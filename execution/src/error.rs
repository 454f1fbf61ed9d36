use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("invalid action for an order: only BUY/SELL are tradeable")]
    InvalidAction,

    #[error("invalid quantity: must be greater than zero")]
    InvalidQuantity,

    #[error("repository error: {0}")]
    Repo(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("repository error: {0}")]
pub struct RepoError(pub String);
