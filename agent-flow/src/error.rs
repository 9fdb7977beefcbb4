use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors surfaced by workflow and storage operations
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Storage error: {0}")]
    StorageError(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
