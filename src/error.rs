//! Error types for the farmer

use ethers::providers::ProviderError;
use thiserror::Error;

/// Main error type for the farmer
///
/// Nothing here is retried: apart from the zero-balance skip and the
/// quick-swap gas fallback, any error propagates up and ends the run.
#[derive(Error, Debug)]
pub enum FarmerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("ABI encoding error: {0}")]
    Encoding(String),

    #[error("Gas estimation error: {0}")]
    GasEstimation(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Unexpected chain response: {0}")]
    ChainData(String),
}

/// Result type for farmer operations
pub type FarmerResult<T> = Result<T, FarmerError>;
