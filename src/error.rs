//! Error types for transaction submission and confirmation

use ethers::types::{TransactionReceipt, H256};
use std::time::Duration;
use thiserror::Error;

/// Main error type for deploy-tools
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chain connection error: {0}")]
    ChainConnection(String),

    #[error("Gas estimation failed, transaction would likely revert: {0}")]
    GasEstimation(String),

    #[error("Transaction rejected by node: {0}")]
    Submission(String),

    #[error("Call reverted: {0}")]
    Call(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Timeout after {waited:?} waiting for receipt of {tx_hash:?}")]
    Timeout { tx_hash: H256, waited: Duration },

    #[error("Transaction {tx_hash:?} failed in block {block:?}")]
    TransactionFailed {
        tx_hash: H256,
        block: Option<u64>,
        receipt: Box<TransactionReceipt>,
    },

    #[error("Transaction {0:?} succeeded but created no contract")]
    NoContractCreated(H256),

    #[error("Batch stopped at transaction {index} ({tx_hash:?}) after {} confirmed: {source}", .confirmed.len())]
    BatchFailed {
        index: usize,
        tx_hash: H256,
        confirmed: Vec<TransactionReceipt>,
        #[source]
        source: Box<DeployError>,
    },
}

impl DeployError {
    /// Build a failure from a mined receipt
    pub fn failed(receipt: TransactionReceipt) -> Self {
        DeployError::TransactionFailed {
            tx_hash: receipt.transaction_hash,
            block: receipt.block_number.map(|b| b.as_u64()),
            receipt: Box::new(receipt),
        }
    }

    /// Receipt of a mined but failed transaction, if this is one
    pub fn receipt(&self) -> Option<&TransactionReceipt> {
        match self {
            DeployError::TransactionFailed { receipt, .. } => Some(receipt),
            DeployError::BatchFailed { source, .. } => source.receipt(),
            _ => None,
        }
    }

    /// Check if the transaction may still be mined later
    pub fn is_pending(&self) -> bool {
        match self {
            DeployError::Timeout { .. } => true,
            DeployError::BatchFailed { source, .. } => source.is_pending(),
            _ => false,
        }
    }
}

/// Result type for deploy-tools operations
pub type DeployResult<T> = Result<T, DeployError>;
