//! Chain module - the node connection used by the transaction pipeline
//!
//! Everything above this module talks to the node through the [`Gateway`]
//! trait so the pipeline can run against a mock in tests.

pub mod provider;

pub use provider::EthersGateway;

use crate::error::DeployResult;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, TransactionReceipt, TransactionRequest, H256, U256};

/// Reads and submissions needed to drive a transaction to a receipt
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Chain ID used for EIP-155 replay protection
    fn chain_id(&self) -> u64;

    /// Accounts held (and possibly unlocked) by the node
    async fn accounts(&self) -> DeployResult<Vec<Address>>;

    /// Transaction count of `address` including the node's pending pool
    async fn get_pending_nonce(&self, address: Address) -> DeployResult<U256>;

    /// Suggested legacy gas price in wei
    async fn get_gas_price(&self) -> DeployResult<U256>;

    /// Gas estimate; an error means the node expects the call to revert
    async fn estimate_gas(&self, tx: &TransactionRequest) -> DeployResult<U256>;

    /// Read-only `eth_call` against the latest block
    async fn call(&self, tx: &TransactionRequest) -> DeployResult<Bytes>;

    /// Submit an RLP encoded signed transaction
    async fn send_raw(&self, raw: Bytes) -> DeployResult<H256>;

    /// Submit a transaction for the node to sign with an unlocked account
    async fn send_unsigned(&self, tx: &TransactionRequest) -> DeployResult<H256>;

    /// Receipt of a mined transaction, `None` while it is not mined
    async fn get_receipt(&self, tx_hash: H256) -> DeployResult<Option<TransactionReceipt>>;

    /// Gas limit the node recorded for a known transaction
    async fn get_transaction_gas_limit(&self, tx_hash: H256) -> DeployResult<Option<U256>>;
}
