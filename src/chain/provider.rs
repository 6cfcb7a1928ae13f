//! JSON-RPC gateway backed by an ethers HTTP provider

use super::Gateway;
use crate::error::{DeployError, DeployResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider, ProviderError, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use tracing::{debug, info};

/// Gateway over a single node connection
pub struct EthersGateway {
    /// HTTP provider
    provider: Provider<Http>,
    /// Chain ID reported by the node at connect time
    chain_id: u64,
    /// Node URL, for log messages
    url: String,
}

impl EthersGateway {
    /// Connect to a node and read its chain ID
    pub async fn connect(url: &str) -> DeployResult<Self> {
        let provider = Provider::<Http>::try_from(url)
            .map_err(|e| DeployError::Config(format!("Invalid JSON-RPC URL {}: {}", url, e)))?;

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| DeployError::ChainConnection(format!("{}: {}", url, e)))?
            .as_u64();

        info!("Connected to {} (chain ID {})", url, chain_id);

        Ok(Self {
            provider,
            chain_id,
            url: url.to_string(),
        })
    }

    fn connection_error(&self, e: ProviderError) -> DeployError {
        DeployError::ChainConnection(format!("{}: {}", self.url, e))
    }

    /// A JSON-RPC error response means the node answered and refused the
    /// request; anything else never got an answer.
    fn rejection_error(&self, e: ProviderError, rejected: fn(String) -> DeployError) -> DeployError {
        if let Some(response) = RpcError::as_error_response(&e) {
            return rejected(response.to_string());
        }
        self.connection_error(e)
    }
}

#[async_trait]
impl Gateway for EthersGateway {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn accounts(&self) -> DeployResult<Vec<Address>> {
        self.provider
            .get_accounts()
            .await
            .map_err(|e| self.connection_error(e))
    }

    async fn get_pending_nonce(&self, address: Address) -> DeployResult<U256> {
        self.provider
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| self.connection_error(e))
    }

    async fn get_gas_price(&self) -> DeployResult<U256> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| self.connection_error(e))
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> DeployResult<U256> {
        let tx = TypedTransaction::Legacy(tx.clone());
        self.provider
            .estimate_gas(&tx, None)
            .await
            .map_err(|e| self.rejection_error(e, DeployError::GasEstimation))
    }

    async fn call(&self, tx: &TransactionRequest) -> DeployResult<Bytes> {
        let tx = TypedTransaction::Legacy(tx.clone());
        self.provider
            .call(&tx, None)
            .await
            .map_err(|e| self.rejection_error(e, DeployError::Call))
    }

    async fn send_raw(&self, raw: Bytes) -> DeployResult<H256> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| self.rejection_error(e, DeployError::Submission))?;

        Ok(pending.tx_hash())
    }

    async fn send_unsigned(&self, tx: &TransactionRequest) -> DeployResult<H256> {
        // Plain eth_sendTransaction: the provider's send_transaction would try
        // to fill fields the builder already settled.
        self.provider
            .request::<_, H256>("eth_sendTransaction", [tx])
            .await
            .map_err(|e| self.rejection_error(e, DeployError::Submission))
    }

    async fn get_receipt(&self, tx_hash: H256) -> DeployResult<Option<TransactionReceipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| self.connection_error(e))?;

        debug!("Receipt for {:?} present: {}", tx_hash, receipt.is_some());
        Ok(receipt)
    }

    async fn get_transaction_gas_limit(&self, tx_hash: H256) -> DeployResult<Option<U256>> {
        let tx = self
            .provider
            .get_transaction(tx_hash)
            .await
            .map_err(|e| self.connection_error(e))?;

        Ok(tx.map(|tx| tx.gas))
    }
}
