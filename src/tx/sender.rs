//! Signing and submission of prepared transactions
//!
//! A transaction is signed locally when the private key for its sender is
//! configured and sent with `eth_sendRawTransaction`. Otherwise it is handed
//! to the node with `eth_sendTransaction`, which needs the sender unlocked on
//! the node. Each submission is exactly one node call. Rejections are not
//! retried: resending with a guessed nonce would break the tracker's
//! sequence.

use super::request::PreparedTransaction;
use crate::chain::Gateway;
use crate::error::{DeployError, DeployResult};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, H256};
use std::sync::Arc;
use tracing::{error, info};

/// What actually goes to the node for one submission
#[derive(Debug, Clone, PartialEq)]
pub enum SignedEnvelope {
    /// RLP encoded transaction signed with a local key
    Raw(Bytes),
    /// Request for the node to sign with one of its accounts
    Unsigned(TransactionRequest),
}

/// Transaction sender
pub struct TransactionSender {
    gateway: Arc<dyn Gateway>,
    /// Local signing key, bound to the gateway's chain ID
    wallet: Option<LocalWallet>,
}

impl TransactionSender {
    /// Create a new transaction sender
    pub fn new(gateway: Arc<dyn Gateway>, wallet: Option<LocalWallet>) -> Self {
        let chain_id = gateway.chain_id();
        let wallet = wallet.map(|w| w.with_chain_id(chain_id));

        if let Some(wallet) = &wallet {
            info!("Signing locally with {:?}", wallet.address());
        }

        Self { gateway, wallet }
    }

    /// Parse a hex private key, with or without `0x`
    pub fn load_wallet(private_key: &str) -> DeployResult<LocalWallet> {
        private_key
            .trim()
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| DeployError::Wallet(format!("Invalid private key: {}", e)))
    }

    /// Address of the local signing key
    pub fn wallet_address(&self) -> Option<Address> {
        self.wallet.as_ref().map(Signer::address)
    }

    /// Sign locally if we hold the sender's key, otherwise wrap for the node
    pub fn envelope(&self, tx: &PreparedTransaction) -> DeployResult<SignedEnvelope> {
        let request = tx.to_request();

        match &self.wallet {
            Some(wallet) if wallet.address() == tx.from => {
                let typed = TypedTransaction::Legacy(request);
                let signature = wallet
                    .sign_transaction_sync(&typed)
                    .map_err(|e| DeployError::Wallet(e.to_string()))?;
                Ok(SignedEnvelope::Raw(typed.rlp_signed(&signature)))
            }
            _ => Ok(SignedEnvelope::Unsigned(request)),
        }
    }

    /// Submit a prepared transaction and return its hash
    pub async fn submit(&self, tx: &PreparedTransaction) -> DeployResult<H256> {
        let result = match self.envelope(tx)? {
            SignedEnvelope::Raw(raw) => self.gateway.send_raw(raw).await,
            SignedEnvelope::Unsigned(request) => self.gateway.send_unsigned(&request).await,
        };

        match result {
            Ok(tx_hash) => {
                info!(
                    "Transaction sent: {:?} (from {:?}, nonce {})",
                    tx_hash, tx.from, tx.nonce
                );
                Ok(tx_hash)
            }
            Err(e) => {
                error!("Submission from {:?} nonce {} failed: {}", tx.from, tx.nonce, e);
                Err(e)
            }
        }
    }
}
