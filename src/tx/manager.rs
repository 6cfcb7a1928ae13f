//! Send-and-confirm and batch confirmation on top of the pipeline
//!
//! Every operation is a single attempt. Failures and timeouts go back to the
//! caller unchanged; resubmitting automatically could reuse a nonce the
//! tracker already handed out.

use super::builder::TransactionBuilder;
use super::gas::GasEstimator;
use super::nonce::NonceTracker;
use super::receipt::ReceiptWaiter;
use super::request::{PreparedTransaction, TransactionIntent};
use super::sender::TransactionSender;
use crate::chain::{EthersGateway, Gateway};
use crate::config::{Settings, TransactionConfig};
use crate::error::{DeployError, DeployResult};

use ethers::signers::LocalWallet;
use ethers::types::{Address, Bytes, TransactionReceipt, TransactionRequest, H256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// A submitted, not yet confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTransaction {
    pub tx_hash: H256,
    pub transaction: PreparedTransaction,
}

/// Entry point for sending transactions and waiting for them
pub struct TransactionManager {
    gateway: Arc<dyn Gateway>,
    builder: TransactionBuilder,
    sender: TransactionSender,
    waiter: ReceiptWaiter,
    receipt_timeout: Duration,
    batch_timeout: Duration,
}

impl TransactionManager {
    /// Create a manager over `gateway`.
    ///
    /// `nonces` should be shared by every manager in the process that sends
    /// from the same addresses.
    pub fn new(
        gateway: Arc<dyn Gateway>,
        nonces: Arc<NonceTracker>,
        wallet: Option<LocalWallet>,
        default_from: Option<Address>,
        config: &TransactionConfig,
    ) -> Self {
        let sender = TransactionSender::new(gateway.clone(), wallet);
        let builder = TransactionBuilder::new(
            gateway.clone(),
            nonces,
            GasEstimator::new(config.gas_limit_buffer_percent),
            sender.wallet_address(),
            default_from,
        );
        let waiter = ReceiptWaiter::new(gateway.clone(), config.poll_interval());

        Self {
            gateway,
            builder,
            sender,
            waiter,
            receipt_timeout: config.receipt_timeout(),
            batch_timeout: config.batch_timeout(),
        }
    }

    /// Connect to the configured node and load the configured key
    pub async fn from_settings(settings: &Settings) -> DeployResult<Self> {
        let gateway = EthersGateway::connect(&settings.node.jsonrpc).await?;

        let wallet = settings
            .private_key()
            .map(|key| TransactionSender::load_wallet(&key))
            .transpose()?;
        let default_from = settings
            .default_from()
            .map_err(|e| DeployError::Config(e.to_string()))?;

        Ok(Self::new(
            Arc::new(gateway),
            Arc::new(NonceTracker::new()),
            wallet,
            default_from,
            &settings.transactions,
        ))
    }

    /// Build and submit without waiting for the receipt
    pub async fn send(&self, intent: TransactionIntent) -> DeployResult<SentTransaction> {
        let transaction = self.builder.build(intent).await?;
        let tx_hash = self.sender.submit(&transaction).await?;
        Ok(SentTransaction {
            tx_hash,
            transaction,
        })
    }

    /// Build, submit and wait until the transaction is mined successfully
    pub async fn send_and_confirm(
        &self,
        intent: TransactionIntent,
    ) -> DeployResult<TransactionReceipt> {
        let sent = self.send(intent).await?;
        self.waiter
            .wait_for_receipt(sent.tx_hash, Some(sent.transaction.gas), self.receipt_timeout)
            .await
    }

    /// Deploy a contract from init code and return its address
    pub async fn deploy(
        &self,
        intent: TransactionIntent,
    ) -> DeployResult<(Address, TransactionReceipt)> {
        if intent.to.is_some() {
            return Err(DeployError::Config(
                "contract creation must not set a recipient".to_string(),
            ));
        }

        let receipt = self.send_and_confirm(intent).await?;
        let address = receipt
            .contract_address
            .ok_or(DeployError::NoContractCreated(receipt.transaction_hash))?;

        info!("Contract deployed at {:?}", address);
        Ok((address, receipt))
    }

    /// Read-only call of `to` with ABI encoded `data`; nothing is sent
    pub async fn call(&self, to: Address, data: Bytes) -> DeployResult<Bytes> {
        let tx = TransactionRequest::new().to(to).data(data);
        self.gateway.call(&tx).await
    }

    /// Wait for already sent transactions, in order.
    ///
    /// Stops at the first transaction that fails or times out; the error
    /// carries its index and the receipts confirmed before it. Transactions
    /// after it are not polled.
    pub async fn confirm_batch(&self, tx_hashes: &[H256]) -> DeployResult<Vec<TransactionReceipt>> {
        let mut confirmed = Vec::with_capacity(tx_hashes.len());

        for (index, tx_hash) in tx_hashes.iter().copied().enumerate() {
            match self
                .waiter
                .wait_for_receipt(tx_hash, None, self.batch_timeout)
                .await
            {
                Ok(receipt) => confirmed.push(receipt),
                Err(e) => {
                    error!(
                        "Batch stopped at {} of {} ({:?}): {}",
                        index + 1,
                        tx_hashes.len(),
                        tx_hash,
                        e
                    );
                    return Err(DeployError::BatchFailed {
                        index,
                        tx_hash,
                        confirmed,
                        source: Box::new(e),
                    });
                }
            }
        }

        info!("Confirmed {} transactions", confirmed.len());
        Ok(confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockGateway;
    use ethers::types::{U256, U64};
    use std::sync::Mutex;

    const FROM: u64 = 0xf00;

    fn receipt(tx_hash: H256, status: u64) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: tx_hash,
            block_number: Some(U64::from(1)),
            status: Some(U64::from(status)),
            gas_used: Some(U256::from(21_000)),
            ..Default::default()
        }
    }

    fn config() -> TransactionConfig {
        TransactionConfig {
            poll_interval_ms: 100,
            receipt_timeout_secs: 10,
            batch_timeout_secs: 10,
            gas_limit_buffer_percent: 0,
        }
    }

    fn manager(gateway: MockGateway) -> TransactionManager {
        TransactionManager::new(
            Arc::new(gateway),
            Arc::new(NonceTracker::new()),
            None,
            Some(Address::from_low_u64_be(FROM)),
            &config(),
        )
    }

    fn node_gateway() -> MockGateway {
        let mut gateway = MockGateway::new();
        gateway.expect_chain_id().return_const(1337u64);
        gateway
            .expect_get_gas_price()
            .returning(|| Ok(U256::from(1_000_000_000u64)));
        gateway
            .expect_estimate_gas()
            .returning(|_| Ok(U256::from(21_000)));
        gateway
            .expect_get_pending_nonce()
            .times(1)
            .returning(|_| Ok(U256::from(12)));
        gateway
    }

    #[tokio::test]
    async fn test_send_and_confirm_populates_request() {
        let mut gateway = node_gateway();
        gateway
            .expect_send_unsigned()
            .withf(|tx| {
                tx.gas == Some(U256::from(21_000))
                    && tx.gas_price == Some(U256::from(1_000_000_000u64))
                    && tx.nonce == Some(U256::from(12))
                    && tx.from == Some(Address::from_low_u64_be(FROM))
            })
            .times(1)
            .returning(|_| Ok(H256::repeat_byte(1)));
        gateway
            .expect_get_receipt()
            .returning(|hash| Ok(Some(receipt(hash, 1))));

        let intent = TransactionIntent::transfer(Address::from_low_u64_be(2), 10u64);
        let receipt = manager(gateway).send_and_confirm(intent).await.unwrap();
        assert_eq!(receipt.transaction_hash, H256::repeat_byte(1));
    }

    #[tokio::test]
    async fn test_consecutive_sends_use_consecutive_nonces() {
        let nonces = Arc::new(Mutex::new(Vec::new()));
        let seen = nonces.clone();

        let mut gateway = node_gateway();
        gateway.expect_send_unsigned().times(2).returning(move |tx| {
            let nonce = tx.nonce.unwrap();
            seen.lock().unwrap().push(nonce);
            Ok(H256::from_low_u64_be(nonce.as_u64()))
        });
        gateway.expect_get_receipt().never();

        let manager = manager(gateway);
        let to = Address::from_low_u64_be(2);
        let value = U256::exp10(16);
        let first = manager.send(TransactionIntent::transfer(to, value)).await.unwrap();
        let second = manager.send(TransactionIntent::transfer(to, value)).await.unwrap();

        assert_eq!(second.transaction.nonce, first.transaction.nonce + U256::one());
        assert_eq!(*nonces.lock().unwrap(), vec![U256::from(12), U256::from(13)]);
    }

    #[tokio::test]
    async fn test_reverted_transaction_is_not_resubmitted() {
        let mut gateway = node_gateway();
        gateway
            .expect_send_unsigned()
            .times(1)
            .returning(|_| Ok(H256::repeat_byte(3)));
        gateway
            .expect_get_receipt()
            .returning(|hash| Ok(Some(receipt(hash, 0))));

        let err = manager(gateway)
            .send_and_confirm(TransactionIntent::call(Address::from_low_u64_be(2), vec![0xaa]))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::TransactionFailed { .. }));
    }

    #[tokio::test]
    async fn test_deploy_returns_contract_address() {
        let contract = Address::from_low_u64_be(0xc0de);

        let mut gateway = node_gateway();
        gateway
            .expect_send_unsigned()
            .withf(|tx| tx.to.is_none())
            .returning(|_| Ok(H256::repeat_byte(4)));
        gateway.expect_get_receipt().returning(move |hash| {
            let mut r = receipt(hash, 1);
            r.contract_address = Some(contract);
            Ok(Some(r))
        });

        let (address, _) = manager(gateway)
            .deploy(TransactionIntent::deploy(vec![0x60, 0x80, 0x60, 0x40]))
            .await
            .unwrap();
        assert_eq!(address, contract);
    }

    #[tokio::test]
    async fn test_deploy_without_contract_address() {
        let mut gateway = node_gateway();
        gateway
            .expect_send_unsigned()
            .returning(|_| Ok(H256::repeat_byte(5)));
        gateway
            .expect_get_receipt()
            .returning(|hash| Ok(Some(receipt(hash, 1))));

        let err = manager(gateway)
            .deploy(TransactionIntent::deploy(vec![0x60, 0x80]))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::NoContractCreated(hash) if hash == H256::repeat_byte(5)));
    }

    #[tokio::test]
    async fn test_missing_status_checked_against_sent_gas() {
        let mut gateway = node_gateway();
        gateway
            .expect_send_unsigned()
            .times(1)
            .returning(|_| Ok(H256::repeat_byte(6)));
        gateway.expect_get_receipt().returning(|hash| {
            let mut r = receipt(hash, 1);
            r.status = None;
            Ok(Some(r))
        });
        gateway.expect_get_transaction_gas_limit().never();

        // estimate is 21000 and the receipt used all of it
        let err = manager(gateway)
            .send_and_confirm(TransactionIntent::transfer(Address::from_low_u64_be(2), 1u64))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::TransactionFailed { .. }));
    }

    #[tokio::test]
    async fn test_call_sends_nothing() {
        let mut gateway = MockGateway::new();
        gateway.expect_chain_id().return_const(1337u64);
        gateway
            .expect_call()
            .withf(|tx| tx.to == Some(Address::from_low_u64_be(2).into()) && tx.nonce.is_none())
            .times(1)
            .returning(|_| Ok(Bytes::from(vec![0x2a])));
        gateway.expect_send_unsigned().never();
        gateway.expect_send_raw().never();

        let out = manager(gateway)
            .call(Address::from_low_u64_be(2), Bytes::from(vec![0x12, 0x34]))
            .await
            .unwrap();
        assert_eq!(out.to_vec(), vec![0x2a]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_stops_at_first_timeout() {
        let id1 = H256::repeat_byte(1);
        let id2 = H256::repeat_byte(2);
        let id3 = H256::repeat_byte(3);

        let mut gateway = MockGateway::new();
        gateway.expect_chain_id().return_const(1337u64);
        gateway
            .expect_get_receipt()
            .withf(move |hash| *hash == id1)
            .returning(|hash| Ok(Some(receipt(hash, 1))));
        gateway
            .expect_get_receipt()
            .withf(move |hash| *hash == id2)
            .returning(|_| Ok(None));
        gateway
            .expect_get_receipt()
            .withf(move |hash| *hash == id3)
            .never();

        let err = manager(gateway)
            .confirm_batch(&[id1, id2, id3])
            .await
            .unwrap_err();

        match err {
            DeployError::BatchFailed {
                index,
                tx_hash,
                confirmed,
                source,
            } => {
                assert_eq!(index, 1);
                assert_eq!(tx_hash, id2);
                assert_eq!(confirmed.len(), 1);
                assert_eq!(confirmed[0].transaction_hash, id1);
                assert!(matches!(*source, DeployError::Timeout { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_batch_reports_failed_receipt() {
        let ok = H256::repeat_byte(1);
        let bad = H256::repeat_byte(2);

        let mut gateway = MockGateway::new();
        gateway.expect_chain_id().return_const(1337u64);
        gateway
            .expect_get_receipt()
            .returning(move |hash| Ok(Some(receipt(hash, if hash == bad { 0 } else { 1 }))));

        let manager = manager(gateway);
        let receipts = manager.confirm_batch(&[ok, ok]).await.unwrap();
        assert_eq!(receipts.len(), 2);

        let err = manager.confirm_batch(&[ok, bad, ok]).await.unwrap_err();
        assert!(matches!(err, DeployError::BatchFailed { index: 1, .. }));
        assert_eq!(err.receipt().map(|r| r.transaction_hash), Some(bad));
    }
}
