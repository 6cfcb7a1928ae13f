//! Waiting for receipts and deciding whether a mined transaction succeeded
//!
//! Some node implementations leave out the receipt `status` field. For those
//! receipts a transaction that used exactly its gas limit is taken as an
//! out-of-gas revert and anything else as a success. This is a best-effort
//! heuristic, not something the protocol guarantees.

use crate::chain::Gateway;
use crate::error::{DeployError, DeployResult};

use ethers::types::{TransactionReceipt, H256, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Status as reported in a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Failure,
    /// Status field missing or not 0/1
    Unknown,
}

impl ReceiptStatus {
    pub fn of(receipt: &TransactionReceipt) -> Self {
        match receipt.status.map(|s| s.as_u64()) {
            Some(1) => ReceiptStatus::Success,
            Some(0) => ReceiptStatus::Failure,
            _ => ReceiptStatus::Unknown,
        }
    }
}

/// Final outcome of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failure,
}

/// Resolve a receipt status to an outcome.
///
/// `Unknown` becomes a failure only when the gas used equals the gas limit.
pub fn resolve_status(
    status: ReceiptStatus,
    gas_used: Option<U256>,
    gas_limit: Option<U256>,
) -> Verdict {
    match status {
        ReceiptStatus::Success => Verdict::Success,
        ReceiptStatus::Failure => Verdict::Failure,
        ReceiptStatus::Unknown => match (gas_used, gas_limit) {
            (Some(used), Some(limit)) if used == limit => Verdict::Failure,
            _ => Verdict::Success,
        },
    }
}

/// Polls the node until a transaction is mined
pub struct ReceiptWaiter {
    gateway: Arc<dyn Gateway>,
    poll_interval: Duration,
}

impl ReceiptWaiter {
    pub fn new(gateway: Arc<dyn Gateway>, poll_interval: Duration) -> Self {
        Self {
            gateway,
            poll_interval,
        }
    }

    /// Wait for `tx_hash` to be mined and check that it succeeded.
    ///
    /// `gas_limit` is the limit the transaction was sent with, if known. It
    /// is only needed for receipts without a status field and is looked up
    /// from the node when absent.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: H256,
        gas_limit: Option<U256>,
        timeout: Duration,
    ) -> DeployResult<TransactionReceipt> {
        let receipt = self.poll(tx_hash, timeout).await?;
        self.evaluate(receipt, gas_limit).await
    }

    /// Poll until a receipt shows up or `timeout` passes
    pub async fn poll(&self, tx_hash: H256, timeout: Duration) -> DeployResult<TransactionReceipt> {
        let deadline = Instant::now() + timeout;
        let mut polls = 0u32;

        loop {
            polls += 1;
            if let Some(receipt) = self.gateway.get_receipt(tx_hash).await? {
                debug!("Receipt for {:?} after {} polls", tx_hash, polls);
                return Ok(receipt);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!("No receipt for {:?} after {:?}", tx_hash, timeout);
                return Err(DeployError::Timeout {
                    tx_hash,
                    waited: timeout,
                });
            }

            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Decide whether a mined transaction succeeded
    pub async fn evaluate(
        &self,
        receipt: TransactionReceipt,
        gas_limit: Option<U256>,
    ) -> DeployResult<TransactionReceipt> {
        let status = ReceiptStatus::of(&receipt);

        let gas_limit = match (status, gas_limit) {
            (ReceiptStatus::Unknown, None) => {
                self.gateway
                    .get_transaction_gas_limit(receipt.transaction_hash)
                    .await?
            }
            _ => gas_limit,
        };

        let verdict = resolve_status(status, receipt.gas_used, gas_limit);
        if status == ReceiptStatus::Unknown {
            warn!(
                "Receipt for {:?} has no status, inferred {:?} from gas used {:?} / limit {:?}",
                receipt.transaction_hash, verdict, receipt.gas_used, gas_limit
            );
        }

        match verdict {
            Verdict::Success => {
                info!(
                    "Transaction {:?} succeeded in block {:?}",
                    receipt.transaction_hash, receipt.block_number
                );
                Ok(receipt)
            }
            Verdict::Failure => Err(DeployError::failed(receipt)),
        }
    }
}
