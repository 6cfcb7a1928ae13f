//! Turns a [`TransactionIntent`] into a [`PreparedTransaction`]
//!
//! Only read calls are made against the node. The nonce is drawn last, after
//! gas estimation succeeded, so a transaction that would revert never
//! consumes a nonce from the tracker.

use super::gas::GasEstimator;
use super::nonce::NonceTracker;
use super::request::{PreparedTransaction, TransactionIntent};
use crate::chain::Gateway;
use crate::error::{DeployError, DeployResult};

use ethers::types::Address;
use std::sync::Arc;
use tracing::debug;

/// Fills unset transaction fields with defaults
pub struct TransactionBuilder {
    gateway: Arc<dyn Gateway>,
    nonces: Arc<NonceTracker>,
    gas_estimator: GasEstimator,
    /// Address of the local signing key, if one is configured
    signer: Option<Address>,
    /// Configured fallback sender
    default_from: Option<Address>,
}

impl TransactionBuilder {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        nonces: Arc<NonceTracker>,
        gas_estimator: GasEstimator,
        signer: Option<Address>,
        default_from: Option<Address>,
    ) -> Self {
        Self {
            gateway,
            nonces,
            gas_estimator,
            signer,
            default_from,
        }
    }

    /// Populate every field of `intent`
    pub async fn build(&self, intent: TransactionIntent) -> DeployResult<PreparedTransaction> {
        let gateway = self.gateway.as_ref();
        let from = self.resolve_from(intent.from).await?;

        let gas_price = match intent.gas_price {
            Some(price) => price,
            None => self.gas_estimator.gas_price(gateway).await?,
        };

        let gas = match intent.gas {
            Some(gas) => gas,
            None => {
                let request = intent.estimation_request(from, gas_price);
                self.gas_estimator.gas_limit(gateway, &request).await?
            }
        };

        let nonce = match intent.nonce {
            Some(nonce) => nonce,
            None => self.nonces.next_nonce(gateway, from).await?,
        };

        let prepared = PreparedTransaction {
            from,
            to: intent.to,
            data: intent.data,
            value: intent.value,
            gas,
            gas_price,
            nonce,
            chain_id: gateway.chain_id(),
        };

        debug!(
            "Prepared transaction from {:?} nonce {} gas {} @ {} wei (max cost {})",
            prepared.from,
            prepared.nonce,
            prepared.gas,
            prepared.gas_price,
            prepared.max_cost()
        );
        Ok(prepared)
    }

    /// Sender: explicit `from`, else local key, else configured default,
    /// else the node's first account.
    async fn resolve_from(&self, requested: Option<Address>) -> DeployResult<Address> {
        if let Some(signer) = self.signer {
            return match requested {
                Some(from) if from != signer => Err(DeployError::Config(format!(
                    "from {:?} does not match the private key's address {:?}",
                    from, signer
                ))),
                _ => Ok(signer),
            };
        }

        if let Some(from) = requested.or(self.default_from) {
            return Ok(from);
        }

        self.gateway
            .accounts()
            .await?
            .first()
            .copied()
            .ok_or_else(|| {
                DeployError::Config(
                    "No sender available: configure a private key or default_from".to_string(),
                )
            })
    }
}
