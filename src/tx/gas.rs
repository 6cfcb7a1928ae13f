//! Gas price and gas limit defaults

use crate::chain::Gateway;
use crate::error::DeployResult;

use ethers::types::{TransactionRequest, U256};
use tracing::debug;

/// Fills gas price and gas limit from the node
#[derive(Debug, Clone, Default)]
pub struct GasEstimator {
    /// Buffer percentage for gas limit (e.g., 20 = 20% buffer)
    gas_limit_buffer_percent: u64,
}

impl GasEstimator {
    /// Create a new gas estimator
    pub fn new(gas_limit_buffer_percent: u64) -> Self {
        Self {
            gas_limit_buffer_percent,
        }
    }

    /// Node's suggested gas price
    pub async fn gas_price(&self, gateway: &dyn Gateway) -> DeployResult<U256> {
        let price = gateway.get_gas_price().await?;
        debug!("Suggested gas price: {} wei", price);
        Ok(price)
    }

    /// Estimated gas limit for `tx`, plus the configured buffer
    pub async fn gas_limit(
        &self,
        gateway: &dyn Gateway,
        tx: &TransactionRequest,
    ) -> DeployResult<U256> {
        let estimate = gateway.estimate_gas(tx).await?;
        let limit = self.with_buffer(estimate);
        debug!("Gas estimate {} -> limit {}", estimate, limit);
        Ok(limit)
    }

    fn with_buffer(&self, estimate: U256) -> U256 {
        let buffer = estimate * self.gas_limit_buffer_percent / 100;
        estimate.saturating_add(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockGateway;
    use crate::error::DeployError;

    #[test]
    fn test_buffer() {
        assert_eq!(GasEstimator::new(0).with_buffer(U256::from(21_000)), U256::from(21_000));
        assert_eq!(GasEstimator::new(20).with_buffer(U256::from(100_000)), U256::from(120_000));
    }

    #[tokio::test]
    async fn test_estimation_failure_propagates() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_estimate_gas()
            .returning(|_| Err(DeployError::GasEstimation("execution reverted".into())));

        let err = GasEstimator::default()
            .gas_limit(&gateway, &TransactionRequest::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::GasEstimation(_)));
    }
}
