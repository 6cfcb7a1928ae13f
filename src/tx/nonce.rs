//! Nonce tracking for sequential submissions from one process
//!
//! The first nonce for an address is seeded from the node's pending
//! transaction count. After that the tracker never asks the chain again and
//! hands out `last + 1`, so several transactions can be sent back to back
//! without waiting for the previous one to show up in the node's view.
//!
//! The tracker assumes this process is the only one submitting for the
//! addresses it tracks. Transactions sent by anyone else for the same
//! address will desynchronize it until the process restarts.

use crate::chain::Gateway;
use crate::error::DeployResult;

use dashmap::DashMap;
use ethers::types::{Address, U256};
use tracing::debug;

/// Per-address nonce counter
#[derive(Debug, Default)]
pub struct NonceTracker {
    /// Last issued nonce per signer address
    issued: DashMap<Address, U256>,
}

impl NonceTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next nonce for `address`
    pub async fn next_nonce(&self, gateway: &dyn Gateway, address: Address) -> DeployResult<U256> {
        if let Some(mut last) = self.issued.get_mut(&address) {
            *last += U256::one();
            debug!("Allocated nonce {} for {:?}", *last, address);
            return Ok(*last);
        }

        let pending = gateway.get_pending_nonce(address).await?;

        // Another task may have seeded the address while we were waiting on
        // the node; in that case continue its sequence.
        let nonce = *self
            .issued
            .entry(address)
            .and_modify(|last| *last += U256::one())
            .or_insert(pending);

        debug!(
            "Allocated nonce {} for {:?} (pending count {})",
            nonce, address, pending
        );
        Ok(nonce)
    }

    /// Last nonce handed out for `address`, if it has been seeded
    pub fn last_issued(&self, address: Address) -> Option<U256> {
        self.issued.get(&address).map(|n| *n)
    }

    /// Number of addresses being tracked
    pub fn tracked_count(&self) -> usize {
        self.issued.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockGateway;

    #[tokio::test]
    async fn test_seeds_once_then_increments() {
        let address = Address::from_low_u64_be(1);
        let mut gateway = MockGateway::new();
        gateway
            .expect_get_pending_nonce()
            .withf(move |a| *a == address)
            .times(1)
            .returning(|_| Ok(U256::from(7)));

        let tracker = NonceTracker::new();
        let mut issued = Vec::new();
        for _ in 0..5 {
            issued.push(tracker.next_nonce(&gateway, address).await.unwrap());
        }

        let expected: Vec<U256> = (7u64..12).map(U256::from).collect();
        assert_eq!(issued, expected);
        assert_eq!(tracker.last_issued(address), Some(U256::from(11)));
    }

    #[tokio::test]
    async fn test_addresses_are_independent() {
        let a = Address::from_low_u64_be(1);
        let b = Address::from_low_u64_be(2);
        let mut gateway = MockGateway::new();
        gateway
            .expect_get_pending_nonce()
            .times(2)
            .returning(move |addr| Ok(if addr == a { U256::zero() } else { U256::from(40) }));

        let tracker = NonceTracker::new();
        assert_eq!(tracker.next_nonce(&gateway, a).await.unwrap(), U256::zero());
        assert_eq!(tracker.next_nonce(&gateway, b).await.unwrap(), U256::from(40));
        assert_eq!(tracker.next_nonce(&gateway, a).await.unwrap(), U256::one());
        assert_eq!(tracker.next_nonce(&gateway, b).await.unwrap(), U256::from(41));
        assert_eq!(tracker.tracked_count(), 2);
    }

    #[tokio::test]
    async fn test_seed_failure_leaves_address_untracked() {
        let address = Address::from_low_u64_be(3);
        let mut gateway = MockGateway::new();
        gateway
            .expect_get_pending_nonce()
            .times(1)
            .returning(|_| Err(crate::error::DeployError::ChainConnection("down".into())));

        let tracker = NonceTracker::new();
        assert!(tracker.next_nonce(&gateway, address).await.is_err());
        assert_eq!(tracker.last_issued(address), None);
    }
}
