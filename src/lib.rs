//! deploy-tools - send, deploy and confirm Ethereum transactions
//!
//! The [`TransactionManager`] builds transactions from a
//! [`TransactionIntent`], fills gas, gas price and nonce, signs locally or
//! through the node, and waits for a successful receipt.

pub mod chain;
pub mod config;
pub mod error;
pub mod tx;

pub use chain::{EthersGateway, Gateway};
pub use config::Settings;
pub use error::{DeployError, DeployResult};
pub use tx::{NonceTracker, TransactionIntent, TransactionManager};
