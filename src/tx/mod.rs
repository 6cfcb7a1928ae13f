//! Transaction submission module with nonce tracking, gas defaults and
//! receipt confirmation

mod builder;
mod gas;
mod manager;
mod nonce;
mod receipt;
mod request;
mod sender;

pub use builder::TransactionBuilder;
pub use gas::GasEstimator;
pub use manager::{SentTransaction, TransactionManager};
pub use nonce::NonceTracker;
pub use receipt::{resolve_status, ReceiptStatus, ReceiptWaiter, Verdict};
pub use request::{PreparedTransaction, TransactionIntent};
pub use sender::{SignedEnvelope, TransactionSender};
