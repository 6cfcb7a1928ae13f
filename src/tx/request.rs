//! Transaction intent and the fully populated request built from it

use ethers::types::{Address, Bytes, TransactionRequest, U256};

/// What the caller wants sent. Unset fields are filled by the builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionIntent {
    pub from: Option<Address>,
    /// Recipient; `None` creates a contract from `data`
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
    pub gas: Option<U256>,
    pub gas_price: Option<U256>,
    pub nonce: Option<U256>,
}

impl TransactionIntent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain ether transfer of `value` wei
    pub fn transfer(to: Address, value: impl Into<U256>) -> Self {
        Self::new().to(to).value(value)
    }

    /// Contract function call with ABI encoded calldata
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self::new().to(to).data(data)
    }

    /// Contract creation from init code (bytecode followed by encoded constructor args)
    pub fn deploy(init_code: impl Into<Bytes>) -> Self {
        Self::new().data(init_code)
    }

    #[must_use]
    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    #[must_use]
    pub fn to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    #[must_use]
    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    #[must_use]
    pub fn value(mut self, value: impl Into<U256>) -> Self {
        self.value = value.into();
        self
    }

    #[must_use]
    pub fn gas(mut self, gas: impl Into<U256>) -> Self {
        self.gas = Some(gas.into());
        self
    }

    #[must_use]
    pub fn gas_price(mut self, gas_price: impl Into<U256>) -> Self {
        self.gas_price = Some(gas_price.into());
        self
    }

    #[must_use]
    pub fn nonce(mut self, nonce: impl Into<U256>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Request used for gas estimation: everything known except gas and nonce
    pub(crate) fn estimation_request(&self, from: Address, gas_price: U256) -> TransactionRequest {
        let mut tx = TransactionRequest::new()
            .from(from)
            .data(self.data.clone())
            .value(self.value)
            .gas_price(gas_price);
        if let Some(to) = self.to {
            tx = tx.to(to);
        }
        tx
    }
}

/// A transaction with every field needed for submission populated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransaction {
    pub from: Address,
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
    pub gas: U256,
    pub gas_price: U256,
    pub nonce: U256,
    pub chain_id: u64,
}

impl PreparedTransaction {
    /// Legacy (EIP-155) request as sent to the node or signed locally
    pub fn to_request(&self) -> TransactionRequest {
        let mut tx = TransactionRequest::new()
            .from(self.from)
            .data(self.data.clone())
            .value(self.value)
            .gas(self.gas)
            .gas_price(self.gas_price)
            .nonce(self.nonce)
            .chain_id(self.chain_id);
        if let Some(to) = self.to {
            tx = tx.to(to);
        }
        tx
    }

    /// Upper bound of the fee this transaction can burn, in wei
    pub fn max_cost(&self) -> U256 {
        self.gas.saturating_mul(self.gas_price)
    }
}
