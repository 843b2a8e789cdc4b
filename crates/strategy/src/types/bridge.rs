use alloy::primitives::{Address, B256, U256};
use rust_decimal::Decimal;

/// Bridge route for one destination chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTokenInfo {
    pub source_token: Address,
    pub dest_token: Address,
    pub min_amount: U256,
    pub max_amount: U256,
}

impl ChainTokenInfo {
    /// Whether `amount` lies inside the inclusive `[min_amount, max_amount]` window.
    pub fn accepts(&self, amount: U256) -> bool {
        amount >= self.min_amount && amount <= self.max_amount
    }
}

/// Acknowledgement returned by the bridge gateway when a transfer is initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayReceipt {
    pub submission_id: B256,
}

/// Source-side record of an initiated cross-chain transfer.
///
/// Holding a receipt means the transfer was handed to the gateway, not that
/// it settled on the destination chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeReceipt {
    pub submission_id: B256,
    pub chain_id: u64,
    pub source_token: Address,
    pub dest_token: Address,
    pub amount: U256,
    pub recipient: Address,
    /// Oracle price of `source_token` at the time of the call.
    pub price: Decimal,
}
