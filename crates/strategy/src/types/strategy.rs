use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Step the controller is executing. `Idle` whenever no flow is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    #[default]
    Idle,
    Supplying,
    Borrowing,
    Bridging,
    Repaying,
    WithdrawingCollateral,
}

impl FlowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Supplying => "supplying",
            Self::Borrowing => "borrowing",
            Self::Bridging => "bridging",
            Self::Repaying => "repaying",
            Self::WithdrawingCollateral => "withdrawing_collateral",
        }
    }
}

/// Point-in-time view of the strategy's book-keeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategySnapshot {
    pub want_token: Address,
    pub total_supplied: U256,
    pub total_borrowed: U256,
    pub leverage_bps: u32,
    pub destination_chain_id: u64,
    pub recipient: Address,
    /// Phase the most recent failed flow stopped in (`Idle` = rejected
    /// before any side effect).
    pub last_aborted_phase: Option<FlowPhase>,
}

/// Derived position view. Computed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSnapshot {
    pub supplied: U256,
    pub borrowed: U256,
    pub price: Decimal,
    pub collateral_value: Decimal,
    pub debt_value: Decimal,
    /// collateral value / debt value; `Decimal::MAX` without debt.
    pub computed_health_factor: Decimal,
    /// Health factor as reported by the lending market.
    pub market_health_factor: Decimal,
}
