use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::Role;

/// Typed error hierarchy for the strategy engine.
///
/// Library-internal errors use specific variants; collaborator failures keep
/// the collaborator's error chain as `reason`. Application code wraps with
/// `anyhow::Context` for propagation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    // -- Access control -----------------------------------------------------
    #[error("AccessControl: account {principal} is missing role {role}")]
    Unauthorized { principal: Address, role: Role },

    // -- Configuration ------------------------------------------------------
    #[error("invalid range for chain {chain_id}: min {min_amount} > max {max_amount}")]
    InvalidRange {
        chain_id: u64,
        min_amount: U256,
        max_amount: U256,
    },

    #[error("configuration error: {0}")]
    Config(String),

    // -- Bridging -----------------------------------------------------------
    #[error("no bridge route configured for chain {chain_id}")]
    NoRouteConfigured { chain_id: u64 },

    #[error("bridge amount {amount} outside [{min_amount}, {max_amount}] for chain {chain_id}")]
    AmountOutOfRange {
        chain_id: u64,
        amount: U256,
        min_amount: U256,
        max_amount: U256,
    },

    #[error("bridge gateway send failed: {reason}")]
    BridgeFailed { reason: String },

    #[error("price oracle unavailable: {reason}")]
    OracleUnavailable { reason: String },

    // -- Leverage / health --------------------------------------------------
    #[error("leverage exceeded: borrowed {borrowed} + {requested} > limit {limit}")]
    LeverageExceeded {
        borrowed: U256,
        requested: U256,
        limit: U256,
    },

    #[error("unhealthy position: health factor {health_factor} below minimum {threshold}")]
    UnhealthyPosition {
        health_factor: Decimal,
        threshold: Decimal,
    },

    // -- Lending market -----------------------------------------------------
    #[error("supply failed: {reason}")]
    SupplyFailed { reason: String },

    #[error("borrow failed: {reason}")]
    BorrowFailed { reason: String },

    #[error("repay failed: {reason}")]
    RepayFailed { reason: String },

    #[error("collateral withdrawal failed: {reason}")]
    CollateralWithdrawFailed { reason: String },

    #[error("lending market query failed: {reason}")]
    MarketQueryFailed { reason: String },

    #[error("withdrawal rejected: {reason}")]
    WithdrawRejected { reason: String },

    // -- Yield vault --------------------------------------------------------
    #[error("vault deposit failed: {reason}")]
    VaultDepositFailed { reason: String },

    #[error("vault withdrawal failed: {reason}")]
    VaultWithdrawFailed { reason: String },

    #[error("earn failed: {reason}")]
    EarnFailed { reason: String },

    #[error("harvest failed: {reason}")]
    HarvestFailed { reason: String },

    // -- Base asset ---------------------------------------------------------
    #[error("token transfer failed: {reason}")]
    TransferFailed { reason: String },

    #[error("token balance query failed: {reason}")]
    BalanceQueryFailed { reason: String },

    // -- Transport ----------------------------------------------------------
    #[error("{operation} timed out after {timeout_seconds}s")]
    CollaboratorTimeout {
        operation: &'static str,
        timeout_seconds: u64,
    },
}
