//! External collaborator interfaces consumed by the strategy core.
//!
//! Each trait is the boundary to a remote system (lending market, bridge
//! gateway, compounding vault, price oracle, base-asset token). Every
//! implementation is bound to the strategy's own account, so calls carry no
//! explicit `from`. Methods return `anyhow::Result`; the core maps failures
//! into typed [`StrategyError`] variants and bounds every call with a timeout
//! via [`bounded`].

use std::future::Future;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use anyhow::Result;
use rust_decimal::Decimal;

use crate::errors::StrategyError;
use crate::types::GatewayReceipt;

/// Lending market holding the strategy's collateral and debt.
pub trait LendingMarket: Send + Sync {
    /// Address the strategy approves before supply/repay.
    fn address(&self) -> Address;

    fn supply(&self, asset: Address, amount: U256) -> impl Future<Output = Result<()>> + Send;

    fn borrow(&self, asset: Address, amount: U256) -> impl Future<Output = Result<()>> + Send;

    fn repay(&self, asset: Address, amount: U256) -> impl Future<Output = Result<()>> + Send;

    /// Withdraw collateral; returns the amount actually withdrawn.
    fn withdraw(&self, asset: Address, amount: U256) -> impl Future<Output = Result<U256>> + Send;

    fn health_factor(&self, account: Address) -> impl Future<Output = Result<Decimal>> + Send;

    fn supplied_balance(&self, account: Address) -> impl Future<Output = Result<U256>> + Send;

    fn borrowed_balance(&self, account: Address) -> impl Future<Output = Result<U256>> + Send;
}

/// Cross-chain bridge gateway. `send` initiates a transfer and returns
/// without waiting for destination-chain settlement.
pub trait BridgeGateway: Send + Sync {
    fn address(&self) -> Address;

    fn send(
        &self,
        token: Address,
        amount: U256,
        destination_chain_id: u64,
        dest_token: Address,
        recipient: Address,
    ) -> impl Future<Output = Result<GatewayReceipt>> + Send;
}

/// Auto-compounding yield vault (share based).
pub trait YieldVault: Send + Sync {
    fn address(&self) -> Address;

    /// Deposit `amount` of the underlying; returns shares minted.
    fn deposit(&self, amount: U256) -> impl Future<Output = Result<U256>> + Send;

    /// Redeem `shares`; returns underlying returned.
    fn withdraw(&self, shares: U256) -> impl Future<Output = Result<U256>> + Send;

    /// Reinvest idle vault funds.
    fn earn(&self) -> impl Future<Output = Result<()>> + Send;

    /// Underlying per share, WAD-scaled (1e18 = 1:1).
    fn price_per_full_share(&self) -> impl Future<Output = Result<U256>> + Send;

    /// Reward emissions accrued to the strategy and not yet claimed.
    fn pending_rewards(&self) -> impl Future<Output = Result<U256>> + Send;

    /// Pay accrued rewards (in want) out to the strategy account; returns the
    /// amount claimed.
    fn claim_rewards(&self) -> impl Future<Output = Result<U256>> + Send;
}

/// Token price source.
pub trait PriceOracle: Send + Sync {
    fn get_price(&self, token: Address) -> impl Future<Output = Result<Decimal>> + Send;

    fn set_feed(&self, token: Address, feed: Address) -> impl Future<Output = Result<()>> + Send;
}

/// The want token, with standard balance/approve/transfer semantics.
pub trait AssetToken: Send + Sync {
    fn address(&self) -> Address;

    fn balance_of(&self, owner: Address) -> impl Future<Output = Result<U256>> + Send;

    fn approve(&self, spender: Address, amount: U256) -> impl Future<Output = Result<()>> + Send;

    fn transfer(&self, to: Address, amount: U256) -> impl Future<Output = Result<()>> + Send;
}

/// Await a collaborator call with an upper time bound.
///
/// Collaborator errors are mapped through `on_error` (which receives the full
/// error chain); an elapsed timer becomes [`StrategyError::CollaboratorTimeout`].
pub async fn bounded<T, F, E>(
    operation: &'static str,
    limit: Duration,
    call: F,
    on_error: E,
) -> Result<T, StrategyError>
where
    F: Future<Output = Result<T>>,
    E: FnOnce(String) -> StrategyError,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(on_error(format!("{operation}: {e:#}"))),
        Err(_) => Err(StrategyError::CollaboratorTimeout {
            operation,
            timeout_seconds: limit.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_value_through() {
        let value = bounded("noop", Duration::from_secs(1), async { Ok(7u32) }, |reason| {
            StrategyError::SupplyFailed { reason }
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_bounded_maps_collaborator_error() {
        let err = bounded(
            "supply",
            Duration::from_secs(1),
            async { Err::<(), _>(anyhow::anyhow!("insufficient allowance")) },
            |reason| StrategyError::SupplyFailed { reason },
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            StrategyError::SupplyFailed {
                reason: "supply: insufficient allowance".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let err = bounded(
            "borrow",
            Duration::from_secs(5),
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            },
            |reason| StrategyError::BorrowFailed { reason },
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            StrategyError::CollaboratorTimeout {
                operation: "borrow",
                timeout_seconds: 5
            }
        );
    }
}
