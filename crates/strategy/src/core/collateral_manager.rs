//! Lending-market position: collateral in, debt out.
//!
//! Tracks `total_supplied` / `total_borrowed` as committed by the market and
//! enforces the leverage invariant
//! `total_borrowed <= total_supplied * leverage_bps / 10000`
//! before any borrow reaches the market. The health factor is always read
//! fresh from the market.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::core::events::{EventBus, StrategyEvent};
use crate::errors::StrategyError;
use crate::execution::collaborators::{bounded, AssetToken, LendingMarket};
use crate::types::wad_ray::{mul_bps, units_to_decimal};
use crate::types::PositionSnapshot;

/// Borrow ceiling for `supplied` at `leverage_bps`.
pub fn borrow_limit(supplied: U256, leverage_bps: u32) -> U256 {
    mul_bps(supplied, leverage_bps)
}

/// Whether `(supplied, borrowed)` satisfies the leverage invariant.
pub fn leverage_holds(supplied: U256, borrowed: U256, leverage_bps: u32) -> bool {
    borrowed <= borrow_limit(supplied, leverage_bps)
}

pub struct CollateralManager<M, T> {
    market: Arc<M>,
    token: Arc<T>,
    account: Address,
    leverage_bps: u32,
    total_supplied: U256,
    total_borrowed: U256,
    timeout: Duration,
    events: EventBus,
}

impl<M: LendingMarket, T: AssetToken> CollateralManager<M, T> {
    pub fn new(
        market: Arc<M>,
        token: Arc<T>,
        account: Address,
        leverage_bps: u32,
        timeout: Duration,
        events: EventBus,
    ) -> Self {
        Self {
            market,
            token,
            account,
            leverage_bps,
            total_supplied: U256::ZERO,
            total_borrowed: U256::ZERO,
            timeout,
            events,
        }
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    pub fn total_supplied(&self) -> U256 {
        self.total_supplied
    }

    pub fn total_borrowed(&self) -> U256 {
        self.total_borrowed
    }

    pub fn leverage_bps(&self) -> u32 {
        self.leverage_bps
    }

    fn want(&self) -> Address {
        self.token.address()
    }

    // -----------------------------------------------------------------------
    // Leverage checks (pure, no market calls)
    // -----------------------------------------------------------------------

    /// `LeverageExceeded` unless borrowing `amount` more keeps the invariant
    /// on the current book.
    pub fn check_borrow(&self, amount: U256) -> Result<(), StrategyError> {
        self.check_borrow_after_supply(U256::ZERO, amount)
    }

    /// Same as [`Self::check_borrow`] but as if `extra_supply` had already
    /// been supplied. Lets a flow validate its borrow before supplying.
    pub fn check_borrow_after_supply(
        &self,
        extra_supply: U256,
        amount: U256,
    ) -> Result<(), StrategyError> {
        let limit = borrow_limit(
            self.total_supplied.saturating_add(extra_supply),
            self.leverage_bps,
        );
        let exceeded = self
            .total_borrowed
            .checked_add(amount)
            .map_or(true, |projected| projected > limit);
        if exceeded {
            return Err(StrategyError::LeverageExceeded {
                borrowed: self.total_borrowed,
                requested: amount,
                limit,
            });
        }
        Ok(())
    }

    /// `LeverageExceeded` unless the book after repaying `repay` and
    /// withdrawing `withdraw` collateral keeps the invariant.
    pub fn check_projected_withdrawal(
        &self,
        repay: U256,
        withdraw: U256,
    ) -> Result<(), StrategyError> {
        let borrowed = self.total_borrowed.saturating_sub(repay);
        let supplied = self.total_supplied.saturating_sub(withdraw);
        if !leverage_holds(supplied, borrowed, self.leverage_bps) {
            return Err(StrategyError::LeverageExceeded {
                borrowed,
                requested: U256::ZERO,
                limit: borrow_limit(supplied, self.leverage_bps),
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Market mutations
    // -----------------------------------------------------------------------

    pub async fn supply(&mut self, amount: U256) -> Result<(), StrategyError> {
        let want = self.want();
        let market_address = self.market.address();
        bounded(
            "approve",
            self.timeout,
            self.token.approve(market_address, amount),
            |reason| StrategyError::SupplyFailed { reason },
        )
        .await?;
        bounded(
            "supply",
            self.timeout,
            self.market.supply(want, amount),
            |reason| StrategyError::SupplyFailed { reason },
        )
        .await?;

        self.total_supplied = self.total_supplied.saturating_add(amount);
        info!(%amount, total_supplied = %self.total_supplied, "collateral supplied");
        self.events.emit(StrategyEvent::Supplied { amount });
        Ok(())
    }

    pub async fn borrow(&mut self, amount: U256) -> Result<(), StrategyError> {
        self.check_borrow(amount)?;

        let want = self.want();
        bounded(
            "borrow",
            self.timeout,
            self.market.borrow(want, amount),
            |reason| StrategyError::BorrowFailed { reason },
        )
        .await?;

        self.total_borrowed = self.total_borrowed.saturating_add(amount);
        info!(%amount, total_borrowed = %self.total_borrowed, "debt drawn");
        self.events.emit(StrategyEvent::Borrowed { amount });
        Ok(())
    }

    /// Repay up to `amount`; returns the portion credited against the book.
    pub async fn repay(&mut self, amount: U256) -> Result<U256, StrategyError> {
        let want = self.want();
        let market_address = self.market.address();
        bounded(
            "approve",
            self.timeout,
            self.token.approve(market_address, amount),
            |reason| StrategyError::RepayFailed { reason },
        )
        .await?;
        bounded(
            "repay",
            self.timeout,
            self.market.repay(want, amount),
            |reason| StrategyError::RepayFailed { reason },
        )
        .await?;

        let repaid = amount.min(self.total_borrowed);
        self.total_borrowed -= repaid;
        info!(%repaid, total_borrowed = %self.total_borrowed, "debt repaid");
        self.events.emit(StrategyEvent::RepaidToAave { amount: repaid });
        Ok(repaid)
    }

    /// Withdraw collateral; returns what the market actually released.
    pub async fn withdraw(&mut self, amount: U256) -> Result<U256, StrategyError> {
        let want = self.want();
        let withdrawn = bounded(
            "withdraw",
            self.timeout,
            self.market.withdraw(want, amount),
            |reason| StrategyError::CollateralWithdrawFailed { reason },
        )
        .await?;

        let credited = withdrawn.min(self.total_supplied);
        self.total_supplied -= credited;
        info!(
            requested = %amount,
            %withdrawn,
            total_supplied = %self.total_supplied,
            "collateral withdrawn"
        );
        Ok(withdrawn)
    }

    // -----------------------------------------------------------------------
    // Health
    // -----------------------------------------------------------------------

    /// Health factor as reported by the market right now.
    pub async fn health_factor(&self) -> Result<Decimal, StrategyError> {
        bounded(
            "health_factor",
            self.timeout,
            self.market.health_factor(self.account),
            |reason| StrategyError::MarketQueryFailed { reason },
        )
        .await
    }

    /// `UnhealthyPosition` when the market health factor is below `threshold`.
    pub async fn assert_healthy(&self, threshold: Decimal) -> Result<(), StrategyError> {
        let health_factor = self.health_factor().await?;
        if health_factor < threshold {
            return Err(StrategyError::UnhealthyPosition {
                health_factor,
                threshold,
            });
        }
        debug!(%health_factor, %threshold, "health gate passed");
        Ok(())
    }

    /// Derived position valued at `price`, from live market balances.
    pub async fn position_snapshot(
        &self,
        price: Decimal,
        decimals: u8,
    ) -> Result<PositionSnapshot, StrategyError> {
        let supplied = bounded(
            "supplied_balance",
            self.timeout,
            self.market.supplied_balance(self.account),
            |reason| StrategyError::MarketQueryFailed { reason },
        )
        .await?;
        let borrowed = bounded(
            "borrowed_balance",
            self.timeout,
            self.market.borrowed_balance(self.account),
            |reason| StrategyError::MarketQueryFailed { reason },
        )
        .await?;
        let market_health_factor = self.health_factor().await?;

        let value = |amount: U256| {
            units_to_decimal(amount, decimals)
                .and_then(|units| units.checked_mul(price))
                .ok_or_else(|| StrategyError::MarketQueryFailed {
                    reason: format!("value of {amount} at price {price} exceeds decimal range"),
                })
        };
        let collateral_value = value(supplied)?;
        let debt_value = value(borrowed)?;
        let computed_health_factor = if debt_value.is_zero() {
            Decimal::MAX
        } else {
            collateral_value / debt_value
        };

        Ok(PositionSnapshot {
            supplied,
            borrowed,
            price,
            collateral_value,
            debt_value,
            computed_health_factor,
            market_health_factor,
        })
    }
}
