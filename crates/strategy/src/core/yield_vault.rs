//! Compounding-vault adapter and strategy-level harvest.
//!
//! `earn` compounds inside the vault. `harvest` claims reward emissions
//! paid to the strategy account and reinvests them. The two are independent.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use tracing::{debug, info};

use crate::core::events::{EventBus, StrategyEvent};
use crate::errors::StrategyError;
use crate::execution::collaborators::{bounded, AssetToken, YieldVault};
use crate::types::wad_ray::Wad;

pub struct YieldVaultAdapter<V, T> {
    vault: Arc<V>,
    token: Arc<T>,
    timeout: Duration,
    events: EventBus,
}

impl<V: YieldVault, T: AssetToken> YieldVaultAdapter<V, T> {
    pub fn new(vault: Arc<V>, token: Arc<T>, timeout: Duration, events: EventBus) -> Self {
        Self {
            vault,
            token,
            timeout,
            events,
        }
    }

    /// Deposit `amount` of want; returns shares minted.
    pub async fn deposit_to_vault(&self, amount: U256) -> Result<U256, StrategyError> {
        let vault_address = self.vault.address();
        bounded(
            "approve",
            self.timeout,
            self.token.approve(vault_address, amount),
            |reason| StrategyError::VaultDepositFailed { reason },
        )
        .await?;
        let shares = bounded(
            "deposit",
            self.timeout,
            self.vault.deposit(amount),
            |reason| StrategyError::VaultDepositFailed { reason },
        )
        .await?;

        info!(%amount, %shares, "deposited to vault");
        self.events.emit(StrategyEvent::BeefyDeposited { amount });
        Ok(shares)
    }

    /// Redeem the shares worth `amount` at the current share price.
    ///
    /// Returns what the vault paid out, which may differ from `amount`.
    pub async fn withdraw_from_vault(&self, amount: U256) -> Result<U256, StrategyError> {
        let price_per_share = bounded(
            "price_per_full_share",
            self.timeout,
            self.vault.price_per_full_share(),
            |reason| StrategyError::VaultWithdrawFailed { reason },
        )
        .await?;
        if price_per_share.is_zero() {
            return Err(StrategyError::VaultWithdrawFailed {
                reason: "vault reports zero share price".into(),
            });
        }
        let shares = amount
            .checked_mul(Wad::ONE.raw())
            .map(|scaled| scaled / price_per_share)
            .ok_or_else(|| StrategyError::VaultWithdrawFailed {
                reason: format!("share conversion overflows for {amount}"),
            })?;

        let returned = bounded(
            "withdraw",
            self.timeout,
            self.vault.withdraw(shares),
            |reason| StrategyError::VaultWithdrawFailed { reason },
        )
        .await?;

        info!(requested = %amount, %shares, %returned, "withdrawn from vault");
        self.events.emit(StrategyEvent::BeefyWithdrawn {
            requested: amount,
            returned,
        });
        Ok(returned)
    }

    pub async fn earn(&self) -> Result<(), StrategyError> {
        bounded(
            "earn",
            self.timeout,
            self.vault.earn(),
            |reason| StrategyError::EarnFailed { reason },
        )
        .await?;
        self.events.emit(StrategyEvent::BeefyEarned);
        Ok(())
    }

    /// Rewards claimable by the next harvest.
    pub async fn pending_rewards(&self) -> Result<U256, StrategyError> {
        bounded(
            "pending_rewards",
            self.timeout,
            self.vault.pending_rewards(),
            |reason| StrategyError::HarvestFailed { reason },
        )
        .await
    }

    /// Claim reward emissions and deposit them back into the vault.
    ///
    /// Returns the amount claimed. Want already idle on the strategy account
    /// (e.g. funds set aside for repayment) is not touched.
    pub async fn harvest(&self) -> Result<U256, StrategyError> {
        let claimed = bounded(
            "claim_rewards",
            self.timeout,
            self.vault.claim_rewards(),
            |reason| StrategyError::HarvestFailed { reason },
        )
        .await?;

        if !claimed.is_zero() {
            bounded(
                "approve",
                self.timeout,
                self.token.approve(self.vault.address(), claimed),
                |reason| StrategyError::HarvestFailed { reason },
            )
            .await?;
            let shares = bounded(
                "deposit",
                self.timeout,
                self.vault.deposit(claimed),
                |reason| StrategyError::HarvestFailed { reason },
            )
            .await?;
            debug!(%claimed, %shares, "rewards reinvested");
        }

        info!(%claimed, "strategy rewards harvested");
        self.events.emit(StrategyEvent::StrategyHarvested);
        Ok(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::drain;
    use crate::execution::paper::{PaperToken, PaperWallet, PaperYieldVault};
    use alloy::primitives::address;

    const WANT: Address = address!("00000000000000000000000000000000000000aa");
    const STRATEGY: Address = address!("00000000000000000000000000000000000000bb");
    const VAULT: Address = address!("00000000000000000000000000000000000000dd");

    fn ether(n: u64) -> U256 {
        U256::from(n) * Wad::ONE.raw()
    }

    struct Fixture {
        token: Arc<PaperToken>,
        vault: Arc<PaperYieldVault>,
        wallet: Arc<PaperWallet>,
        adapter: YieldVaultAdapter<PaperYieldVault, PaperWallet>,
        events: EventBus,
    }

    fn fixture(yield_bps: u32) -> Fixture {
        let token = Arc::new(PaperToken::new(WANT));
        token.mint(STRATEGY, ether(100)).unwrap();
        let vault = Arc::new(
            PaperYieldVault::new(VAULT, STRATEGY, token.clone()).with_earn_yield_bps(yield_bps),
        );
        let wallet = Arc::new(PaperWallet::new(token.clone(), STRATEGY));
        let events = EventBus::new();
        let adapter = YieldVaultAdapter::new(
            vault.clone(),
            wallet.clone(),
            Duration::from_secs(5),
            events.clone(),
        );
        Fixture {
            token,
            vault,
            wallet,
            adapter,
            events,
        }
    }

    #[tokio::test]
    async fn test_deposit_mints_shares() {
        let f = fixture(0);
        let mut rx = f.events.subscribe();
        let shares = f.adapter.deposit_to_vault(ether(40)).await.unwrap();
        assert_eq!(shares, ether(40));
        assert_eq!(f.vault.shares_of(STRATEGY), ether(40));
        assert_eq!(
            drain(&mut rx),
            vec![StrategyEvent::BeefyDeposited { amount: ether(40) }]
        );
    }

    #[tokio::test]
    async fn test_withdraw_converts_amount_to_shares() {
        let f = fixture(1_000);
        f.adapter.deposit_to_vault(ether(100)).await.unwrap();
        f.adapter.earn().await.unwrap();
        let mut rx = f.events.subscribe();

        // share price is now 1.1; 55 want is 50 shares
        let returned = f.adapter.withdraw_from_vault(ether(55)).await.unwrap();
        assert_eq!(returned, ether(55));
        assert_eq!(f.vault.shares_of(STRATEGY), ether(50));
        assert_eq!(
            drain(&mut rx),
            vec![StrategyEvent::BeefyWithdrawn {
                requested: ether(55),
                returned: ether(55),
            }]
        );
    }

    #[tokio::test]
    async fn test_withdraw_more_than_held_fails() {
        let f = fixture(0);
        f.adapter.deposit_to_vault(ether(10)).await.unwrap();
        let err = f.adapter.withdraw_from_vault(ether(11)).await.unwrap_err();
        assert!(matches!(err, StrategyError::VaultWithdrawFailed { .. }));
    }

    #[tokio::test]
    async fn test_harvest_reinvests_claimed_rewards_only() {
        let f = fixture(0);
        f.adapter.deposit_to_vault(ether(40)).await.unwrap();
        f.vault.accrue_rewards(ether(3)).unwrap();
        assert_eq!(f.adapter.pending_rewards().await.unwrap(), ether(3));
        let mut rx = f.events.subscribe();

        let harvested = f.adapter.harvest().await.unwrap();
        assert_eq!(harvested, ether(3));
        // idle want on the account is untouched; rewards moved into the vault
        assert_eq!(f.token.balance(STRATEGY).unwrap(), ether(60));
        assert_eq!(f.token.balance(VAULT).unwrap(), ether(43));
        assert_eq!(f.vault.shares_of(STRATEGY), ether(43));
        assert_eq!(f.adapter.pending_rewards().await.unwrap(), U256::ZERO);
        assert_eq!(drain(&mut rx), vec![StrategyEvent::StrategyHarvested]);
    }

    #[tokio::test]
    async fn test_harvest_without_rewards_moves_nothing() {
        let f = fixture(0);
        let harvested = f.adapter.harvest().await.unwrap();
        assert_eq!(harvested, U256::ZERO);
        assert_eq!(f.token.balance(STRATEGY).unwrap(), ether(100));
        assert_eq!(f.token.balance(VAULT).unwrap(), U256::ZERO);
    }

    #[tokio::test]
    async fn test_rewards_accrue_from_earn() {
        let token = Arc::new(PaperToken::new(WANT));
        token.mint(STRATEGY, ether(100)).unwrap();
        let vault = Arc::new(
            PaperYieldVault::new(VAULT, STRATEGY, token.clone()).with_reward_bps(100),
        );
        let wallet = Arc::new(PaperWallet::new(token.clone(), STRATEGY));
        let adapter =
            YieldVaultAdapter::new(vault.clone(), wallet, Duration::from_secs(5), EventBus::new());

        adapter.deposit_to_vault(ether(100)).await.unwrap();
        adapter.earn().await.unwrap();
        assert_eq!(adapter.harvest().await.unwrap(), ether(1));
        assert_eq!(vault.shares_of(STRATEGY), ether(101));
    }

    #[tokio::test]
    async fn test_reinvest_failure_fails_harvest() {
        let f = fixture(0);
        f.vault.accrue_rewards(ether(2)).unwrap();
        f.wallet.faults().fail("approve");
        let mut rx = f.events.subscribe();

        let err = f.adapter.harvest().await.unwrap_err();
        assert!(matches!(err, StrategyError::HarvestFailed { .. }));
        // the claim landed; nothing reached the vault
        assert_eq!(f.token.balance(STRATEGY).unwrap(), ether(102));
        assert_eq!(f.token.balance(VAULT).unwrap(), U256::ZERO);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_typed_and_silent() {
        let f = fixture(0);
        let mut rx = f.events.subscribe();

        f.vault.faults().fail("earn");
        assert!(matches!(
            f.adapter.earn().await.unwrap_err(),
            StrategyError::EarnFailed { .. }
        ));

        f.vault.faults().fail("claim_rewards");
        assert!(matches!(
            f.adapter.harvest().await.unwrap_err(),
            StrategyError::HarvestFailed { .. }
        ));

        f.vault.faults().fail("deposit");
        assert!(matches!(
            f.adapter.deposit_to_vault(ether(1)).await.unwrap_err(),
            StrategyError::VaultDepositFailed { .. }
        ));
        assert!(drain(&mut rx).is_empty());
    }
}
