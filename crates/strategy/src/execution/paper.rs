//! Paper collaborators: in-memory stand-ins for every external system.
//!
//! Used by the binary for dry runs and by the test suite. All collaborators
//! share one [`PaperToken`] ledger so value moves between accounts the way it
//! would on-chain: supplying pulls tokens into the market, bridging locks them
//! in the gateway, the vault holds deposited funds and grows them on `earn`.
//!
//! Each collaborator carries [`Faults`] so callers can force a named
//! operation to revert or add latency to every call.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use alloy::primitives::{keccak256, Address, B256, U256};
use anyhow::{anyhow, bail, ensure, Result};
use rust_decimal::Decimal;
use tracing::debug;

use crate::constants::PAPER_LIQUIDATION_THRESHOLD;
use crate::types::wad_ray::{mul_bps, units_to_decimal, Wad};
use crate::types::GatewayReceipt;

use super::collaborators::{AssetToken, BridgeGateway, LendingMarket, PriceOracle, YieldVault};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| anyhow!("paper state lock poisoned"))
}

// ---------------------------------------------------------------------------
// Fault injection
// ---------------------------------------------------------------------------

/// Named-operation failure switches plus a per-call latency.
#[derive(Debug, Default)]
pub struct Faults {
    failing: Mutex<HashSet<&'static str>>,
    latency: Mutex<Duration>,
}

impl Faults {
    /// Make every subsequent call of `operation` revert.
    pub fn fail(&self, operation: &'static str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(operation);
        }
    }

    /// Undo [`Faults::fail`].
    pub fn heal(&self, operation: &'static str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.remove(operation);
        }
    }

    /// Delay applied before every call.
    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut current) = self.latency.lock() {
            *current = latency;
        }
    }

    async fn enter(&self, operation: &'static str) -> Result<()> {
        let latency = *lock(&self.latency)?;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if lock(&self.failing)?.contains(operation) {
            bail!("{operation} reverted (injected fault)");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Token ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct TokenBook {
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

/// ERC20-like ledger shared by every paper collaborator.
#[derive(Debug)]
pub struct PaperToken {
    address: Address,
    book: Mutex<TokenBook>,
}

impl PaperToken {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            book: Mutex::new(TokenBook::default()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn mint(&self, to: Address, amount: U256) -> Result<()> {
        let mut book = lock(&self.book)?;
        let balance = book.balances.entry(to).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| anyhow!("mint overflows balance"))?;
        Ok(())
    }

    pub fn balance(&self, owner: Address) -> Result<U256> {
        Ok(lock(&self.book)?
            .balances
            .get(&owner)
            .copied()
            .unwrap_or_default())
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        Ok(lock(&self.book)?
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default())
    }

    pub fn approve_from(&self, owner: Address, spender: Address, amount: U256) -> Result<()> {
        lock(&self.book)?.allowances.insert((owner, spender), amount);
        Ok(())
    }

    /// Move `amount` from `from` to `to`; reverts on insufficient balance.
    pub fn transfer_between(&self, from: Address, to: Address, amount: U256) -> Result<()> {
        let mut book = lock(&self.book)?;
        Self::move_balance(&mut book, from, to, amount)
    }

    /// Spend `spender`'s allowance over `from` and move the funds to `to`.
    pub fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        let mut book = lock(&self.book)?;
        let allowance = book
            .allowances
            .get(&(from, spender))
            .copied()
            .unwrap_or_default();
        ensure!(
            allowance >= amount,
            "insufficient allowance: {allowance} < {amount}"
        );
        Self::move_balance(&mut book, from, to, amount)?;
        if allowance != U256::MAX {
            book.allowances.insert((from, spender), allowance - amount);
        }
        Ok(())
    }

    fn move_balance(book: &mut TokenBook, from: Address, to: Address, amount: U256) -> Result<()> {
        let from_balance = book.balances.get(&from).copied().unwrap_or_default();
        ensure!(
            from_balance >= amount,
            "insufficient balance: {from_balance} < {amount}"
        );
        book.balances.insert(from, from_balance - amount);
        let to_balance = book.balances.entry(to).or_default();
        *to_balance = to_balance.saturating_add(amount);
        Ok(())
    }
}

/// The strategy account's view of a [`PaperToken`].
#[derive(Debug)]
pub struct PaperWallet {
    token: Arc<PaperToken>,
    account: Address,
    faults: Faults,
}

impl PaperWallet {
    pub fn new(token: Arc<PaperToken>, account: Address) -> Self {
        Self {
            token,
            account,
            faults: Faults::default(),
        }
    }

    pub fn faults(&self) -> &Faults {
        &self.faults
    }
}

impl AssetToken for PaperWallet {
    fn address(&self) -> Address {
        self.token.address()
    }

    async fn balance_of(&self, owner: Address) -> Result<U256> {
        self.faults.enter("balance_of").await?;
        self.token.balance(owner)
    }

    async fn approve(&self, spender: Address, amount: U256) -> Result<()> {
        self.faults.enter("approve").await?;
        self.token.approve_from(self.account, spender, amount)
    }

    async fn transfer(&self, to: Address, amount: U256) -> Result<()> {
        self.faults.enter("transfer").await?;
        self.token.transfer_between(self.account, to, amount)
    }
}

// ---------------------------------------------------------------------------
// Lending market
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MarketBook {
    supplied: HashMap<Address, U256>,
    borrowed: HashMap<Address, U256>,
}

/// Single-asset lending market. Collateral and debt are the same token, so
/// the health factor is `supplied * liquidation_threshold / borrowed`.
#[derive(Debug)]
pub struct PaperLendingMarket {
    address: Address,
    account: Address,
    token: Arc<PaperToken>,
    liquidation_threshold: Decimal,
    book: Mutex<MarketBook>,
    forced_health_factor: Mutex<Option<Decimal>>,
    faults: Faults,
}

impl PaperLendingMarket {
    pub fn new(address: Address, account: Address, token: Arc<PaperToken>) -> Self {
        Self {
            address,
            account,
            token,
            liquidation_threshold: PAPER_LIQUIDATION_THRESHOLD,
            book: Mutex::new(MarketBook::default()),
            forced_health_factor: Mutex::new(None),
            faults: Faults::default(),
        }
    }

    pub fn with_liquidation_threshold(mut self, threshold: Decimal) -> Self {
        self.liquidation_threshold = threshold;
        self
    }

    /// Pin the reported health factor (`None` restores the computed value).
    pub fn set_health_factor(&self, health_factor: Option<Decimal>) {
        if let Ok(mut forced) = self.forced_health_factor.lock() {
            *forced = health_factor;
        }
    }

    pub fn faults(&self) -> &Faults {
        &self.faults
    }

    fn ensure_asset(&self, asset: Address) -> Result<()> {
        ensure!(
            asset == self.token.address(),
            "unsupported asset {asset}"
        );
        Ok(())
    }

    fn position(&self, account: Address) -> Result<(U256, U256)> {
        let book = lock(&self.book)?;
        Ok((
            book.supplied.get(&account).copied().unwrap_or_default(),
            book.borrowed.get(&account).copied().unwrap_or_default(),
        ))
    }
}

impl LendingMarket for PaperLendingMarket {
    fn address(&self) -> Address {
        self.address
    }

    async fn supply(&self, asset: Address, amount: U256) -> Result<()> {
        self.faults.enter("supply").await?;
        self.ensure_asset(asset)?;
        self.token
            .transfer_from(self.address, self.account, self.address, amount)?;
        let mut book = lock(&self.book)?;
        let supplied = book.supplied.entry(self.account).or_default();
        *supplied = supplied.saturating_add(amount);
        debug!(%amount, "paper market: supplied");
        Ok(())
    }

    async fn borrow(&self, asset: Address, amount: U256) -> Result<()> {
        self.faults.enter("borrow").await?;
        self.ensure_asset(asset)?;
        self.token
            .transfer_between(self.address, self.account, amount)
            .map_err(|e| anyhow!("market liquidity: {e}"))?;
        let mut book = lock(&self.book)?;
        let borrowed = book.borrowed.entry(self.account).or_default();
        *borrowed = borrowed.saturating_add(amount);
        debug!(%amount, "paper market: borrowed");
        Ok(())
    }

    async fn repay(&self, asset: Address, amount: U256) -> Result<()> {
        self.faults.enter("repay").await?;
        self.ensure_asset(asset)?;
        let (_, debt) = self.position(self.account)?;
        let repaid = amount.min(debt);
        self.token
            .transfer_from(self.address, self.account, self.address, repaid)?;
        let mut book = lock(&self.book)?;
        book.borrowed.insert(self.account, debt - repaid);
        debug!(%repaid, "paper market: repaid");
        Ok(())
    }

    async fn withdraw(&self, asset: Address, amount: U256) -> Result<U256> {
        self.faults.enter("withdraw").await?;
        self.ensure_asset(asset)?;
        let (collateral, _) = self.position(self.account)?;
        let withdrawn = amount.min(collateral);
        self.token
            .transfer_between(self.address, self.account, withdrawn)
            .map_err(|e| anyhow!("market liquidity: {e}"))?;
        let mut book = lock(&self.book)?;
        book.supplied.insert(self.account, collateral - withdrawn);
        debug!(%withdrawn, "paper market: withdrawn");
        Ok(withdrawn)
    }

    async fn health_factor(&self, account: Address) -> Result<Decimal> {
        self.faults.enter("health_factor").await?;
        if let Some(forced) = *lock(&self.forced_health_factor)? {
            return Ok(forced);
        }
        let (collateral, debt) = self.position(account)?;
        if debt.is_zero() {
            return Ok(Decimal::MAX);
        }
        let collateral = units_to_decimal(collateral, 18)
            .ok_or_else(|| anyhow!("collateral {collateral} exceeds decimal range"))?;
        let debt =
            units_to_decimal(debt, 18).ok_or_else(|| anyhow!("debt {debt} exceeds decimal range"))?;
        Ok(collateral * self.liquidation_threshold / debt)
    }

    async fn supplied_balance(&self, account: Address) -> Result<U256> {
        self.faults.enter("supplied_balance").await?;
        Ok(self.position(account)?.0)
    }

    async fn borrowed_balance(&self, account: Address) -> Result<U256> {
        self.faults.enter("borrowed_balance").await?;
        Ok(self.position(account)?.1)
    }
}

// ---------------------------------------------------------------------------
// Bridge gateway
// ---------------------------------------------------------------------------

/// A transfer accepted by the paper gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperTransfer {
    pub submission_id: B256,
    pub token: Address,
    pub amount: U256,
    pub destination_chain_id: u64,
    pub dest_token: Address,
    pub recipient: Address,
}

/// Gateway that locks the sent funds and records the transfer. Nothing is
/// ever delivered on a destination chain.
#[derive(Debug)]
pub struct PaperBridgeGateway {
    address: Address,
    account: Address,
    token: Arc<PaperToken>,
    transfers: Mutex<Vec<PaperTransfer>>,
    faults: Faults,
}

impl PaperBridgeGateway {
    pub fn new(address: Address, account: Address, token: Arc<PaperToken>) -> Self {
        Self {
            address,
            account,
            token,
            transfers: Mutex::new(Vec::new()),
            faults: Faults::default(),
        }
    }

    pub fn transfers(&self) -> Vec<PaperTransfer> {
        self.transfers
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    pub fn faults(&self) -> &Faults {
        &self.faults
    }
}

impl BridgeGateway for PaperBridgeGateway {
    fn address(&self) -> Address {
        self.address
    }

    async fn send(
        &self,
        token: Address,
        amount: U256,
        destination_chain_id: u64,
        dest_token: Address,
        recipient: Address,
    ) -> Result<GatewayReceipt> {
        self.faults.enter("send").await?;
        ensure!(token == self.token.address(), "unsupported token {token}");
        self.token
            .transfer_from(self.address, self.account, self.address, amount)?;

        let mut transfers = lock(&self.transfers)?;
        let nonce = transfers.len() as u64;
        let mut preimage = Vec::with_capacity(8 + 8 + 32 + 20);
        preimage.extend_from_slice(&nonce.to_be_bytes());
        preimage.extend_from_slice(&destination_chain_id.to_be_bytes());
        preimage.extend_from_slice(&amount.to_be_bytes::<32>());
        preimage.extend_from_slice(recipient.as_slice());
        let submission_id = keccak256(&preimage);

        transfers.push(PaperTransfer {
            submission_id,
            token,
            amount,
            destination_chain_id,
            dest_token,
            recipient,
        });
        debug!(%submission_id, %amount, destination_chain_id, "paper gateway: transfer locked");
        Ok(GatewayReceipt { submission_id })
    }
}

// ---------------------------------------------------------------------------
// Yield vault
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct VaultBook {
    shares: HashMap<Address, U256>,
    total_shares: U256,
    pending_rewards: U256,
}

/// Share-based compounding vault. `earn` grows the vault's assets by
/// `earn_yield_bps`, raising the price per share.
#[derive(Debug)]
pub struct PaperYieldVault {
    address: Address,
    account: Address,
    token: Arc<PaperToken>,
    earn_yield_bps: u32,
    reward_bps: u32,
    book: Mutex<VaultBook>,
    faults: Faults,
}

impl PaperYieldVault {
    pub fn new(address: Address, account: Address, token: Arc<PaperToken>) -> Self {
        Self {
            address,
            account,
            token,
            earn_yield_bps: 0,
            reward_bps: 0,
            book: Mutex::new(VaultBook::default()),
            faults: Faults::default(),
        }
    }

    pub fn with_earn_yield_bps(mut self, bps: u32) -> Self {
        self.earn_yield_bps = bps;
        self
    }

    /// Rewards accrued on each `earn`, in bps of vault assets. Paid out to
    /// the strategy account by `claim_rewards`, outside the share price.
    pub fn with_reward_bps(mut self, bps: u32) -> Self {
        self.reward_bps = bps;
        self
    }

    pub fn accrue_rewards(&self, amount: U256) -> Result<()> {
        lock(&self.book)?.pending_rewards += amount;
        Ok(())
    }

    pub fn shares_of(&self, holder: Address) -> U256 {
        self.book
            .lock()
            .map(|b| b.shares.get(&holder).copied().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn faults(&self) -> &Faults {
        &self.faults
    }
}

impl YieldVault for PaperYieldVault {
    fn address(&self) -> Address {
        self.address
    }

    async fn deposit(&self, amount: U256) -> Result<U256> {
        self.faults.enter("deposit").await?;
        let assets = self.token.balance(self.address)?;
        self.token
            .transfer_from(self.address, self.account, self.address, amount)?;

        let mut book = lock(&self.book)?;
        let minted = if book.total_shares.is_zero() || assets.is_zero() {
            amount
        } else {
            amount * book.total_shares / assets
        };
        book.total_shares += minted;
        *book.shares.entry(self.account).or_default() += minted;
        Ok(minted)
    }

    async fn withdraw(&self, shares: U256) -> Result<U256> {
        self.faults.enter("withdraw").await?;
        let assets = self.token.balance(self.address)?;
        let amount = {
            let mut book = lock(&self.book)?;
            let held = book.shares.get(&self.account).copied().unwrap_or_default();
            ensure!(held >= shares, "insufficient shares: {held} < {shares}");
            let amount = if book.total_shares.is_zero() {
                U256::ZERO
            } else {
                shares * assets / book.total_shares
            };
            book.shares.insert(self.account, held - shares);
            book.total_shares -= shares;
            amount
        };
        self.token
            .transfer_between(self.address, self.account, amount)?;
        Ok(amount)
    }

    async fn earn(&self) -> Result<()> {
        self.faults.enter("earn").await?;
        let assets = self.token.balance(self.address)?;
        let gain = mul_bps(assets, self.earn_yield_bps);
        if !gain.is_zero() {
            self.token.mint(self.address, gain)?;
        }
        let rewards = mul_bps(assets, self.reward_bps);
        lock(&self.book)?.pending_rewards += rewards;
        debug!(%gain, %rewards, "paper vault: compounded");
        Ok(())
    }

    async fn price_per_full_share(&self) -> Result<U256> {
        self.faults.enter("price_per_full_share").await?;
        let assets = self.token.balance(self.address)?;
        let total_shares = lock(&self.book)?.total_shares;
        if total_shares.is_zero() {
            return Ok(Wad::ONE.raw());
        }
        Ok(assets * Wad::ONE.raw() / total_shares)
    }

    async fn pending_rewards(&self) -> Result<U256> {
        self.faults.enter("pending_rewards").await?;
        Ok(lock(&self.book)?.pending_rewards)
    }

    async fn claim_rewards(&self) -> Result<U256> {
        self.faults.enter("claim_rewards").await?;
        let claimed = std::mem::take(&mut lock(&self.book)?.pending_rewards);
        if !claimed.is_zero() {
            // emissions are minted straight to the claimant
            self.token.mint(self.account, claimed)?;
        }
        debug!(%claimed, "paper vault: rewards claimed");
        Ok(claimed)
    }
}

// ---------------------------------------------------------------------------
// Price oracle
// ---------------------------------------------------------------------------

/// Oracle with directly settable prices.
#[derive(Debug, Default)]
pub struct PaperPriceOracle {
    prices: Mutex<HashMap<Address, Decimal>>,
    feeds: Mutex<HashMap<Address, Address>>,
    faults: Faults,
}

impl PaperPriceOracle {
    pub fn set_price(&self, token: Address, price: Decimal) {
        if let Ok(mut prices) = self.prices.lock() {
            prices.insert(token, price);
        }
    }

    pub fn feed(&self, token: Address) -> Option<Address> {
        self.feeds.lock().ok().and_then(|f| f.get(&token).copied())
    }

    pub fn faults(&self) -> &Faults {
        &self.faults
    }
}

impl PriceOracle for PaperPriceOracle {
    async fn get_price(&self, token: Address) -> Result<Decimal> {
        self.faults.enter("get_price").await?;
        lock(&self.prices)?
            .get(&token)
            .copied()
            .ok_or_else(|| anyhow!("no price for {token}"))
    }

    async fn set_feed(&self, token: Address, feed: Address) -> Result<()> {
        self.faults.enter("set_feed").await?;
        lock(&self.feeds)?.insert(token, feed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use rust_decimal_macros::dec;

    const WANT: Address = address!("00000000000000000000000000000000000000aa");
    const STRATEGY: Address = address!("00000000000000000000000000000000000000bb");
    const MARKET: Address = address!("00000000000000000000000000000000000000cc");
    const VAULT: Address = address!("00000000000000000000000000000000000000dd");

    fn ether(n: u64) -> U256 {
        U256::from(n) * Wad::ONE.raw()
    }

    #[test]
    fn test_transfer_from_spends_allowance() {
        let token = PaperToken::new(WANT);
        token.mint(STRATEGY, ether(10)).unwrap();
        token.approve_from(STRATEGY, MARKET, ether(4)).unwrap();

        token
            .transfer_from(MARKET, STRATEGY, MARKET, ether(3))
            .unwrap();
        assert_eq!(token.balance(MARKET).unwrap(), ether(3));
        assert_eq!(token.allowance(STRATEGY, MARKET).unwrap(), ether(1));

        let err = token
            .transfer_from(MARKET, STRATEGY, MARKET, ether(2))
            .unwrap_err();
        assert!(err.to_string().contains("insufficient allowance"));
    }

    #[tokio::test]
    async fn test_market_health_factor_from_position() {
        let token = Arc::new(PaperToken::new(WANT));
        token.mint(STRATEGY, ether(100)).unwrap();
        token.mint(MARKET, ether(1_000)).unwrap();
        let market = PaperLendingMarket::new(MARKET, STRATEGY, token.clone());

        assert_eq!(market.health_factor(STRATEGY).await.unwrap(), Decimal::MAX);

        token.approve_from(STRATEGY, MARKET, ether(100)).unwrap();
        market.supply(WANT, ether(100)).await.unwrap();
        market.borrow(WANT, ether(40)).await.unwrap();
        // 100 * 0.8 / 40
        assert_eq!(market.health_factor(STRATEGY).await.unwrap(), dec!(2));

        market.set_health_factor(Some(dec!(0.9)));
        assert_eq!(market.health_factor(STRATEGY).await.unwrap(), dec!(0.9));
    }

    #[tokio::test]
    async fn test_injected_fault_reverts_named_operation_only() {
        let token = Arc::new(PaperToken::new(WANT));
        let market = PaperLendingMarket::new(MARKET, STRATEGY, token);
        market.faults().fail("borrow");

        let err = market.borrow(WANT, ether(1)).await.unwrap_err();
        assert!(err.to_string().contains("borrow reverted"));
        assert!(market.supplied_balance(STRATEGY).await.is_ok());

        market.faults().heal("borrow");
        let err = market.borrow(WANT, ether(1)).await.unwrap_err();
        assert!(err.to_string().contains("market liquidity"));
    }

    #[tokio::test]
    async fn test_vault_earn_raises_share_price() {
        let token = Arc::new(PaperToken::new(WANT));
        token.mint(STRATEGY, ether(100)).unwrap();
        token.approve_from(STRATEGY, VAULT, U256::MAX).unwrap();
        let vault = PaperYieldVault::new(VAULT, STRATEGY, token.clone()).with_earn_yield_bps(1_000);

        let shares = vault.deposit(ether(100)).await.unwrap();
        assert_eq!(shares, ether(100));
        assert_eq!(vault.price_per_full_share().await.unwrap(), Wad::ONE.raw());

        vault.earn().await.unwrap();
        // 10% more assets for the same shares
        assert_eq!(
            vault.price_per_full_share().await.unwrap(),
            U256::from(1_100_000_000_000_000_000u128)
        );

        let returned = vault.withdraw(shares).await.unwrap();
        assert_eq!(returned, ether(110));
        assert_eq!(token.balance(STRATEGY).unwrap(), ether(110));
    }

    #[tokio::test]
    async fn test_vault_rewards_accrue_on_earn_and_pay_out_once() {
        let token = Arc::new(PaperToken::new(WANT));
        token.mint(STRATEGY, ether(100)).unwrap();
        token.approve_from(STRATEGY, VAULT, U256::MAX).unwrap();
        let vault = PaperYieldVault::new(VAULT, STRATEGY, token.clone()).with_reward_bps(200);

        vault.deposit(ether(100)).await.unwrap();
        vault.earn().await.unwrap();
        assert_eq!(vault.pending_rewards().await.unwrap(), ether(2));
        // rewards sit outside the share price
        assert_eq!(vault.price_per_full_share().await.unwrap(), Wad::ONE.raw());

        assert_eq!(vault.claim_rewards().await.unwrap(), ether(2));
        assert_eq!(token.balance(STRATEGY).unwrap(), ether(2));
        assert_eq!(vault.claim_rewards().await.unwrap(), U256::ZERO);
        assert_eq!(token.balance(STRATEGY).unwrap(), ether(2));
    }

    #[tokio::test]
    async fn test_oracle_missing_price_fails() {
        let oracle = PaperPriceOracle::default();
        assert!(oracle.get_price(WANT).await.is_err());
        oracle.set_price(WANT, dec!(2));
        assert_eq!(oracle.get_price(WANT).await.unwrap(), dec!(2));
    }
}
