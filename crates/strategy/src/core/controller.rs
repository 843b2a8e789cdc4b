//! Strategy controller: the orchestration state machine.
//!
//! Composes [`CollateralManager`], [`BridgeRouter`] and [`YieldVaultAdapter`]
//! behind the [`AccessControlGate`]. Flows:
//!
//! - **deposit**: `Idle → Supplying → Borrowing → Bridging → Idle`
//! - **withdraw**: `Idle → Repaying → WithdrawingCollateral → Idle`
//!
//! Every mutating flow holds the write guard for its whole duration and runs
//! all validation before its first side effect. A failure after that point
//! leaves the earlier steps committed; callers inspect [`snapshot`] to see
//! what landed.
//!
//! [`snapshot`]: StrategyController::snapshot

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, info, warn};

use crate::config::validate::{parse_address, parse_amount};
use crate::config::StrategyConfig;
use crate::constants::MAX_LEVERAGE_BPS;
use crate::core::access_control::AccessControlGate;
use crate::core::bridge_router::BridgeRouter;
use crate::core::chain_registry::ChainTokenRegistry;
use crate::core::collateral_manager::CollateralManager;
use crate::core::events::{EventBus, StrategyEvent};
use crate::core::yield_vault::YieldVaultAdapter;
use crate::errors::StrategyError;
use crate::execution::collaborators::{
    bounded, AssetToken, BridgeGateway, LendingMarket, PriceOracle, YieldVault,
};
use crate::types::wad_ray::mul_bps;
use crate::types::{
    BridgeReceipt, ChainTokenInfo, FlowPhase, PositionSnapshot, Role, StrategySnapshot,
};

/// Pre-extracted controller parameters.
#[derive(Debug, Clone)]
pub struct StrategyParams {
    /// Account holding the strategy's funds.
    pub account: Address,
    pub admin: Address,
    /// Vault principal; receives withdrawn funds.
    pub vault: Address,
    pub managers: Vec<Address>,
    pub recipient: Address,
    pub dest_token: Address,
    pub destination_chain_id: u64,
    pub leverage_bps: u32,
    pub min_health_factor: Decimal,
    pub want_decimals: u8,
    pub collaborator_timeout: Duration,
    pub routes: Vec<(u64, ChainTokenInfo)>,
}

impl StrategyParams {
    pub fn from_config(config: &StrategyConfig) -> Result<Self, StrategyError> {
        let address = |name: &str, value: &str| {
            parse_address(value).map_err(|e| StrategyError::Config(format!("{name}: {e}")))
        };
        let amount = |name: &str, value: &str| {
            parse_amount(value).map_err(|e| StrategyError::Config(format!("{name}: {e}")))
        };

        let managers = config
            .roles
            .managers
            .iter()
            .map(|m| address("roles.managers", m))
            .collect::<Result<Vec<_>, _>>()?;

        let routes = config
            .routes
            .iter()
            .map(|r| {
                Ok((
                    r.chain_id,
                    ChainTokenInfo {
                        source_token: address("routes.source_token", &r.source_token)?,
                        dest_token: address("routes.dest_token", &r.dest_token)?,
                        min_amount: amount("routes.min_amount", &r.min_amount)?,
                        max_amount: amount("routes.max_amount", &r.max_amount)?,
                    },
                ))
            })
            .collect::<Result<Vec<_>, StrategyError>>()?;

        Ok(Self {
            account: address("contracts.strategy", &config.contracts.strategy)?,
            admin: address("roles.admin", &config.roles.admin)?,
            vault: address("roles.vault", &config.roles.vault)?,
            managers,
            recipient: address("recipient", &config.recipient)?,
            dest_token: address("dest_token", &config.dest_token)?,
            destination_chain_id: config.destination_chain_id,
            leverage_bps: config.leverage_bps,
            min_health_factor: config.min_health_factor,
            want_decimals: config.want_decimals,
            collaborator_timeout: Duration::from_secs(config.timing.collaborator_timeout_seconds),
            routes,
        })
    }
}

/// Handles to every external system the strategy talks to.
pub struct Collaborators<M, T, G, O, V> {
    pub market: Arc<M>,
    pub token: Arc<T>,
    pub gateway: Arc<G>,
    pub oracle: Arc<O>,
    pub vault: Arc<V>,
}

/// State mutated by flows; lives behind the controller's lock.
struct Engine<M, T, G, O, V> {
    gate: AccessControlGate,
    collateral: CollateralManager<M, T>,
    router: BridgeRouter<G, O, T>,
    vault: YieldVaultAdapter<V, T>,
    destination_chain_id: u64,
    last_aborted_phase: Option<FlowPhase>,
}

pub struct StrategyController<M, T, G, O, V> {
    engine: RwLock<Engine<M, T, G, O, V>>,
    token: Arc<T>,
    account: Address,
    vault: Address,
    recipient: Address,
    min_health_factor: Decimal,
    want_decimals: u8,
    timeout: Duration,
    events: EventBus,
    phase: watch::Sender<FlowPhase>,
}

impl<M, T, G, O, V> StrategyController<M, T, G, O, V>
where
    M: LendingMarket,
    T: AssetToken,
    G: BridgeGateway,
    O: PriceOracle,
    V: YieldVault,
{
    /// Wire the controller. Initial roles: `admin` → ADMIN, `vault` → VAULT,
    /// each manager → MANAGER. The destination chain gets an unbounded
    /// default route unless `routes` configures one.
    pub fn new(
        params: StrategyParams,
        collaborators: Collaborators<M, T, G, O, V>,
    ) -> Result<Self, StrategyError> {
        if params.leverage_bps > MAX_LEVERAGE_BPS {
            return Err(StrategyError::Config(format!(
                "leverage_bps {} exceeds {MAX_LEVERAGE_BPS}",
                params.leverage_bps
            )));
        }

        let Collaborators {
            market,
            token,
            gateway,
            oracle,
            vault,
        } = collaborators;
        let events = EventBus::new();
        let timeout = params.collaborator_timeout;
        let want = token.address();

        let mut gate = AccessControlGate::with_admin(params.admin);
        gate.grant_role(params.admin, params.vault, Role::Vault)?;
        for manager in &params.managers {
            gate.grant_role(params.admin, *manager, Role::Manager)?;
        }

        let mut registry = ChainTokenRegistry::default();
        registry.set_token_info(
            params.destination_chain_id,
            want,
            params.dest_token,
            U256::ZERO,
            U256::MAX,
        )?;
        for (chain_id, route) in &params.routes {
            registry.set_token_info(
                *chain_id,
                route.source_token,
                route.dest_token,
                route.min_amount,
                route.max_amount,
            )?;
        }

        let engine = Engine {
            gate,
            collateral: CollateralManager::new(
                market,
                token.clone(),
                params.account,
                params.leverage_bps,
                timeout,
                events.clone(),
            ),
            router: BridgeRouter::new(
                gateway,
                oracle,
                token.clone(),
                registry,
                timeout,
                events.clone(),
            ),
            vault: YieldVaultAdapter::new(vault, token.clone(), timeout, events.clone()),
            destination_chain_id: params.destination_chain_id,
            last_aborted_phase: None,
        };

        info!(
            want = %want,
            account = %params.account,
            leverage_bps = params.leverage_bps,
            destination_chain_id = params.destination_chain_id,
            min_health_factor = %params.min_health_factor,
            "strategy controller ready"
        );

        let (phase, _) = watch::channel(FlowPhase::Idle);
        Ok(Self {
            engine: RwLock::new(engine),
            token,
            account: params.account,
            vault: params.vault,
            recipient: params.recipient,
            min_health_factor: params.min_health_factor,
            want_decimals: params.want_decimals,
            timeout,
            events,
            phase,
        })
    }

    // -----------------------------------------------------------------------
    // Core flows
    // -----------------------------------------------------------------------

    /// Supply the strategy's whole want balance, borrow against it and bridge
    /// the borrowed funds. Zero balance is a no-op.
    pub async fn deposit(&self, caller: Address) -> Result<Option<BridgeReceipt>, StrategyError> {
        let mut engine = self.engine.write().await;
        engine.gate.authorize(caller, Role::Vault)?;
        let result = self.run_deposit(&mut engine).await;
        self.finish(&mut engine, "deposit", result)
    }

    async fn run_deposit(
        &self,
        engine: &mut Engine<M, T, G, O, V>,
    ) -> Result<Option<BridgeReceipt>, StrategyError> {
        engine
            .collateral
            .assert_healthy(self.min_health_factor)
            .await?;

        let balance = self.strategy_balance().await?;
        if balance.is_zero() {
            debug!("deposit: no idle want, nothing to do");
            return Ok(None);
        }

        let borrow_amount = mul_bps(balance, engine.collateral.leverage_bps());
        let chain_id = engine.destination_chain_id;
        if !borrow_amount.is_zero() {
            engine
                .collateral
                .check_borrow_after_supply(balance, borrow_amount)?;
            engine.router.validate(chain_id, borrow_amount)?;
        }

        self.enter(FlowPhase::Supplying);
        engine.collateral.supply(balance).await?;
        if borrow_amount.is_zero() {
            return Ok(None);
        }

        self.enter(FlowPhase::Borrowing);
        engine.collateral.borrow(borrow_amount).await?;

        self.enter(FlowPhase::Bridging);
        let receipt = engine
            .router
            .bridge(chain_id, borrow_amount, self.recipient)
            .await?;

        info!(
            supplied = %balance,
            borrowed = %borrow_amount,
            chain_id,
            "deposit complete"
        );
        Ok(Some(receipt))
    }

    /// Unwind `amount` of collateral back to the vault, repaying the debt
    /// first when the strategy holds enough idle want to cover it.
    ///
    /// Returns the amount delivered to the vault.
    pub async fn withdraw(&self, caller: Address, amount: U256) -> Result<U256, StrategyError> {
        let mut engine = self.engine.write().await;
        engine.gate.authorize(caller, Role::Vault)?;
        let result = self.run_withdraw(&mut engine, amount).await;
        self.finish(&mut engine, "withdraw", result)
    }

    async fn run_withdraw(
        &self,
        engine: &mut Engine<M, T, G, O, V>,
        amount: U256,
    ) -> Result<U256, StrategyError> {
        let supplied = engine.collateral.total_supplied();
        if amount.is_zero() {
            return Err(StrategyError::WithdrawRejected {
                reason: "amount is zero".into(),
            });
        }
        if amount > supplied {
            return Err(StrategyError::WithdrawRejected {
                reason: format!("amount {amount} exceeds supplied {supplied}"),
            });
        }

        let borrowed = engine.collateral.total_borrowed();
        let balance = self.strategy_balance().await?;
        let repay = if !borrowed.is_zero() && balance >= borrowed {
            borrowed
        } else {
            U256::ZERO
        };
        engine.collateral.check_projected_withdrawal(repay, amount)?;
        engine
            .collateral
            .assert_healthy(self.min_health_factor)
            .await?;

        if !repay.is_zero() {
            self.enter(FlowPhase::Repaying);
            engine.collateral.repay(repay).await?;
        }

        self.enter(FlowPhase::WithdrawingCollateral);
        let withdrawn = engine.collateral.withdraw(amount).await?;

        // Nothing reaches the vault unless the position is still healthy.
        engine
            .collateral
            .assert_healthy(self.min_health_factor)
            .await?;

        bounded(
            "transfer",
            self.timeout,
            self.token.transfer(self.vault, withdrawn),
            |reason| StrategyError::TransferFailed { reason },
        )
        .await?;

        info!(requested = %amount, %withdrawn, repaid = %repay, vault = %self.vault, "withdraw complete");
        Ok(withdrawn)
    }

    /// Claim and reinvest strategy-level rewards, then compound the vault.
    /// Open to any principal. Returns the amount claimed.
    pub async fn harvest(&self, caller: Address) -> Result<U256, StrategyError> {
        let mut engine = self.engine.write().await;
        let result = Self::run_harvest(&engine).await;
        if let Ok(harvested) = &result {
            debug!(%caller, %harvested, "harvest complete");
        }
        self.finish(&mut engine, "harvest", result)
    }

    async fn run_harvest(engine: &Engine<M, T, G, O, V>) -> Result<U256, StrategyError> {
        let harvested = engine.vault.harvest().await?;
        engine.vault.earn().await?;
        Ok(harvested)
    }

    /// Health gate run by the vault before it hands over funds.
    pub async fn before_deposit(&self, caller: Address) -> Result<(), StrategyError> {
        let engine = self.engine.read().await;
        engine.gate.authorize(caller, Role::Vault)?;
        engine
            .collateral
            .assert_healthy(self.min_health_factor)
            .await
    }

    // -----------------------------------------------------------------------
    // Manager-driven steps
    // -----------------------------------------------------------------------

    pub async fn supply_to_market(&self, caller: Address, amount: U256) -> Result<(), StrategyError> {
        let mut engine = self.engine.write().await;
        engine.gate.authorize(caller, Role::Manager)?;
        self.enter(FlowPhase::Supplying);
        let result = engine.collateral.supply(amount).await;
        self.finish(&mut engine, "supply_to_market", result)
    }

    /// Borrow `amount` and bridge it to the destination chain.
    pub async fn borrow_and_bridge(
        &self,
        caller: Address,
        amount: U256,
    ) -> Result<BridgeReceipt, StrategyError> {
        let mut engine = self.engine.write().await;
        engine.gate.authorize(caller, Role::Manager)?;
        let result = self.run_borrow_and_bridge(&mut engine, amount).await;
        self.finish(&mut engine, "borrow_and_bridge", result)
    }

    async fn run_borrow_and_bridge(
        &self,
        engine: &mut Engine<M, T, G, O, V>,
        amount: U256,
    ) -> Result<BridgeReceipt, StrategyError> {
        let chain_id = engine.destination_chain_id;
        engine
            .collateral
            .assert_healthy(self.min_health_factor)
            .await?;
        engine.collateral.check_borrow(amount)?;
        engine.router.validate(chain_id, amount)?;

        self.enter(FlowPhase::Borrowing);
        engine.collateral.borrow(amount).await?;

        self.enter(FlowPhase::Bridging);
        let receipt = engine.router.bridge(chain_id, amount, self.recipient).await?;
        self.events.emit(StrategyEvent::BridgedToSonic { amount });
        Ok(receipt)
    }

    /// Put `amount` of idle want to work in the yield vault; returns shares.
    pub async fn farm(&self, caller: Address, amount: U256) -> Result<U256, StrategyError> {
        let mut engine = self.engine.write().await;
        engine.gate.authorize(caller, Role::Manager)?;
        let result = engine.vault.deposit_to_vault(amount).await;
        if result.is_ok() {
            self.events.emit(StrategyEvent::FarmedInSonic { amount });
        }
        self.finish(&mut engine, "farm", result)
    }

    /// Pull `amount` out of the yield vault and repay debt with it.
    /// Returns the amount repaid.
    pub async fn withdraw_and_repay(
        &self,
        caller: Address,
        amount: U256,
    ) -> Result<U256, StrategyError> {
        let mut engine = self.engine.write().await;
        engine.gate.authorize(caller, Role::Manager)?;
        let result = self.run_withdraw_and_repay(&mut engine, amount).await;
        self.finish(&mut engine, "withdraw_and_repay", result)
    }

    async fn run_withdraw_and_repay(
        &self,
        engine: &mut Engine<M, T, G, O, V>,
        amount: U256,
    ) -> Result<U256, StrategyError> {
        let returned = engine.vault.withdraw_from_vault(amount).await?;
        self.events
            .emit(StrategyEvent::WithdrawnFromSonic { amount: returned });

        let repay = returned.min(engine.collateral.total_borrowed());
        if repay.is_zero() {
            return Ok(U256::ZERO);
        }
        self.enter(FlowPhase::Repaying);
        engine.collateral.repay(repay).await
    }

    // -----------------------------------------------------------------------
    // Direct vault operations
    // -----------------------------------------------------------------------

    pub async fn deposit_to_vault(&self, caller: Address, amount: U256) -> Result<U256, StrategyError> {
        let mut engine = self.engine.write().await;
        engine.gate.authorize(caller, Role::Vault)?;
        let result = engine.vault.deposit_to_vault(amount).await;
        self.finish(&mut engine, "deposit_to_vault", result)
    }

    pub async fn withdraw_from_vault(
        &self,
        caller: Address,
        amount: U256,
    ) -> Result<U256, StrategyError> {
        let mut engine = self.engine.write().await;
        engine.gate.authorize(caller, Role::Vault)?;
        let result = engine.vault.withdraw_from_vault(amount).await;
        self.finish(&mut engine, "withdraw_from_vault", result)
    }

    /// Vault compounding alone. Open to any principal.
    pub async fn earn(&self, _caller: Address) -> Result<(), StrategyError> {
        let mut engine = self.engine.write().await;
        let result = engine.vault.earn().await;
        self.finish(&mut engine, "earn", result)
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    pub async fn set_token_info(
        &self,
        caller: Address,
        chain_id: u64,
        source_token: Address,
        dest_token: Address,
        min_amount: U256,
        max_amount: U256,
    ) -> Result<(), StrategyError> {
        let mut engine = self.engine.write().await;
        engine.gate.authorize(caller, Role::Manager)?;
        engine.router.registry_mut().set_token_info(
            chain_id,
            source_token,
            dest_token,
            min_amount,
            max_amount,
        )
    }

    pub async fn set_destination_chain_id(
        &self,
        caller: Address,
        chain_id: u64,
    ) -> Result<(), StrategyError> {
        let mut engine = self.engine.write().await;
        engine.gate.authorize(caller, Role::Admin)?;
        let previous = std::mem::replace(&mut engine.destination_chain_id, chain_id);
        info!(previous, chain_id, "destination chain set");
        Ok(())
    }

    pub async fn set_price_feed(
        &self,
        caller: Address,
        token: Address,
        feed: Address,
    ) -> Result<(), StrategyError> {
        let engine = self.engine.write().await;
        engine.gate.authorize(caller, Role::Manager)?;
        engine.router.set_price_feed(token, feed).await
    }

    pub async fn grant_role(
        &self,
        caller: Address,
        principal: Address,
        role: Role,
    ) -> Result<(), StrategyError> {
        self.engine
            .write()
            .await
            .gate
            .grant_role(caller, principal, role)
    }

    pub async fn revoke_role(
        &self,
        caller: Address,
        principal: Address,
        role: Role,
    ) -> Result<(), StrategyError> {
        self.engine
            .write()
            .await
            .gate
            .revoke_role(caller, principal, role)
    }

    pub async fn has_role(&self, principal: Address, role: Role) -> bool {
        self.engine.read().await.gate.has_role(principal, role)
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn want_token(&self) -> Address {
        self.token.address()
    }

    /// Phase of the flow currently running (`Idle` between flows).
    pub fn phase(&self) -> FlowPhase {
        *self.phase.borrow()
    }

    /// Receiver notified on every phase transition.
    pub fn watch_phase(&self) -> watch::Receiver<FlowPhase> {
        self.phase.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StrategyEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> StrategySnapshot {
        let engine = self.engine.read().await;
        StrategySnapshot {
            want_token: self.token.address(),
            total_supplied: engine.collateral.total_supplied(),
            total_borrowed: engine.collateral.total_borrowed(),
            leverage_bps: engine.collateral.leverage_bps(),
            destination_chain_id: engine.destination_chain_id,
            recipient: self.recipient,
            last_aborted_phase: engine.last_aborted_phase,
        }
    }

    /// Live position valued at the current oracle price of the want token.
    pub async fn position_snapshot(&self) -> Result<PositionSnapshot, StrategyError> {
        let engine = self.engine.read().await;
        let price = engine.router.price_of(self.token.address()).await?;
        engine
            .collateral
            .position_snapshot(price, self.want_decimals)
            .await
    }

    pub async fn pending_rewards(&self) -> Result<U256, StrategyError> {
        self.engine.read().await.vault.pending_rewards().await
    }

    pub async fn health_factor(&self) -> Result<Decimal, StrategyError> {
        self.engine.read().await.collateral.health_factor().await
    }

    pub async fn chain_tokens(&self, chain_id: u64) -> Option<ChainTokenInfo> {
        self.engine.read().await.router.registry().lookup(chain_id)
    }

    pub async fn routes(&self) -> Vec<(u64, ChainTokenInfo)> {
        self.engine.read().await.router.registry().routes()
    }

    pub async fn destination_chain_id(&self) -> u64 {
        self.engine.read().await.destination_chain_id
    }

    pub async fn total_supplied(&self) -> U256 {
        self.engine.read().await.collateral.total_supplied()
    }

    pub async fn total_borrowed(&self) -> U256 {
        self.engine.read().await.collateral.total_borrowed()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn strategy_balance(&self) -> Result<U256, StrategyError> {
        bounded(
            "balance_of",
            self.timeout,
            self.token.balance_of(self.account),
            |reason| StrategyError::BalanceQueryFailed { reason },
        )
        .await
    }

    fn enter(&self, phase: FlowPhase) {
        debug!(phase = phase.as_str(), "flow phase");
        self.phase.send_replace(phase);
    }

    /// Return to `Idle`, recording where a failed flow stopped.
    fn finish<R>(
        &self,
        engine: &mut Engine<M, T, G, O, V>,
        flow: &'static str,
        result: Result<R, StrategyError>,
    ) -> Result<R, StrategyError> {
        let phase = self.phase.send_replace(FlowPhase::Idle);
        if let Err(e) = &result {
            engine.last_aborted_phase = Some(phase);
            warn!(flow, phase = phase.as_str(), error = %e, "flow aborted");
        }
        result
    }
}
