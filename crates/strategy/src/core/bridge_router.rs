//! Cross-chain transfer initiation.
//!
//! Validates the amount against the destination's route, prices the source
//! token fresh from the oracle, hands the transfer to the gateway and emits
//! `BridgedToDestination`. A returned receipt means "initiated"; settlement
//! on the destination chain is never awaited.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use tracing::info;

use crate::core::chain_registry::ChainTokenRegistry;
use crate::core::events::{EventBus, StrategyEvent};
use crate::errors::StrategyError;
use crate::execution::collaborators::{bounded, AssetToken, BridgeGateway, PriceOracle};
use crate::types::{BridgeReceipt, ChainTokenInfo};

pub struct BridgeRouter<G, O, T> {
    gateway: Arc<G>,
    oracle: Arc<O>,
    token: Arc<T>,
    registry: ChainTokenRegistry,
    timeout: Duration,
    events: EventBus,
}

impl<G: BridgeGateway, O: PriceOracle, T: AssetToken> BridgeRouter<G, O, T> {
    pub fn new(
        gateway: Arc<G>,
        oracle: Arc<O>,
        token: Arc<T>,
        registry: ChainTokenRegistry,
        timeout: Duration,
        events: EventBus,
    ) -> Self {
        Self {
            gateway,
            oracle,
            token,
            registry,
            timeout,
            events,
        }
    }

    pub fn registry(&self) -> &ChainTokenRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ChainTokenRegistry {
        &mut self.registry
    }

    /// Route for `chain_id` if `amount` is bridgeable there.
    ///
    /// Pure registry check; flows call it before their first side effect.
    pub fn validate(&self, chain_id: u64, amount: U256) -> Result<ChainTokenInfo, StrategyError> {
        let route = self
            .registry
            .lookup(chain_id)
            .ok_or(StrategyError::NoRouteConfigured { chain_id })?;
        if !route.accepts(amount) {
            return Err(StrategyError::AmountOutOfRange {
                chain_id,
                amount,
                min_amount: route.min_amount,
                max_amount: route.max_amount,
            });
        }
        Ok(route)
    }

    /// Current oracle price of `token`.
    pub async fn price_of(&self, token: Address) -> Result<Decimal, StrategyError> {
        bounded(
            "get_price",
            self.timeout,
            self.oracle.get_price(token),
            |reason| StrategyError::OracleUnavailable { reason },
        )
        .await
    }

    pub async fn set_price_feed(&self, token: Address, feed: Address) -> Result<(), StrategyError> {
        bounded(
            "set_feed",
            self.timeout,
            self.oracle.set_feed(token, feed),
            |reason| StrategyError::OracleUnavailable { reason },
        )
        .await?;
        info!(%token, %feed, "price feed set");
        Ok(())
    }

    pub async fn bridge(
        &self,
        chain_id: u64,
        amount: U256,
        recipient: Address,
    ) -> Result<BridgeReceipt, StrategyError> {
        let route = self.validate(chain_id, amount)?;
        let price = self.price_of(route.source_token).await?;

        let gateway_address = self.gateway.address();
        bounded(
            "approve",
            self.timeout,
            self.token.approve(gateway_address, amount),
            |reason| StrategyError::BridgeFailed { reason },
        )
        .await?;
        let ack = bounded(
            "send",
            self.timeout,
            self.gateway.send(
                route.source_token,
                amount,
                chain_id,
                route.dest_token,
                recipient,
            ),
            |reason| StrategyError::BridgeFailed { reason },
        )
        .await?;

        info!(
            submission_id = %ack.submission_id,
            chain_id,
            %amount,
            %price,
            %recipient,
            "bridge transfer initiated"
        );
        self.events.emit(StrategyEvent::BridgedToDestination {
            amount,
            destination_chain_id: chain_id,
            price,
            dest_token: route.dest_token,
        });

        Ok(BridgeReceipt {
            submission_id: ack.submission_id,
            chain_id,
            source_token: route.source_token,
            dest_token: route.dest_token,
            amount,
            recipient,
            price,
        })
    }
}
