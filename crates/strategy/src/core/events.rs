//! Strategy event bus.
//!
//! Every state change the strategy commits is published as a
//! [`StrategyEvent`]: logged through `tracing` with the event name and
//! arguments in canonical order, and broadcast to any subscribers. Each event
//! also has an ABI log encoding matching [`IStrategyEvents`].

use std::fmt;

use alloy::primitives::{Address, LogData, U256};
use alloy::sol_types::SolEvent;
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::execution::contracts::IStrategyEvents;
use crate::types::wad_ray::price_to_wad;

/// Observable strategy events. Variant names and field order are part of the
/// external contract with indexing tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyEvent {
    Supplied {
        amount: U256,
    },
    Borrowed {
        amount: U256,
    },
    BridgedToDestination {
        amount: U256,
        destination_chain_id: u64,
        price: Decimal,
        dest_token: Address,
    },
    BridgedToSonic {
        amount: U256,
    },
    BeefyDeposited {
        amount: U256,
    },
    BeefyWithdrawn {
        requested: U256,
        returned: U256,
    },
    StrategyHarvested,
    BeefyEarned,
    FarmedInSonic {
        amount: U256,
    },
    WithdrawnFromSonic {
        amount: U256,
    },
    RepaidToAave {
        amount: U256,
    },
}

impl StrategyEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Supplied { .. } => "Supplied",
            Self::Borrowed { .. } => "Borrowed",
            Self::BridgedToDestination { .. } => "BridgedToDestination",
            Self::BridgedToSonic { .. } => "BridgedToSonic",
            Self::BeefyDeposited { .. } => "BeefyDeposited",
            Self::BeefyWithdrawn { .. } => "BeefyWithdrawn",
            Self::StrategyHarvested => "StrategyHarvested",
            Self::BeefyEarned => "BeefyEarned",
            Self::FarmedInSonic { .. } => "FarmedInSonic",
            Self::WithdrawnFromSonic { .. } => "WithdrawnFromSonic",
            Self::RepaidToAave { .. } => "RepaidToAave",
        }
    }

    /// ABI log payload (topic0 = event signature hash, data = arguments).
    pub fn encode_log(&self) -> LogData {
        use IStrategyEvents as abi;

        match *self {
            Self::Supplied { amount } => abi::Supplied { amount }.encode_log_data(),
            Self::Borrowed { amount } => abi::Borrowed { amount }.encode_log_data(),
            Self::BridgedToDestination {
                amount,
                destination_chain_id,
                price,
                dest_token,
            } => abi::BridgedToDestination {
                amount,
                destinationChainId: U256::from(destination_chain_id),
                price: price_to_wad(price),
                destToken: dest_token,
            }
            .encode_log_data(),
            Self::BridgedToSonic { amount } => abi::BridgedToSonic { amount }.encode_log_data(),
            Self::BeefyDeposited { amount } => abi::BeefyDeposited { amount }.encode_log_data(),
            Self::BeefyWithdrawn {
                requested,
                returned,
            } => abi::BeefyWithdrawn {
                requested,
                returned,
            }
            .encode_log_data(),
            Self::StrategyHarvested => abi::StrategyHarvested {}.encode_log_data(),
            Self::BeefyEarned => abi::BeefyEarned {}.encode_log_data(),
            Self::FarmedInSonic { amount } => abi::FarmedInSonic { amount }.encode_log_data(),
            Self::WithdrawnFromSonic { amount } => {
                abi::WithdrawnFromSonic { amount }.encode_log_data()
            }
            Self::RepaidToAave { amount } => abi::RepaidToAave { amount }.encode_log_data(),
        }
    }
}

/// Renders as `Name(arg, ...)` in canonical argument order.
impl fmt::Display for StrategyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supplied { amount }
            | Self::Borrowed { amount }
            | Self::BridgedToSonic { amount }
            | Self::BeefyDeposited { amount }
            | Self::FarmedInSonic { amount }
            | Self::WithdrawnFromSonic { amount }
            | Self::RepaidToAave { amount } => write!(f, "{}({amount})", self.name()),
            Self::BridgedToDestination {
                amount,
                destination_chain_id,
                price,
                dest_token,
            } => write!(
                f,
                "BridgedToDestination({amount}, {destination_chain_id}, {price}, {dest_token})"
            ),
            Self::BeefyWithdrawn {
                requested,
                returned,
            } => write!(f, "BeefyWithdrawn({requested}, {returned})"),
            Self::StrategyHarvested | Self::BeefyEarned => write!(f, "{}()", self.name()),
        }
    }
}

/// Fan-out publisher for strategy events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StrategyEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// New receiver observing every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StrategyEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: StrategyEvent) {
        info!(event = event.name(), args = %event, "strategy event");
        if self.tx.send(event).is_err() {
            debug!("no event subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain everything currently buffered in `rx`.
#[cfg(test)]
pub(crate) fn drain(rx: &mut broadcast::Receiver<StrategyEvent>) -> Vec<StrategyEvent> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => out.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    out
}
