pub mod access_control;
pub mod bridge_router;
pub mod chain_registry;
pub mod collateral_manager;
pub mod controller;
pub mod events;
pub mod yield_vault;

pub use controller::{Collaborators, StrategyController, StrategyParams};
pub use events::{EventBus, StrategyEvent};
