pub mod bridge;
pub mod roles;
pub mod strategy;
pub mod wad_ray;

pub use bridge::{BridgeReceipt, ChainTokenInfo, GatewayReceipt};
pub use roles::Role;
pub use strategy::{FlowPhase, PositionSnapshot, StrategySnapshot};
