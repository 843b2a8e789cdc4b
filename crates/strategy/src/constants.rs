use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ---------------------------------------------------------------------------
// Numeric Constants
// ---------------------------------------------------------------------------

/// Basis-point denominator: 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Upper bound for the leverage ratio (borrow up to 100% of supplied).
pub const MAX_LEVERAGE_BPS: u32 = BPS_DENOMINATOR;

// ---------------------------------------------------------------------------
// Default Strategy Values
// ---------------------------------------------------------------------------

/// Borrow 75% of supplied collateral.
pub const DEFAULT_LEVERAGE_BPS: u32 = 7_500;

/// Operations are blocked when the lending market reports a lower health factor.
pub const DEFAULT_MIN_HEALTH_FACTOR: Decimal = dec!(1.0);

pub const DEFAULT_WANT_DECIMALS: u8 = 18;

pub const DEFAULT_COLLABORATOR_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_HARVEST_INTERVAL_SECONDS: u64 = 3_600;

/// Broadcast buffer for strategy events; slow subscribers lag rather than block.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Paper Collaborator Defaults
// ---------------------------------------------------------------------------

/// Liquidation threshold applied by the paper lending market.
pub const PAPER_LIQUIDATION_THRESHOLD: Decimal = dec!(0.8);
