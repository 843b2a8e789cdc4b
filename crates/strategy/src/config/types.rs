use rust_decimal::Decimal;
use serde::Deserialize;

use crate::constants::{
    DEFAULT_COLLABORATOR_TIMEOUT_SECONDS, DEFAULT_HARVEST_INTERVAL_SECONDS, DEFAULT_LEVERAGE_BPS,
    DEFAULT_MIN_HEALTH_FACTOR, DEFAULT_WANT_DECIMALS,
};

// ---------------------------------------------------------------------------
// Top-level aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub app: AppConfig,
    pub strategy: StrategyConfig,
    pub paper: Option<PaperConfig>,
}

// ---------------------------------------------------------------------------
// app.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: String,
    #[serde(default = "default_log_file_name")]
    pub file_name: String,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_file_name() -> String {
    "strategy.log".into()
}

fn default_log_filter() -> String {
    "cross_chain_strategy=info,warn".into()
}

// ---------------------------------------------------------------------------
// strategy.json
// ---------------------------------------------------------------------------

/// Addresses are kept as strings until validation; amounts are decimal
/// strings of base units (they routinely exceed `u64`).
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub want_token: String,
    #[serde(default = "default_want_decimals")]
    pub want_decimals: u8,
    pub dest_token: String,
    pub destination_chain_id: u64,
    pub recipient: String,
    #[serde(default = "default_leverage_bps")]
    pub leverage_bps: u32,
    #[serde(default = "default_min_health_factor")]
    pub min_health_factor: Decimal,
    pub roles: RolesConfig,
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RolesConfig {
    pub admin: String,
    pub vault: String,
    #[serde(default)]
    pub managers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    /// Account the strategy holds funds under.
    pub strategy: String,
    pub lending_market: String,
    pub bridge_gateway: String,
    pub yield_vault: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    pub collaborator_timeout_seconds: u64,
    pub harvest_interval_seconds: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            collaborator_timeout_seconds: DEFAULT_COLLABORATOR_TIMEOUT_SECONDS,
            harvest_interval_seconds: DEFAULT_HARVEST_INTERVAL_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub chain_id: u64,
    pub source_token: String,
    pub dest_token: String,
    pub min_amount: String,
    pub max_amount: String,
}

fn default_want_decimals() -> u8 {
    DEFAULT_WANT_DECIMALS
}

fn default_leverage_bps() -> u32 {
    DEFAULT_LEVERAGE_BPS
}

fn default_min_health_factor() -> Decimal {
    DEFAULT_MIN_HEALTH_FACTOR
}

// ---------------------------------------------------------------------------
// paper.json (optional)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PaperConfig {
    /// Want balance the vault principal starts with.
    pub vault_balance: String,
    /// Want the lending market can lend out.
    pub market_liquidity: String,
    pub liquidation_threshold: Decimal,
    pub earn_yield_bps: u32,
    /// Reward emissions accrued per `earn`, claimed by harvest.
    #[serde(default)]
    pub reward_bps: u32,
    pub want_price: Decimal,
    #[serde(default)]
    pub latency_ms: u64,
}
