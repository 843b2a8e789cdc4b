pub mod types;
pub mod validate;

pub use types::*;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Load and merge all config JSON files into a single [`EngineConfig`],
/// then apply environment variable overrides and validate.
///
/// Expected directory layout:
/// ```text
/// config/
///   app.json
///   strategy.json
///   paper.json   (optional)
/// ```
///
/// # Environment variable overrides
///
/// | Env Var                          | Config Field                     |
/// |----------------------------------|----------------------------------|
/// | `STRATEGY_LEVERAGE_BPS`          | `strategy.leverage_bps`          |
/// | `STRATEGY_MIN_HEALTH_FACTOR`     | `strategy.min_health_factor`     |
/// | `STRATEGY_DESTINATION_CHAIN_ID`  | `strategy.destination_chain_id`  |
/// | `STRATEGY_RECIPIENT`             | `strategy.recipient`             |
pub fn load_config(config_dir: &Path) -> Result<EngineConfig> {
    let read = |name: &str| -> Result<String> {
        let path = config_dir.join(name);
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))
    };

    let app: AppConfig = serde_json::from_str(&read("app.json")?).context("parsing app.json")?;

    let strategy: StrategyConfig =
        serde_json::from_str(&read("strategy.json")?).context("parsing strategy.json")?;

    // Paper config is optional.
    let paper: Option<PaperConfig> = match read("paper.json") {
        Ok(contents) => Some(serde_json::from_str(&contents).context("parsing paper.json")?),
        Err(_) => None,
    };

    let mut config = EngineConfig {
        app,
        strategy,
        paper,
    };

    apply_env_overrides(&mut config);
    validate::validate_config(&config)?;

    Ok(config)
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides to the loaded config.
///
/// Only non-empty env vars take effect. Parse failures are logged and skipped
/// (the JSON value remains).
fn apply_env_overrides(config: &mut EngineConfig) {
    if let Some(val) = env_parse::<u32>("STRATEGY_LEVERAGE_BPS") {
        info!(val, "env override: STRATEGY_LEVERAGE_BPS");
        config.strategy.leverage_bps = val;
    }

    if let Some(val) = env_decimal("STRATEGY_MIN_HEALTH_FACTOR") {
        info!(%val, "env override: STRATEGY_MIN_HEALTH_FACTOR");
        config.strategy.min_health_factor = val;
    }

    if let Some(val) = env_parse::<u64>("STRATEGY_DESTINATION_CHAIN_ID") {
        info!(val, "env override: STRATEGY_DESTINATION_CHAIN_ID");
        config.strategy.destination_chain_id = val;
    }

    if let Some(val) = env_string("STRATEGY_RECIPIENT") {
        info!("env override: STRATEGY_RECIPIENT");
        config.strategy.recipient = val;
    }
}

/// Read a non-empty env var as a `String`.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Read a non-empty env var and parse it as `T`.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

/// Read a non-empty env var and parse it as `Decimal`.
fn env_decimal(key: &str) -> Option<Decimal> {
    env_string(key).and_then(|v| Decimal::from_str(&v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serial_test::serial;
    use std::path::PathBuf;

    fn project_config_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
    }

    const STRATEGY_JSON: &str = r#"{
        "want_token": "0x00000000000000000000000000000000000000aa",
        "want_decimals": 18,
        "dest_token": "0x00000000000000000000000000000000000000de",
        "destination_chain_id": 146,
        "recipient": "0x00000000000000000000000000000000000000f0",
        "leverage_bps": 7500,
        "min_health_factor": "1.0",
        "roles": {
            "admin": "0x00000000000000000000000000000000000000a1",
            "vault": "0x00000000000000000000000000000000000000a2",
            "managers": ["0x00000000000000000000000000000000000000a3"]
        },
        "contracts": {
            "strategy": "0x00000000000000000000000000000000000000bb",
            "lending_market": "0x00000000000000000000000000000000000000cc",
            "bridge_gateway": "0x00000000000000000000000000000000000000ee",
            "yield_vault": "0x00000000000000000000000000000000000000dd"
        },
        "timing": { "collaborator_timeout_seconds": 30, "harvest_interval_seconds": 3600 },
        "routes": [
            {
                "chain_id": 137,
                "source_token": "0x00000000000000000000000000000000000000aa",
                "dest_token": "0x00000000000000000000000000000000000000de",
                "min_amount": "50000000000000000000",
                "max_amount": "60000000000000000000"
            }
        ]
    }"#;

    // -----------------------------------------------------------------------
    // Helper: write a minimal set of config JSON files to a temp dir.
    // -----------------------------------------------------------------------

    fn write_test_configs(dir: &Path) {
        std::fs::write(dir.join("app.json"), r#"{ "logging": { "log_dir": "logs" } }"#).unwrap();
        std::fs::write(dir.join("strategy.json"), STRATEGY_JSON).unwrap();
    }

    /// Remove all strategy env vars so tests don't interfere with each other.
    fn clean_strategy_env() {
        for key in [
            "STRATEGY_LEVERAGE_BPS",
            "STRATEGY_MIN_HEALTH_FACTOR",
            "STRATEGY_DESTINATION_CHAIN_ID",
            "STRATEGY_RECIPIENT",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_load_real_configs() {
        clean_strategy_env();
        let dir = project_config_dir();
        if !dir.exists() {
            eprintln!("skipping: config dir not found at {}", dir.display());
            return;
        }
        let config = load_config(&dir).expect("config should load and validate");
        assert!(config.paper.is_some());
        assert!(config.strategy.leverage_bps > 0);
    }

    #[test]
    #[serial]
    fn test_load_test_configs() {
        clean_strategy_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        let config = load_config(tmp.path()).expect("test config should load");
        assert_eq!(config.strategy.destination_chain_id, 146);
        assert_eq!(config.strategy.leverage_bps, 7500);
        assert_eq!(config.strategy.min_health_factor, dec!(1.0));
        assert_eq!(config.strategy.routes.len(), 1);
        assert!(config.paper.is_none());
    }

    #[test]
    #[serial]
    fn test_missing_config_file_errors() {
        clean_strategy_env();
        let tmp = tempfile::tempdir().unwrap();
        let err = load_config(tmp.path()).unwrap_err();
        assert!(
            err.to_string().contains("failed to read config file"),
            "expected file-not-found error, got: {err}"
        );
    }

    #[test]
    #[serial]
    fn test_env_overrides_apply() {
        clean_strategy_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("STRATEGY_LEVERAGE_BPS", "5000");
        std::env::set_var("STRATEGY_MIN_HEALTH_FACTOR", "1.2");
        std::env::set_var("STRATEGY_DESTINATION_CHAIN_ID", "137");
        std::env::set_var(
            "STRATEGY_RECIPIENT",
            "0x00000000000000000000000000000000000000f1",
        );

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.strategy.leverage_bps, 5000);
        assert_eq!(config.strategy.min_health_factor, dec!(1.2));
        assert_eq!(config.strategy.destination_chain_id, 137);
        assert_eq!(
            config.strategy.recipient,
            "0x00000000000000000000000000000000000000f1"
        );
        clean_strategy_env();
    }

    #[test]
    #[serial]
    fn test_env_override_empty_or_invalid_ignored() {
        clean_strategy_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("STRATEGY_LEVERAGE_BPS", "");
        std::env::set_var("STRATEGY_DESTINATION_CHAIN_ID", "polygon");
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.strategy.leverage_bps, 7500);
        assert_eq!(config.strategy.destination_chain_id, 146);
        clean_strategy_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_reported_together() {
        clean_strategy_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("STRATEGY_LEVERAGE_BPS", "12000");
        std::env::set_var("STRATEGY_MIN_HEALTH_FACTOR", "0.5");
        std::env::set_var("STRATEGY_RECIPIENT", "0x1234");

        let err = load_config(tmp.path()).unwrap_err().to_string();
        assert!(err.contains("3 errors"), "got: {err}");
        assert!(err.contains("leverage_bps"));
        assert!(err.contains("min_health_factor"));
        assert!(err.contains("strategy.recipient"));
        clean_strategy_env();
    }

    #[test]
    #[serial]
    fn test_inverted_route_range_rejected() {
        clean_strategy_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());
        let inverted = STRATEGY_JSON.replace(
            "\"max_amount\": \"60000000000000000000\"",
            "\"max_amount\": \"40000000000000000000\"",
        );
        std::fs::write(tmp.path().join("strategy.json"), inverted).unwrap();

        let err = load_config(tmp.path()).unwrap_err().to_string();
        assert!(err.contains("routes[chain_id=137]"), "got: {err}");
        assert!(err.contains("must be <= max_amount"));
    }

    #[test]
    #[serial]
    fn test_paper_config_is_validated_when_present() {
        clean_strategy_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());
        std::fs::write(
            tmp.path().join("paper.json"),
            r#"{
                "vault_balance": "100000000000000000000",
                "market_liquidity": "lots",
                "liquidation_threshold": "1.5",
                "earn_yield_bps": 50,
                "reward_bps": 20000,
                "want_price": "1"
            }"#,
        )
        .unwrap();

        let err = load_config(tmp.path()).unwrap_err().to_string();
        assert!(err.contains("paper.market_liquidity"), "got: {err}");
        assert!(err.contains("liquidation_threshold"));
        assert!(err.contains("paper: reward_bps (20000)"));
    }
}
