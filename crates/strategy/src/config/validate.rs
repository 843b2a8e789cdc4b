use std::str::FromStr;

use alloy::primitives::{Address, U256};
use anyhow::{bail, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::types::{EngineConfig, PaperConfig, StrategyConfig};
use crate::constants::{BPS_DENOMINATOR, MAX_LEVERAGE_BPS};

/// Validate invariants across the merged config that serde alone cannot enforce.
///
/// Every violation is collected and reported in one error. Called
/// automatically by [`super::load_config`].
pub fn validate_config(config: &EngineConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    validate_strategy_config(&config.strategy, &mut errors);
    validate_routes(&config.strategy, &mut errors);
    if let Some(paper) = &config.paper {
        validate_paper_config(paper, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        let msg = format!(
            "Configuration validation failed ({} error{}):\n  - {}",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" },
            errors.join("\n  - ")
        );
        bail!("{msg}");
    }
}

// ---------------------------------------------------------------------------
// Strategy config
// ---------------------------------------------------------------------------

fn validate_strategy_config(strategy: &StrategyConfig, errors: &mut Vec<String>) {
    let mut addresses: Vec<(String, &String)> = vec![
        ("strategy.want_token".into(), &strategy.want_token),
        ("strategy.dest_token".into(), &strategy.dest_token),
        ("strategy.recipient".into(), &strategy.recipient),
        ("roles.admin".into(), &strategy.roles.admin),
        ("roles.vault".into(), &strategy.roles.vault),
        ("contracts.strategy".into(), &strategy.contracts.strategy),
        ("contracts.lending_market".into(), &strategy.contracts.lending_market),
        ("contracts.bridge_gateway".into(), &strategy.contracts.bridge_gateway),
        ("contracts.yield_vault".into(), &strategy.contracts.yield_vault),
    ];
    for (i, manager) in strategy.roles.managers.iter().enumerate() {
        addresses.push((format!("roles.managers[{i}]"), manager));
    }
    for (name, addr) in addresses {
        if let Err(e) = validate_address(addr) {
            errors.push(format!("{name}: {e}"));
        }
    }

    if strategy.leverage_bps == 0 || strategy.leverage_bps > MAX_LEVERAGE_BPS {
        errors.push(format!(
            "strategy: leverage_bps must be in (0, {MAX_LEVERAGE_BPS}], got {}",
            strategy.leverage_bps
        ));
    }

    if strategy.min_health_factor < dec!(1.0) {
        errors.push(format!(
            "strategy: min_health_factor ({}) must be >= 1.0",
            strategy.min_health_factor
        ));
    }

    if strategy.want_decimals > 28 {
        errors.push(format!(
            "strategy: want_decimals ({}) exceeds decimal precision (28)",
            strategy.want_decimals
        ));
    }

    if strategy.timing.collaborator_timeout_seconds == 0 {
        errors.push("timing: collaborator_timeout_seconds must be > 0".into());
    }
    if strategy.timing.harvest_interval_seconds == 0 {
        errors.push("timing: harvest_interval_seconds must be > 0".into());
    }
}

fn validate_routes(strategy: &StrategyConfig, errors: &mut Vec<String>) {
    for route in &strategy.routes {
        let prefix = format!("routes[chain_id={}]", route.chain_id);

        for (name, addr) in [
            ("source_token", &route.source_token),
            ("dest_token", &route.dest_token),
        ] {
            if let Err(e) = validate_address(addr) {
                errors.push(format!("{prefix}.{name}: {e}"));
            }
        }

        let min = parse_amount(&route.min_amount);
        let max = parse_amount(&route.max_amount);
        match (min, max) {
            (Ok(min), Ok(max)) if min > max => errors.push(format!(
                "{prefix}: min_amount ({min}) must be <= max_amount ({max})"
            )),
            (Ok(_), Ok(_)) => {}
            (min, max) => {
                if let Err(e) = min {
                    errors.push(format!("{prefix}.min_amount: {e}"));
                }
                if let Err(e) = max {
                    errors.push(format!("{prefix}.max_amount: {e}"));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Paper config
// ---------------------------------------------------------------------------

fn validate_paper_config(paper: &PaperConfig, errors: &mut Vec<String>) {
    for (name, amount) in [
        ("vault_balance", &paper.vault_balance),
        ("market_liquidity", &paper.market_liquidity),
    ] {
        if let Err(e) = parse_amount(amount) {
            errors.push(format!("paper.{name}: {e}"));
        }
    }

    if paper.liquidation_threshold <= Decimal::ZERO || paper.liquidation_threshold > dec!(1.0) {
        errors.push(format!(
            "paper: liquidation_threshold ({}) must be in (0, 1]",
            paper.liquidation_threshold
        ));
    }

    if paper.want_price <= Decimal::ZERO {
        errors.push(format!(
            "paper: want_price ({}) must be > 0",
            paper.want_price
        ));
    }

    for (name, bps) in [
        ("earn_yield_bps", paper.earn_yield_bps),
        ("reward_bps", paper.reward_bps),
    ] {
        if bps > BPS_DENOMINATOR {
            errors.push(format!("paper: {name} ({bps}) must be <= {BPS_DENOMINATOR}"));
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Validate an Ethereum-style address string: must be 0x-prefixed and 42 chars
/// of hex.
fn validate_address(addr: &str) -> Result<(), String> {
    if addr.is_empty() {
        return Err("address is empty".into());
    }
    if !addr.starts_with("0x") && !addr.starts_with("0X") {
        return Err(format!("address '{addr}' must start with 0x"));
    }
    if addr.len() != 42 {
        return Err(format!(
            "address '{addr}' has length {} (expected 42)",
            addr.len()
        ));
    }
    if !addr[2..].chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("address '{addr}' contains non-hex characters"));
    }
    Ok(())
}

/// Parse a validated address string.
pub fn parse_address(addr: &str) -> Result<Address, String> {
    validate_address(addr)?;
    Address::from_str(addr).map_err(|e| format!("address '{addr}': {e}"))
}

/// Parse a base-10 integer amount in token base units.
pub fn parse_amount(amount: &str) -> Result<U256, String> {
    if amount.is_empty() || !amount.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("amount '{amount}' must be a base-10 integer"));
    }
    U256::from_str_radix(amount, 10).map_err(|e| format!("amount '{amount}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address_valid() {
        assert!(validate_address("0xcA11bde05977b3631167028862bE2a173976CA11").is_ok());
        assert!(validate_address("0x6807dc923806fE8Fd134338EABCA509979a7e0cB").is_ok());
    }

    #[test]
    fn test_validate_address_empty() {
        assert!(validate_address("").is_err());
    }

    #[test]
    fn test_validate_address_no_prefix() {
        let err = validate_address("cA11bde05977b3631167028862bE2a173976CA11").unwrap_err();
        assert!(err.contains("must start with 0x"));
    }

    #[test]
    fn test_validate_address_wrong_length() {
        let err = validate_address("0xcA11bde05977b3631167028862bE2a17").unwrap_err();
        assert!(err.contains("length"));
    }

    #[test]
    fn test_parse_address_ignores_case() {
        let mixed = parse_address("0x6807dc923806fE8Fd134338EABCA509979a7e0cB").unwrap();
        let lower = parse_address("0x6807dc923806fe8fd134338eabca509979a7e0cb").unwrap();
        assert_eq!(mixed, lower);
        assert!(parse_address("0x6807dc923806fe8fd134338eabca509979a7e0cz").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(
            parse_amount("100000000000000000000").unwrap(),
            U256::from(100_000_000_000_000_000_000u128)
        );
        assert!(parse_amount("").is_err());
        assert!(parse_amount("-5").is_err());
        assert!(parse_amount("1.5").is_err());
        assert!(parse_amount("1e18").is_err());
    }
}
