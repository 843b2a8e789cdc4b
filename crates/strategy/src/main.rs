use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{anyhow, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use cross_chain_strategy::config::validate::{parse_address, parse_amount};
use cross_chain_strategy::config::{self, EngineConfig, PaperConfig};
use cross_chain_strategy::core::{Collaborators, StrategyController, StrategyParams};
use cross_chain_strategy::execution::paper::{
    PaperBridgeGateway, PaperLendingMarket, PaperPriceOracle, PaperToken, PaperWallet,
    PaperYieldVault,
};
use cross_chain_strategy::logging;

type PaperController = StrategyController<
    PaperLendingMarket,
    PaperWallet,
    PaperBridgeGateway,
    PaperPriceOracle,
    PaperYieldVault,
>;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignore if missing).
    let _ = dotenvy::dotenv();

    let config_dir = std::env::var("STRATEGY_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));

    let config = config::load_config(&config_dir)?;

    // Hold the guard for the process lifetime.
    let _guard = logging::init_tracing(&config.app.logging)?;

    info!(
        config_dir = %config_dir.display(),
        destination_chain_id = config.strategy.destination_chain_id,
        leverage_bps = config.strategy.leverage_bps,
        routes = config.strategy.routes.len(),
        "cross-chain strategy starting (paper collaborators)"
    );

    let paper = config
        .paper
        .clone()
        .context("paper.json is required: only paper collaborators are available")?;
    let params = StrategyParams::from_config(&config.strategy)
        .context("failed to extract strategy parameters")?;
    let vault = params.vault;
    let account = params.account;
    let harvest_interval = Duration::from_secs(config.strategy.timing.harvest_interval_seconds);

    let (token, controller) = build_paper_controller(&config, &paper, params)?;
    let controller = Arc::new(controller);

    // -----------------------------------------------------------------------
    // Initial allocation: vault funds the strategy, then deposits
    // -----------------------------------------------------------------------

    let funding = parse_amount(&paper.vault_balance).map_err(|e| anyhow!(e))?;
    token
        .transfer_between(vault, account, funding)
        .context("funding strategy from vault")?;

    controller
        .before_deposit(vault)
        .await
        .context("pre-deposit health check failed")?;

    match controller.deposit(vault).await {
        Ok(Some(receipt)) => info!(
            submission_id = %receipt.submission_id,
            amount = %receipt.amount,
            chain_id = receipt.chain_id,
            price = %receipt.price,
            "initial deposit bridged"
        ),
        Ok(None) => info!("initial deposit had nothing to bridge"),
        Err(e) => error!(error = %e, "initial deposit failed"),
    }

    // -----------------------------------------------------------------------
    // Harvest keeper
    // -----------------------------------------------------------------------

    let shutdown = CancellationToken::new();
    let keeper = tokio::spawn(run_harvest_keeper(
        controller.clone(),
        account,
        harvest_interval,
        shutdown.clone(),
    ));

    info!(
        interval_seconds = harvest_interval.as_secs(),
        "harvest keeper running; press Ctrl+C to shutdown"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    info!("shutdown signal received, stopping gracefully...");
    shutdown.cancel();
    if let Err(e) = keeper.await {
        error!(error = %e, "harvest keeper task panicked");
    }

    // -----------------------------------------------------------------------
    // Final state
    // -----------------------------------------------------------------------

    let snapshot = controller.snapshot().await;
    info!(
        want = %snapshot.want_token,
        total_supplied = %snapshot.total_supplied,
        total_borrowed = %snapshot.total_borrowed,
        leverage_bps = snapshot.leverage_bps,
        destination_chain_id = snapshot.destination_chain_id,
        last_aborted_phase = ?snapshot.last_aborted_phase,
        "final strategy snapshot"
    );
    match controller.position_snapshot().await {
        Ok(position) => info!(
            collateral_value = %position.collateral_value,
            debt_value = %position.debt_value,
            computed_health_factor = %position.computed_health_factor,
            market_health_factor = %position.market_health_factor,
            "final position"
        ),
        Err(e) => warn!(error = %e, "final position unavailable"),
    }

    info!("shutdown complete");
    Ok(())
}

// ---------------------------------------------------------------------------
// Initialization helpers
// ---------------------------------------------------------------------------

/// Wire the controller to in-memory collaborators sharing one token ledger.
fn build_paper_controller(
    config: &EngineConfig,
    paper: &PaperConfig,
    params: StrategyParams,
) -> Result<(Arc<PaperToken>, PaperController)> {
    let address = |name: &str, value: &str| -> Result<Address> {
        parse_address(value).map_err(|e| anyhow!("{name}: {e}"))
    };
    let contracts = &config.strategy.contracts;
    let want = address("want_token", &config.strategy.want_token)?;
    let market_address = address("contracts.lending_market", &contracts.lending_market)?;
    let gateway_address = address("contracts.bridge_gateway", &contracts.bridge_gateway)?;
    let vault_address = address("contracts.yield_vault", &contracts.yield_vault)?;
    let latency = Duration::from_millis(paper.latency_ms);

    let token = Arc::new(PaperToken::new(want));
    let liquidity = parse_amount(&paper.market_liquidity).map_err(|e| anyhow!(e))?;
    let vault_balance = parse_amount(&paper.vault_balance).map_err(|e| anyhow!(e))?;
    token.mint(market_address, liquidity)?;
    token.mint(params.vault, vault_balance)?;

    let market = Arc::new(
        PaperLendingMarket::new(market_address, params.account, token.clone())
            .with_liquidation_threshold(paper.liquidation_threshold),
    );
    let wallet = Arc::new(PaperWallet::new(token.clone(), params.account));
    let gateway = Arc::new(PaperBridgeGateway::new(
        gateway_address,
        params.account,
        token.clone(),
    ));
    let oracle = Arc::new(PaperPriceOracle::default());
    oracle.set_price(want, paper.want_price);
    let yield_vault = Arc::new(
        PaperYieldVault::new(vault_address, params.account, token.clone())
            .with_earn_yield_bps(paper.earn_yield_bps)
            .with_reward_bps(paper.reward_bps),
    );

    market.faults().set_latency(latency);
    wallet.faults().set_latency(latency);
    gateway.faults().set_latency(latency);
    oracle.faults().set_latency(latency);
    yield_vault.faults().set_latency(latency);

    info!(
        %want,
        market = %market_address,
        gateway = %gateway_address,
        vault = %vault_address,
        latency_ms = paper.latency_ms,
        "paper collaborators initialized"
    );

    let controller = StrategyController::new(
        params,
        Collaborators {
            market,
            token: wallet,
            gateway,
            oracle,
            vault: yield_vault,
        },
    )
    .context("failed to construct strategy controller")?;

    Ok((token, controller))
}

/// Call `harvest` every `interval` until `shutdown` fires. Failures are
/// logged and the next tick tries again.
async fn run_harvest_keeper(
    controller: Arc<PaperController>,
    keeper: Address,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // first tick completes immediately; the deposit just ran
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("harvest keeper stopping");
                break;
            }
            _ = ticker.tick() => {
                match controller.harvest(keeper).await {
                    Ok(harvested) => info!(%harvested, "scheduled harvest complete"),
                    Err(e) => warn!(error = %e, "scheduled harvest failed"),
                }
            }
        }
    }
}
