//! Sentinel agent entrypoint.
//!
//! Parses the CLI argument surface, loads `.env` + environment
//! configuration, wires the Supervisor and the HTTP façade, and runs
//! until a shutdown signal is received. Exit codes: 0 normal exit,
//! 1 on missing credentials or failure to start.

use anyhow::{bail, Result};
use clap::Parser;
use sentinel_agent::application::supervisor::Supervisor;
use sentinel_agent::config::Config;
use sentinel_agent::infrastructure::observability::MetricsReporter;
use sentinel_agent::interfaces::http;
use std::io::Write;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

/// Autonomous futures-trading agent.
#[derive(Parser, Debug)]
#[command(name = "sentinel-agent", version, about = "Autonomous futures-trading decision engine")]
struct Cli {
    /// Trading symbol; defaults to DEFAULT_SYMBOLS from the environment.
    #[arg(long)]
    symbol: Option<String>,

    /// Run against the mock broker (default). Mutually exclusive with --live.
    #[arg(long, conflicts_with = "live")]
    demo: bool,

    /// Run against the live broker. Requires an interactive "YES" confirmation.
    #[arg(long)]
    live: bool,

    /// Disable the sentiment pipeline (collectors + scorer + aggregator).
    #[arg(long)]
    no_sentiment: bool,

    /// Override the max position size (contracts).
    #[arg(long)]
    max_contracts: Option<u32>,

    /// Override the daily loss limit.
    #[arg(long)]
    max_daily_loss: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    match run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(error = %e, "sentinel-agent failed to start");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(env_filter)
        .init();

    info!("sentinel-agent {} starting", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env()?;

    if let Some(symbol) = cli.symbol {
        config.default_symbols = vec![symbol];
    }
    if let Some(max_contracts) = cli.max_contracts {
        config.max_position_size = max_contracts;
    }
    if let Some(max_daily_loss) = cli.max_daily_loss {
        config.max_daily_loss = rust_decimal::Decimal::try_from(max_daily_loss)
            .unwrap_or(config.max_daily_loss);
    }
    if cli.no_sentiment {
        config.micro_blog_bearer_token = None;
        config.forum_client_id = None;
        config.forum_client_secret = None;
        config.news_api_key = None;
        config.alpha_vantage_api_key = None;
    }

    if cli.live {
        if !config.has_broker_credentials() {
            bail!("--live requires TRADOVATE_USERNAME/PASSWORD/APP_ID to be set");
        }
        confirm_live_trading()?;
        info!("LIVE trading confirmed by operator");
    } else {
        info!("running in demo mode (mock broker)");
    }

    info!(
        symbols = ?config.default_symbols,
        sentiment = !cli.no_sentiment,
        "configuration loaded"
    );

    let supervisor = Supervisor::build(config.clone()).await?;
    supervisor.start().await?;
    info!("supervisor started");

    if config.observability_enabled {
        let reporter = MetricsReporter::new(
            supervisor.metrics.clone(),
            supervisor.risk_gate().clone(),
            config.observability_interval_seconds,
        );
        tokio::spawn(reporter.run());
        info!(interval = config.observability_interval_seconds, "metrics reporter started");
    }

    let app = http::router(supervisor.clone());
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "http facade listening");

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!(error = %e, "http server exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    supervisor.shutdown().await?;
    info!("sentinel-agent shut down cleanly");
    Ok(())
}

/// Live trading requires an interactive "YES" typed on stdin (§6).
/// Any other input (including EOF, e.g. non-interactive CI) aborts.
fn confirm_live_trading() -> Result<()> {
    print!("Type YES to confirm LIVE trading with real capital: ");
    std::io::stdout().flush().ok();
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    if input.trim() != "YES" {
        bail!("live trading not confirmed, aborting");
    }
    Ok(())
}
