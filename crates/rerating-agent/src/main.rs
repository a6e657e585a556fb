//! rerating-agent: scan NSE/BSE results filings, score each company for an
//! early rerating, and keep a paper portfolio of BUY/SELL decisions.
//!
//! Usage:
//!   cargo run -p rerating-agent
//!   cargo run -p rerating-agent -- --exchange nse
//!   cargo run -p rerating-agent -- --dry-run

use std::sync::Arc;

use analysis_core::{Exchange, SymbolResolver};
use anyhow::Result;
use exchange_client::{BseFilingFeed, CompanySearchClient, NseFilingFeed};
use fundamental_analysis::RecommendationEngine;
use notification_service::{NotificationConfig, NotificationService};
use portfolio_manager::{PortfolioDb, PositionStore, ProcessingState};

mod config;
mod fundamentals;
mod pipeline;

use config::{AgentConfig, CliArgs};
use fundamentals::SnapshotFundamentalsSource;
use pipeline::{ExchangeRun, Pipeline};

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "rerating_agent=info,exchange_client=info,portfolio_manager=info".into())
    };

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }
}

fn exchange_run(exchange: Exchange, config: &AgentConfig) -> Result<ExchangeRun> {
    let run = match exchange {
        Exchange::Nse => ExchangeRun {
            exchange,
            feed: Arc::new(NseFilingFeed::new(config.exchange_rate_limit)?),
            resolver: Arc::new(SymbolResolver),
        },
        Exchange::Bse => ExchangeRun {
            exchange,
            feed: Arc::new(BseFilingFeed::new(config.exchange_rate_limit)?),
            resolver: Arc::new(CompanySearchClient::new(config.exchange_rate_limit)?),
        },
    };
    Ok(run)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = CliArgs::parse(std::env::args())?;
    let config = AgentConfig::from_env()?;
    tracing::info!("Starting rerating agent");
    tracing::info!("  Database: {}", config.database_url);
    tracing::info!("  Fundamentals: {}", config.fundamentals_dir.display());
    tracing::info!("  Concurrency: {}", config.analysis_concurrency);
    tracing::info!("  Dry run: {}", args.dry_run);

    if !PortfolioDb::exists(&config.database_url) {
        tracing::info!("Creating new database at {}", config.database_url);
    }
    let db = PortfolioDb::new(&config.database_url).await?;

    let notifier = if args.dry_run {
        NotificationService::disabled()
    } else {
        NotificationService::new(&NotificationConfig::from_env())
    };

    let pipeline = Pipeline::new(
        Arc::new(SnapshotFundamentalsSource::new(config.fundamentals_dir.clone())),
        RecommendationEngine::with_default_pe(config.default_pe),
        PositionStore::new(db.clone()),
        ProcessingState::new(db),
        notifier,
    )
    .with_concurrency(config.analysis_concurrency)
    .with_dry_run(args.dry_run);

    let mut runs = Vec::new();
    for exchange in config.exchanges(args.exchange) {
        match exchange_run(exchange, &config) {
            Ok(run) => runs.push(run),
            Err(e) => tracing::error!("Could not set up {} clients: {:#}", exchange, e),
        }
    }

    if runs.is_empty() {
        tracing::warn!("No exchanges enabled, nothing to do");
        return Ok(());
    }

    let results = pipeline.run(&runs).await;
    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    tracing::info!("Finished: {} exchange(s) ok, {} failed", results.len() - failed, failed);

    Ok(())
}
