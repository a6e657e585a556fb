use analysis_core::Exchange;
use anyhow::{bail, Context, Result};
use fundamental_analysis::DEFAULT_PE;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    // Storage
    pub database_url: String,            // sqlite:rerating.db
    pub fundamentals_dir: PathBuf,       // ./fundamentals

    // Throughput
    pub analysis_concurrency: usize,     // 4 companies at a time
    pub exchange_rate_limit: usize,      // 30 requests/min per client

    // Feeds
    pub enable_nse: bool,
    pub enable_bse: bool,

    // Analysis
    pub default_pe: f64,                 // DEFAULT_PE, used when a snapshot has no PE
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}", key))
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:rerating.db".to_string()),
            fundamentals_dir: lookup("FUNDAMENTALS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./fundamentals")),
            analysis_concurrency: parse_or(&lookup, "ANALYSIS_CONCURRENCY", "4")?,
            exchange_rate_limit: parse_or(&lookup, "EXCHANGE_RATE_LIMIT", "30")?,
            enable_nse: parse_or(&lookup, "ENABLE_NSE", "true")?,
            enable_bse: parse_or(&lookup, "ENABLE_BSE", "true")?,
            default_pe: parse_or(&lookup, "DEFAULT_PE", &DEFAULT_PE.to_string())?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.analysis_concurrency == 0 {
            bail!("ANALYSIS_CONCURRENCY must be at least 1");
        }
        if self.exchange_rate_limit == 0 {
            bail!("EXCHANGE_RATE_LIMIT must be at least 1");
        }
        if !(self.default_pe.is_finite() && self.default_pe > 0.0) {
            bail!("DEFAULT_PE must be a positive number, got {}", self.default_pe);
        }
        if self.database_url.trim().is_empty() {
            bail!("DATABASE_URL must not be empty");
        }
        Ok(())
    }

    /// Exchanges to process this run, narrowed by `--exchange` when given
    pub fn exchanges(&self, only: Option<Exchange>) -> Vec<Exchange> {
        [(Exchange::Nse, self.enable_nse), (Exchange::Bse, self.enable_bse)]
            .into_iter()
            .filter(|(exchange, enabled)| *enabled && only.map_or(true, |o| o == *exchange))
            .map(|(exchange, _)| exchange)
            .collect()
    }
}

/// Command-line flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    /// Analyze and log only: no store writes, no watermark updates, no notifications
    pub dry_run: bool,
    pub exchange: Option<Exchange>,
}

impl CliArgs {
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        let dry_run = args.iter().any(|a| a == "--dry-run");

        let exchange = match args.iter().position(|a| a == "--exchange") {
            Some(i) => {
                let value = args.get(i + 1).context("--exchange needs a value (nse or bse)")?;
                Some(match value.to_ascii_lowercase().as_str() {
                    "nse" => Exchange::Nse,
                    "bse" => Exchange::Bse,
                    other => bail!("Unknown exchange {:?}, expected nse or bse", other),
                })
            }
            None => None,
        };

        Ok(Self { dry_run, exchange })
    }
}
