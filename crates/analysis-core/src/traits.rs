use async_trait::async_trait;
use crate::{AnalysisError, CompanyFundamentals, Filing};

/// A feed of financial-results filings published on an exchange
#[async_trait]
pub trait FilingFeed: Send + Sync {
    async fn fetch_filings(&self) -> Result<Vec<Filing>, AnalysisError>;
    fn name(&self) -> &str;
}

/// Source of yearly/quarterly fundamentals keyed by ticker
#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    async fn fundamentals(&self, ticker: &str) -> Result<CompanyFundamentals, AnalysisError>;
}

/// Maps a filing to the ticker understood by the fundamentals source
#[async_trait]
pub trait TickerResolver: Send + Sync {
    async fn resolve(&self, filing: &Filing) -> Result<String, AnalysisError>;
}

/// Resolves filings that already carry an exchange symbol
pub struct SymbolResolver;

#[async_trait]
impl TickerResolver for SymbolResolver {
    async fn resolve(&self, filing: &Filing) -> Result<String, AnalysisError> {
        filing
            .symbol
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AnalysisError::InvalidData(format!("Filing for {} has no symbol", filing.company)))
    }
}
