use analysis_core::{AnalysisError, CompanyFundamentals, FundamentalsSource};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::PathBuf;

/// Reads `<dir>/<TICKER>.json` snapshots written by the fundamentals exporter and
/// keeps only the current fiscal year's quarters.
pub struct SnapshotFundamentalsSource {
    dir: PathBuf,
    today: Option<NaiveDate>,
}

impl SnapshotFundamentalsSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            today: None,
        }
    }

    /// Fix the date used to pick the fiscal year
    pub fn as_of(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn snapshot_path(&self, ticker: &str) -> Result<PathBuf, AnalysisError> {
        let ticker = ticker.trim();
        if ticker.is_empty() || ticker.contains(['/', '\\']) || ticker.contains("..") {
            return Err(AnalysisError::InvalidData(format!("Unusable ticker {:?}", ticker)));
        }
        Ok(self.dir.join(format!("{}.json", ticker)))
    }
}

#[async_trait]
impl FundamentalsSource for SnapshotFundamentalsSource {
    async fn fundamentals(&self, ticker: &str) -> Result<CompanyFundamentals, AnalysisError> {
        let path = self.snapshot_path(ticker)?;
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            AnalysisError::InsufficientData(format!("No fundamentals snapshot at {}: {}", path.display(), e))
        })?;

        let company: CompanyFundamentals = serde_json::from_str(&raw)
            .map_err(|e| AnalysisError::InvalidData(format!("Bad snapshot {}: {}", path.display(), e)))?;

        let today = self.today.unwrap_or_else(exchange_client::ist_today);
        Ok(company.restrict_to_fiscal_year(today))
    }
}
