use analysis_core::{AnalysisError, Exchange, Filing, FilingFeed};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::{parse_exchange_timestamp, ExchangeSession};

const BASE_URL: &str = "https://www.nseindia.com";
const FILINGS_PAGE: &str = "/companies-listing/corporate-integrated-filing?integratedType=integratedfilingfinancials";
const FILINGS_API: &str = "/api/integrated-filing-results";
const FILING_TYPE: &str = "Integrated Filing- Financials";

#[derive(Debug, Deserialize)]
struct NseFilingsResponse {
    #[serde(default)]
    data: Vec<NseFilingRow>,
}

#[derive(Debug, Deserialize)]
struct NseFilingRow {
    symbol: Option<String>,
    #[serde(rename = "cmName")]
    cm_name: Option<String>,
    #[serde(rename = "smName")]
    sm_name: Option<String>,
    #[serde(rename = "creation_Date")]
    creation_date: Option<String>,
}

impl NseFilingRow {
    fn into_filing(self) -> Option<Filing> {
        let symbol = self.symbol.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())?;
        let filed_at = match self.creation_date.as_deref().and_then(parse_exchange_timestamp) {
            Some(ts) => ts,
            None => {
                tracing::debug!("Skipping NSE filing for {} with unreadable date {:?}", symbol, self.creation_date);
                return None;
            }
        };
        let company = self
            .cm_name
            .or(self.sm_name)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| symbol.clone());

        Some(Filing {
            exchange: Exchange::Nse,
            symbol: Some(symbol),
            company,
            scrip_code: None,
            filed_at,
            headline: None,
        })
    }
}

/// Integrated financial-results filings from NSE.
pub struct NseFilingFeed {
    session: ExchangeSession,
    base_url: String,
    page_size: u32,
}

impl NseFilingFeed {
    pub fn new(requests_per_minute: usize) -> Result<Self, AnalysisError> {
        let session = ExchangeSession::new(BASE_URL, &format!("{}{}", BASE_URL, FILINGS_PAGE), requests_per_minute)?;
        Ok(Self {
            session,
            base_url: BASE_URL.to_string(),
            page_size: 40,
        })
    }

    /// Point the feed at another host (used against mock servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_preflight_delay(mut self, delay: Duration) -> Self {
        self.session = self.session.with_preflight_delay(delay);
        self
    }

    async fn fetch_once(&self) -> Result<Vec<Filing>, AnalysisError> {
        let client = self.session.fresh_client()?;
        let pages = [self.base_url.clone(), format!("{}{}", self.base_url, FILINGS_PAGE)];
        self.session.preflight(&client, &pages).await;

        let size = self.page_size.to_string();
        let response: NseFilingsResponse = self
            .session
            .get_json(
                &client,
                &format!("{}{}", self.base_url, FILINGS_API),
                &[("type", FILING_TYPE), ("page", "1"), ("size", &size)],
            )
            .await?;

        Ok(dedupe_by_symbol(response.data.into_iter().filter_map(NseFilingRow::into_filing)))
    }
}

/// First filing per symbol wins
fn dedupe_by_symbol(filings: impl IntoIterator<Item = Filing>) -> Vec<Filing> {
    let mut seen = HashSet::new();
    filings
        .into_iter()
        .filter(|f| seen.insert(f.symbol.clone()))
        .collect()
}

#[async_trait]
impl FilingFeed for NseFilingFeed {
    async fn fetch_filings(&self) -> Result<Vec<Filing>, AnalysisError> {
        match self.fetch_once().await {
            Ok(filings) => Ok(filings),
            Err(e) => {
                tracing::warn!("NSE filings fetch failed ({}), retrying with a fresh session", e);
                self.fetch_once().await
            }
        }
    }

    fn name(&self) -> &str {
        "NSE"
    }
}
