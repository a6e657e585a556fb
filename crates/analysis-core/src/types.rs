use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fiscal;

/// Stock exchange a filing was published on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    Nse,
    Bse,
}

impl Exchange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Nse => "NSE",
            Exchange::Bse => "BSE",
        }
    }

    /// Key under which the processing watermark for this feed is stored
    pub fn watermark_key(&self) -> &'static str {
        match self {
            Exchange::Nse => "nse_filings",
            Exchange::Bse => "bse_filings",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A financial-results filing announced on an exchange feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filing {
    pub exchange: Exchange,
    /// Trading symbol (NSE only)
    pub symbol: Option<String>,
    pub company: String,
    /// Numeric scrip code (BSE only)
    pub scrip_code: Option<String>,
    pub filed_at: DateTime<Utc>,
    #[serde(default)]
    pub headline: Option<String>,
}

impl Filing {
    /// Symbol when present, otherwise the company name
    pub fn display_name(&self) -> &str {
        self.symbol.as_deref().unwrap_or(&self.company)
    }
}

/// One reporting-period series, oldest first. Cells the source could not read are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinancialSeries(pub Vec<Option<f64>>);

impl FinancialSeries {
    /// Present values only, in order
    pub fn values(&self) -> Vec<f64> {
        self.0.iter().flatten().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop the first `count` cells
    pub fn skip(&self, count: usize) -> Self {
        Self(self.0.iter().skip(count).copied().collect())
    }
}

impl From<Vec<f64>> for FinancialSeries {
    fn from(values: Vec<f64>) -> Self {
        Self(values.into_iter().map(Some).collect())
    }
}

/// Fundamentals for one company as returned by a fundamentals source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyFundamentals {
    pub stock_name: String,
    pub ticker: Option<String>,

    /// Quarter labels such as "Jun 2025", oldest first
    pub quarters: Vec<String>,
    pub quarterly_sales: FinancialSeries,
    pub quarterly_pat: FinancialSeries,
    pub quarterly_eps: FinancialSeries,
    pub quarterly_op_profit: FinancialSeries,

    /// Fiscal year labels such as "Mar 2025", oldest first
    pub years: Vec<String>,
    pub yearly_sales: FinancialSeries,
    pub yearly_eps: FinancialSeries,
    pub yearly_op_profit: FinancialSeries,
    pub yearly_pat: FinancialSeries,

    pub pe_ratio: Option<f64>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub debt: Option<f64>,
    pub promoter_holding: Option<f64>,
    pub roe: Option<f64>,
    pub roce: Option<f64>,
}

impl CompanyFundamentals {
    /// Keep only the quarters of the fiscal year containing `today`.
    ///
    /// Quarterly series are trimmed from the front by the same number of cells
    /// as the quarter labels, so label and value positions stay aligned.
    pub fn restrict_to_fiscal_year(mut self, today: NaiveDate) -> Self {
        let current = fiscal::current_fiscal_quarters(&self.quarters, today);
        let skip = self.quarters.len().saturating_sub(current.len());

        self.quarterly_sales = self.quarterly_sales.skip(skip);
        self.quarterly_pat = self.quarterly_pat.skip(skip);
        self.quarterly_eps = self.quarterly_eps.skip(skip);
        self.quarterly_op_profit = self.quarterly_op_profit.skip(skip);
        self.quarters = current;
        self
    }

    /// Exchange the company is traded on: NSE when a ticker symbol is known
    pub fn exchange(&self) -> Exchange {
        match &self.ticker {
            Some(t) if !t.is_empty() => Exchange::Nse,
            _ => Exchange::Bse,
        }
    }

    pub fn display_name(&self) -> &str {
        match &self.ticker {
            Some(t) if !t.is_empty() => t,
            _ => &self.stock_name,
        }
    }
}

/// Growth of one metric before and after the implied current-year value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthResult {
    /// CAGR (%) excluding the implied value; `None` when that window spans no periods
    pub old_growth_rate: Option<f64>,
    /// CAGR (%) including the implied value
    pub new_growth_rate: f64,
    /// Relative change between the two rates (%)
    pub jump_percent: Option<f64>,
    /// Absolute difference between the two rates
    pub change: Option<f64>,
    pub implied_value: f64,
}

/// Action derived from a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Buy,
    Sell,
    Hold,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Buy => "BUY",
            Decision::Sell => "SELL",
            Decision::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the recommendation engine for one company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "EPS")]
    pub eps: Option<GrowthResult>,
    #[serde(rename = "Sales")]
    pub sales: Option<GrowthResult>,
    #[serde(rename = "OP")]
    pub op: Option<GrowthResult>,
    #[serde(rename = "PAT")]
    pub pat: Option<GrowthResult>,
    #[serde(rename = "PE")]
    pub pe: f64,
    /// PE over EPS growth (floored at 1); `None` without an EPS result
    #[serde(rename = "PEG")]
    pub peg: Option<f64>,
    #[serde(rename = "peChange")]
    pub pe_change: Option<f64>,
    pub decision: Decision,
    #[serde(rename = "reratingCandidate")]
    pub rerating_candidate: bool,
}

/// A company together with its recommendation and Doubling Potential Score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCompany {
    pub company: CompanyFundamentals,
    pub recommendation: Recommendation,
    pub dps: u8,
}

impl ScoredCompany {
    pub fn decision(&self) -> Decision {
        self.recommendation.decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_values_skip_missing_cells() {
        let series = FinancialSeries(vec![Some(1.0), None, Some(3.0)]);
        assert_eq!(series.values(), vec![1.0, 3.0]);
        assert_eq!(series.skip(1).values(), vec![3.0]);
    }

    #[test]
    fn test_fundamentals_deserialize_from_snapshot_shape() {
        let json = r#"{
            "stockName": "Mangal Electrical Industries Ltd",
            "ticker": "MEIL",
            "quarters": ["Jun 2025"],
            "quarterlyEps": [4.1],
            "yearlyEps": [10.0, null, 12.0],
            "peRatio": 28.5,
            "roe": 18.2
        }"#;
        let company: CompanyFundamentals = serde_json::from_str(json).unwrap();
        assert_eq!(company.ticker.as_deref(), Some("MEIL"));
        assert_eq!(company.yearly_eps.values(), vec![10.0, 12.0]);
        assert!(company.quarterly_sales.is_empty());
        assert_eq!(company.pe_ratio, Some(28.5));
        assert_eq!(company.exchange(), Exchange::Nse);
    }

    #[test]
    fn test_restrict_to_fiscal_year_trims_quarterly_series() {
        let company = CompanyFundamentals {
            stock_name: "Esaar India".to_string(),
            quarters: vec!["Dec 2024".into(), "Mar 2025".into(), "Jun 2025".into()],
            quarterly_eps: vec![1.0, 2.0, 3.0].into(),
            quarterly_sales: vec![10.0, 20.0, 30.0].into(),
            ..Default::default()
        };

        let today = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        let trimmed = company.restrict_to_fiscal_year(today);
        assert_eq!(trimmed.quarters, vec!["Jun 2025".to_string()]);
        assert_eq!(trimmed.quarterly_eps.values(), vec![3.0]);
        assert_eq!(trimmed.quarterly_sales.values(), vec![30.0]);
        assert_eq!(trimmed.exchange(), Exchange::Bse);
    }

    #[test]
    fn test_recommendation_serializes_with_record_field_names() {
        let rec = Recommendation {
            eps: None,
            sales: None,
            op: None,
            pat: None,
            pe: 30.0,
            peg: Some(30.0),
            pe_change: None,
            decision: Decision::Sell,
            rerating_candidate: false,
        };
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["decision"], "SELL");
        assert_eq!(value["PEG"], 30.0);
        assert!(value["peChange"].is_null());
        assert_eq!(value["reratingCandidate"], false);
    }
}
