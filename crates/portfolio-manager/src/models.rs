use analysis_core::{Exchange, FinancialSeries, ScoredCompany};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATUS_BOUGHT: &str = "bought";
pub const STATUS_SOLD: &str = "sold";

/// Period labels and series captured with a snapshot, stored as one JSON column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSeries {
    pub quarters: Vec<String>,
    pub quarterly_sales: FinancialSeries,
    pub quarterly_pat: FinancialSeries,
    pub quarterly_eps: FinancialSeries,
    pub quarterly_op_profit: FinancialSeries,
    pub years: Vec<String>,
    pub yearly_sales: FinancialSeries,
    pub yearly_eps: FinancialSeries,
}

/// Fundamentals and analysis results at the moment of a buy or sell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub stock_name: String,
    pub ticker: Option<String>,
    pub exchange: Exchange,
    pub taken_at: DateTime<Utc>,

    pub price: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub market_cap: Option<f64>,
    pub debt: Option<f64>,
    pub roe: Option<f64>,
    pub roce: Option<f64>,
    pub promoter_holding: Option<f64>,
    pub series: SnapshotSeries,

    pub eps_growth_old: Option<f64>,
    pub eps_growth_new: Option<f64>,
    pub sales_growth_old: Option<f64>,
    pub sales_growth_new: Option<f64>,
    pub eps_jump: Option<f64>,
    pub eps_change: Option<f64>,
    pub peg: Option<f64>,
    pub implied_eps: Option<f64>,
    pub implied_sales: Option<f64>,
    pub dps: u8,
}

impl PositionSnapshot {
    pub fn from_scored(scored: &ScoredCompany, taken_at: DateTime<Utc>) -> Self {
        let company = &scored.company;
        let rec = &scored.recommendation;
        let eps = rec.eps.as_ref();
        let sales = rec.sales.as_ref();

        Self {
            stock_name: company.stock_name.clone(),
            ticker: company.ticker.clone().filter(|t| !t.is_empty()),
            exchange: company.exchange(),
            taken_at,
            price: company.current_price,
            pe_ratio: company.pe_ratio,
            market_cap: company.market_cap,
            debt: company.debt,
            roe: company.roe,
            roce: company.roce,
            promoter_holding: company.promoter_holding,
            series: SnapshotSeries {
                quarters: company.quarters.clone(),
                quarterly_sales: company.quarterly_sales.clone(),
                quarterly_pat: company.quarterly_pat.clone(),
                quarterly_eps: company.quarterly_eps.clone(),
                quarterly_op_profit: company.quarterly_op_profit.clone(),
                years: company.years.clone(),
                yearly_sales: company.yearly_sales.clone(),
                yearly_eps: company.yearly_eps.clone(),
            },
            eps_growth_old: eps.and_then(|g| g.old_growth_rate),
            eps_growth_new: eps.map(|g| g.new_growth_rate),
            sales_growth_old: sales.and_then(|g| g.old_growth_rate),
            sales_growth_new: sales.map(|g| g.new_growth_rate),
            eps_jump: eps.and_then(|g| g.jump_percent),
            eps_change: eps.and_then(|g| g.change),
            peg: rec.peg.filter(|p| p.is_finite()),
            implied_eps: eps.map(|g| g.implied_value),
            implied_sales: sales.map(|g| g.implied_value),
            dps: scored.dps,
        }
    }

    pub fn display_name(&self) -> &str {
        self.ticker.as_deref().unwrap_or(&self.stock_name)
    }
}

/// A row of the `positions` table
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PositionRecord {
    pub id: i64,
    pub stock_name: String,
    pub ticker: Option<String>,
    pub exchange: String,
    pub status: String,

    pub buy_date: String,
    pub buy_price: Option<f64>,
    pub buy_pe_ratio: Option<f64>,
    pub buy_market_cap: Option<f64>,
    pub buy_debt: Option<f64>,
    pub buy_roe: Option<f64>,
    pub buy_roce: Option<f64>,
    pub buy_promoter_holding: Option<f64>,
    pub buy_series: Option<String>,
    pub buy_eps_growth_old: Option<f64>,
    pub buy_eps_growth_new: Option<f64>,
    pub buy_sales_growth_old: Option<f64>,
    pub buy_sales_growth_new: Option<f64>,
    pub buy_eps_jump: Option<f64>,
    pub buy_eps_change: Option<f64>,
    pub buy_peg: Option<f64>,
    pub buy_implied_eps: Option<f64>,
    pub buy_implied_sales: Option<f64>,
    pub buy_dps: Option<i64>,

    pub sell_date: Option<String>,
    pub sell_price: Option<f64>,
    pub sell_pe_ratio: Option<f64>,
    pub sell_market_cap: Option<f64>,
    pub sell_debt: Option<f64>,
    pub sell_roe: Option<f64>,
    pub sell_roce: Option<f64>,
    pub sell_promoter_holding: Option<f64>,
    pub sell_series: Option<String>,
    pub sell_eps_growth_old: Option<f64>,
    pub sell_eps_growth_new: Option<f64>,
    pub sell_sales_growth_old: Option<f64>,
    pub sell_sales_growth_new: Option<f64>,
    pub sell_eps_jump: Option<f64>,
    pub sell_eps_change: Option<f64>,
    pub sell_peg: Option<f64>,
    pub sell_implied_eps: Option<f64>,
    pub sell_implied_sales: Option<f64>,
    pub sell_dps: Option<i64>,

    pub profit_loss: Option<f64>,
    pub profit_loss_percent: Option<f64>,
    pub holding_period_days: Option<i64>,

    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl PositionRecord {
    pub fn is_open(&self) -> bool {
        self.status == STATUS_BOUGHT
    }

    pub fn buy_series(&self) -> serde_json::Result<Option<SnapshotSeries>> {
        self.buy_series.as_deref().map(|s| serde_json::from_str(s)).transpose()
    }

    pub fn sell_series(&self) -> serde_json::Result<Option<SnapshotSeries>> {
        self.sell_series.as_deref().map(|s| serde_json::from_str(s)).transpose()
    }

    pub fn display_name(&self) -> &str {
        self.ticker.as_deref().unwrap_or(&self.stock_name)
    }
}
