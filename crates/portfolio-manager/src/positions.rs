use crate::db::PortfolioDb;
use crate::models::*;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::query::Query;

/// Snapshot columns, each present once with a `buy_` and once with a `sell_` prefix
const SNAPSHOT_COLUMNS: [&str; 19] = [
    "date",
    "price",
    "pe_ratio",
    "market_cap",
    "debt",
    "roe",
    "roce",
    "promoter_holding",
    "series",
    "eps_growth_old",
    "eps_growth_new",
    "sales_growth_old",
    "sales_growth_new",
    "eps_jump",
    "eps_change",
    "peg",
    "implied_eps",
    "implied_sales",
    "dps",
];

fn prefixed_columns(prefix: &str) -> Vec<String> {
    SNAPSHOT_COLUMNS.iter().map(|c| format!("{}_{}", prefix, c)).collect()
}

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Bind snapshot values in `SNAPSHOT_COLUMNS` order
fn bind_snapshot<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    snapshot: &PositionSnapshot,
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>> {
    let series = serde_json::to_string(&snapshot.series).context("Failed to encode snapshot series")?;
    Ok(query
        .bind(timestamp(&snapshot.taken_at))
        .bind(snapshot.price)
        .bind(snapshot.pe_ratio)
        .bind(snapshot.market_cap)
        .bind(snapshot.debt)
        .bind(snapshot.roe)
        .bind(snapshot.roce)
        .bind(snapshot.promoter_holding)
        .bind(series)
        .bind(snapshot.eps_growth_old)
        .bind(snapshot.eps_growth_new)
        .bind(snapshot.sales_growth_old)
        .bind(snapshot.sales_growth_new)
        .bind(snapshot.eps_jump)
        .bind(snapshot.eps_change)
        .bind(snapshot.peg)
        .bind(snapshot.implied_eps)
        .bind(snapshot.implied_sales)
        .bind(i64::from(snapshot.dps)))
}

/// Realized result of closing a position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosedPnl {
    pub profit_loss: Option<f64>,
    pub profit_loss_percent: Option<f64>,
    pub holding_period_days: Option<i64>,
}

/// Profit per share, return and holding period between a buy and a sell.
pub fn closed_pnl(
    buy_price: Option<f64>,
    sell_price: Option<f64>,
    buy_date: Option<DateTime<Utc>>,
    sell_date: DateTime<Utc>,
) -> ClosedPnl {
    let buy = buy_price.and_then(Decimal::from_f64);
    let sell = sell_price.and_then(Decimal::from_f64);

    let (profit_loss, profit_loss_percent) = match (buy, sell) {
        (Some(buy), Some(sell)) => {
            let diff = sell - buy;
            let percent = if buy > Decimal::ZERO {
                (diff / buy * Decimal::ONE_HUNDRED).round_dp(2).to_f64()
            } else {
                None
            };
            (diff.round_dp(4).to_f64(), percent)
        }
        _ => (None, None),
    };

    ClosedPnl {
        profit_loss,
        profit_loss_percent,
        holding_period_days: buy_date.map(|d| (sell_date - d).num_days()),
    }
}

/// Open and closed positions, at most one open position per company name.
pub struct PositionStore {
    db: PortfolioDb,
}

impl PositionStore {
    pub fn new(db: PortfolioDb) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &PortfolioDb {
        &self.db
    }

    /// Open a position. When one is already open for the company, that record is
    /// returned unchanged.
    pub async fn buy(&self, snapshot: &PositionSnapshot) -> Result<PositionRecord> {
        let buy_columns = prefixed_columns("buy");
        let sql = format!(
            "INSERT OR IGNORE INTO positions (stock_name, ticker, exchange, status, {}) VALUES (?, ?, ?, ?, {})",
            buy_columns.join(", "),
            vec!["?"; buy_columns.len()].join(", ")
        );

        let query = sqlx::query(&sql)
            .bind(&snapshot.stock_name)
            .bind(&snapshot.ticker)
            .bind(snapshot.exchange.as_str())
            .bind(STATUS_BOUGHT);
        let result = bind_snapshot(query, snapshot)?
            .execute(self.db.pool())
            .await
            .with_context(|| format!("Failed to record buy of {}", snapshot.stock_name))?;

        if result.rows_affected() == 0 {
            tracing::info!("{} already bought, keeping the open position", snapshot.display_name());
        } else {
            tracing::info!("Bought {}", snapshot.display_name());
        }

        self.open_position(&snapshot.stock_name)
            .await?
            .with_context(|| format!("Open position for {} missing after buy", snapshot.stock_name))
    }

    /// Close the open position for the company with the sell snapshot. Returns
    /// `None` when nothing is open.
    pub async fn sell(&self, snapshot: &PositionSnapshot) -> Result<Option<PositionRecord>> {
        let mut tx = self.db.pool().begin().await?;

        let open = sqlx::query_as::<_, PositionRecord>(
            "SELECT * FROM positions WHERE stock_name = ? AND status = ?",
        )
        .bind(&snapshot.stock_name)
        .bind(STATUS_BOUGHT)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(open) = open else {
            tracing::info!("{} not held or already sold", snapshot.display_name());
            return Ok(None);
        };

        let buy_date = DateTime::parse_from_rfc3339(&open.buy_date)
            .ok()
            .map(|d| d.with_timezone(&Utc));
        let pnl = closed_pnl(open.buy_price, snapshot.price, buy_date, snapshot.taken_at);

        let assignments: Vec<String> = prefixed_columns("sell")
            .iter()
            .map(|c| format!("{} = ?", c))
            .collect();
        let sql = format!(
            "UPDATE positions SET status = ?, {}, profit_loss = ?, profit_loss_percent = ?, \
             holding_period_days = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            assignments.join(", ")
        );

        let query = sqlx::query(&sql).bind(STATUS_SOLD);
        bind_snapshot(query, snapshot)?
            .bind(pnl.profit_loss)
            .bind(pnl.profit_loss_percent)
            .bind(pnl.holding_period_days)
            .bind(open.id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to record sell of {}", snapshot.stock_name))?;

        let closed = sqlx::query_as::<_, PositionRecord>("SELECT * FROM positions WHERE id = ?")
            .bind(open.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(
            "Sold {} (P&L {:?}%, held {:?} days)",
            snapshot.display_name(),
            pnl.profit_loss_percent,
            pnl.holding_period_days
        );

        Ok(Some(closed))
    }

    pub async fn open_position(&self, stock_name: &str) -> Result<Option<PositionRecord>> {
        let position = sqlx::query_as::<_, PositionRecord>(
            "SELECT * FROM positions WHERE stock_name = ? AND status = ?",
        )
        .bind(stock_name)
        .bind(STATUS_BOUGHT)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(position)
    }

    /// Every position, newest first
    pub async fn all_positions(&self) -> Result<Vec<PositionRecord>> {
        let positions = sqlx::query_as::<_, PositionRecord>("SELECT * FROM positions ORDER BY id DESC")
            .fetch_all(self.db.pool())
            .await?;

        Ok(positions)
    }
}
