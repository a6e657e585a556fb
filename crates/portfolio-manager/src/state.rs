use crate::db::PortfolioDb;
use analysis_core::Filing;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

/// Filings newer than the stored watermark plus the watermark to commit once
/// they have been processed.
#[derive(Debug, Clone, PartialEq)]
pub struct FreshBatch {
    pub filings: Vec<Filing>,
    /// Latest filing time in the whole fetched batch
    pub high_water: Option<DateTime<Utc>>,
}

/// Keep filings strictly newer than `watermark` (all of them when there is none).
pub fn select_fresh(filings: Vec<Filing>, watermark: Option<DateTime<Utc>>) -> FreshBatch {
    let high_water = filings.iter().map(|f| f.filed_at).max();
    let filings = match watermark {
        Some(mark) => filings.into_iter().filter(|f| f.filed_at > mark).collect(),
        None => filings,
    };
    FreshBatch { filings, high_water }
}

/// Per-feed processing watermarks
pub struct ProcessingState {
    db: PortfolioDb,
}

impl ProcessingState {
    pub fn new(db: PortfolioDb) -> Self {
        Self { db }
    }

    pub async fn last_processed(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT last_processed_time FROM processing_state WHERE key = ?")
                .bind(key)
                .fetch_optional(self.db.pool())
                .await?;

        row.map(|(raw,)| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|d| d.with_timezone(&Utc))
                .with_context(|| format!("Corrupt watermark for {}: {}", key, raw))
        })
        .transpose()
    }

    /// Move the watermark for `key` forward to `processed_at`. Earlier times are ignored.
    pub async fn advance(&self, key: &str, processed_at: DateTime<Utc>) -> Result<()> {
        let current = self.last_processed(key).await?;
        if current.is_some_and(|c| c >= processed_at) {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO processing_state (key, last_processed_time)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET
                last_processed_time = excluded.last_processed_time,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(processed_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(self.db.pool())
        .await
        .with_context(|| format!("Failed to advance watermark {}", key))?;

        tracing::debug!("Watermark {} advanced to {}", key, processed_at);
        Ok(())
    }

    /// Split a fetched batch against the stored watermark for `key`
    pub async fn fresh_filings(&self, filings: Vec<Filing>, key: &str) -> Result<FreshBatch> {
        let watermark = self.last_processed(key).await?;
        let batch = select_fresh(filings, watermark);
        tracing::info!(
            "{} fresh filings for {} (watermark {:?})",
            batch.filings.len(),
            key,
            watermark
        );
        Ok(batch)
    }

    /// Record a processed batch
    pub async fn commit(&self, key: &str, batch: &FreshBatch) -> Result<()> {
        match batch.high_water {
            Some(ts) => self.advance(key, ts).await,
            None => Ok(()),
        }
    }
}
