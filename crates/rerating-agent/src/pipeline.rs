use analysis_core::{
    CompanyFundamentals, Decision, Exchange, Filing, FilingFeed, FundamentalsSource, ScoredCompany,
    TickerResolver,
};
use anyhow::{Context, Result};
use chrono::Utc;
use fundamental_analysis::{score_company, RecommendationEngine};
use notification_service::{Alert, AlertType, NotificationService};
use portfolio_manager::{PositionSnapshot, PositionStore, ProcessingState};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// A filing feed with the resolver that maps its filings to fundamentals tickers
pub struct ExchangeRun {
    pub exchange: Exchange,
    pub feed: Arc<dyn FilingFeed>,
    pub resolver: Arc<dyn TickerResolver>,
}

/// Counts for one exchange run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub fresh: usize,
    pub analyzed: usize,
    pub bought: usize,
    pub sold: usize,
    pub held: usize,
}

pub struct Pipeline {
    fundamentals: Arc<dyn FundamentalsSource>,
    engine: RecommendationEngine,
    positions: PositionStore,
    state: ProcessingState,
    notifier: NotificationService,
    concurrency: usize,
    dry_run: bool,
}

/// Carry the exchange identity of the filing onto the fundamentals record:
/// NSE filings keep their symbol as ticker, BSE companies have none.
fn attach_identity(mut company: CompanyFundamentals, filing: &Filing) -> CompanyFundamentals {
    company.stock_name = filing.company.clone();
    company.ticker = filing.symbol.clone();
    company
}

async fn analyze_filing(
    filing: &Filing,
    resolver: &dyn TickerResolver,
    fundamentals: &dyn FundamentalsSource,
    engine: RecommendationEngine,
) -> Result<ScoredCompany> {
    let ticker = resolver
        .resolve(filing)
        .await
        .with_context(|| format!("Could not resolve ticker for {}", filing.company))?;
    let company = fundamentals
        .fundamentals(&ticker)
        .await
        .with_context(|| format!("No fundamentals for {} ({})", filing.company, ticker))?;
    let company = attach_identity(company, filing);

    let recommendation = engine.recommend_company(&company);
    Ok(score_company(company, recommendation))
}

impl Pipeline {
    pub fn new(
        fundamentals: Arc<dyn FundamentalsSource>,
        engine: RecommendationEngine,
        positions: PositionStore,
        state: ProcessingState,
        notifier: NotificationService,
    ) -> Self {
        Self {
            fundamentals,
            engine,
            positions,
            state,
            notifier,
            concurrency: 4,
            dry_run: false,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    async fn notify(&self, alert_type: AlertType) {
        if self.dry_run {
            return;
        }
        self.notifier.send_alert_async(&Alert::new(alert_type)).await;
    }

    /// Run every exchange in turn. A failing exchange is logged and does not stop the others.
    pub async fn run(&self, runs: &[ExchangeRun]) -> Vec<(Exchange, Result<RunSummary>)> {
        let mut results = Vec::with_capacity(runs.len());
        for run in runs {
            let result = self.run_exchange(run).await;
            match &result {
                Ok(summary) => tracing::info!("{} run finished: {:?}", run.exchange, summary),
                Err(e) => tracing::error!("{} run failed: {:#}", run.exchange, e),
            }
            results.push((run.exchange, result));
        }
        results
    }

    pub async fn run_exchange(&self, run: &ExchangeRun) -> Result<RunSummary> {
        let key = run.exchange.watermark_key();
        tracing::info!("Starting {} scan (feed {})", run.exchange, run.feed.name());

        let filings = run
            .feed
            .fetch_filings()
            .await
            .with_context(|| format!("Failed to fetch {} filings", run.exchange))?;
        let mut summary = RunSummary {
            fetched: filings.len(),
            ..Default::default()
        };

        let batch = self.state.fresh_filings(filings, key).await?;
        summary.fresh = batch.filings.len();
        if batch.filings.is_empty() {
            tracing::info!("No fresh {} filings", run.exchange);
            return Ok(summary);
        }

        self.notify(AlertType::FilingsReleased {
            names: batch.filings.iter().map(|f| f.display_name().to_string()).collect(),
        })
        .await;

        let scored = self.analyze_all(&batch.filings, &run.resolver).await;
        summary.analyzed = scored.len();

        for company in scored {
            self.notify(AlertType::CompanyResult(Box::new(company.clone()))).await;
            match self.act_on(&company).await {
                Ok(decision) => match decision {
                    Decision::Buy => summary.bought += 1,
                    Decision::Sell => summary.sold += 1,
                    Decision::Hold => summary.held += 1,
                },
                Err(e) => tracing::warn!("Failed to act on {}: {:#}", company.company.display_name(), e),
            }
        }

        if self.dry_run {
            tracing::info!("Dry run: {} watermark left unchanged", key);
        } else {
            self.state.commit(key, &batch).await?;
        }

        Ok(summary)
    }

    /// Analyze filings concurrently, bounded by the configured concurrency. Failed
    /// companies are logged and dropped; the rest keep filing order.
    async fn analyze_all(&self, filings: &[Filing], resolver: &Arc<dyn TickerResolver>) -> Vec<ScoredCompany> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, filing) in filings.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let resolver = Arc::clone(resolver);
            let fundamentals = Arc::clone(&self.fundamentals);
            let engine = self.engine;

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = analyze_filing(&filing, resolver.as_ref(), fundamentals.as_ref(), engine).await;
                (index, filing, result)
            });
        }

        let mut scored = Vec::with_capacity(filings.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(company))) => {
                    tracing::info!(
                        "{}: {} (DPS {})",
                        company.company.display_name(),
                        company.decision(),
                        company.dps
                    );
                    scored.push((index, company));
                }
                Ok((_, filing, Err(e))) => {
                    tracing::warn!("Skipping {}: {:#}", filing.display_name(), e);
                }
                Err(e) => tracing::warn!("Analysis task failed: {}", e),
            }
        }

        scored.sort_by_key(|(index, _)| *index);
        scored.into_iter().map(|(_, company)| company).collect()
    }

    async fn act_on(&self, company: &ScoredCompany) -> Result<Decision> {
        let decision = company.decision();
        let name = company.company.display_name().to_string();

        if self.dry_run {
            tracing::info!("Dry run: would {} {}", decision, name);
            return Ok(decision);
        }

        match decision {
            Decision::Buy => {
                let eps_jump = company.recommendation.eps.as_ref().and_then(|e| e.jump_percent);
                self.notify(AlertType::RerateCandidate {
                    name: name.clone(),
                    eps_jump,
                })
                .await;
                self.positions
                    .buy(&PositionSnapshot::from_scored(company, Utc::now()))
                    .await?;
            }
            Decision::Sell => {
                let closed = self
                    .positions
                    .sell(&PositionSnapshot::from_scored(company, Utc::now()))
                    .await?;
                if let Some(closed) = closed {
                    self.notify(AlertType::PositionClosed {
                        name,
                        pnl_percent: closed.profit_loss_percent,
                    })
                    .await;
                }
            }
            Decision::Hold => tracing::info!("Holding {}", name),
        }

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{AnalysisError, SymbolResolver};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use notification_service::{NotificationChannel, NotificationError};
    use portfolio_manager::PortfolioDb;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StaticFeed(Vec<Filing>);

    #[async_trait]
    impl FilingFeed for StaticFeed {
        async fn fetch_filings(&self) -> Result<Vec<Filing>, AnalysisError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    struct BrokenFeed;

    #[async_trait]
    impl FilingFeed for BrokenFeed {
        async fn fetch_filings(&self) -> Result<Vec<Filing>, AnalysisError> {
            Err(AnalysisError::ApiError("HTTP 403".into()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    struct MapFundamentals(HashMap<String, CompanyFundamentals>);

    #[async_trait]
    impl FundamentalsSource for MapFundamentals {
        async fn fundamentals(&self, ticker: &str) -> Result<CompanyFundamentals, AnalysisError> {
            self.0
                .get(ticker)
                .cloned()
                .ok_or_else(|| AnalysisError::InsufficientData(format!("no snapshot for {}", ticker)))
        }
    }

    struct RecordingChannel(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
            self.0.lock().unwrap().push(alert.title.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn nse_filing(symbol: &str, hour: u32) -> Filing {
        Filing {
            exchange: Exchange::Nse,
            symbol: Some(symbol.to_string()),
            company: format!("{} Ltd", symbol),
            scrip_code: None,
            filed_at: Utc.with_ymd_and_hms(2025, 10, 14, hour, 0, 0).unwrap(),
            headline: None,
        }
    }

    /// EPS 10 -> 12 with two quarters of 4: jump 51.15%, PEG 0.83
    fn rerating_company() -> CompanyFundamentals {
        CompanyFundamentals {
            stock_name: "snapshot name".into(),
            yearly_eps: vec![10.0, 12.0].into(),
            quarterly_eps: vec![4.0, 4.0].into(),
            yearly_sales: vec![100.0, 115.0].into(),
            quarterly_sales: vec![33.0, 34.0].into(),
            yearly_op_profit: vec![20.0, 23.0].into(),
            quarterly_op_profit: vec![6.5, 6.5].into(),
            yearly_pat: vec![12.0, 14.0].into(),
            quarterly_pat: vec![4.5, 4.5].into(),
            pe_ratio: Some(25.0),
            current_price: Some(300.0),
            roe: Some(18.0),
            ..Default::default()
        }
    }

    /// EPS growth ~4.5%, PEG well above 3
    fn weak_company() -> CompanyFundamentals {
        CompanyFundamentals {
            yearly_eps: vec![10.0, 10.5, 11.0].into(),
            quarterly_eps: vec![2.85, 2.85, 2.85, 2.85].into(),
            pe_ratio: Some(40.0),
            current_price: Some(330.0),
            ..Default::default()
        }
    }

    struct Harness {
        pipeline: Pipeline,
        sent: Arc<Mutex<Vec<String>>>,
    }

    async fn harness(snapshots: &[(&str, CompanyFundamentals)], dry_run: bool) -> Harness {
        let db = PortfolioDb::new("sqlite::memory:").await.unwrap();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let notifier = NotificationService::with_channels(vec![Box::new(RecordingChannel(sent.clone()))]);
        let fundamentals = MapFundamentals(
            snapshots
                .iter()
                .map(|(ticker, company)| (ticker.to_string(), company.clone()))
                .collect(),
        );

        let pipeline = Pipeline::new(
            Arc::new(fundamentals),
            RecommendationEngine::new(),
            PositionStore::new(db.clone()),
            ProcessingState::new(db),
            notifier,
        )
        .with_concurrency(2)
        .with_dry_run(dry_run);

        Harness { pipeline, sent }
    }

    fn nse_run(filings: Vec<Filing>) -> ExchangeRun {
        ExchangeRun {
            exchange: Exchange::Nse,
            feed: Arc::new(StaticFeed(filings)),
            resolver: Arc::new(SymbolResolver),
        }
    }

    #[tokio::test]
    async fn test_buy_flow_records_position_and_notifies() {
        let h = harness(&[("MEIL", rerating_company())], false).await;
        let summary = h.pipeline.run_exchange(&nse_run(vec![nse_filing("MEIL", 10)])).await.unwrap();

        assert_eq!(
            summary,
            RunSummary { fetched: 1, fresh: 1, analyzed: 1, bought: 1, sold: 0, held: 0 }
        );

        let position = h.pipeline.positions.open_position("MEIL Ltd").await.unwrap().unwrap();
        assert_eq!(position.ticker.as_deref(), Some("MEIL"));
        assert_eq!(position.exchange, "NSE");
        assert_eq!(position.buy_eps_jump, Some(51.15));
        assert_eq!(position.buy_price, Some(300.0));

        let sent = h.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec!["Results released (1)", "MEIL: BUY", "Rerating candidate: MEIL"]
        );

        let watermark = h.pipeline.state.last_processed("nse_filings").await.unwrap();
        assert_eq!(watermark, Some(Utc.with_ymd_and_hms(2025, 10, 14, 10, 0, 0).unwrap()));
    }

    #[tokio::test]
    async fn test_second_run_skips_processed_filings() {
        let h = harness(&[("MEIL", rerating_company())], false).await;
        let run = nse_run(vec![nse_filing("MEIL", 10)]);
        h.pipeline.run_exchange(&run).await.unwrap();
        let again = h.pipeline.run_exchange(&run).await.unwrap();

        assert_eq!(again.fetched, 1);
        assert_eq!(again.fresh, 0);
        assert_eq!(h.pipeline.positions.all_positions().await.unwrap().len(), 1);
        assert_eq!(h.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_sell_flow_closes_open_position() {
        let h = harness(&[("MEIL", rerating_company())], false).await;
        h.pipeline.run_exchange(&nse_run(vec![nse_filing("MEIL", 10)])).await.unwrap();

        let h2 = Harness {
            pipeline: Pipeline {
                fundamentals: Arc::new(MapFundamentals(HashMap::from([("MEIL".to_string(), weak_company())]))),
                ..h.pipeline
            },
            sent: h.sent,
        };
        let summary = h2.pipeline.run_exchange(&nse_run(vec![nse_filing("MEIL", 12)])).await.unwrap();
        assert_eq!(summary.sold, 1);

        assert!(h2.pipeline.positions.open_position("MEIL Ltd").await.unwrap().is_none());
        let all = h2.pipeline.positions.all_positions().await.unwrap();
        assert_eq!(all[0].profit_loss_percent, Some(10.0));
        assert!(h2.sent.lock().unwrap().contains(&"Position closed: MEIL".to_string()));
    }

    #[tokio::test]
    async fn test_failed_company_does_not_stop_batch() {
        let h = harness(&[("MEIL", rerating_company())], false).await;
        let summary = h
            .pipeline
            .run_exchange(&nse_run(vec![nse_filing("GONE", 9), nse_filing("MEIL", 10)]))
            .await
            .unwrap();

        assert_eq!(summary.fresh, 2);
        assert_eq!(summary.analyzed, 1);
        assert_eq!(summary.bought, 1);
        // watermark still covers the whole batch
        let watermark = h.pipeline.state.last_processed("nse_filings").await.unwrap();
        assert_eq!(watermark, Some(Utc.with_ymd_and_hms(2025, 10, 14, 10, 0, 0).unwrap()));
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let h = harness(&[("MEIL", rerating_company())], true).await;
        let summary = h.pipeline.run_exchange(&nse_run(vec![nse_filing("MEIL", 10)])).await.unwrap();

        assert_eq!(summary.bought, 1);
        assert!(h.pipeline.positions.all_positions().await.unwrap().is_empty());
        assert!(h.pipeline.state.last_processed("nse_filings").await.unwrap().is_none());
        assert!(h.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broken_feed_does_not_stop_other_exchanges() {
        let h = harness(&[("MEIL", rerating_company())], false).await;
        let runs = vec![
            ExchangeRun {
                exchange: Exchange::Bse,
                feed: Arc::new(BrokenFeed),
                resolver: Arc::new(SymbolResolver),
            },
            nse_run(vec![nse_filing("MEIL", 10)]),
        ];

        let results = h.pipeline.run(&runs).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_err());
        assert_eq!(results[1].1.as_ref().unwrap().bought, 1);
    }

    #[test]
    fn test_attach_identity_for_bse_filing() {
        let filing = Filing {
            exchange: Exchange::Bse,
            symbol: None,
            company: "Esaar India Ltd".into(),
            scrip_code: Some("531502".into()),
            filed_at: Utc::now(),
            headline: None,
        };
        let company = attach_identity(
            CompanyFundamentals {
                stock_name: "ESAAR".into(),
                ticker: Some("SCRIP-42".into()),
                ..Default::default()
            },
            &filing,
        );
        assert_eq!(company.stock_name, "Esaar India Ltd");
        assert!(company.ticker.is_none());
        assert_eq!(company.exchange(), Exchange::Bse);
    }
}
