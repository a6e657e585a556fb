use analysis_core::{AnalysisError, Exchange, Filing, FilingFeed};
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::{ist_today, parse_exchange_timestamp, string_or_number, ExchangeSession};

const SITE_URL: &str = "https://www.bseindia.com";
const API_URL: &str = "https://api.bseindia.com";
const ANNOUNCEMENTS_PAGE: &str = "/corporates/ann.html";
const ANNOUNCEMENTS_API: &str = "/BseIndiaAPI/api/AnnSubCategoryGetData/w";

#[derive(Debug, Deserialize)]
struct BseAnnouncementsResponse {
    #[serde(rename = "Table", default)]
    table: Vec<BseAnnouncementRow>,
}

#[derive(Debug, Deserialize)]
struct BseAnnouncementRow {
    #[serde(rename = "NEWSID", default, deserialize_with = "string_or_number")]
    news_id: Option<String>,
    #[serde(rename = "SLONGNAME")]
    long_name: Option<String>,
    #[serde(rename = "SCRIP_CD", default, deserialize_with = "string_or_number")]
    scrip_code: Option<String>,
    #[serde(rename = "NEWS_DT")]
    news_date: Option<String>,
    #[serde(rename = "News_submission_dt")]
    submission_date: Option<String>,
    #[serde(rename = "HEADLINE")]
    headline: Option<String>,
}

impl BseAnnouncementRow {
    fn into_filing(self) -> Option<Filing> {
        let company = self.long_name.map(|n| n.trim().to_string()).unwrap_or_default();
        let filed_at = self
            .news_date
            .as_deref()
            .and_then(parse_exchange_timestamp)
            .or_else(|| self.submission_date.as_deref().and_then(parse_exchange_timestamp));

        let Some(filed_at) = filed_at else {
            tracing::debug!("Skipping BSE announcement {:?} for {} with no readable date", self.news_id, company);
            return None;
        };

        Some(Filing {
            exchange: Exchange::Bse,
            symbol: None,
            company,
            scrip_code: self.scrip_code,
            filed_at,
            headline: self.headline,
        })
    }
}

/// Financial-results announcements from BSE for a single day (yesterday, IST, unless set).
pub struct BseFilingFeed {
    session: ExchangeSession,
    site_url: String,
    api_url: String,
    date: Option<NaiveDate>,
}

impl BseFilingFeed {
    pub fn new(requests_per_minute: usize) -> Result<Self, AnalysisError> {
        let session = ExchangeSession::new(
            SITE_URL,
            &format!("{}/corporates/ann.aspx", SITE_URL),
            requests_per_minute,
        )?;
        Ok(Self {
            session,
            site_url: SITE_URL.to_string(),
            api_url: API_URL.to_string(),
            date: None,
        })
    }

    pub fn with_base_urls(mut self, site_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        self.site_url = site_url.into().trim_end_matches('/').to_string();
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_preflight_delay(mut self, delay: Duration) -> Self {
        self.session = self.session.with_preflight_delay(delay);
        self
    }

    /// Fetch announcements for `date` instead of yesterday
    pub fn for_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    fn target_date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| {
            let today = ist_today();
            today.checked_sub_days(Days::new(1)).unwrap_or(today)
        })
    }
}

/// Key on scrip code, falling back to the lower-cased company name. Rows with
/// neither are dropped; the first row per key wins.
fn dedupe_announcements(filings: impl IntoIterator<Item = Filing>) -> Vec<Filing> {
    let mut seen = HashSet::new();
    filings
        .into_iter()
        .filter(|f| {
            let key = f
                .scrip_code
                .as_deref()
                .unwrap_or(&f.company)
                .trim()
                .to_lowercase();
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

#[async_trait]
impl FilingFeed for BseFilingFeed {
    async fn fetch_filings(&self) -> Result<Vec<Filing>, AnalysisError> {
        let client = self.session.fresh_client()?;
        let pages = [self.site_url.clone(), format!("{}{}", self.site_url, ANNOUNCEMENTS_PAGE)];
        self.session.preflight(&client, &pages).await;

        let date = self.target_date().format("%Y%m%d").to_string();
        tracing::info!("Fetching BSE financial results for {}", date);

        let response: BseAnnouncementsResponse = self
            .session
            .get_json(
                &client,
                &format!("{}{}", self.api_url, ANNOUNCEMENTS_API),
                &[
                    ("pageno", "1"),
                    ("strCat", "Result"),
                    ("strPrevDate", &date),
                    ("strScrip", ""),
                    ("strSearch", "P"),
                    ("strToDate", &date),
                    ("strType", "C"),
                    ("subcategory", "Financial Results"),
                ],
            )
            .await?;

        Ok(dedupe_announcements(
            response.table.into_iter().filter_map(BseAnnouncementRow::into_filing),
        ))
    }

    fn name(&self) -> &str {
        "BSE"
    }
}
