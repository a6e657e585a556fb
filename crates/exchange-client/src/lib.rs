//! HTTP clients for the Indian exchange announcement feeds and the company
//! search used to map BSE company names to fundamentals tickers.

pub mod bse;
pub mod nse;
pub mod search;

pub use bse::BseFilingFeed;
pub use nse::NseFilingFeed;
pub use search::{normalize_company_name, search_query_for, CompanySearchClient, SearchHit};

use analysis_core::AnalysisError;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let oldest = ts.front().copied().unwrap_or(now);
            let sleep_dur = (oldest + self.window).duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for exchange slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Browser-like HTTP session shared by the exchange clients.
///
/// The exchanges only answer API calls that carry the cookies set by their HTML
/// pages, so every fetch starts from a fresh cookie store primed by [`preflight`].
///
/// [`preflight`]: ExchangeSession::preflight
#[derive(Clone)]
pub struct ExchangeSession {
    headers: HeaderMap,
    rate_limiter: RateLimiter,
    timeout: Duration,
    preflight_delay: Duration,
}

impl ExchangeSession {
    pub fn new(origin: &str, referer: &str, requests_per_minute: usize) -> Result<Self, AnalysisError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(ORIGIN, header_value(origin)?);
        headers.insert(REFERER, header_value(referer)?);

        Ok(Self {
            headers,
            rate_limiter: RateLimiter::new(requests_per_minute, Duration::from_secs(60)),
            timeout: Duration::from_secs(20),
            preflight_delay: Duration::from_millis(800),
        })
    }

    /// Pause between preflight page visits
    pub fn with_preflight_delay(mut self, delay: Duration) -> Self {
        self.preflight_delay = delay;
        self
    }

    /// A client with an empty cookie store
    pub fn fresh_client(&self) -> Result<Client, AnalysisError> {
        Client::builder()
            .cookie_store(true)
            .default_headers(self.headers.clone())
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| AnalysisError::ApiError(format!("Failed to build HTTP client: {}", e)))
    }

    /// Visit each page in order so the server sets its session cookies.
    /// Failures are logged and ignored; the API call that follows reports the real error.
    pub async fn preflight(&self, client: &Client, pages: &[String]) {
        for page in pages {
            self.rate_limiter.acquire().await;
            match client.get(page).send().await {
                Ok(resp) => tracing::debug!("Preflight {} -> {}", page, resp.status()),
                Err(e) => tracing::warn!("Preflight request to {} failed: {}", page, e),
            }
            if !self.preflight_delay.is_zero() {
                tokio::time::sleep(self.preflight_delay).await;
            }
        }
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, AnalysisError> {
        let (client, request) = builder.build_split();
        let request = request.map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| AnalysisError::ApiError("Cannot clone request".to_string()))?;
            let response = client
                .execute(req_clone)
                .await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 5u64 * (attempt as u64 + 1);
            tracing::warn!("Exchange 429 rate limited, waiting {}s before retry {}/3", wait_secs, attempt + 1);
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(AnalysisError::ApiError("Rate limited after 3 retries".to_string()))
    }

    /// GET `url` with `query` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        client: &Client,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AnalysisError> {
        let response = self.send_request(client.get(url).query(query)).await?;

        if !response.status().is_success() {
            return Err(AnalysisError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(format!("Failed to decode {}: {}", url, e)))
    }
}

fn header_value(value: &str) -> Result<HeaderValue, AnalysisError> {
    HeaderValue::from_str(value).map_err(|e| AnalysisError::InvalidData(format!("Bad header value {:?}: {}", value, e)))
}

fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Calendar date in India right now
pub fn ist_today() -> NaiveDate {
    Utc::now().with_timezone(&ist()).date_naive()
}

/// Parse an exchange timestamp such as `14-Oct-2025 19:12:41` or
/// `2025-10-15T18:45:32.47`. Exchange times carry no zone and are IST.
pub fn parse_exchange_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    const FORMATS: [&str; 5] = [
        "%d-%b-%Y %H:%M:%S",
        "%d-%b-%Y %H:%M",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
    ];

    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(raw, fmt)
            .ok()
            .and_then(|naive| ist().from_local_datetime(&naive).single())
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Accept a JSON string or number and keep it as text. Exchanges are not
/// consistent about quoting numeric codes.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
