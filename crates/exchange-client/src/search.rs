use analysis_core::{AnalysisError, Filing, TickerResolver};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{string_or_number, ExchangeSession};

const BASE_URL: &str = "https://ticker.finology.in";
const SEARCH_PATH: &str = "/GetSearchData.ashx";

/// One row of the company search response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub compname: String,
    #[serde(rename = "FINCODE", default, deserialize_with = "string_or_number")]
    pub fincode: Option<String>,
}

/// Lower-case a company name and strip `Ltd`/`Limited` suffixes, trailing dots and
/// repeated whitespace so names from different sources compare equal.
pub fn normalize_company_name(name: &str) -> String {
    name.split_whitespace()
        .filter(|word| {
            let bare = word.trim_end_matches('.').to_lowercase();
            bare != "ltd" && bare != "limited"
        })
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches('.')
        .trim()
        .to_lowercase()
}

/// Search text for a company: its first word, or the first two words when the
/// first is shorter than three characters.
pub fn search_query_for(company: &str) -> String {
    let words: Vec<&str> = company.split_whitespace().collect();
    match words.first() {
        Some(first) if first.chars().count() >= 3 => first.to_string(),
        Some(_) => words.iter().take(2).copied().collect::<Vec<_>>().join(" "),
        None => String::new(),
    }
}

/// Resolves BSE company names to `SCRIP-<fincode>` tickers via the fundamentals
/// site's search endpoint.
pub struct CompanySearchClient {
    session: ExchangeSession,
    base_url: String,
}

impl CompanySearchClient {
    pub fn new(requests_per_minute: usize) -> Result<Self, AnalysisError> {
        let session = ExchangeSession::new(BASE_URL, &format!("{}/", BASE_URL), requests_per_minute)?;
        Ok(Self {
            session,
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_preflight_delay(mut self, delay: Duration) -> Self {
        self.session = self.session.with_preflight_delay(delay);
        self
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, AnalysisError> {
        let client = self.session.fresh_client()?;
        self.session.preflight(&client, &[self.base_url.clone()]).await;

        let hits: Option<Vec<SearchHit>> = self
            .session
            .get_json(&client, &format!("{}{}", self.base_url, SEARCH_PATH), &[("q", query)])
            .await?;
        Ok(hits.unwrap_or_default())
    }

    /// Ticker for `company`: the hit whose normalized name matches exactly,
    /// otherwise the first hit.
    pub async fn resolve_ticker(&self, company: &str) -> Result<String, AnalysisError> {
        let query = search_query_for(company);
        if query.is_empty() {
            return Err(AnalysisError::InvalidData("Empty company name".to_string()));
        }

        let hits = self.search(&query).await?;
        let target = normalize_company_name(company);
        let matched = hits
            .iter()
            .find(|hit| normalize_company_name(&hit.compname) == target)
            .or_else(|| hits.first())
            .ok_or_else(|| AnalysisError::InsufficientData(format!("No search results for {}", company)))?;

        if normalize_company_name(&matched.compname) != target {
            tracing::debug!("No exact match for {}, using first hit {:?}", company, matched.compname);
        }

        matched
            .fincode
            .as_ref()
            .map(|code| format!("SCRIP-{}", code))
            .ok_or_else(|| AnalysisError::InvalidData(format!("Search hit for {} has no FINCODE", company)))
    }
}

#[async_trait]
impl TickerResolver for CompanySearchClient {
    async fn resolve(&self, filing: &Filing) -> Result<String, AnalysisError> {
        self.resolve_ticker(filing.company.trim()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_normalize_company_name() {
        assert_eq!(normalize_company_name("Esaar India Ltd."), "esaar india");
        assert_eq!(normalize_company_name("ESAAR  INDIA LIMITED"), "esaar india");
        assert_eq!(normalize_company_name("Esaar India Ltd"), normalize_company_name("esaar india"));
        assert_eq!(normalize_company_name("Voltas..."), "voltas");
        assert_eq!(normalize_company_name("Ltd Holdings Ltd"), "holdings");
    }

    #[test]
    fn test_search_query_for() {
        assert_eq!(search_query_for("Esaar India Ltd"), "Esaar");
        assert_eq!(search_query_for("3i Infotech Ltd"), "3i Infotech");
        assert_eq!(search_query_for("  JK Tyre & Industries"), "JK Tyre");
        assert_eq!(search_query_for(""), "");
    }

    async fn client_for(server: &MockServer) -> CompanySearchClient {
        CompanySearchClient::new(1000)
            .unwrap()
            .with_base_url(server.uri())
            .with_preflight_delay(Duration::ZERO)
    }

    async fn mount_search(server: &MockServer, query: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(query_param("q", query))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_resolve_prefers_exact_normalized_match() {
        let server = MockServer::start().await;
        mount_search(
            &server,
            "Esaar",
            serde_json::json!([
                {"compname": "Esaar Exports Ltd", "FINCODE": 111},
                {"compname": "Esaar (India) Ltd", "FINCODE": 222},
                {"compname": "ESAAR INDIA LIMITED", "FINCODE": "333"}
            ]),
        )
        .await;

        let ticker = client_for(&server).await.resolve_ticker("Esaar India Ltd").await.unwrap();
        assert_eq!(ticker, "SCRIP-333");
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_first_hit() {
        let server = MockServer::start().await;
        mount_search(
            &server,
            "Esaar",
            serde_json::json!([
                {"compname": "Esaar Exports Ltd", "FINCODE": 111},
                {"compname": "Esaar Trading", "FINCODE": 222}
            ]),
        )
        .await;

        let ticker = client_for(&server).await.resolve_ticker("Esaar India Ltd").await.unwrap();
        assert_eq!(ticker, "SCRIP-111");
    }

    #[tokio::test]
    async fn test_resolve_without_hits_fails() {
        let server = MockServer::start().await;
        mount_search(&server, "Nowhere", serde_json::json!([])).await;

        let result = client_for(&server).await.resolve_ticker("Nowhere Corp").await;
        assert!(matches!(result, Err(AnalysisError::InsufficientData(_))));
    }

    #[tokio::test]
    async fn test_resolver_uses_filing_company() {
        let server = MockServer::start().await;
        mount_search(&server, "Esaar", serde_json::json!([{"compname": "Esaar India Ltd", "FINCODE": 42}])).await;

        let filing = Filing {
            exchange: analysis_core::Exchange::Bse,
            symbol: None,
            company: " Esaar India Ltd ".to_string(),
            scrip_code: Some("531502".to_string()),
            filed_at: chrono::Utc::now(),
            headline: None,
        };
        let ticker = client_for(&server).await.resolve(&filing).await.unwrap();
        assert_eq!(ticker, "SCRIP-42");
    }
}
