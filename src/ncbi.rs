use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::Registry;
use crate::error::KiraError;
use crate::registry::{Fetcher, RawSummary};

pub const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const MAX_BATCH_SIZE: usize = 10_000;
/// NCBI allows 3 requests/second without a key.
pub const RATE_LIMIT_WITHOUT_KEY: Duration = Duration::from_millis(340);
/// And 10 requests/second with one.
pub const RATE_LIMIT_WITH_KEY: Duration = Duration::from_millis(110);

#[derive(Clone)]
pub struct EntrezSettings {
    pub email: String,
    pub api_key: Option<String>,
    pub batch_size: usize,
    pub rate_limit: Duration,
    pub tool: String,
}

impl EntrezSettings {
    pub fn new(email: impl Into<String>, api_key: Option<String>) -> Self {
        let rate_limit = if api_key.is_some() {
            RATE_LIMIT_WITH_KEY
        } else {
            RATE_LIMIT_WITHOUT_KEY
        };
        Self {
            email: email.into(),
            api_key,
            batch_size: DEFAULT_BATCH_SIZE,
            rate_limit,
            tool: "kira-dm".to_string(),
        }
    }
}

impl std::fmt::Debug for EntrezSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntrezSettings")
            .field("email", &self.email)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("batch_size", &self.batch_size)
            .field("rate_limit", &self.rate_limit)
            .field("tool", &self.tool)
            .finish()
    }
}

/// Blocking E-utilities client shared by every registry fetcher.
///
/// All requests go through one rate limiter, so sharing the client across
/// fetchers keeps the whole run under NCBI's request budget.
pub struct EntrezClient {
    client: Client,
    base_url: String,
    settings: EntrezSettings,
    last_request: Mutex<Option<Instant>>,
}

impl EntrezClient {
    pub fn new(settings: EntrezSettings) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-dm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::NcbiHttp(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| KiraError::NcbiHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: EUTILS_BASE_URL.to_string(),
            settings,
            last_request: Mutex::new(None),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn settings(&self) -> &EntrezSettings {
        &self.settings
    }

    /// Every ID matching `term`, paging through the result set.
    pub fn esearch(&self, db: &str, term: &str) -> Result<Vec<String>, KiraError> {
        let batch_size = self.settings.batch_size.max(1);
        let mut ids = Vec::new();
        let mut retstart = 0usize;
        loop {
            let page = self.esearch_page(db, term, retstart, batch_size)?;
            if retstart == 0 {
                debug!(db, count = page.count, "esearch");
            }
            let fetched = page.ids.len();
            ids.extend(page.ids);
            retstart += fetched;
            if fetched < batch_size || ids.len() >= page.count {
                break;
            }
        }
        Ok(ids)
    }

    /// Summaries for `ids`, requested in batches. A failing batch is logged
    /// and left out of the result.
    pub fn esummary(&self, db: &str, ids: &[String]) -> Result<Vec<RawSummary>, KiraError> {
        let mut summaries = Vec::with_capacity(ids.len());
        for (index, batch) in ids.chunks(self.settings.batch_size.max(1)).enumerate() {
            match self.esummary_batch(db, batch) {
                Ok(found) => summaries.extend(found),
                Err(err) => {
                    warn!(db, batch = index + 1, error = %err, "esummary batch failed");
                }
            }
        }
        Ok(summaries)
    }

    fn esearch_page(
        &self,
        db: &str,
        term: &str,
        retstart: usize,
        retmax: usize,
    ) -> Result<EsearchPage, KiraError> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let mut params = self.common_params(db);
        params.push(("term", term.to_string()));
        params.push(("retstart", retstart.to_string()));
        params.push(("retmax", retmax.to_string()));
        let response = self.send_with_retries(|| self.client.get(&url).query(&params))?;
        parse_esearch(&handle_json(response)?)
    }

    fn esummary_batch(&self, db: &str, ids: &[String]) -> Result<Vec<RawSummary>, KiraError> {
        let url = format!("{}/esummary.fcgi", self.base_url);
        let mut params = self.common_params(db);
        params.push(("id", ids.join(",")));
        let response = self.send_with_retries(|| self.client.post(&url).form(&params))?;
        parse_esummary(&handle_json(response)?)
    }

    fn common_params(&self, db: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("db", db.to_string()),
            ("retmode", "json".to_string()),
            ("tool", self.settings.tool.clone()),
            ("email", self.settings.email.clone()),
        ];
        if let Some(api_key) = &self.settings.api_key {
            params.push(("api_key", api_key.clone()));
        }
        params
    }

    fn throttle(&self) {
        let mut last = self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.settings.rate_limit {
                thread::sleep(self.settings.rate_limit - elapsed);
            }
        }
        *last = Some(Instant::now());
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, KiraError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            self.throttle();
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(status, attempt, "retrying E-utilities request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(error = %err, attempt, "retrying E-utilities request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(KiraError::NcbiHttp(err.to_string()));
                }
            }
        }
    }
}

/// [`Fetcher`] for one registry backed by a shared [`EntrezClient`].
pub struct EntrezFetcher {
    client: Arc<EntrezClient>,
    registry: Registry,
}

impl EntrezFetcher {
    pub fn new(client: Arc<EntrezClient>, registry: Registry) -> Self {
        Self { client, registry }
    }
}

impl Fetcher for EntrezFetcher {
    fn fetch_ids(&self, query: &str) -> Result<Vec<String>, KiraError> {
        self.client.esearch(self.registry.entrez_db(), query)
    }

    fn fetch_summaries(&self, ids: &[String]) -> Result<Vec<RawSummary>, KiraError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.client.esummary(self.registry.entrez_db(), ids)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsearchPage {
    pub count: usize,
    pub ids: Vec<String>,
}

fn handle_json(response: reqwest::blocking::Response) -> Result<Value, KiraError> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "E-utilities request failed".to_string());
        return Err(KiraError::NcbiStatus { status, message });
    }
    response
        .json::<Value>()
        .map_err(|err| KiraError::NcbiPayload(err.to_string()))
}

pub fn parse_esearch(body: &Value) -> Result<EsearchPage, KiraError> {
    let result = body
        .get("esearchresult")
        .ok_or_else(|| KiraError::NcbiPayload("missing esearchresult".to_string()))?;
    if let Some(error) = result.get("ERROR").and_then(Value::as_str) {
        return Err(KiraError::NcbiPayload(error.to_string()));
    }
    let count = match result.get("count") {
        Some(Value::String(text)) => text
            .parse::<usize>()
            .map_err(|err| KiraError::NcbiPayload(format!("bad esearch count {text:?}: {err}")))?,
        Some(Value::Number(number)) => number.as_u64().unwrap_or(0) as usize,
        _ => 0,
    };
    let ids = result
        .get("idlist")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|id| match id {
                    Value::String(text) => Some(text.clone()),
                    Value::Number(number) => Some(number.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(EsearchPage { count, ids })
}

/// Summaries in the `uids` order of an esummary JSON body.
pub fn parse_esummary(body: &Value) -> Result<Vec<RawSummary>, KiraError> {
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        return Err(KiraError::NcbiPayload(error.to_string()));
    }
    let result = body
        .get("result")
        .ok_or_else(|| KiraError::NcbiPayload("missing esummary result".to_string()))?;
    let uids = result
        .get("uids")
        .and_then(Value::as_array)
        .ok_or_else(|| KiraError::NcbiPayload("missing esummary uids".to_string()))?;
    Ok(uids
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|uid| result.get(uid))
        .filter(|summary| summary.get("error").is_none())
        .cloned()
        .collect())
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn rate_limit_follows_api_key() {
        let anonymous = EntrezSettings::new("a@b.org", None);
        assert_eq!(anonymous.rate_limit, Duration::from_millis(340));
        let keyed = EntrezSettings::new("a@b.org", Some("secret".to_string()));
        assert_eq!(keyed.rate_limit, Duration::from_millis(110));
        assert!(!format!("{keyed:?}").contains("secret"));
    }

    #[test]
    fn parse_esearch_page() {
        let body = json!({
            "esearchresult": {"count": "3", "retmax": "2", "idlist": ["11", "12"]}
        });
        let page = parse_esearch(&body).unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.ids, vec!["11", "12"]);
    }

    #[test]
    fn parse_esearch_error() {
        let body = json!({"esearchresult": {"ERROR": "Invalid query"}});
        assert_matches!(parse_esearch(&body), Err(KiraError::NcbiPayload(_)));
    }

    #[test]
    fn parse_esummary_keeps_uid_order() {
        let body = json!({
            "result": {
                "uids": ["2", "1", "3"],
                "1": {"uid": "1"},
                "2": {"uid": "2"},
                "3": {"uid": "3", "error": "cannot get document summary"}
            }
        });
        let summaries = parse_esummary(&body).unwrap();
        let uids: Vec<_> = summaries.iter().map(|s| s["uid"].as_str().unwrap()).collect();
        assert_eq!(uids, vec!["2", "1"]);
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
    }
}
