use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use url::Url;
use xwall_core::error::AppError;
use xwall_core::models::{Mention, MentionStatus, NewMention};
use xwall_core::traits::{MentionStore, PersistOutcome};

const DEFAULT_TABLE: &str = "xwall";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Mention store backed by a Supabase/PostgREST HTTP endpoint.
///
/// Inserts use `on_conflict=source_id` with `resolution=ignore-duplicates`;
/// PostgREST answers an ignored row with an empty representation, which is
/// reported as [`PersistOutcome::Duplicate`].
#[derive(Clone)]
pub struct PostgrestStore {
    client: Client,
    table_url: Url,
    api_key: String,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl PostgrestStore {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, AppError> {
        Self::with_table(base_url, api_key, DEFAULT_TABLE)
    }

    pub fn with_table(base_url: &str, api_key: &str, table: &str) -> Result<Self, AppError> {
        if api_key.trim().is_empty() {
            return Err(AppError::ConfigError("SUPABASE_KEY is empty".into()));
        }
        let table_url = Url::parse(&format!(
            "{}/rest/v1/{}",
            base_url.trim_end_matches('/'),
            table
        ))
        .map_err(|e| AppError::ConfigError(format!("Invalid SUPABASE_URL '{base_url}': {e}")))?;

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            table_url,
            api_key: api_key.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        })
    }

    fn url_with(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.table_url.clone();
        url.query_pairs_mut().extend_pairs(params);
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, AppError> {
        let response = self.authorized(request).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(AppError::DatabaseError(format!(
                "PostgREST HTTP {}: {}",
                status.as_u16(),
                message
            )));
        }
        Ok(response)
    }

    async fn fetch_rows(&self, params: &[(&str, &str)]) -> Result<Vec<Mention>, AppError> {
        let response = self.send(self.client.get(self.url_with(params))).await?;
        response
            .json()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Unexpected PostgREST rows: {e}")))
    }
}

/// Textual form of a returned `id` column. Tables keyed by UUID and by
/// identity integers are both accepted.
fn row_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Total from a `Content-Range` header such as `0-0/42` or `*/0`.
fn parse_content_range_total(value: &str) -> Option<i64> {
    value.rsplit_once('/')?.1.parse().ok()
}

impl MentionStore for PostgrestStore {
    async fn insert(&self, mention: &NewMention) -> Result<PersistOutcome, AppError> {
        let url = self.url_with(&[("on_conflict", "source_id")]);

        let response = self
            .send(
                self.client
                    .post(url)
                    .header("Prefer", "resolution=ignore-duplicates,return=representation")
                    .json(mention),
            )
            .await?;

        // An ignored duplicate comes back as `[]`; any returned row was written.
        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Unexpected insert response: {e}")))?;

        Ok(match rows.first() {
            Some(row) => PersistOutcome::Inserted(row.get("id").and_then(row_id)),
            None => PersistOutcome::Duplicate,
        })
    }

    async fn get_by_source_id(&self, source_id: &str) -> Result<Option<Mention>, AppError> {
        let rows = self
            .fetch_rows(&[
                ("select", "*"),
                ("source_id", format!("eq.{source_id}").as_str()),
                ("limit", "1"),
            ])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_recent(
        &self,
        status: Option<MentionStatus>,
        limit: usize,
    ) -> Result<Vec<Mention>, AppError> {
        let limit = limit.to_string();
        let status_filter = status.map(|s| format!("eq.{s}"));

        let mut params = vec![
            ("select", "*"),
            ("order", "created_at.desc"),
            ("limit", limit.as_str()),
        ];
        if let Some(filter) = &status_filter {
            params.push(("status", filter.as_str()));
        }
        self.fetch_rows(&params).await
    }

    async fn count_by_status(&self, status: MentionStatus) -> Result<i64, AppError> {
        let response = self
            .send(
                self.client
                    .get(self.url_with(&[
                        ("select", "id"),
                        ("status", format!("eq.{status}").as_str()),
                        ("limit", "1"),
                    ]))
                    .header("Prefer", "count=exact"),
            )
            .await?;

        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| AppError::DatabaseError("PostgREST returned no row count".into()))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.send(self.client.get(self.url_with(&[("select", "id"), ("limit", "1")])))
            .await?;
        Ok(())
    }
}
