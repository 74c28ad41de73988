use std::time::Duration;

use reqwest::Client;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use url::Url;
use xwall_core::credentials::CredentialSet;
use xwall_core::error::AppError;
use xwall_core::models::{MediaAttachment, MediaKind, PostAuthor, RawPost, SearchSort};
use xwall_core::traits::{ProviderFactory, SearchProvider};

const DEFAULT_BASE_URL: &str = "https://x.com/i/api/graphql";
const DEFAULT_QUERY_ID: &str = "nK1dw4oV3k4w5TdtcAdSww";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// Public bearer token shipped with the X web client.
const WEB_BEARER_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

/// Cookie-authenticated client for the X `SearchTimeline` GraphQL endpoint.
///
/// Issues one request per search. Any non-2xx answer is surfaced as an
/// error so the caller's retry policy decides what happens next.
#[derive(Clone)]
pub struct XSearchClient {
    client: Client,
    endpoint: Url,
    timeout_secs: u64,
}

impl XSearchClient {
    pub fn new(credentials: &CredentialSet) -> Result<Self, AppError> {
        Self::build(credentials, DEFAULT_BASE_URL, DEFAULT_QUERY_ID, DEFAULT_TIMEOUT)
    }

    fn build(
        credentials: &CredentialSet,
        base_url: &str,
        query_id: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        credentials.validate()?;

        let endpoint = Url::parse(&format!(
            "{}/{}/SearchTimeline",
            base_url.trim_end_matches('/'),
            query_id
        ))
        .map_err(|e| AppError::ConfigError(format!("Invalid search endpoint: {e}")))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(auth_headers(credentials)?)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            timeout_secs: timeout.as_secs(),
        })
    }

    fn request_url(&self, query: &str, sort: SearchSort, limit: usize) -> Result<Url, AppError> {
        let variables = json!({
            "rawQuery": query,
            "count": limit,
            "querySource": "typed_query",
            "product": sort.as_str(),
        });

        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("variables", &serde_json::to_string(&variables)?)
            .append_pair("features", &serde_json::to_string(&search_features())?);
        Ok(url)
    }
}

/// Headers every request carries: bearer, session cookies and the CSRF echo.
fn auth_headers(credentials: &CredentialSet) -> Result<HeaderMap, AppError> {
    let csrf = credentials.csrf_token().unwrap_or_default();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {WEB_BEARER_TOKEN}"))
            .map_err(|e| AppError::ConfigError(e.to_string()))?,
    );
    headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&credentials.cookie_header())
            .map_err(|_| AppError::CredentialError("cookie value is not a valid header".into()))?,
    );
    headers.insert(
        "x-csrf-token",
        HeaderValue::from_str(csrf)
            .map_err(|_| AppError::CredentialError("ct0 is not a valid header value".into()))?,
    );
    headers.insert("x-twitter-auth-type", HeaderValue::from_static("OAuth2Session"));
    headers.insert("x-twitter-active-user", HeaderValue::from_static("yes"));
    Ok(headers)
}

fn search_features() -> Value {
    json!({
        "responsive_web_graphql_exclude_directive_enabled": true,
        "verified_phone_label_enabled": false,
        "responsive_web_graphql_timeline_navigation_enabled": true,
        "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false,
        "tweetypie_unmention_optimization_enabled": true,
        "longform_notetweets_consumption_enabled": true,
        "freedom_of_speech_not_reach_fetch_enabled": true,
        "standardized_nudges_misinfo": true,
        "view_counts_everywhere_api_enabled": true,
        "responsive_web_edit_tweet_api_enabled": true,
        "creator_subscriptions_tweet_preview_api_enabled": true,
    })
}

impl SearchProvider for XSearchClient {
    async fn search(
        &self,
        query: &str,
        sort: SearchSort,
        limit: usize,
    ) -> Result<Vec<RawPost>, AppError> {
        let url = self.request_url(query, sort, limit)?;

        let response = self.client.get(url).send().await.map_err(|e| {
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
            let status_code = status.as_u16();
            if status_code == 429 {
                return Err(AppError::RateLimitExceeded);
            }
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ProviderError {
                message: provider_message(&body).unwrap_or(body),
                status_code,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::ParseError(format!("Failed to parse search response: {e}")))?;

        let mut posts = parse_timeline(&body)?;
        posts.truncate(limit);
        Ok(posts)
    }
}

/// First `errors[].message` of a GraphQL error body.
fn provider_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value["errors"][0]["message"].as_str().map(str::to_string)
}

/// Extract posts from a `SearchTimeline` response body.
///
/// Entries that are not tweets (cursors, user modules, tombstones) are skipped.
pub fn parse_timeline(body: &Value) -> Result<Vec<RawPost>, AppError> {
    let instructions = body
        .pointer("/data/search_by_raw_query/search_timeline/timeline/instructions")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            let message = provider_message(&body.to_string())
                .unwrap_or_else(|| "timeline instructions missing".into());
            AppError::ParseError(message)
        })?;

    let posts = instructions
        .iter()
        .filter(|i| i["type"] == "TimelineAddEntries")
        .filter_map(|i| i["entries"].as_array())
        .flatten()
        .filter_map(|entry| entry.pointer("/content/itemContent/tweet_results/result"))
        .filter_map(parse_tweet)
        .collect();

    Ok(posts)
}

fn parse_tweet(result: &Value) -> Option<RawPost> {
    // Posts under visibility limits are wrapped one level deeper.
    let result = match result["__typename"].as_str() {
        Some("TweetWithVisibilityResults") => &result["tweet"],
        _ => result,
    };
    let legacy = result.get("legacy")?;

    let id = legacy["id_str"]
        .as_str()
        .or_else(|| result["rest_id"].as_str())?
        .to_string();

    let author = result
        .pointer("/core/user_results/result")
        .and_then(parse_author);

    let media = legacy
        .pointer("/extended_entities/media")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|m| MediaAttachment {
                    kind: MediaKind::from_provider(m["type"].as_str().unwrap_or_default()),
                    media_url: m["media_url_https"].as_str().map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default();

    let retweeted_id = legacy
        .pointer("/retweeted_status_result/result/rest_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(RawPost {
        id,
        author,
        text: legacy["full_text"].as_str().map(str::to_string),
        media,
        retweeted_id,
        in_reply_to: legacy["in_reply_to_status_id_str"]
            .as_str()
            .map(str::to_string),
        is_quote: legacy["is_quote_status"].as_bool().unwrap_or(false),
    })
}

fn parse_author(user: &Value) -> Option<PostAuthor> {
    // Newer payloads moved the names out of `legacy` into `core`.
    let handle = user
        .pointer("/legacy/screen_name")
        .or_else(|| user.pointer("/core/screen_name"))
        .and_then(Value::as_str)?;
    let display_name = user
        .pointer("/legacy/name")
        .or_else(|| user.pointer("/core/name"))
        .and_then(Value::as_str)
        .unwrap_or(handle);
    let avatar_url = user
        .pointer("/legacy/profile_image_url_https")
        .or_else(|| user.pointer("/avatar/image_url"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(PostAuthor {
        handle: handle.to_string(),
        display_name: display_name.to_string(),
        avatar_url,
    })
}

/// Builds [`XSearchClient`]s from resolved credentials.
#[derive(Clone)]
pub struct XSearchClientFactory {
    base_url: String,
    query_id: String,
    timeout: Duration,
}

impl Default for XSearchClientFactory {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            query_id: DEFAULT_QUERY_ID.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl XSearchClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_query_id(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = query_id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ProviderFactory for XSearchClientFactory {
    type Provider = XSearchClient;

    fn connect(&self, credentials: &CredentialSet) -> Result<XSearchClient, AppError> {
        XSearchClient::build(credentials, &self.base_url, &self.query_id, self.timeout)
    }
}
