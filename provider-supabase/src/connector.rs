//! Supabase (PostgREST) connector
//!
//! Implements [`RemoteStore`] over the project's REST endpoint
//! (`<url>/rest/v1/<table>`), authenticating every request with the anon key.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::remote::{ChangeCallback, RemoteStore, Row, SelectQuery, Subscription};
use core_runtime::config::{RemoteConfig, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::SupabaseError;
use crate::poller::ChangePoller;

/// REST path prefix under the project URL
const REST_PATH: &str = "rest/v1";

/// Per-request timeout handed to the HTTP client
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgREST error body
#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: Option<String>,
    code: Option<String>,
    hint: Option<String>,
}

/// Supabase table connector
///
/// # Example
///
/// ```ignore
/// use provider_supabase::SupabaseConnector;
/// use core_runtime::config::RemoteConfig;
///
/// let connector = SupabaseConnector::new(http_client, &RemoteConfig::from_env()?);
/// let rows = connector
///     .select(&SelectQuery::table("media_items").order_by("created_at", SortOrder::Descending))
///     .await?;
/// ```
#[derive(Clone)]
pub struct SupabaseConnector {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    anon_key: String,
    retry_policy: RetryPolicy,
    poll_interval: Duration,
}

impl SupabaseConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, config: &RemoteConfig) -> Self {
        Self {
            http_client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            retry_policy: RetryPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// How often subscriptions poll the table for changes; never below
    /// [`MIN_POLL_INTERVAL`]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}/{}", self.base_url, REST_PATH, urlencoding::encode(table))
    }

    fn select_url(&self, query: &SelectQuery) -> String {
        let mut url = format!(
            "{}?select={}",
            self.table_url(&query.table),
            urlencoding::encode(&query.projection())
        );
        if let Some(order) = &query.order_by {
            url.push_str(&format!(
                "&order={}.{}",
                urlencoding::encode(&order.column),
                order.order.as_str()
            ));
        }
        url
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest::new(method, url)
            .header("apikey", self.anon_key.clone())
            .bearer_token(self.anon_key.clone())
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
    }

    /// Execute a request, retrying rate limits, server errors and transport
    /// failures with backoff.
    #[instrument(skip(self, request), fields(method = ?request.method, url = %request.url))]
    async fn execute_with_retry(&self, request: HttpRequest) -> Result<HttpResponse> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.http_client.execute(request.clone()).await {
                Ok(response) if response.is_success() => {
                    debug!(status = response.status, "Request succeeded");
                    return Ok(response);
                }
                Ok(response) if response.status == 429 || response.is_server_error() => {
                    if attempt >= max_attempts {
                        warn!(status = response.status, attempt, "Request failed, giving up");
                        return Err(Self::api_error(&response).into());
                    }
                    let delay = self.retry_policy.delay_for(attempt);
                    warn!(
                        status = response.status,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(response) => {
                    warn!(status = response.status, "Request rejected");
                    return Err(Self::api_error(&response).into());
                }
                Err(e) => {
                    if attempt >= max_attempts {
                        warn!(error = %e, attempt, "Request failed, giving up");
                        return Err(BridgeError::RemoteError(e.to_string()));
                    }
                    let delay = self.retry_policy.delay_for(attempt);
                    warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64, "Request failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn api_error(response: &HttpResponse) -> SupabaseError {
        let message = match serde_json::from_slice::<PostgrestError>(&response.body) {
            Ok(PostgrestError {
                message: Some(message),
                code,
                hint,
            }) => {
                let mut text = message;
                if let Some(code) = code {
                    text.push_str(&format!(" [{}]", code));
                }
                if let Some(hint) = hint {
                    text.push_str(&format!(" ({})", hint));
                }
                text
            }
            _ => String::from_utf8_lossy(&response.body).to_string(),
        };

        match response.status {
            401 | 403 => SupabaseError::Unauthorized {
                status_code: response.status,
                message,
            },
            status_code => SupabaseError::ApiError {
                status_code,
                message,
            },
        }
    }
}

#[async_trait]
impl RemoteStore for SupabaseConnector {
    #[instrument(skip(self, query), fields(table = %query.table))]
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>> {
        let request = self.request(HttpMethod::Get, self.select_url(query));
        let response = self.execute_with_retry(request).await?;

        let rows: Vec<Row> = serde_json::from_slice(&response.body).map_err(|e| {
            SupabaseError::ParseError(format!("Failed to parse select response: {}", e))
        })?;
        debug!(count = rows.len(), "Selected rows");
        Ok(rows)
    }

    #[instrument(skip(self, rows), fields(table = %table, count = rows.len()))]
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let request = self
            .request(HttpMethod::Post, self.table_url(table))
            .header("Prefer", "return=minimal")
            .json(&rows)?;
        self.execute_with_retry(request).await?;
        info!("Inserted rows");
        Ok(())
    }

    #[instrument(skip(self), fields(table = %table, id = %id))]
    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        let url = format!("{}?id=eq.{}", self.table_url(table), urlencoding::encode(id));
        self.execute_with_retry(self.request(HttpMethod::Delete, url))
            .await?;
        info!("Deleted row");
        Ok(())
    }

    #[instrument(skip(self, callback), fields(table = %table))]
    async fn subscribe(&self, table: &str, callback: ChangeCallback) -> Result<Subscription> {
        let poller = ChangePoller::new(self.clone(), table, self.poll_interval);
        Ok(poller.spawn(callback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::remote::SortOrder;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn connector(mock_http: MockHttpClient) -> SupabaseConnector {
        let config = RemoteConfig::new("https://abc.supabase.co/", "anon-123");
        SupabaseConnector::new(Arc::new(mock_http), &config).with_retry_policy(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            use_exponential_backoff: true,
        })
    }

    #[tokio::test]
    async fn test_select_builds_postgrest_query() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.method, HttpMethod::Get);
            assert_eq!(
                req.url,
                "https://abc.supabase.co/rest/v1/media_items?select=%2A&order=created_at.desc"
            );
            assert_eq!(req.headers.get("apikey").unwrap(), "anon-123");
            assert_eq!(req.headers.get("Authorization").unwrap(), "Bearer anon-123");
            Ok(response(200, r#"[{"id":"media-1"},{"id":"media-2"}]"#))
        });

        let rows = connector(mock_http)
            .select(&SelectQuery::table("media_items").order_by("created_at", SortOrder::Descending))
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], "media-1");
    }

    #[tokio::test]
    async fn test_select_with_projection() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|req| {
            assert!(req.url.ends_with("?select=id%2Ccreated_at"));
            Ok(response(200, "[]"))
        });

        let rows = connector(mock_http)
            .select(&SelectQuery::table("media_items").columns(["id", "created_at"]))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_insert_posts_json_array() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.method, HttpMethod::Post);
            assert_eq!(req.url, "https://abc.supabase.co/rest/v1/media_items");
            assert_eq!(req.headers.get("Prefer").unwrap(), "return=minimal");
            assert_eq!(req.headers.get("Content-Type").unwrap(), "application/json");
            let body: Vec<Row> = serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
            assert_eq!(body.len(), 2);
            Ok(response(201, ""))
        });

        connector(mock_http)
            .insert(
                "media_items",
                vec![serde_json::json!({"id": "a"}), serde_json::json!({"id": "b"})],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_insert_makes_no_request() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().never();

        connector(mock_http).insert("media_items", vec![]).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_filters_by_id() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.method, HttpMethod::Delete);
            assert_eq!(
                req.url,
                "https://abc.supabase.co/rest/v1/media_items?id=eq.media-1-abc%20def"
            );
            Ok(response(204, ""))
        });

        connector(mock_http)
            .delete("media_items", "media-1-abc def")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(401, r#"{"message":"Invalid API key","hint":"Check your key"}"#)));

        let err = connector(mock_http)
            .select(&SelectQuery::table("media_items"))
            .await
            .unwrap_err();

        match err {
            BridgeError::RemoteError(message) => {
                assert!(message.contains("unauthorized"));
                assert!(message.contains("Invalid API key (Check your key)"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();
        mock_http
            .expect_execute()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(503, "unavailable")));
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(200, "[]")));

        let rows = connector(mock_http)
            .select(&SelectQuery::table("media_items"))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_after_retries() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(3)
            .returning(|_| Err(BridgeError::OperationFailed("dns failure".to_string())));

        let err = connector(mock_http)
            .delete("media_items", "x")
            .await
            .unwrap_err();
        assert!(err.is_remote());
    }

    #[tokio::test]
    async fn test_malformed_select_body() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .returning(|_| Ok(response(200, "<html>not json</html>")));

        let err = connector(mock_http)
            .select(&SelectQuery::table("media_items"))
            .await
            .unwrap_err();
        assert!(err.is_remote());
    }

    #[test]
    fn test_poll_interval_has_a_floor() {
        let connector = connector(MockHttpClient::new()).with_poll_interval(Duration::ZERO);
        assert_eq!(connector.poll_interval, MIN_POLL_INTERVAL);

        let slow = connector.with_poll_interval(Duration::from_secs(30));
        assert_eq!(slow.poll_interval, Duration::from_secs(30));
    }
}
