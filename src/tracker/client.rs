use crate::tracker::types::{Comment, Review, Story, StoryId};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::StreamExt;
use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://www.pivotaltracker.com";

const TOKEN_HEADER: &str = "X-TrackerToken";
const PAGINATION_TOTAL_HEADER: &str = "X-Tracker-Pagination-Total";
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Connection settings for [`TrackerClient`].
///
/// Built once from [`crate::config::Config`] and handed to the client; the
/// client never reads configuration on its own.
#[derive(Debug)]
pub struct TrackerSettings {
    pub base_url: Url,
    pub project_id: u64,
    pub api_token: SecretString,
    /// Upper bound for one request, including reading the body.
    pub request_timeout: Duration,
    /// Retries for transient failures (network, timeout, 5xx, 429).
    pub max_retries: u32,
    /// `limit` sent to the paginated stories endpoint.
    pub page_size: u32,
    /// Only list stories accepted after this instant.
    pub accepted_after: Option<DateTime<Utc>>,
}

impl TrackerSettings {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_MAX_RETRIES: u32 = 2;
    pub const DEFAULT_PAGE_SIZE: u32 = 100;
    /// Largest `limit` the Tracker API accepts.
    pub const MAX_PAGE_SIZE: u32 = 500;

    pub fn new(base_url: Url, project_id: u64, api_token: SecretString) -> Self {
        Self {
            base_url,
            project_id,
            api_token,
            request_timeout: Self::DEFAULT_TIMEOUT,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            page_size: Self::DEFAULT_PAGE_SIZE,
            accepted_after: None,
        }
    }
}

/// The Tracker call an [`UpstreamError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Stories { project_id: u64 },
    Reviews { story_id: StoryId },
    Comments { story_id: StoryId },
}

impl Call {
    pub fn story_id(&self) -> Option<StoryId> {
        match self {
            Call::Stories { .. } => None,
            Call::Reviews { story_id } | Call::Comments { story_id } => Some(*story_id),
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Call::Stories { project_id } => {
                write!(f, "listing accepted stories of project {}", project_id)
            }
            Call::Reviews { story_id } => write!(f, "fetching reviews for story {}", story_id),
            Call::Comments { story_id } => write!(f, "fetching comments for story {}", story_id),
        }
    }
}

/// Why a single Tracker request failed.
#[derive(Debug, Error)]
pub enum FetchErrorKind {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Body was not the JSON shape we expected
    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
}

impl FetchErrorKind {
    /// Returns true if this error is transient and the request should be retried.
    fn is_retryable(&self) -> bool {
        match self {
            FetchErrorKind::Timeout(_) => true,
            FetchErrorKind::Network(e) => !e.is_builder(),
            FetchErrorKind::HttpStatus(status) => *status >= 500 || *status == 429,
            FetchErrorKind::Decode(_) | FetchErrorKind::ResponseTooLarge(_) => false,
        }
    }
}

/// A failed call to the Tracker API, tagged with the call that failed.
#[derive(Debug, Error)]
#[error("Tracker API error while {call}: {kind}")]
pub struct UpstreamError {
    pub call: Call,
    pub kind: FetchErrorKind,
}

impl UpstreamError {
    pub fn story_id(&self) -> Option<StoryId> {
        self.call.story_id()
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
    #[error("Base URL cannot be used for API paths: {0}")]
    InvalidBaseUrl(String),
    #[error("API token contains characters not allowed in an HTTP header")]
    InvalidToken,
}

struct Fetched {
    body: Vec<u8>,
    pagination_total: Option<usize>,
}

/// Read-only client for the Pivotal Tracker v5 REST API.
pub struct TrackerClient {
    http: reqwest::Client,
    token: HeaderValue,
    settings: TrackerSettings,
}

impl TrackerClient {
    pub fn new(settings: TrackerSettings) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("newsletter-export/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;
        Self::with_http_client(http, settings)
    }

    /// Use an existing `reqwest::Client` (shared pool, custom TLS, ...).
    pub fn with_http_client(
        http: reqwest::Client,
        settings: TrackerSettings,
    ) -> Result<Self, ClientError> {
        if settings.base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(settings.base_url.to_string()));
        }

        let mut token = HeaderValue::from_str(settings.api_token.expose_secret())
            .map_err(|_| ClientError::InvalidToken)?;
        token.set_sensitive(true);

        Ok(Self {
            http,
            token,
            settings,
        })
    }

    pub fn project_id(&self) -> u64 {
        self.settings.project_id
    }

    /// Lists every story of the project in state `accepted`, following
    /// pagination until the reported total is reached.
    pub async fn fetch_accepted_stories(&self) -> Result<Vec<Story>, UpstreamError> {
        let call = Call::Stories {
            project_id: self.settings.project_id,
        };
        let page_size = self.settings.page_size.max(1);
        let mut stories = Vec::new();
        let mut offset = 0usize;

        loop {
            let mut url = self.project_url(&["stories"]);
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("with_state", "accepted")
                    .append_pair("limit", &page_size.to_string())
                    .append_pair("offset", &offset.to_string());
                if let Some(after) = self.settings.accepted_after {
                    query.append_pair(
                        "accepted_after",
                        &after.to_rfc3339_opts(SecondsFormat::Secs, true),
                    );
                }
            }

            let fetched = self
                .fetch_with_retry(&url)
                .await
                .map_err(|kind| UpstreamError { call, kind })?;
            let page: Vec<Story> =
                decode(&fetched.body).map_err(|kind| UpstreamError { call, kind })?;
            let returned = page.len();
            stories.extend(page);

            match fetched.pagination_total {
                Some(total) if returned > 0 && offset + returned < total => {
                    tracing::debug!(
                        offset = offset,
                        returned = returned,
                        total = total,
                        "Fetching next page of stories"
                    );
                    offset += returned;
                }
                _ => break,
            }
        }

        tracing::debug!(
            project_id = self.settings.project_id,
            count = stories.len(),
            "Fetched accepted stories"
        );
        Ok(stories)
    }

    pub async fn fetch_reviews(&self, story_id: StoryId) -> Result<Vec<Review>, UpstreamError> {
        let url = self.project_url(&["stories", &story_id.to_string(), "reviews"]);
        let reviews: Vec<Review> = self.fetch_list(Call::Reviews { story_id }, &url).await?;
        tracing::trace!(story_id = story_id, count = reviews.len(), "Fetched reviews");
        Ok(reviews)
    }

    /// Comments in creation order. The sort is stable, so comments sharing a
    /// timestamp (or lacking one) keep the order the API returned them in.
    pub async fn fetch_comments(&self, story_id: StoryId) -> Result<Vec<Comment>, UpstreamError> {
        let url = self.project_url(&["stories", &story_id.to_string(), "comments"]);
        let mut comments: Vec<Comment> =
            self.fetch_list(Call::Comments { story_id }, &url).await?;
        comments.sort_by_key(|comment| comment.created_at);
        tracing::trace!(story_id = story_id, count = comments.len(), "Fetched comments");
        Ok(comments)
    }

    /// `{base}/services/v5/projects/{project_id}/{tail...}`
    fn project_url(&self, tail: &[&str]) -> Url {
        let mut url = self.settings.base_url.clone();
        let project_id = self.settings.project_id.to_string();
        // cannot_be_a_base was ruled out in the constructor
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["services", "v5", "projects", project_id.as_str()])
                .extend(tail);
        }
        url
    }

    async fn fetch_list<T: DeserializeOwned>(
        &self,
        call: Call,
        url: &Url,
    ) -> Result<Vec<T>, UpstreamError> {
        let fetched = self
            .fetch_with_retry(url)
            .await
            .map_err(|kind| UpstreamError { call, kind })?;
        decode(&fetched.body).map_err(|kind| UpstreamError { call, kind })
    }

    /// Exponential backoff: 1s, 2s, 4s, ... up to `max_retries` retries.
    async fn fetch_with_retry(&self, url: &Url) -> Result<Fetched, FetchErrorKind> {
        let mut retry_count = 0;

        loop {
            match self.fetch_once(url).await {
                Ok(fetched) => return Ok(fetched),
                Err(e) if e.is_retryable() && retry_count < self.settings.max_retries => {
                    let delay = 1u64 << retry_count.min(6);
                    tracing::warn!(
                        path = %url.path(),
                        error = %e,
                        retry = retry_count + 1,
                        delay_secs = delay,
                        "Retrying Tracker request after transient error"
                    );
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &Url) -> Result<Fetched, FetchErrorKind> {
        let timeout = self.settings.request_timeout;
        tokio::time::timeout(timeout, self.send_and_read(url))
            .await
            .map_err(|_| FetchErrorKind::Timeout(timeout))?
    }

    async fn send_and_read(&self, url: &Url) -> Result<Fetched, FetchErrorKind> {
        let response = self
            .http
            .get(url.clone())
            .header(TOKEN_HEADER, self.token.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchErrorKind::HttpStatus(status.as_u16()));
        }

        let pagination_total = response
            .headers()
            .get(PAGINATION_TOTAL_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok());

        let body = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
        Ok(Fetched {
            body,
            pagination_total,
        })
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, FetchErrorKind> {
    serde_json::from_slice(body).map_err(FetchErrorKind::Decode)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchErrorKind> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchErrorKind::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchErrorKind::Network)?;
        append_limited(&mut bytes, &chunk, limit)?;
    }

    Ok(bytes)
}

/// Appends `chunk` unless that would take `bytes` past `limit`. Bodies sent
/// without Content-Length are only bounded here.
fn append_limited(bytes: &mut Vec<u8>, chunk: &[u8], limit: usize) -> Result<(), FetchErrorKind> {
    if bytes.len().saturating_add(chunk.len()) > limit {
        return Err(FetchErrorKind::ResponseTooLarge(limit));
    }
    bytes.extend_from_slice(chunk);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::types::ReviewStatus;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "test-token";

    fn test_settings(uri: &str) -> TrackerSettings {
        let mut settings = TrackerSettings::new(
            Url::parse(uri).unwrap(),
            99,
            SecretString::from(TOKEN.to_string()),
        );
        settings.max_retries = 0;
        settings.request_timeout = Duration::from_secs(5);
        settings
    }

    fn client_for(server: &MockServer) -> TrackerClient {
        TrackerClient::new(test_settings(&server.uri())).unwrap()
    }

    #[test]
    fn test_project_url_building() {
        let client = TrackerClient::new(test_settings("https://www.pivotaltracker.com")).unwrap();
        assert_eq!(
            client.project_url(&["stories", "12", "reviews"]).as_str(),
            "https://www.pivotaltracker.com/services/v5/projects/99/stories/12/reviews"
        );

        let client =
            TrackerClient::new(test_settings("https://tracker.example.com/proxy/")).unwrap();
        assert_eq!(
            client.project_url(&["stories"]).as_str(),
            "https://tracker.example.com/proxy/services/v5/projects/99/stories"
        );
    }

    #[test]
    fn test_invalid_token_rejected() {
        let mut settings = test_settings("https://www.pivotaltracker.com");
        settings.api_token = SecretString::from("bad\ntoken".to_string());
        assert!(matches!(
            TrackerClient::new(settings),
            Err(ClientError::InvalidToken)
        ));
    }

    #[test]
    fn test_cannot_be_a_base_url_rejected() {
        let settings = test_settings("mailto:someone@example.com");
        assert!(matches!(
            TrackerClient::new(settings),
            Err(ClientError::InvalidBaseUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_accepted_stories_sends_token_and_state() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/v5/projects/99/stories"))
            .and(query_param("with_state", "accepted"))
            .and(header("X-TrackerToken", TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"id": 1, "name": "First", "labels": [{"id": 5, "name": "web"}]},
                    {"id": 2, "name": "Second", "labels": []}]"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let stories = client_for(&mock_server)
            .fetch_accepted_stories()
            .await
            .unwrap();
        assert_eq!(stories.len(), 2);
        assert_eq!(stories[0].name, "First");
        assert_eq!(stories[0].labels[0].name.as_deref(), Some("web"));
    }

    #[tokio::test]
    async fn test_fetch_accepted_stories_follows_pagination() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/v5/projects/99/stories"))
            .and(query_param("offset", "0"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Tracker-Pagination-Total", "3")
                    .set_body_string(r#"[{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/v5/projects/99/stories"))
            .and(query_param("offset", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Tracker-Pagination-Total", "3")
                    .set_body_string(r#"[{"id": 3, "name": "c"}]"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut settings = test_settings(&mock_server.uri());
        settings.page_size = 2;
        let client = TrackerClient::new(settings).unwrap();

        let stories = client.fetch_accepted_stories().await.unwrap();
        let ids: Vec<_> = stories.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_accepted_after_is_sent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/v5/projects/99/stories"))
            .and(query_param("accepted_after", "2024-05-01T00:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut settings = test_settings(&mock_server.uri());
        settings.accepted_after = Some("2024-05-01T00:00:00Z".parse().unwrap());
        let client = TrackerClient::new(settings).unwrap();

        assert!(client.fetch_accepted_stories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_reviews_and_comments() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/v5/projects/99/stories/7/reviews"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"id": 1, "review_type_id": 3, "status": "pass", "story_id": 7}]"#,
            ))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/v5/projects/99/stories/7/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"id": 1, "text": "hello", "created_at": "2024-01-02T03:04:05Z"}, {"id": 2}]"#,
            ))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let reviews = client.fetch_reviews(7).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].status, ReviewStatus::Pass);

        let comments = client.fetch_comments(7).await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].text.as_deref(), Some("hello"));
        assert!(comments[1].text.is_none());
    }

    #[tokio::test]
    async fn test_404_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut settings = test_settings(&mock_server.uri());
        settings.max_retries = 3;
        let client = TrackerClient::new(settings).unwrap();

        let err = client.fetch_reviews(11).await.unwrap_err();
        assert_eq!(err.call, Call::Reviews { story_id: 11 });
        assert_eq!(err.story_id(), Some(11));
        match err.kind {
            FetchErrorKind::HttpStatus(404) => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_500_retries_then_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2) // Initial request + 1 retry
            .mount(&mock_server)
            .await;

        let mut settings = test_settings(&mock_server.uri());
        settings.max_retries = 1;
        let client = TrackerClient::new(settings).unwrap();

        let err = client.fetch_comments(4).await.unwrap_err();
        assert!(matches!(err.kind, FetchErrorKind::HttpStatus(500)));
        assert_eq!(err.call, Call::Comments { story_id: 4 });
    }

    #[tokio::test]
    async fn test_503_retry_then_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&mock_server)
            .await;

        let mut settings = test_settings(&mock_server.uri());
        settings.max_retries = 2;
        let client = TrackerClient::new(settings).unwrap();

        assert!(client.fetch_reviews(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_429_retry_then_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"review_type_id": 5, "status": "pass"}]"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut settings = test_settings(&mock_server.uri());
        settings.max_retries = 1;
        let client = TrackerClient::new(settings).unwrap();

        let reviews = client.fetch_reviews(3).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].status, ReviewStatus::Pass);
    }

    #[tokio::test]
    async fn test_429_without_retries_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = client_for(&mock_server).fetch_comments(3).await.unwrap_err();
        assert!(matches!(err.kind, FetchErrorKind::HttpStatus(429)));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected_and_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(vec![b' '; MAX_RESPONSE_SIZE + 1]),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut settings = test_settings(&mock_server.uri());
        settings.max_retries = 2;
        let client = TrackerClient::new(settings).unwrap();

        let err = client.fetch_accepted_stories().await.unwrap_err();
        match err.kind {
            FetchErrorKind::ResponseTooLarge(limit) => assert_eq!(limit, MAX_RESPONSE_SIZE),
            e => panic!("Expected ResponseTooLarge, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_read_limited_bytes_checks_content_length() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&mock_server)
            .await;

        let response = reqwest::get(mock_server.uri()).await.unwrap();
        assert_eq!(response.content_length(), Some(64));
        assert!(matches!(
            read_limited_bytes(response, 16).await,
            Err(FetchErrorKind::ResponseTooLarge(16))
        ));

        let response = reqwest::get(mock_server.uri()).await.unwrap();
        assert_eq!(read_limited_bytes(response, 64).await.unwrap().len(), 64);
    }

    #[test]
    fn test_append_limited_stops_streamed_body_at_limit() {
        let mut bytes = Vec::new();
        append_limited(&mut bytes, b"0123456789", 16).unwrap();
        append_limited(&mut bytes, b"abcdef", 16).unwrap();
        assert_eq!(bytes.len(), 16);

        let err = append_limited(&mut bytes, b"!", 16).unwrap_err();
        assert!(matches!(err, FetchErrorKind::ResponseTooLarge(16)));
        assert_eq!(bytes.len(), 16);
    }

    #[tokio::test]
    async fn test_comments_come_back_in_creation_order() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/v5/projects/99/stories/8/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[
                    {"id": 3, "text": "third", "created_at": "2024-01-03T00:00:00Z"},
                    {"id": 1, "text": "first", "created_at": "2024-01-01T00:00:00Z"},
                    {"id": 2, "text": "second", "created_at": "2024-01-02T00:00:00Z"},
                    {"id": 4, "text": "tied", "created_at": "2024-01-02T00:00:00Z"}
                ]"#,
            ))
            .mount(&mock_server)
            .await;

        let comments = client_for(&mock_server).fetch_comments(8).await.unwrap();
        let texts: Vec<_> = comments.iter().filter_map(|c| c.text.as_deref()).collect();
        assert_eq!(texts, vec!["first", "second", "tied", "third"]);
    }

    #[tokio::test]
    async fn test_malformed_json_is_decode_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = client_for(&mock_server)
            .fetch_accepted_stories()
            .await
            .unwrap_err();
        assert!(matches!(err.kind, FetchErrorKind::Decode(_)));
        assert_eq!(err.call, Call::Stories { project_id: 99 });
        assert_eq!(err.story_id(), None);
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("[]")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let mut settings = test_settings(&mock_server.uri());
        settings.request_timeout = Duration::from_millis(200);
        let client = TrackerClient::new(settings).unwrap();

        let err = client.fetch_reviews(1).await.unwrap_err();
        assert!(matches!(err.kind, FetchErrorKind::Timeout(_)));
    }

    #[test]
    fn test_error_message_names_story() {
        let err = UpstreamError {
            call: Call::Reviews { story_id: 1234 },
            kind: FetchErrorKind::HttpStatus(500),
        };
        let msg = err.to_string();
        assert!(msg.contains("story 1234"));
        assert!(msg.contains("reviews"));
        assert!(msg.contains("500"));
    }
}
