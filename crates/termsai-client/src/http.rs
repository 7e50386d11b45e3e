use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, TRANSFER_ENCODING};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use termsai_core::config::ClientConfig;
use termsai_core::error::{Result, TermsError};
use termsai_core::text::NO_GRAPH_DATA;
use termsai_core::types::{
    AddConceptRequest, FeedbackRequest, FilterRequest, FilterVerdict, GenerateRequest,
    GraphEnvelope, GraphId, GraphPayload, SearchRequest,
};

use crate::backend::{is_event_stream, GraphBackend, ResponseBody};

/// HTTP client for the graph service.
pub struct HttpBackend {
    config: ClientConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TermsError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Backend for `base_url` with otherwise default settings.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::new(ClientConfig::default().with_base_url(base_url))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Streaming endpoints get a cache-busting query parameter.
    fn stream_url(&self, path: &str) -> String {
        format!(
            "{}?t={}",
            self.config.endpoint(path),
            chrono::Utc::now().timestamp_millis()
        )
    }

    /// Every request carries the session cookie and bypasses caches.
    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(CACHE_CONTROL, "no-cache")
            .header(COOKIE, format!("user_id={}", self.config.user_id))
    }

    fn post(&self, url: String) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    fn get(&self, url: String) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    fn map_status_error(status: StatusCode, body: String) -> TermsError {
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => TermsError::ServerReported(parsed.error),
            Err(_) => TermsError::Network(format!("HTTP {}: {}", status, body)),
        }
    }

    async fn send(request: RequestBuilder, endpoint: &'static str) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            warn!(endpoint, error = %e, "Request failed");
            TermsError::Network(e.to_string())
        })?;

        let status = response.status();
        info!(endpoint, %status, "Response received");
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read response body".into());
            warn!(endpoint, %status, body = %body, "Service error");
            return Err(Self::map_status_error(status, body));
        }
        Ok(response)
    }

    /// Decide between incremental and buffered consumption of `response`.
    async fn into_body(response: Response) -> Result<ResponseBody> {
        let headers = response.headers();
        let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        let chunked = headers
            .get(TRANSFER_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false);
        let has_length = headers.contains_key(CONTENT_LENGTH);

        if is_event_stream(content_type, chunked, has_length) {
            debug!("Reading response as event stream");
            let bytes = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| TermsError::Network(e.to_string())));
            return Ok(ResponseBody::Stream(Box::pin(bytes)));
        }

        debug!(?content_type, "Reading response as buffered body");
        let text = response
            .text()
            .await
            .map_err(|e| TermsError::Network(e.to_string()))?;
        Ok(ResponseBody::Buffered(text))
    }

    async fn fetch_graph(&self, request: RequestBuilder, endpoint: &'static str) -> Result<GraphPayload> {
        let response = Self::send(request, endpoint).await?;
        let envelope = response
            .json::<GraphEnvelope>()
            .await
            .map_err(|e| TermsError::InvalidResponse(e.to_string()))?;
        if let Some(error) = envelope.error {
            return Err(TermsError::ServerReported(error));
        }
        envelope
            .data
            .ok_or_else(|| TermsError::InvalidResponse(NO_GRAPH_DATA.into()))
    }
}

#[async_trait]
impl GraphBackend for HttpBackend {
    async fn check_filter(&self, topic: &str) -> Result<bool> {
        let request = self
            .post(self.config.endpoint("/check_filter"))
            .json(&FilterRequest {
                topic: topic.to_string(),
            });
        let response = Self::send(request, "check_filter").await?;
        let verdict = response
            .json::<FilterVerdict>()
            .await
            .map_err(|e| TermsError::InvalidResponse(e.to_string()))?;
        Ok(verdict.filtered)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<ResponseBody> {
        info!(topic = %request.topic, count = request.count, "Requesting generation");
        let response = Self::send(
            self.post(self.stream_url("/generate_stream")).json(request),
            "generate_stream",
        )
        .await?;
        Self::into_body(response).await
    }

    async fn feedback(&self, request: &FeedbackRequest) -> Result<ResponseBody> {
        info!(
            topic = %request.topic,
            is_like = request.is_like,
            augmented = request.augment.is_some(),
            "Sending feedback"
        );
        let response = Self::send(
            self.post(self.stream_url("/feedback")).json(request),
            "feedback",
        )
        .await?;
        Self::into_body(response).await
    }

    async fn add_concept(&self, request: &AddConceptRequest) -> Result<ResponseBody> {
        info!(new_concept = %request.new_concept, "Requesting concept addition");
        let response = Self::send(
            self.post(self.stream_url("/add_concept")).json(request),
            "add_concept",
        )
        .await?;
        Self::into_body(response).await
    }

    async fn search_graph(&self, request: &SearchRequest) -> Result<ResponseBody> {
        info!(graph_id = %request.graph_id, "Searching graph");
        let response = Self::send(
            self.post(self.stream_url("/search_graph")).json(request),
            "search_graph",
        )
        .await?;
        Self::into_body(response).await
    }

    async fn default_graph(&self) -> Result<GraphPayload> {
        let request = self.get(self.config.endpoint("/default_graph"));
        self.fetch_graph(request, "default_graph").await
    }

    async fn get_graph(&self, graph_id: &GraphId) -> Result<GraphPayload> {
        let request = self
            .get(self.config.endpoint("/get_graph"))
            .query(&[("graph_id", graph_id.to_string())]);
        self.fetch_graph(request, "get_graph").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_status_error_prefers_error_body() {
        let err = HttpBackend::map_status_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"主题不能为空"}"#.into(),
        );
        assert!(matches!(err, TermsError::ServerReported(m) if m == "主题不能为空"));
    }

    #[test]
    fn map_status_error_falls_back_to_network() {
        let err = HttpBackend::map_status_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "<html>oops</html>".into(),
        );
        match err {
            TermsError::Network(m) => {
                assert!(m.contains("500"));
                assert!(m.contains("oops"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn with_base_url_trims_trailing_slash() {
        let backend = HttpBackend::with_base_url("http://localhost:8080/").unwrap();
        assert_eq!(backend.config().base_url, "http://localhost:8080");
    }

    #[test]
    fn stream_url_carries_cache_buster() {
        let backend = HttpBackend::with_base_url("http://localhost:8080").unwrap();
        let url = backend.stream_url("/generate_stream");
        assert!(url.starts_with("http://localhost:8080/generate_stream?t="));
        assert!(url["http://localhost:8080/generate_stream?t=".len()..]
            .parse::<i64>()
            .is_ok());
    }

    #[test]
    fn graph_requests_carry_cookie_and_no_cache() {
        let config = ClientConfig::new()
            .with_base_url("http://localhost:8080")
            .with_user_id("u-42");
        let backend = HttpBackend::new(config).unwrap();
        let request = backend
            .get(backend.config().endpoint("/get_graph"))
            .query(&[("graph_id", "7")])
            .build()
            .unwrap();
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.url().as_str(), "http://localhost:8080/get_graph?graph_id=7");
        assert_eq!(request.headers()[COOKIE], "user_id=u-42");
        assert_eq!(request.headers()[CACHE_CONTROL], "no-cache");

        let request = backend.post(backend.stream_url("/feedback")).build().unwrap();
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.headers()[COOKIE], "user_id=u-42");
    }
}
