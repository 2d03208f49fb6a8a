//! Single entry point for every network call.
//!
//! All verbs funnel into one executor that resolves the URL, attaches the stored credential,
//! bounds the call with the configured timeout and turns anything that goes wrong into a
//! [`Failure`]. Exactly one attempt is made per call.

pub mod transport;

use crate::failure::Failure;
use crate::store::SessionStore;
use crate::types::{ListQuery, Paged};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use transport::{Method, Transport, TransportError, TransportRequest, TransportResponse};
use uuid::Uuid;

//--------------------------------------------------------------------------------------------------
// Configuration
//--------------------------------------------------------------------------------------------------

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Log request and response bodies.
    #[serde(default)]
    pub debug: bool,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            debug: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

//--------------------------------------------------------------------------------------------------
// Headers and bodies
//--------------------------------------------------------------------------------------------------

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const AUTHORIZATION_BEARER_PREFIX: &str = "Bearer ";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// What the API sends back alongside a non-2xx status: `{error?, message?}`. The first of the two
// that holds a non-empty string is surfaced.
const ERROR_BODY_FIELDS: [&str; 2] = ["error", "message"];

fn failure_message(status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|body| {
            ERROR_BODY_FIELDS.iter().find_map(|field| {
                body.get(*field)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| format!("HTTP {}", status))
}

fn body_for_log(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}

//--------------------------------------------------------------------------------------------------
// Gateway
//--------------------------------------------------------------------------------------------------

/// Cheap to clone; clones share the transport and the session store.
#[derive(Clone)]
pub struct RequestGateway {
    config: Arc<GatewayConfig>,
    transport: Arc<dyn Transport>,
    store: SessionStore,
}

impl std::fmt::Debug for RequestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGateway")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish()
    }
}

impl RequestGateway {
    pub fn new(config: GatewayConfig, transport: Arc<dyn Transport>, store: SessionStore) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            store,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Absolute `http(s)://` paths are used as-is.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    //----------------------------------------------------------------------------------------------
    // Verbs
    //----------------------------------------------------------------------------------------------

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Failure> {
        self.request::<T, ()>(Method::Get, path, None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, Failure>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        self.request(Method::Post, path, Some(body)).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, Failure>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        self.request(Method::Put, path, Some(body)).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, Failure>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        self.request(Method::Patch, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, Failure> {
        self.request::<T, ()>(Method::Delete, path, None).await
    }

    /// `GET path?page=..&limit=..[&search=..]` returning the paged envelope.
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &ListQuery,
    ) -> Result<Paged<T>, Failure> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let path = format!("{}{}{}", path, separator, query.to_query_string());
        self.get(&path).await
    }

    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, Failure>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let body = match body.map(serde_json::to_vec).transpose() {
            Ok(body) => body,
            Err(err) => {
                error!("Failed to serialise {} {} request body: {}", method, path, err);
                return Err(Failure::unexpected());
            }
        };

        let value = self.execute(method, path, body).await?;

        serde_json::from_value(value).map_err(|err| {
            warn!("Response from {} {} has an unexpected shape: {}", method, path, err);
            Failure::parse(format!("Unexpected response from server: {}", err))
        })
    }

    //----------------------------------------------------------------------------------------------
    // Executor
    //----------------------------------------------------------------------------------------------

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Value, Failure> {
        let url = self.resolve_url(path);
        let request_id = Uuid::new_v4().to_string();

        let mut headers = vec![
            (CONTENT_TYPE_HEADER.to_string(), JSON_CONTENT_TYPE.to_string()),
            (REQUEST_ID_HEADER.to_string(), request_id.clone()),
        ];
        if let Some(token) = self.store.get() {
            headers.push((
                AUTHORIZATION_HEADER.to_string(),
                format!("{}{}", AUTHORIZATION_BEARER_PREFIX, token),
            ));
        }

        if self.config.debug {
            info!(
                "[{}] {} {} body={}",
                request_id,
                method,
                url,
                body.as_deref().map(body_for_log).unwrap_or_default()
            );
        } else {
            debug!("[{}] {} {}", request_id, method, url);
        }

        let request = TransportRequest {
            method,
            url: url.clone(),
            headers,
            body,
        };

        // Dropping the in-flight future on timeout aborts the underlying call
        let started = Instant::now();
        let in_flight = self.transport.send(request);
        let response = match tokio::time::timeout(self.config.timeout(), in_flight).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(self.classify(&request_id, method, &url, err)),
            Err(_) => {
                warn!(
                    "[{}] {} {} timed out after {} ms",
                    request_id, method, url, self.config.timeout_ms
                );
                return Err(Failure::transport(format!(
                    "Request timed out after {} ms",
                    self.config.timeout_ms
                )));
            }
        };

        if self.config.debug {
            info!(
                "[{}] {} {} -> {} in {:?} body={}",
                request_id,
                method,
                url,
                response.status,
                started.elapsed(),
                body_for_log(&response.body)
            );
        } else {
            debug!(
                "[{}] {} {} -> {} in {:?}",
                request_id,
                method,
                url,
                response.status,
                started.elapsed()
            );
        }

        self.interpret(&request_id, response)
    }

    fn classify(
        &self,
        request_id: &str,
        method: Method,
        url: &str,
        err: TransportError,
    ) -> Failure {
        match err {
            TransportError::Connect(detail) => {
                warn!("[{}] {} {} could not connect: {}", request_id, method, url, detail);
                Failure::transport("Unable to reach the server")
            }
            TransportError::TimedOut => {
                warn!("[{}] {} {} timed out in transport", request_id, method, url);
                Failure::transport(format!(
                    "Request timed out after {} ms",
                    self.config.timeout_ms
                ))
            }
            TransportError::Other(detail) => {
                error!("[{}] {} {} failed: {}", request_id, method, url, detail);
                Failure::unexpected()
            }
        }
    }

    fn interpret(&self, request_id: &str, response: TransportResponse) -> Result<Value, Failure> {
        let status = response.status;

        if !response.is_success() {
            let message = failure_message(status, &response.body);
            warn!("[{}] Request failed with {}: {}", request_id, status, message);
            return Err(Failure::protocol(status, message));
        }

        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        let value: Value = serde_json::from_slice(&response.body).map_err(|err| {
            warn!("[{}] Response body is not JSON: {}", request_id, err);
            Failure::parse("Invalid response from server").with_status(status)
        })?;

        if value.get("success") == Some(&Value::Bool(false)) {
            let message = value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or("Request failed")
                .to_string();
            warn!("[{}] Request reported failure: {}", request_id, message);
            return Err(Failure::protocol(status, message));
        }

        Ok(value)
    }
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::failure::{FailureKind, UNEXPECTED_ERROR_MESSAGE};
    use crate::store::memory::{MemoryCookies, MemorySlot};
    use crate::types::ApiResponse;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    pub(crate) struct CannedTransport {
        responses: Mutex<Vec<Result<TransportResponse, TransportError>>>,
        pub(crate) seen: Mutex<Vec<TransportRequest>>,
    }

    impl CannedTransport {
        pub(crate) fn replying(status: u16, body: Value) -> Arc<Self> {
            Self::replying_raw(status, body.to_string().into_bytes())
        }

        pub(crate) fn replying_raw(status: u16, body: Vec<u8>) -> Arc<Self> {
            Self::failing_with(Ok(TransportResponse { status, body }))
        }

        pub(crate) fn failing_with(result: Result<TransportResponse, TransportError>) -> Arc<Self> {
            let transport = Self::default();
            transport.responses.lock().push(result);
            Arc::new(transport)
        }

        pub(crate) fn last_request(&self) -> TransportRequest {
            self.seen.lock().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.seen.lock().push(request);
            let mut responses = self.responses.lock();
            if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses[0].clone()
            }
        }
    }

    struct NeverTransport;

    #[async_trait]
    impl Transport for NeverTransport {
        async fn send(&self, _: TransportRequest) -> Result<TransportResponse, TransportError> {
            std::future::pending().await
        }
    }

    pub(crate) fn store() -> SessionStore {
        SessionStore::new(Arc::new(MemorySlot::default()), Arc::new(MemoryCookies::default()))
    }

    fn gateway(transport: Arc<dyn Transport>) -> RequestGateway {
        RequestGateway::new(GatewayConfig::new("http://api.test/v1/"), transport, store())
    }

    #[tokio::test]
    async fn not_found_surfaces_server_message() {
        let transport = CannedTransport::replying(404, json!({ "message": "not found" }));
        let failure = gateway(transport).get::<Value>("/institutions/9").await.unwrap_err();

        assert_eq!(failure.message(), "not found");
        assert_eq!(failure.kind(), FailureKind::ProtocolError);
        assert_eq!(failure.status(), Some(404));
    }

    #[tokio::test]
    async fn error_field_wins_over_message() {
        let transport =
            CannedTransport::replying(400, json!({ "error": "bad input", "message": "ignored" }));
        let failure = gateway(transport).get::<Value>("/x").await.unwrap_err();
        assert_eq!(failure.message(), "bad input");
    }

    #[tokio::test]
    async fn unparseable_error_body_falls_back_to_status() {
        let transport = CannedTransport::replying_raw(502, b"<html>Bad Gateway</html>".to_vec());
        let failure = gateway(transport).get::<Value>("/x").await.unwrap_err();
        assert_eq!(failure.message(), "HTTP 502");
        assert_eq!(failure.status(), Some(502));
    }

    #[tokio::test]
    async fn structured_error_field_falls_through_to_message() {
        let transport = CannedTransport::replying(
            422,
            json!({ "error": { "code": "E_VALIDATION" }, "message": "Name is required" }),
        );
        let failure = gateway(transport).get::<Value>("/x").await.unwrap_err();
        assert_eq!(failure.message(), "Name is required");
        assert_eq!(failure.status(), Some(422));
    }

    #[tokio::test]
    async fn empty_error_string_falls_through_to_message() {
        let transport = CannedTransport::replying(400, json!({ "error": "", "message": "Bad" }));
        let failure = gateway(transport).get::<Value>("/x").await.unwrap_err();
        assert_eq!(failure.message(), "Bad");
    }

    #[test]
    fn oversized_timeout_saturates() {
        let config = GatewayConfig::new("http://a").with_timeout(Duration::MAX);
        assert_eq!(config.timeout_ms, u64::MAX);
    }

    #[tokio::test]
    async fn never_resolving_transport_times_out_at_the_bound() {
        let gateway = RequestGateway::new(
            GatewayConfig::new("http://api.test").with_timeout(Duration::from_millis(50)),
            Arc::new(NeverTransport),
            store(),
        );

        let started = Instant::now();
        let failure = gateway.get::<Value>("/slow").await.unwrap_err();
        let elapsed = started.elapsed();

        assert_eq!(failure.kind(), FailureKind::Transport);
        assert_eq!(failure.message(), "Request timed out after 50 ms");
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn default_timeout_is_ten_seconds() {
        assert_eq!(GatewayConfig::new("http://a").timeout(), Duration::from_secs(10));
        let config: GatewayConfig =
            serde_json::from_value(json!({ "base_url": "http://a" })).unwrap();
        assert_eq!(config.timeout_ms, 10_000);
        assert!(!config.debug);
    }

    #[tokio::test]
    async fn attaches_bearer_token_when_present() {
        let transport = CannedTransport::replying(200, json!({ "success": true }));
        let gateway = gateway(transport.clone());
        gateway.store().set("a.b.c");

        gateway.get::<Value>("features").await.unwrap();

        let request = transport.last_request();
        assert_eq!(request.url, "http://api.test/v1/features");
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.header("authorization"), Some("Bearer a.b.c"));
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert!(request.header(REQUEST_ID_HEADER).is_some());
    }

    #[tokio::test]
    async fn omits_authorization_without_token() {
        let transport = CannedTransport::replying(200, json!({ "success": true }));
        gateway(transport.clone()).get::<Value>("/features").await.unwrap();

        let request = transport.last_request();
        assert!(request.header(AUTHORIZATION_HEADER).is_none());
        assert_eq!(request.header(CONTENT_TYPE_HEADER), Some(JSON_CONTENT_TYPE));
    }

    #[tokio::test]
    async fn absolute_urls_bypass_base() {
        let transport = CannedTransport::replying(200, json!({ "success": true }));
        gateway(transport.clone())
            .get::<Value>("https://identity.test/auth/me")
            .await
            .unwrap();
        assert_eq!(transport.last_request().url, "https://identity.test/auth/me");
    }

    #[tokio::test]
    async fn post_sends_json_body_and_parses_envelope() {
        let transport = CannedTransport::replying(
            201,
            json!({ "success": true, "message": "created", "data": { "id": "r1" } }),
        );
        let response: ApiResponse<Value> = gateway(transport.clone())
            .post("/roles", &json!({ "name": "auditor" }))
            .await
            .unwrap();

        assert_eq!(response.data, Some(json!({ "id": "r1" })));
        let request = transport.last_request();
        assert_eq!(request.method, Method::Post);
        assert_eq!(
            serde_json::from_slice::<Value>(request.body.as_deref().unwrap()).unwrap(),
            json!({ "name": "auditor" })
        );
    }

    #[tokio::test]
    async fn success_false_is_a_protocol_error() {
        let transport =
            CannedTransport::replying(200, json!({ "success": false, "message": "Email taken" }));
        let failure = gateway(transport).post::<Value, _>("/x", &json!({})).await.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::ProtocolError);
        assert_eq!(failure.message(), "Email taken");
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_parse_error() {
        let transport = CannedTransport::replying_raw(200, b"{\"success\": tru".to_vec());
        let failure = gateway(transport).get::<Value>("/x").await.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::ParseError);
    }

    #[tokio::test]
    async fn wrong_shape_is_a_parse_error() {
        let transport = CannedTransport::replying(200, json!({ "success": true, "data": 5 }));
        let failure = gateway(transport)
            .get::<ApiResponse<Vec<String>>>("/x")
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::ParseError);
    }

    #[tokio::test]
    async fn empty_body_reads_as_null() {
        let transport = CannedTransport::replying_raw(204, Vec::new());
        let unit: () = gateway(transport.clone()).delete("/roles/r1").await.unwrap();
        assert_eq!(unit, ());
        assert_eq!(transport.last_request().method, Method::Delete);
        assert!(transport.last_request().body.is_none());
    }

    #[tokio::test]
    async fn connect_failure_is_transport() {
        let transport = CannedTransport::failing_with(Err(TransportError::Connect(
            "connection refused".to_string(),
        )));
        let failure = gateway(transport).get::<Value>("/x").await.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Transport);
        assert_eq!(failure.message(), "Unable to reach the server");
    }

    #[tokio::test]
    async fn anything_else_is_unexpected() {
        let transport =
            CannedTransport::failing_with(Err(TransportError::Other("tls exploded".to_string())));
        let failure = gateway(transport).get::<Value>("/x").await.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Unknown);
        assert_eq!(failure.message(), UNEXPECTED_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn unserialisable_body_is_unexpected() {
        use std::collections::HashMap;
        // JSON object keys must be strings
        let mut body = HashMap::new();
        body.insert((1, 2), "x");
        let transport = CannedTransport::replying(200, json!({ "success": true }));
        let failure = gateway(transport.clone())
            .post::<Value, _>("/x", &body)
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Unknown);
        assert!(transport.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn page_query_is_appended() {
        let transport = CannedTransport::replying(
            200,
            json!({
                "data": [{ "id": "s1" }],
                "meta": { "page": 2, "limit": 1, "total": 3, "totalPages": 3 }
            }),
        );
        let page: Paged<Value> = gateway(transport.clone())
            .get_page("/students", &ListQuery::page(2, 1).with_search("ann"))
            .await
            .unwrap();

        assert_eq!(page.meta.page, 2);
        assert_eq!(
            transport.last_request().url,
            "http://api.test/v1/students?page=2&limit=1&search=ann"
        );
    }

    #[tokio::test]
    async fn exactly_one_attempt_per_call() {
        let transport = CannedTransport::replying(503, json!({ "message": "busy" }));
        let _ = gateway(transport.clone()).get::<Value>("/x").await;
        assert_eq!(transport.seen.lock().len(), 1);
    }
}
