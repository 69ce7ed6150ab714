//! The API client: one object per configured backend.
//!
//! # Design
//! `ApiClient` owns everything that used to be process-global: the auth
//! token, the response cache and the interceptor chains. The network itself
//! sits behind `Transport`, so the client is where policy lives:
//!
//! 1. resolve the endpoint against `base_url` and build default headers,
//! 2. run request interceptors in registration order,
//! 3. for cacheable GETs, answer from the cache when possible,
//! 4. send inside a per-call timeout, retrying transport failures with
//!    exponential backoff (never HTTP statuses),
//! 5. classify failures into `ErrorResponse`, let every observer see them, and
//!    return them,
//! 6. run response interceptors, parse, and fill the cache.
//!
//! State behind locks is only touched between awaits, never across one.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::cache::{CacheStats, CacheStore};
use crate::config::ClientConfig;
use crate::error::{ErrorCode, ErrorResponse, TransportError};
use crate::http::{FilePart, HttpMethod, HttpRequest, HttpResponse, MultipartForm, RequestBody, RequestConfig};
use crate::interceptor::{ErrorObserver, RequestInterceptor, ResponseInterceptor};
use crate::redact::redact_pii;
use crate::token::{TokenStore, TokenStoreError, AUTH_TOKEN_KEY};
use crate::transport::{Transport, UreqTransport};
use crate::types::{GetOptions, RequestOptions};

pub struct ApiClient<T: Transport = UreqTransport> {
    config: ClientConfig,
    transport: T,
    token_store: Arc<dyn TokenStore>,
    token: RwLock<Option<String>>,
    cache: Mutex<CacheStore<Value>>,
    request_interceptors: Vec<Box<dyn RequestInterceptor>>,
    response_interceptors: Vec<Box<dyn ResponseInterceptor>>,
    error_observers: Vec<Box<dyn ErrorObserver>>,
}

impl<T: Transport> std::fmt::Debug for ApiClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("has_token", &self.auth_token().is_some())
            .field("request_interceptors", &self.request_interceptors.len())
            .field("response_interceptors", &self.response_interceptors.len())
            .field("error_observers", &self.error_observers.len())
            .finish_non_exhaustive()
    }
}

impl ApiClient<UreqTransport> {
    /// Client over real HTTP.
    pub fn new(config: ClientConfig, token_store: Arc<dyn TokenStore>) -> Self {
        let transport = UreqTransport::new(config.timeout);
        Self::with_transport(config, transport, token_store)
    }
}

impl<T: Transport> ApiClient<T> {
    /// Build a client over any transport, loading a persisted token if one
    /// exists.
    pub fn with_transport(config: ClientConfig, transport: T, token_store: Arc<dyn TokenStore>) -> Self {
        let token = token_store.get(AUTH_TOKEN_KEY).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not load persisted auth token");
            None
        });
        let cache = CacheStore::new(config.cache_max_size);

        Self {
            config,
            transport,
            token_store,
            token: RwLock::new(token),
            cache: Mutex::new(cache),
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
            error_observers: Vec::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Auth token
    // ------------------------------------------------------------------

    /// The only writer of the auth token. `None` clears it.
    ///
    /// The in-memory token is updated even when persisting it fails.
    pub fn set_auth_token(&self, token: Option<&str>) -> Result<(), TokenStoreError> {
        *self.token.write().unwrap_or_else(|p| p.into_inner()) = token.map(str::to_string);
        match token {
            Some(token) => self.token_store.set(AUTH_TOKEN_KEY, token),
            None => self.token_store.remove(AUTH_TOKEN_KEY),
        }
    }

    pub fn auth_token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    // ------------------------------------------------------------------
    // Interceptors
    // ------------------------------------------------------------------

    pub fn add_request_interceptor(&mut self, interceptor: impl RequestInterceptor + 'static) {
        self.request_interceptors.push(Box::new(interceptor));
    }

    pub fn add_response_interceptor(&mut self, interceptor: impl ResponseInterceptor + 'static) {
        self.response_interceptors.push(Box::new(interceptor));
    }

    pub fn add_error_observer(&mut self, observer: impl ErrorObserver + 'static) {
        self.error_observers.push(Box::new(observer));
    }

    // ------------------------------------------------------------------
    // Cache
    // ------------------------------------------------------------------

    /// Drop cached responses whose URL contains `pattern`, or everything.
    pub fn invalidate_cache(&self, pattern: Option<&str>) {
        let mut cache = self.cache();
        match pattern {
            Some(pattern) => {
                let removed = cache.delete_matching(pattern);
                tracing::debug!(pattern = %redact_pii(pattern), removed, "cache invalidated");
            }
            None => cache.clear(),
        }
    }

    pub fn clear_expired_cache(&self) -> usize {
        self.cache().clear_expired()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache().stats()
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    pub async fn get<R: DeserializeOwned>(&self, endpoint: &str, options: GetOptions) -> Result<R, ErrorResponse> {
        let config = self.prepare(HttpMethod::Get, endpoint, None, &options.headers, options.timeout);
        let key = config.url.clone();

        if options.cache {
            let cached = self.cache().get(&key);
            if let Some(value) = cached {
                tracing::debug!(url = %redact_pii(&key), "cache hit");
                return self.decode(value);
            }
        }

        let value = self.dispatch(config).await?;
        if options.cache {
            let ttl = options.cache_ttl.unwrap_or(self.config.cache_ttl);
            self.cache().set(key, value.clone(), ttl);
        }
        self.decode(value)
    }

    pub async fn post<R, B>(&self, endpoint: &str, body: &B) -> Result<R, ErrorResponse>
    where
        R: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = self.encode_body(body)?;
        self.request(HttpMethod::Post, endpoint, RequestOptions::with_body(body)).await
    }

    pub async fn put<R, B>(&self, endpoint: &str, body: &B) -> Result<R, ErrorResponse>
    where
        R: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = self.encode_body(body)?;
        self.request(HttpMethod::Put, endpoint, RequestOptions::with_body(body)).await
    }

    pub async fn patch<R, B>(&self, endpoint: &str, body: &B) -> Result<R, ErrorResponse>
    where
        R: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = self.encode_body(body)?;
        self.request(HttpMethod::Patch, endpoint, RequestOptions::with_body(body)).await
    }

    pub async fn delete<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R, ErrorResponse> {
        self.request(HttpMethod::Delete, endpoint, RequestOptions::default()).await
    }

    /// Uncached request with an optional JSON body.
    pub async fn request<R: DeserializeOwned>(
        &self,
        method: HttpMethod,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<R, ErrorResponse> {
        let body = options.body.map(|v| RequestBody::Json(v.to_string()));
        let config = self.prepare(method, endpoint, body, &options.headers, options.timeout);
        let value = self.dispatch(config).await?;
        self.decode(value)
    }

    /// POST a `multipart/form-data` body with one file and extra text fields.
    ///
    /// No `Content-Type` is set here; the transport adds it with the boundary.
    pub async fn upload_file<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        file: FilePart,
        field_name: &str,
        extra_fields: &[(&str, &str)],
    ) -> Result<R, ErrorResponse> {
        let form = MultipartForm {
            file_field: field_name.to_string(),
            file,
            fields: extra_fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        let config = self.prepare(HttpMethod::Post, endpoint, Some(RequestBody::Multipart(form)), &[], None);
        let value = self.dispatch(config).await?;
        self.decode(value)
    }

    // ------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------

    fn encode_body<B: Serialize + ?Sized>(&self, body: &B) -> Result<Value, ErrorResponse> {
        serde_json::to_value(body).map_err(|e| {
            let mut error = ErrorResponse::new(ErrorCode::UnknownError, 0, "Failed to serialize request body");
            error.data = Some(Value::String(e.to_string()));
            self.fail(error)
        })
    }

    pub(crate) fn resolve_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") || self.config.base_url.is_empty() {
            return endpoint.to_string();
        }
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Build the config with default headers, then run request interceptors.
    fn prepare(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: Option<RequestBody>,
        headers: &[(String, String)],
        timeout: Option<Duration>,
    ) -> RequestConfig {
        let mut config = RequestConfig {
            method,
            url: self.resolve_url(endpoint),
            headers: Vec::new(),
            body,
            timeout,
        };
        if !matches!(config.body, Some(RequestBody::Multipart(_))) {
            config.set_header("Content-Type", "application/json");
        }
        if let Some(token) = self.auth_token() {
            config.set_header("Authorization", format!("Bearer {token}"));
        }
        for (name, value) in headers {
            config.set_header(name.clone(), value.clone());
        }

        self.request_interceptors
            .iter()
            .fold(config, |config, interceptor| interceptor.intercept(config))
    }

    /// Execute and parse the body as JSON. An empty body parses as `null`.
    async fn dispatch(&self, config: RequestConfig) -> Result<Value, ErrorResponse> {
        let response = self.execute(config).await?;
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&response.body).map_err(|e| {
            let mut error = ErrorResponse::new(ErrorCode::UnknownError, response.status, "Malformed response body");
            error.data = Some(Value::String(e.to_string()));
            self.fail(error)
        })
    }

    async fn execute(&self, config: RequestConfig) -> Result<HttpResponse, ErrorResponse> {
        let timeout = config.timeout.unwrap_or(self.config.timeout);
        let request = HttpRequest {
            timeout: Some(timeout),
            ..config.into_request()
        };

        let response = match tokio::time::timeout(timeout, self.send_with_retry(&request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(TransportError::TimedOut)) | Err(_) => return Err(self.fail(ErrorResponse::timeout())),
            Ok(Err(e)) => return Err(self.fail(ErrorResponse::network(&e))),
        };

        if !response.is_success() {
            let body = serde_json::from_str::<Value>(&response.body)
                .unwrap_or_else(|_| json!({ "error": response.status_text }));
            return Err(self.fail(ErrorResponse::from_status(response.status, body)));
        }

        Ok(self
            .response_interceptors
            .iter()
            .fold(response, |response, interceptor| interceptor.intercept(response)))
    }

    /// Bounded retry loop over the transport. HTTP statuses are never retried
    /// because they arrive as `Ok` responses.
    async fn send_with_retry(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut attempt: u32 = 0;
        loop {
            match self.transport.send(request).await {
                Ok(response) => return Ok(response),
                Err(TransportError::TimedOut) => return Err(TransportError::TimedOut),
                Err(e) if attempt < self.config.retry_attempts => {
                    let delay = backoff_delay(self.config.retry_delay, attempt);
                    tracing::debug!(
                        method = %request.method,
                        url = %redact_pii(&request.url),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transport failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Apply side effects of a classified error and notify observers.
    fn fail(&self, error: ErrorResponse) -> ErrorResponse {
        if error.is_unauthorized() {
            if let Err(e) = self.set_auth_token(None) {
                tracing::warn!(error = %e, "could not clear persisted auth token");
            }
        }
        tracing::debug!(code = %error.code, status = error.status, "request failed");

        for observer in &self.error_observers {
            match catch_unwind(AssertUnwindSafe(|| observer.observe(&error))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "error observer failed"),
                Err(_) => tracing::warn!("error observer panicked"),
            }
        }
        error
    }

    fn decode<R: DeserializeOwned>(&self, value: Value) -> Result<R, ErrorResponse> {
        serde_json::from_value(value).map_err(|e| {
            let mut error = ErrorResponse::new(
                ErrorCode::UnknownError,
                200,
                "Response did not match the expected shape",
            );
            error.data = Some(Value::String(e.to_string()));
            self.fail(error)
        })
    }

    fn cache(&self) -> MutexGuard<'_, CacheStore<Value>> {
        self.cache.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// `base * 2^attempt`, saturating.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}
