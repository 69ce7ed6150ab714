//! The network primitive behind `ApiClient`.
//!
//! # Design
//! `Transport` is the I/O seam: the client owns retry, timeout and
//! classification, a transport only moves one `HttpRequest` over the wire and
//! reports either a response (any status) or a `TransportError`. Tests swap in
//! scripted transports; production uses `UreqTransport`.

use std::future::Future;
use std::time::Duration;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestBody};

pub trait Transport: Send + Sync {
    /// Execute one request. Non-2xx statuses are responses, not errors.
    fn send(&self, request: &HttpRequest) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// Blocking `ureq` agent driven from tokio's blocking pool.
///
/// A request's own `timeout` becomes ureq's per-request deadline; the agent's
/// `io_timeout` applies only to requests without one.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// `io_timeout` bounds each socket exchange so an abandoned call cannot pin
    /// a blocking thread forever.
    pub fn new(io_timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(io_timeout))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || execute(&agent, request))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?
    }
}

fn execute(agent: &ureq::Agent, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let HttpRequest {
        method,
        url,
        headers,
        body,
        timeout,
    } = request;

    let result = match method {
        HttpMethod::Get => configure(agent.get(&url), &headers, timeout).call(),
        HttpMethod::Delete => configure(agent.delete(&url), &headers, timeout).call(),
        HttpMethod::Post => send_body(configure(agent.post(&url), &headers, timeout), body),
        HttpMethod::Put => send_body(configure(agent.put(&url), &headers, timeout), body),
        HttpMethod::Patch => send_body(configure(agent.patch(&url), &headers, timeout), body),
    };

    let mut response = result.map_err(map_ureq_error)?;
    let status = response.status();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();

    // Once a status has arrived the exchange is no longer retryable. An error
    // status keeps its classification even if its body is unreadable.
    let body = match response.body_mut().read_to_vec() {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if !status.is_success() => {
            tracing::warn!(status = status.as_u16(), error = %e, "discarding unreadable error body");
            String::new()
        }
        Err(e) => return Err(map_ureq_error(e)),
    };

    Ok(HttpResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        body,
    })
}

fn configure<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
    timeout: Option<Duration>,
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    match timeout {
        Some(timeout) => builder.config().timeout_global(Some(timeout)).build(),
        None => builder,
    }
}

fn send_body(
    builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: Option<RequestBody>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(RequestBody::Json(json)) => builder.send(json.as_bytes()),
        Some(RequestBody::Multipart(form)) => {
            let (content_type, bytes) = form.encode();
            builder.header("content-type", content_type.as_str()).send(&bytes[..])
        }
        None => builder.send_empty(),
    }
}

fn map_ureq_error(error: ureq::Error) -> TransportError {
    match error {
        ureq::Error::Timeout(_) => TransportError::TimedOut,
        ureq::Error::Io(e) => TransportError::Io(e.to_string()),
        other => TransportError::Connect(other.to_string()),
    }
}
