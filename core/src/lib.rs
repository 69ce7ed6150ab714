//! Client-side communication layer for a REST backend.
//!
//! # Overview
//! `ApiClient` sends JSON requests through a pluggable `Transport`, applying
//! interceptors, bounded retries with exponential backoff, a per-call timeout
//! and a TTL cache for GET responses. Every failure comes back as one
//! `ErrorResponse` shape with a stable `ErrorCode`.
//!
//! Next to the client live the pieces that keep user data safe on its way in
//! and out: `sanitize` and `validator` for untrusted input, `redact` and
//! `logger` for anything that ends up in a log.
//!
//! # Design
//! - No globals. Token, cache and interceptors belong to a client instance.
//! - The client is async; `UreqTransport` runs blocking HTTP on tokio's
//!   blocking pool. Tests swap in scripted transports.
//! - DTOs are defined by callers through `serde`; the mock-server crate
//!   defines its own, and integration tests catch schema drift.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod interceptor;
pub mod logger;
pub mod logging;
pub mod redact;
pub mod sanitize;
pub mod token;
pub mod transport;
pub mod types;
pub mod validator;

pub use cache::{CacheStats, CacheStore};
pub use client::ApiClient;
pub use config::{ClientConfig, ConfigError};
pub use error::{ErrorCode, ErrorResponse, TransportError};
pub use http::{FilePart, HttpMethod, HttpRequest, HttpResponse, RequestConfig};
pub use interceptor::{ErrorObserver, ObserverError, RequestInterceptor, ResponseInterceptor};
pub use logger::{LogMode, SecureLogger};
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use transport::{Transport, UreqTransport};
pub use types::{GetOptions, RequestOptions};
pub use validator::InputValidator;
