//! Pipeline hooks.
//!
//! Two capabilities: transforms (`RequestInterceptor`, `ResponseInterceptor`)
//! take a value and hand back a value, and observers (`ErrorObserver`) only see
//! a borrowed error. An observer has no way to replace or swallow the error;
//! its own failure is reported back so the client can log it and carry on.
//!
//! Plain closures implement every trait.

use crate::error::ErrorResponse;
use crate::http::{HttpResponse, RequestConfig};

/// Rewrites a request before it is sent.
pub trait RequestInterceptor: Send + Sync {
    fn intercept(&self, config: RequestConfig) -> RequestConfig;
}

/// Rewrites a successful response before its body is parsed.
pub trait ResponseInterceptor: Send + Sync {
    fn intercept(&self, response: HttpResponse) -> HttpResponse;
}

/// Error returned by an observer. Logged and discarded.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Sees every classified error before it reaches the caller.
pub trait ErrorObserver: Send + Sync {
    fn observe(&self, error: &ErrorResponse) -> Result<(), ObserverError>;
}

impl<F> RequestInterceptor for F
where
    F: Fn(RequestConfig) -> RequestConfig + Send + Sync,
{
    fn intercept(&self, config: RequestConfig) -> RequestConfig {
        self(config)
    }
}

impl<F> ResponseInterceptor for F
where
    F: Fn(HttpResponse) -> HttpResponse + Send + Sync,
{
    fn intercept(&self, response: HttpResponse) -> HttpResponse {
        self(response)
    }
}

impl<F> ErrorObserver for F
where
    F: Fn(&ErrorResponse) -> Result<(), ObserverError> + Send + Sync,
{
    fn observe(&self, error: &ErrorResponse) -> Result<(), ObserverError> {
        self(error)
    }
}
