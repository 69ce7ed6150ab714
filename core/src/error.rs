//! Error types for the API client.
//!
//! # Design
//! Every failure that leaves `ApiClient` is an `ErrorResponse`: a message, an
//! HTTP-like status, a fixed `ErrorCode` and the parsed error body if there was
//! one. Transports report connectivity problems as `TransportError`; the
//! client retries those and classifies whatever is left. Callers never see a
//! raw transport error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Canonical error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    Unauthorized,
    Forbidden,
    NotFound,
    ServerError,
    Timeout,
    NetworkError,
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ServerError => "SERVER_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Map an HTTP status to its code and default user-facing message.
    pub fn from_status(status: u16) -> (ErrorCode, &'static str) {
        match status {
            400 => (ErrorCode::ValidationError, "Invalid request data"),
            401 => (ErrorCode::Unauthorized, "Authentication required"),
            403 => (ErrorCode::Forbidden, "You do not have permission to perform this action"),
            404 => (ErrorCode::NotFound, "The requested resource was not found"),
            500..=599 => (ErrorCode::ServerError, "Server error, please try again later"),
            _ => (ErrorCode::UnknownError, "An unexpected error occurred"),
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single error shape returned by every `ApiClient` operation.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{code} ({status}): {message}")]
pub struct ErrorResponse {
    pub message: String,
    /// HTTP status, `408` for client-side timeouts, `0` for network failures.
    pub status: u16,
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status,
            code,
            data: None,
        }
    }

    /// Classify a non-2xx response body.
    ///
    /// A string `message` field in the body replaces the default message; the
    /// whole body is kept as `data`.
    pub fn from_status(status: u16, body: Value) -> Self {
        let (code, default_message) = ErrorCode::from_status(status);
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| default_message.to_string());
        Self {
            message,
            status,
            code,
            data: Some(body),
        }
    }

    pub fn timeout() -> Self {
        Self::new(ErrorCode::Timeout, 408, "Request timed out")
    }

    pub fn network(source: &TransportError) -> Self {
        let mut error = Self::new(
            ErrorCode::NetworkError,
            0,
            "Network error, please check your connection",
        );
        error.data = Some(Value::String(source.to_string()));
        error
    }

    pub fn is_unauthorized(&self) -> bool {
        self.code == ErrorCode::Unauthorized
    }
}

/// A connectivity failure raised by a `Transport` before any HTTP status was
/// received. These are the only failures the client retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    /// The transport's own I/O deadline expired.
    #[error("transport timed out")]
    TimedOut,

    #[error("i/o error: {0}")]
    Io(String),
}
