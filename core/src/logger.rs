//! Redacting log façade.
//!
//! # Design
//! Every call redacts its message with `redact_pii` and its data with
//! `redact_object` before anything else sees it, so neither `tracing` nor a
//! `LogSink` ever receives raw PII. In development mode records are emitted as
//! `tracing` events. In production mode they go to the sink and debug records
//! are dropped. Security records always reach the sink, in both modes.

use std::error::Error;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::redact::{redact_object, redact_pii};

pub const ENV_APP_ENV: &str = "APP_ENV";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Security,
}

/// What a sink receives. Already redacted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// External destination for production logs.
pub trait LogSink: Send + Sync {
    fn write(&self, record: &LogRecord);
}

/// Writes each record as one JSON line on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrJsonSink;

impl LogSink for StderrJsonSink {
    fn write(&self, record: &LogRecord) {
        match serde_json::to_string(record) {
            Ok(line) => eprintln!("{line}"),
            Err(e) => tracing::error!(error = %e, "failed to encode log record"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMode {
    #[default]
    Development,
    Production,
}

impl LogMode {
    /// `APP_ENV=production` (or `prod`) selects production; anything else is
    /// development.
    pub fn from_env() -> Self {
        match std::env::var(ENV_APP_ENV) {
            Ok(v) if matches!(v.to_lowercase().as_str(), "production" | "prod") => LogMode::Production,
            _ => LogMode::Development,
        }
    }
}

#[derive(Clone)]
pub struct SecureLogger {
    mode: LogMode,
    sink: Arc<dyn LogSink>,
}

impl std::fmt::Debug for SecureLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureLogger").field("mode", &self.mode).finish_non_exhaustive()
    }
}

impl Default for SecureLogger {
    fn default() -> Self {
        Self::new(LogMode::from_env(), Arc::new(StderrJsonSink))
    }
}

impl SecureLogger {
    pub fn new(mode: LogMode, sink: Arc<dyn LogSink>) -> Self {
        Self { mode, sink }
    }

    pub fn mode(&self) -> LogMode {
        self.mode
    }

    pub fn debug(&self, message: &str, data: Option<&Value>) {
        self.log(Level::Debug, message, data.map(redact_object));
    }

    pub fn info(&self, message: &str, data: Option<&Value>) {
        self.log(Level::Info, message, data.map(redact_object));
    }

    pub fn warn(&self, message: &str, data: Option<&Value>) {
        self.log(Level::Warn, message, data.map(redact_object));
    }

    pub fn error(&self, message: &str, data: Option<&Value>) {
        self.log(Level::Error, message, data.map(redact_object));
    }

    /// Log an error value, decomposed into `{ name, message, stack }`.
    ///
    /// `stack` is the redacted chain of `source()` messages.
    pub fn error_with<E: Error>(&self, message: &str, error: &E, data: Option<&Value>) {
        let mut stack = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            stack.push(Value::String(redact_pii(&cause.to_string())));
            source = cause.source();
        }

        let mut payload = json!({
            "error": {
                "name": short_type_name::<E>(),
                "message": redact_pii(&error.to_string()),
                "stack": stack,
            }
        });
        if let Some(data) = data {
            payload["data"] = redact_object(data);
        }
        self.log(Level::Error, message, Some(payload));
    }

    /// Security-relevant events. Always forwarded to the sink.
    pub fn security(&self, message: &str, data: Option<&Value>) {
        let record = LogRecord {
            level: Level::Security,
            message: redact_pii(message),
            data: data.map(redact_object),
        };
        if self.mode == LogMode::Development {
            emit(&record);
        }
        self.sink.write(&record);
    }

    /// `data` must already be redacted.
    fn log(&self, level: Level, message: &str, data: Option<Value>) {
        let record = LogRecord {
            level,
            message: redact_pii(message),
            data,
        };
        match self.mode {
            LogMode::Development => emit(&record),
            LogMode::Production if level == Level::Debug => {}
            LogMode::Production => self.sink.write(&record),
        }
    }
}

fn emit(record: &LogRecord) {
    let data = record.data.as_ref().map(Value::to_string).unwrap_or_default();
    match record.level {
        Level::Debug => tracing::debug!(data = %data, "{}", record.message),
        Level::Info => tracing::info!(data = %data, "{}", record.message),
        Level::Warn => tracing::warn!(data = %data, "{}", record.message),
        Level::Error => tracing::error!(data = %data, "{}", record.message),
        Level::Security => tracing::warn!(security = true, data = %data, "{}", record.message),
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
