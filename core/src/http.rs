//! HTTP transport types shared by the client and its transports.
//!
//! # Design
//! Requests and responses are plain data. `ApiClient` builds a
//! `RequestConfig`, lets request interceptors rewrite it, then freezes it into
//! an `HttpRequest` that a `Transport` executes. Everything uses owned types so
//! a request can be moved onto a blocking thread or retried by cloning.

use std::fmt;
use std::time::Duration;

use uuid::Uuid;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single file attached to a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FilePart {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// A `multipart/form-data` body: one file field plus plain text fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    pub file_field: String,
    pub file: FilePart,
    pub fields: Vec<(String, String)>,
}

impl MultipartForm {
    /// Encode the form with a fresh random boundary.
    ///
    /// Returns the `Content-Type` header value (carrying the boundary) and the
    /// encoded body.
    pub fn encode(&self) -> (String, Vec<u8>) {
        let boundary = format!("----api-core-{}", Uuid::new_v4().simple());
        let mut body = Vec::with_capacity(self.file.bytes.len() + 256);

        for (name, value) in &self.fields {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", quote(name)).as_bytes(),
            );
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                quote(&self.file_field),
                quote(&self.file.filename)
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", self.file.content_type).as_bytes());
        body.extend_from_slice(&self.file.bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        (format!("multipart/form-data; boundary={boundary}"), body)
    }
}

/// Escape characters that would terminate a quoted disposition parameter.
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace(['\r', '\n'], " ")
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized JSON text.
    Json(String),
    /// Multipart form; the transport picks the boundary and content type.
    Multipart(MultipartForm),
}

/// Mutable request description handed through the request-interceptor chain.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfig {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// Overrides the client-wide timeout for this call.
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Insert or replace a header, matching names case-insensitively.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(slot) => *slot = (name, value),
            None => self.headers.push((name, value)),
        }
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Freeze the config into the request the transport will execute.
    pub fn into_request(self) -> HttpRequest {
        HttpRequest {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
            timeout: self.timeout,
        }
    }
}

/// An HTTP request described as plain data, ready for a `Transport`.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// Deadline for this exchange. `None` leaves the transport's default.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Canonical reason phrase, e.g. `"Not Found"`.
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RequestConfig {
        RequestConfig {
            method: HttpMethod::Get,
            url: "http://localhost/lessons".to_string(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: None,
            timeout: None,
        }
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut cfg = config();
        cfg.set_header("content-type", "text/plain");
        assert_eq!(cfg.headers.len(), 1);
        assert_eq!(cfg.header("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn remove_header_drops_all_casings() {
        let mut cfg = config();
        cfg.headers.push(("content-type".to_string(), "x".to_string()));
        cfg.remove_header("Content-Type");
        assert!(cfg.headers.is_empty());
    }

    #[test]
    fn success_range_is_2xx() {
        let mut resp = HttpResponse {
            status: 204,
            status_text: "No Content".to_string(),
            headers: Vec::new(),
            body: String::new(),
        };
        assert!(resp.is_success());
        resp.status = 302;
        assert!(!resp.is_success());
    }

    #[test]
    fn multipart_encoding_contains_fields_and_file() {
        let form = MultipartForm {
            file_field: "avatar".to_string(),
            file: FilePart::new("me.png", "image/png", b"PNGDATA".to_vec()),
            fields: vec![("lesson_id".to_string(), "42".to_string())],
        };
        let (content_type, body) = form.encode();
        let boundary = content_type.strip_prefix("multipart/form-data; boundary=").unwrap();
        let text = String::from_utf8(body).unwrap();

        assert!(text.starts_with(&format!("--{boundary}\r\n")));
        assert!(text.contains("name=\"lesson_id\"\r\n\r\n42\r\n"));
        assert!(text.contains("name=\"avatar\"; filename=\"me.png\""));
        assert!(text.contains("Content-Type: image/png\r\n\r\nPNGDATA"));
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn multipart_boundary_is_fresh_per_encode() {
        let form = MultipartForm {
            file_field: "f".to_string(),
            file: FilePart::new("a.txt", "text/plain", Vec::new()),
            fields: Vec::new(),
        };
        assert_ne!(form.encode().0, form.encode().0);
    }
}
