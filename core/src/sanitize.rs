//! Input sanitization for trust boundaries.
//!
//! Everything here is best-effort defense in depth. The regex checks are
//! heuristics: they do not replace parameterized queries, a Content Security
//! Policy, or a real HTML sanitizer. Functions never fail; inputs that cannot
//! be made safe come back as `None`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use url::Url;

/// Maximum filename length, in characters.
pub const MAX_FILENAME_LEN: usize = 255;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Whole dangerous elements, content included. Used when markup is allowed.
static DANGEROUS_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|iframe|object|embed)\b.*?(</\s*(script|iframe|object|embed)\s*>|$)").unwrap()
});

/// Fragments that can execute script even outside a tag.
static SCRIPT_FRAGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)java\s*script\s*:|vb\s*script\s*:|\bon[a-z]+\s*=|\beval\s*\(|expression\s*\(").unwrap()
});

static XSS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)<script",
        r"(?i)java\s*script\s*:",
        r"(?i)vb\s*script\s*:",
        r"(?i)\bon[a-z]+\s*=",
        r"(?i)<iframe",
        r"(?i)<object",
        r"(?i)<embed",
        r"(?i)\beval\s*\(",
        r"(?i)expression\s*\(",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static SQL_INJECTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // OR 1=1, AND 'a'='a'
        r#"(?i)\b(or|and)\b\s+['"]?\w+['"]?\s*=\s*['"]?\w+"#,
        r"(?i)\bunion\b(\s+all)?\s+select\b",
        r"(?i);\s*(drop|delete|insert|update|select|alter|create|truncate)\b",
        r"--|/\*|\*/",
        // ' OR '1'='1
        r"(?i)'\s*or\s*'[^']*'\s*=\s*'",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static SQL_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(or|and|union|select|insert|update|delete|drop)\b").unwrap());

static PATH_ILLEGAL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"|?*\x00-\x1f]"#).unwrap());
static REPEATED_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[/\\]+").unwrap());
static FILENAME_ILLEGAL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[/\\<>:"|?*\x00-\x1f]"#).unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}$").unwrap());
static PHONE_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d+\-() ]").unwrap());

/// Options for `sanitize_input`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeOptions {
    /// Keep benign markup instead of stripping and escaping it.
    pub allow_html: bool,
    /// Truncate to this many characters.
    pub max_length: Option<usize>,
    pub trim: bool,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            allow_html: false,
            max_length: None,
            trim: true,
        }
    }
}

/// Replace HTML-significant characters with entities.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}

/// Remove anything that looks like a tag, keeping the text between tags.
pub fn strip_html(text: &str) -> String {
    TAG.replace_all(text, "").into_owned()
}

/// Remove script-capable fragments until none remain.
///
/// Loops so that nesting such as `javajavascript:script:` cannot reassemble
/// a match after one pass.
fn strip_script_fragments(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = SCRIPT_FRAGMENT.replace_all(&current, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Normalize free-text input.
///
/// Trims, drops NUL bytes, neutralizes markup and truncates. With
/// `allow_html = false` the result never trips `contains_xss`.
pub fn sanitize_input(text: &str, options: &SanitizeOptions) -> String {
    let mut out = if options.trim { text.trim() } else { text }.replace('\0', "");

    if options.allow_html {
        out = DANGEROUS_ELEMENT.replace_all(&out, "").into_owned();
        out = strip_script_fragments(&out);
    } else {
        out = strip_html(&out);
        out = strip_script_fragments(&out);
        out = escape_html(&out);
    }

    if let Some(max) = options.max_length {
        out = truncate_chars(&out, max);
    }
    out
}

/// Strip quotes, comment markers, statement separators and DML keywords.
///
/// A secondary control only. Queries must still be parameterized.
pub fn sanitize_sql(text: &str) -> String {
    let without_markers = text
        .replace("--", "")
        .replace("/*", "")
        .replace("*/", "")
        .replace(['\'', '"', ';', '\\'], "");
    let without_keywords = SQL_KEYWORD.replace_all(&without_markers, "");
    WHITESPACE.replace_all(without_keywords.trim(), " ").into_owned()
}

/// Accept only `http` and `https` URLs, returning the normalized form.
pub fn sanitize_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        _ => None,
    }
}

/// Make a relative path safe to join under a trusted root.
pub fn sanitize_file_path(path: &str) -> String {
    let mut out = PATH_ILLEGAL.replace_all(path, "").into_owned();
    while out.contains("..") {
        out = out.replace("..", "");
    }
    let out = REPEATED_SEPARATOR.replace_all(&out, "/");
    out.trim_start_matches('/').to_string()
}

/// Make a single path segment safe to use as a filename.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = FILENAME_ILLEGAL.replace_all(name, "");
    let underscored = WHITESPACE.replace_all(&cleaned, "_");
    truncate_chars(&underscored, MAX_FILENAME_LEN)
}

/// Trim and lower-case an email address, or `None` if it is malformed.
pub fn sanitize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_lowercase();
    EMAIL.is_match(&normalized).then_some(normalized)
}

/// Keep only digits and common phone punctuation.
pub fn sanitize_phone(phone: &str) -> String {
    PHONE_NOISE.replace_all(phone, "").trim().to_string()
}

/// Apply `sanitize_input` to every string in a JSON tree.
pub fn sanitize_object(value: &Value, options: &SanitizeOptions) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_input(s, options)),
        Value::Array(items) => Value::Array(items.iter().map(|v| sanitize_object(v, options)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize_object(v, options)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Parse JSON text and sanitize it, or `None` if it does not parse.
pub fn sanitize_json(raw: &str, options: &SanitizeOptions) -> Option<Value> {
    let parsed: Value = serde_json::from_str(raw).ok()?;
    Some(sanitize_object(&parsed, options))
}

pub fn contains_xss(text: &str) -> bool {
    XSS_PATTERNS.iter().any(|p| p.is_match(text))
}

pub fn contains_sql_injection(text: &str) -> bool {
    SQL_INJECTION_PATTERNS.iter().any(|p| p.is_match(text))
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Regression corpus of known XSS payloads and bypass attempts.
    const XSS_CORPUS: &[&str] = &[
        "<script>alert('xss')</script>",
        "<SCRIPT SRC=http://evil.example/x.js></SCRIPT>",
        "<img src=x onerror=alert(1)>",
        "<body onload=alert('xss')>",
        "<svg/onload=alert(1)>",
        "javascript:alert(document.cookie)",
        "JaVaScRiPt:alert(1)",
        "java\tscript:alert(1)",
        "javajavascript:script:alert(1)",
        "<iframe src=\"javascript:alert(1)\"></iframe>",
        "<object data=\"evil.swf\"></object>",
        "<embed src=\"evil.swf\">",
        "<<script>script>alert(1)<</script>/script>",
        "eval(atob('YWxlcnQoMSk='))",
        "<div style=\"width: expression(alert(1))\">",
        "<a href=\"vbscript:msgbox(1)\">x</a>",
        "\" onmouseover=\"alert(1)",
    ];

    const SQL_CORPUS: &[&str] = &[
        "' OR '1'='1",
        "' OR 1=1 --",
        "admin'--",
        "1; DROP TABLE users",
        "1 UNION SELECT password FROM users",
        "1 union all select null, null",
        "x' AND 1=1",
        "1 OR 1=1",
        "name'; DELETE FROM lessons WHERE '1'='1",
        "1 /* comment */ OR 1",
    ];

    #[test]
    fn xss_corpus_is_detected() {
        for payload in XSS_CORPUS {
            assert!(contains_xss(payload), "not detected: {payload}");
        }
    }

    #[test]
    fn sanitized_xss_corpus_is_clean() {
        let options = SanitizeOptions::default();
        for payload in XSS_CORPUS {
            let cleaned = sanitize_input(payload, &options);
            assert!(!contains_xss(&cleaned), "{payload:?} -> {cleaned:?}");
        }
    }

    #[test]
    fn sql_corpus_is_detected() {
        for payload in SQL_CORPUS {
            assert!(contains_sql_injection(payload), "not detected: {payload}");
        }
    }

    #[test]
    fn benign_text_is_not_flagged() {
        for text in ["Book a piano lesson for Monday", "Tom and Jerry", "Data = 5", "London"] {
            assert!(!contains_xss(text), "{text}");
            assert!(!contains_sql_injection(text), "{text}");
        }
    }

    #[test]
    fn escape_html_covers_all_significant_characters() {
        assert_eq!(
            escape_html(r#"<a href="/x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;&#x2F;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27;&lt;&#x2F;a&gt;"
        );
    }

    #[test]
    fn strip_html_keeps_text() {
        assert_eq!(strip_html("<p>Hello <b>world</b></p>"), "Hello world");
    }

    #[test]
    fn sanitize_input_trims_drops_nul_and_truncates() {
        let options = SanitizeOptions {
            max_length: Some(5),
            ..SanitizeOptions::default()
        };
        assert_eq!(sanitize_input("  he\0llo world  ", &options), "hello");
    }

    #[test]
    fn sanitize_input_without_trim_keeps_whitespace() {
        let options = SanitizeOptions {
            trim: false,
            ..SanitizeOptions::default()
        };
        assert_eq!(sanitize_input("  hi  ", &options), "  hi  ");
    }

    #[test]
    fn sanitize_input_truncates_on_char_boundaries() {
        let options = SanitizeOptions {
            max_length: Some(3),
            ..SanitizeOptions::default()
        };
        assert_eq!(sanitize_input("ñañaña", &options), "ñañ");
    }

    #[test]
    fn allow_html_keeps_markup_but_drops_scripts() {
        let options = SanitizeOptions {
            allow_html: true,
            ..SanitizeOptions::default()
        };
        let cleaned = sanitize_input(
            "<p onclick=\"go()\">Hi</p><script>alert(1)</script><b>there</b>",
            &options,
        );
        assert_eq!(cleaned, "<p \"go()\">Hi</p><b>there</b>");
        assert!(!contains_xss(&cleaned));
    }

    #[test]
    fn sanitize_sql_strips_markers_and_keywords() {
        assert_eq!(sanitize_sql("1'; DROP TABLE users --"), "1 TABLE users");
        assert_eq!(sanitize_sql("/* x */ name"), "x name");
    }

    #[test]
    fn sanitize_url_filters_schemes() {
        assert_eq!(sanitize_url("javascript:alert(1)"), None);
        assert_eq!(sanitize_url("data:text/html,<script>"), None);
        assert_eq!(sanitize_url("ftp://files.example.com/a"), None);
        assert_eq!(sanitize_url("not a url"), None);
        assert_eq!(sanitize_url("https://a.b/c").as_deref(), Some("https://a.b/c"));
        assert_eq!(sanitize_url(" HTTP://Example.COM ").as_deref(), Some("http://example.com/"));
    }

    #[test]
    fn sanitize_file_path_defeats_traversal() {
        assert_eq!(sanitize_file_path("../../etc/passwd"), "etc/passwd");
        assert_eq!(sanitize_file_path("....//....//etc"), "etc");
        assert_eq!(sanitize_file_path(".../...//x"), "././x");
        assert_eq!(sanitize_file_path("a\\\\b//c"), "a/b/c");
        assert_eq!(sanitize_file_path("/abs/<bad>|name?.txt"), "abs/badname.txt");
    }

    #[test]
    fn sanitize_filename_strips_separators_and_illegal_chars() {
        let name = sanitize_filename("test<script>.txt");
        assert!(!name.contains(['<', '>', '/']));
        assert_eq!(name, "testscript.txt");
        assert_eq!(sanitize_filename("my lesson\tnotes.pdf"), "my_lesson_notes.pdf");
        assert_eq!(sanitize_filename("../../x"), "....x");
        assert_eq!(sanitize_filename(&"a".repeat(300)).chars().count(), MAX_FILENAME_LEN);
    }

    #[test]
    fn sanitize_email_normalizes_or_rejects() {
        assert_eq!(sanitize_email("  Student@Example.COM ").as_deref(), Some("student@example.com"));
        assert_eq!(sanitize_email("no-at-sign.example.com"), None);
        assert_eq!(sanitize_email("a@b"), None);
        assert_eq!(sanitize_email("a b@example.com"), None);
    }

    #[test]
    fn sanitize_phone_keeps_digits_and_punctuation() {
        assert_eq!(sanitize_phone(" +1 (555) 123-4567 ext<script>"), "+1 (555) 123-4567");
    }

    #[test]
    fn sanitize_object_walks_nested_values() {
        let input = json!({
            "title": "  <b>Guitar</b> ",
            "tags": ["<i>x</i>", 3, null],
            "meta": {"note": "javascript:alert(1)", "count": 2}
        });
        let cleaned = sanitize_object(&input, &SanitizeOptions::default());
        assert_eq!(
            cleaned,
            json!({
                "title": "Guitar",
                "tags": ["x", 3, null],
                "meta": {"note": "alert(1)", "count": 2}
            })
        );
    }

    #[test]
    fn sanitize_json_returns_none_on_parse_failure() {
        assert_eq!(sanitize_json("{not json", &SanitizeOptions::default()), None);
        assert_eq!(
            sanitize_json(r#"{"a":"<b>x</b>"}"#, &SanitizeOptions::default()),
            Some(json!({"a": "x"}))
        );
    }
}
