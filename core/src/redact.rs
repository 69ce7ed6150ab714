//! PII redaction for anything headed to a log.
//!
//! Two passes: structural (`redact_object` replaces whole values under
//! sensitive keys) and textual (`redact_pii` rewrites PII found inside free
//! text). Both are pure and never fail.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub const REDACTED: &str = "[REDACTED]";
pub const MAX_DEPTH_SENTINEL: &str = "[MAX_DEPTH_EXCEEDED]";

/// Nesting beyond this depth is replaced by `MAX_DEPTH_SENTINEL`.
pub const MAX_DEPTH: usize = 10;

/// Lower-case substrings that mark a field name as sensitive.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "apikey",
    "api_key",
    "authorization",
    "ssn",
    "creditcard",
    "credit_card",
    "cardnumber",
    "card_number",
    "cvv",
    "privatekey",
    "private_key",
];

// Applied in order. Card and SSN run before phone so their digit groups are
// not half-consumed by the looser phone pattern.
static PII_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}", "[EMAIL_REDACTED]"),
        (r"\b\d{4}[ -]?\d{4}[ -]?\d{4}[ -]?\d{4}\b", "[CARD_REDACTED]"),
        (r"\b\d{3}-\d{2}-\d{4}\b", "[SSN_REDACTED]"),
        (
            r"(?:\+\d{1,3}[-.\s]?)?(?:\(\d{3}\)|\b\d{3})[-.\s]?\d{3}[-.\s]?\d{4}\b",
            "[PHONE_REDACTED]",
        ),
        (r"\b(\d{1,3})\.\d{1,3}\.\d{1,3}\.\d{1,3}\b", "${1}.xxx.xxx.xxx"),
        (
            r#"(?i)\b(password|passwd|pwd)(["']?\s*[:=]\s*["']?)[^\s"',;&]+"#,
            "${1}${2}[REDACTED]",
        ),
        (
            r#"(?i)\b([a-z_]*token)(["']?\s*[:=]\s*["']?)[^\s"',;&]+"#,
            "${1}${2}[REDACTED]",
        ),
        (r"(?i)\b(bearer)\s+[A-Za-z0-9._~+/=\-]+", "${1} [REDACTED]"),
        (
            r#"(?i)\b(api[_-]?key)(["']?\s*[:=]\s*["']?)[^\s"',;&]+"#,
            "${1}${2}[REDACTED]",
        ),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), replacement))
    .collect()
});

/// Replace PII found in free text with fixed placeholders.
pub fn redact_pii(text: &str) -> String {
    let mut out = text.to_string();
    for (pattern, replacement) in PII_PATTERNS.iter() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out
}

pub fn is_sensitive_field(name: &str) -> bool {
    let lower = name.to_lowercase();
    SENSITIVE_FIELDS.iter().any(|field| lower.contains(field))
}

/// Redact a JSON tree for logging.
pub fn redact_object(value: &Value) -> Value {
    redact_at_depth(value, 0)
}

fn redact_at_depth(value: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::String(MAX_DEPTH_SENTINEL.to_string());
    }
    match value {
        Value::String(s) => Value::String(redact_pii(s)),
        Value::Array(items) => Value::Array(items.iter().map(|v| redact_at_depth(v, depth + 1)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let redacted = if is_sensitive_field(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact_at_depth(v, depth + 1)
                    };
                    (key.clone(), redacted)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn email_is_redacted() {
        let out = redact_pii("Contact me at user@example.com");
        assert!(out.contains("[EMAIL_REDACTED]"));
        assert!(!out.contains("user@example.com"));
    }

    #[test]
    fn numbers_get_their_own_placeholders() {
        assert_eq!(redact_pii("card 4111 1111 1111 1111"), "card [CARD_REDACTED]");
        assert_eq!(redact_pii("card 4111-1111-1111-1111."), "card [CARD_REDACTED].");
        assert_eq!(redact_pii("ssn 123-45-6789"), "ssn [SSN_REDACTED]");
        assert_eq!(redact_pii("call 555-123-4567"), "call [PHONE_REDACTED]");
        assert_eq!(redact_pii("call (555) 123-4567"), "call [PHONE_REDACTED]");
        assert_eq!(redact_pii("call +44 555 123 4567"), "call [PHONE_REDACTED]");
    }

    #[test]
    fn ip_keeps_first_octet() {
        assert_eq!(redact_pii("from 192.168.10.42"), "from 192.xxx.xxx.xxx");
    }

    #[test]
    fn key_value_secrets_keep_their_key() {
        assert_eq!(redact_pii("password=hunter2 next"), "password=[REDACTED] next");
        assert_eq!(redact_pii(r#"{"token": "abc.def"}"#), r#"{"token": "[REDACTED]"}"#);
        assert_eq!(redact_pii("Authorization: Bearer eyJabc"), "Authorization: Bearer [REDACTED]");
        assert_eq!(redact_pii("apiKey=sk_live_1"), "apiKey=[REDACTED]");
        assert_eq!(redact_pii("api-key: k1&x=2"), "api-key: [REDACTED]&x=2");
    }

    #[test]
    fn plain_text_passes_through() {
        let text = "Lesson 12 starts at 10:30 in room 4";
        assert_eq!(redact_pii(text), text);
    }

    #[test]
    fn nested_sensitive_field_is_replaced() {
        let out = redact_object(&json!({"user": {"creds": {"password": "x"}}}));
        assert_eq!(out["user"]["creds"]["password"], REDACTED);
    }

    #[test]
    fn sensitive_match_is_case_insensitive_substring() {
        let out = redact_object(&json!({
            "apiKey": "k",
            "refreshToken": "t",
            "user_SSN": "123",
            "cardNumber": 4111111111111111u64,
            "name": "Ada"
        }));
        assert_eq!(out["apiKey"], REDACTED);
        assert_eq!(out["refreshToken"], REDACTED);
        assert_eq!(out["user_SSN"], REDACTED);
        assert_eq!(out["cardNumber"], REDACTED);
        assert_eq!(out["name"], "Ada");
    }

    #[test]
    fn string_leaves_are_scrubbed_and_primitives_kept() {
        let out = redact_object(&json!({
            "note": "mail ada@example.com",
            "items": ["555-123-4567", 3, true, null]
        }));
        assert_eq!(out["note"], "mail [EMAIL_REDACTED]");
        assert_eq!(out["items"], json!(["[PHONE_REDACTED]", 3, true, null]));
    }

    #[test]
    fn null_passes_through() {
        assert_eq!(redact_object(&Value::Null), Value::Null);
    }

    #[test]
    fn depth_limit_returns_sentinel() {
        let mut deep = json!("leaf");
        for _ in 0..15 {
            deep = json!({ "next": deep });
        }
        let out = redact_object(&deep);

        let mut cursor = &out;
        for _ in 0..MAX_DEPTH {
            cursor = &cursor["next"];
        }
        assert_eq!(cursor["next"], MAX_DEPTH_SENTINEL);
    }

    #[test]
    fn shallow_tree_is_not_truncated() {
        let mut deep = json!("leaf");
        for _ in 0..MAX_DEPTH {
            deep = json!({ "next": deep });
        }
        let out = redact_object(&deep);
        assert!(!out.to_string().contains(MAX_DEPTH_SENTINEL));
    }
}
