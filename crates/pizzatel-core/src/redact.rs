//! Secret redaction for structured log payloads.
//!
//! Any object key that looks like a credential has its value replaced with
//! [`MASK`], at any depth. Arrays are walked; scalars are left alone.

use serde_json::Value;

/// Replacement for redacted values.
pub const MASK: &str = "******";

const SENSITIVE_FRAGMENTS: [&str; 6] = [
    "password",
    "secret",
    "token",
    "authorization",
    "api_key",
    "apikey",
];

/// Whether a key names a secret (case-insensitive).
pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower == "jwt" || SENSITIVE_FRAGMENTS.iter().any(|f| lower.contains(f))
}

/// Return a redacted copy of `value`.
pub fn redacted(value: &Value) -> Value {
    let mut out = value.clone();
    redact_in_place(&mut out);
    out
}

/// Redact `value` in place.
pub fn redact_in_place(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                if is_sensitive_key(k) {
                    *v = Value::String(MASK.into());
                } else {
                    redact_in_place(v);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_in_place),
        _ => {}
    }
}
