use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashSet};

pub const REDACTED: &str = "[REDACTED]";
pub const ENV_PLACEHOLDER: &str = "[PROVIDED]";

static SENSITIVE_HEADER_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "authorization",
        "proxy-authorization",
        "x-api-key",
        "x-auth-token",
        "x-access-token",
    ]
    .into_iter()
    .collect()
});

pub fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADER_KEYS.contains(name.to_ascii_lowercase().as_str())
}

/// Copy of a header map with credential-bearing values masked, for
/// request snapshots that end up in the execution log.
pub fn redact_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| {
            if is_sensitive_header(k) {
                (k.clone(), REDACTED.to_string())
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}
