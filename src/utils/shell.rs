use once_cell::sync::Lazy;
use regex::Regex;

static SAFE_BAREWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_./-]+$").expect("bareword regex"));

/// Quotes a value so the shell sees it as one literal word. Values
/// matching the bareword pattern pass through unquoted; everything else
/// is wrapped in single quotes with embedded quotes escaped as `'\''`.
/// Never rejects input, only neutralizes it.
pub fn escape_arg(value: &str) -> String {
    if SAFE_BAREWORD.is_match(value) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Upper-cased, underscore-normalized environment key for a parameter
/// name, e.g. `api-token` becomes `API_TOKEN`.
pub fn env_key(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
