//! Credential redaction.
//!
//! Error text from the client library can echo request headers or URLs
//! that carry the API key. Everything that leaves the lifecycle layer as
//! a log line or a user-facing message goes through `redact`.

use lazy_static::lazy_static;
use regex::Regex;

/// Replacement for redacted material.
pub const REDACTED: &str = "[REDACTED]";

/// Shortest secret that is replaced verbatim. Shorter values would
/// mangle unrelated text.
const MIN_SECRET_LEN: usize = 4;

lazy_static! {
    /// Credential-bearing fragments, secret in group 2.
    static ref CREDENTIAL_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)(authorization:\s*bearer\s+)(\S+)").unwrap(),
        Regex::new(r"(?i)(bearer\s+)([A-Za-z0-9._~+/=-]{8,})").unwrap(),
        Regex::new(r#"(?i)(api[_-]?key["']?\s*[:=]\s*["']?)([^\s"'&,]+)"#).unwrap(),
        Regex::new(r"(?i)(x-openai-api-key:\s*)(\S+)").unwrap(),
    ];
}

/// Remove credentials from a message: the known secret verbatim, plus
/// anything that looks like a key in a header or query string.
pub fn redact(message: &str, secret: Option<&str>) -> String {
    let mut redacted = message.to_string();

    if let Some(secret) = secret.map(str::trim) {
        if secret.len() >= MIN_SECRET_LEN {
            redacted = redacted.replace(secret, REDACTED);
        }
    }

    for pattern in CREDENTIAL_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, format!("${{1}}{}", REDACTED).as_str())
            .to_string();
    }

    redacted
}

/// Short fingerprint of a secret for log lines: `****abcd`.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
