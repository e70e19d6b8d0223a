use once_cell::sync::Lazy;
use regex::Regex;

/// Marker substituted for anything that looks like a credential.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Provider-style secret keys (`sk-...`, including project-scoped forms).
static SECRET_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"sk-[A-Za-z0-9_-]{10,}").unwrap());

/// Long unbroken alphanumeric runs are treated as pasted credentials.
static TOKEN_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Za-z0-9]{24,}\b").unwrap());

/// Redact secret-looking tokens before text leaves the process boundary.
/// Email bodies routinely contain accidentally pasted API keys.
pub fn redact_secrets(text: &str) -> String {
    let pass = SECRET_KEY_RE.replace_all(text, REDACTION_MARKER);
    TOKEN_RUN_RE.replace_all(&pass, REDACTION_MARKER).to_string()
}
