//! Browser descriptor: user-agent source seam and version-string parsing.
//!
//! The descriptor source is deliberately opaque — a Rust client has no
//! `navigator` to read, so callers supply whatever user-agent string their
//! embedding knows about (config, an embedded webview, a test fixture).

use crate::error::TelemetryError;

/// Provides the raw user-agent string for report enrichment.
///
/// Failure here is the designated capability error: it propagates to the
/// immediate caller (`Reporter` enrichment) and no further.
pub trait UserAgentSource: Send + Sync {
    fn user_agent(&self) -> Result<String, TelemetryError>;
}

/// A fixed user-agent string, typically from config.
pub struct StaticUserAgent(pub String);

impl UserAgentSource for StaticUserAgent {
    fn user_agent(&self) -> Result<String, TelemetryError> {
        Ok(self.0.clone())
    }
}

/// A source with no descriptor at all; every read is a capability failure.
/// Useful for headless deployments and for exercising the error path.
pub struct NoUserAgent;

impl UserAgentSource for NoUserAgent {
    fn user_agent(&self) -> Result<String, TelemetryError> {
        Err(TelemetryError::Capability("browser"))
    }
}

/// Read the source and reduce its user-agent string to `"<Browser> v<ver>"`.
pub fn get_browser(source: &dyn UserAgentSource) -> Result<String, TelemetryError> {
    let ua = source
        .user_agent()
        .map_err(|_| TelemetryError::Capability("browser"))?;
    Ok(browser_version(&ua))
}

/// Signature match order matters: Edge and Chrome UAs both contain
/// `Safari/`, and Edge UAs contain `Chrome/`, so the more specific
/// signatures are checked first. The version is the raw remainder of the
/// UA string after the signature; only Chrome truncates at the next space
/// (its UA continues with `Safari/...` after the version).
pub fn browser_version(user_agent: &str) -> String {
    if let Some(rest) = split_after(user_agent, "Firefox/") {
        format!("Firefox v{rest}")
    } else if let Some(rest) = split_after(user_agent, "Edg/") {
        format!("Edge v{rest}")
    } else if let Some(rest) = split_after(user_agent, "Chrome/") {
        let version = rest.split(' ').next().unwrap_or(rest);
        format!("Chrome v{version}")
    } else if let Some(rest) = split_after(user_agent, "Safari/") {
        format!("Safari v{rest}")
    } else {
        "unknown".to_string()
    }
}

fn split_after<'a>(haystack: &'a str, signature: &str) -> Option<&'a str> {
    haystack
        .find(signature)
        .map(|at| &haystack[at + signature.len()..])
}

/// Current wall-clock time as epoch milliseconds, the report timestamp unit.
pub fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
