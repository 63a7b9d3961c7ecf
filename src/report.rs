//! Wire types for error reports and the action trail.
//!
//! All field names are `camelCase` on the wire so the backend and any `jq`
//! poking at the cache file see the same shape the browser client produced.

use serde::{Deserialize, Serialize};

// ─── Action trail ─────────────────────────────────────────────────────────────

/// The DOM element an action targeted, reduced to what the backend needs to
/// reconstruct "what did the user click".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActionTarget {
    pub local_name: String,
    pub id: String,
    pub class_name: String,
}

impl ActionTarget {
    pub fn new(
        local_name: impl Into<String>,
        id: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Self {
        Self {
            local_name: local_name.into(),
            id: id.into(),
            class_name: class_name.into(),
        }
    }
}

/// One captured user interaction: `{target, type}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub target: ActionTarget,
    /// DOM event type, e.g. `"click"`.
    #[serde(rename = "type")]
    pub event_type: String,
}

// ─── Reports ──────────────────────────────────────────────────────────────────

/// A runtime error before enrichment: message, name, stack, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawError {
    pub message: String,
    pub name: String,
    #[serde(default)]
    pub stack: String,
}

impl RawError {
    pub fn new(
        message: impl Into<String>,
        name: impl Into<String>,
        stack: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            name: name.into(),
            stack: stack.into(),
        }
    }
}

/// The enriched payload shipped to the logging endpoint.
///
/// Immutable once constructed; one report corresponds to one delivery
/// attempt (plus any replays of the same cached value). The `timestamp`
/// field doubles as the wire discriminator between an already-enriched
/// report and a raw error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub message: String,
    pub name: String,
    pub stack: String,
    pub actions: Vec<ActionRecord>,
    pub browser_version: String,
    /// Epoch milliseconds at enrichment time.
    pub timestamp: i64,
}

/// Input to [`crate::reporter::Reporter::send`]: either a fresh runtime
/// error that still needs enrichment, or a pre-built report (typically one
/// replayed from the persistent queue).
///
/// Untagged on the wire: a JSON object with a `timestamp` field decodes as
/// `Enriched`, anything else as `Raw` — the same discrimination the cache
/// format has always used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorInput {
    Enriched(ErrorReport),
    Raw(RawError),
}

impl From<RawError> for ErrorInput {
    fn from(raw: RawError) -> Self {
        Self::Raw(raw)
    }
}

impl From<ErrorReport> for ErrorInput {
    fn from(report: ErrorReport) -> Self {
        Self::Enriched(report)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
