// SPDX-License-Identifier: MIT
//! Delivery orchestration: authenticate, send, cache on failure, replay on
//! recovery.
//!
//! `init` and `send` are the terminal catch points of the pipeline. Neither
//! returns `Err`; failures are logged and folded into [`InitOutcome`] /
//! [`SendOutcome`] so callers (and tests) can observe delivery without the
//! pipeline ever throwing into application code.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backoff::{self, BackoffPolicy};
use crate::browser::{epoch_millis, get_browser, UserAgentSource};
use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::report::{ErrorInput, ErrorReport, RawError};
use crate::transport::{AuthRequest, AuthResponse, LogsResponse, Transport};
use crate::TelemetryContext;

// ─── Outcomes ─────────────────────────────────────────────────────────────────

/// What `init` observed. The queue is replayed either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Handshake succeeded; a fresh token is held for this session.
    Authenticated,
    /// Handshake failed; any previously held token (or none) stays in use.
    AuthFailed,
}

/// What happened to one report handed to `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The backend accepted it.
    Delivered,
    /// Delivery failed; the report sits in the persistent queue for the
    /// next replay.
    Cached,
    /// The report could not be built (capability failure) or could not be
    /// cached (storage failure). It is gone; details are in the logs.
    Dropped,
}

// ─── Reporter ─────────────────────────────────────────────────────────────────

pub struct Reporter {
    config: TelemetryConfig,
    ctx: TelemetryContext,
    transport: Arc<dyn Transport>,
    user_agent: Arc<dyn UserAgentSource>,
    policy: BackoffPolicy,
}

impl Reporter {
    pub fn new(
        config: TelemetryConfig,
        ctx: TelemetryContext,
        transport: Arc<dyn Transport>,
        user_agent: Arc<dyn UserAgentSource>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            config,
            ctx,
            transport,
            user_agent,
            policy,
        }
    }

    /// Session init: auth handshake, then queue replay.
    ///
    /// Replay runs regardless of the handshake outcome — a session that
    /// failed to authenticate still re-attempts the backlog with whatever
    /// bearer value it holds (possibly `"null"`), and anything that fails
    /// again simply re-caches.
    pub async fn init(&self, app_id: &str) -> InitOutcome {
        let outcome = match self.authenticate(app_id).await {
            Ok(()) => {
                info!(app_id, "authenticated");
                InitOutcome::Authenticated
            }
            Err(e) => {
                warn!(app_id, err = %e, "auth handshake failed");
                InitOutcome::AuthFailed
            }
        };
        self.replay_queue().await;
        outcome
    }

    /// Ship one error. Raw input is enriched first (browser descriptor,
    /// timestamp, full drain of the trace buffer); pre-built reports are
    /// sent as-is — replay must not re-drain or re-stamp.
    pub async fn send(&self, input: impl Into<ErrorInput>) -> SendOutcome {
        let report = match input.into() {
            ErrorInput::Enriched(report) => report,
            ErrorInput::Raw(raw) => match self.enrich(raw) {
                Ok(report) => report,
                Err(e) => {
                    warn!(err = %e, "report enrichment failed — error dropped");
                    return SendOutcome::Dropped;
                }
            },
        };

        match self.deliver(&report).await {
            Ok(ack) => {
                info!(%ack, "report delivered");
                SendOutcome::Delivered
            }
            Err(e) => {
                warn!(err = %e, error = %report.message, "delivery failed — caching report");
                match self.ctx.queue.push(&report) {
                    Ok(()) => SendOutcome::Cached,
                    Err(cache_err) => {
                        warn!(err = %cache_err, "cache write failed — report lost");
                        SendOutcome::Dropped
                    }
                }
            }
        }
    }

    /// Drain the persistent queue and re-send every entry in order.
    ///
    /// The queue is reset to empty before the first re-send, so entries
    /// that fail again are re-appended by `send`, never duplicated. Legacy
    /// entries cached without a timestamp come back as `Raw` and are
    /// re-enriched by `send` like any fresh error.
    pub async fn replay_queue(&self) {
        let backlog = match self.ctx.queue.drain() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(err = %e, "could not read the error cache — replay skipped");
                return;
            }
        };
        if backlog.is_empty() {
            return;
        }

        info!(count = backlog.len(), "replaying cached reports");
        for entry in backlog {
            self.send(entry).await;
        }
    }

    // ─── Internals ───────────────────────────────────────────────────────────

    async fn authenticate(&self, app_id: &str) -> Result<(), TelemetryError> {
        let url = self.config.auth_url();
        let request = AuthRequest {
            app_id: app_id.to_string(),
        };

        let response =
            backoff::run(&self.policy, || self.transport.post_auth(&url, &request)).await?;

        if response.is_success() {
            let body: AuthResponse = response.json()?;
            let token = body
                .token
                .ok_or_else(|| TelemetryError::Storage("auth response carried no token".into()))?;
            self.ctx.token.put(&token)?;
            Ok(())
        } else {
            // Surface the server's own message when it sent one.
            if let Some(reason) = response.json::<AuthResponse>().ok().and_then(|b| b.message) {
                warn!(status = response.status, %reason, "auth rejected");
            }
            Err(TelemetryError::Status(response.status))
        }
    }

    fn enrich(&self, raw: RawError) -> Result<ErrorReport, TelemetryError> {
        let browser_version = get_browser(self.user_agent.as_ref())?;
        let actions = self.ctx.trace.drain()?;
        debug!(
            actions = actions.len(),
            name = %raw.name,
            "building report from raw error"
        );
        Ok(ErrorReport {
            message: raw.message,
            name: raw.name,
            stack: raw.stack,
            actions,
            browser_version,
            timestamp: epoch_millis(),
        })
    }

    async fn deliver(&self, report: &ErrorReport) -> Result<String, TelemetryError> {
        let url = self.config.logs_url();
        let bearer = self.ctx.token.bearer();

        let response = backoff::run(&self.policy, || {
            self.transport.post_report(&url, &bearer, report)
        })
        .await?;

        if !response.is_success() {
            return Err(TelemetryError::Status(response.status));
        }
        let body: LogsResponse = response.json()?;
        Ok(body.message)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
