//! Wire contract with the logging backend.
//!
//! Two calls, both single JSON POSTs:
//!
//! - `POST <base>/auth/app` — the handshake; body `{"appId": …}`, response
//!   `{token?, message?}`.
//! - `POST <base>/logs` — report delivery; bearer-authorized, body = the
//!   report, response `{message}`.
//!
//! The [`Transport`] trait is the seam tests mock; [`HttpTransport`] is the
//! reqwest-backed production implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backoff::StatusCarrier;
use crate::error::TelemetryError;
use crate::report::ErrorReport;

// ─── Request / response bodies ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub app_id: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthResponse {
    pub token: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogsResponse {
    pub message: String,
}

/// Status plus raw body, decoupled from any HTTP client type so the backoff
/// driver and the mocks share one shape.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub body: String,
}

impl WireResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body. A failure here is a storage-class error (the bytes
    /// arrived; they just don't parse).
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, TelemetryError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

impl StatusCarrier for WireResponse {
    fn status_code(&self) -> u16 {
        self.status
    }
}

// ─── Transport seam ───────────────────────────────────────────────────────────

#[async_trait]
pub trait Transport: Send + Sync {
    /// `POST` the auth handshake body. No credential — this is how one is
    /// obtained.
    async fn post_auth(
        &self,
        url: &str,
        request: &AuthRequest,
    ) -> Result<WireResponse, TelemetryError>;

    /// `POST` one report with `Authorization: Bearer <bearer>`. `bearer` is
    /// the held token or the literal `"null"`.
    async fn post_report(
        &self,
        url: &str,
        bearer: &str,
        report: &ErrorReport,
    ) -> Result<WireResponse, TelemetryError>;
}

// ─── reqwest implementation ───────────────────────────────────────────────────

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build the shared client with a 10 s request timeout. The backoff
    /// executor bounds total time; this bounds a single hung request.
    pub fn new() -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }

    async fn collect(response: reqwest::Response) -> Result<WireResponse, TelemetryError> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(WireResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_auth(
        &self,
        url: &str,
        request: &AuthRequest,
    ) -> Result<WireResponse, TelemetryError> {
        let response = self.client.post(url).json(request).send().await?;
        Self::collect(response).await
    }

    async fn post_report(
        &self,
        url: &str,
        bearer: &str,
        report: &ErrorReport,
    ) -> Result<WireResponse, TelemetryError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(bearer)
            .json(report)
            .send()
            .await?;
        Self::collect(response).await
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
