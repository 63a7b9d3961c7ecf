pub mod backoff;
pub mod browser;
pub mod config;
pub mod error;
pub mod report;
pub mod reporter;
pub mod server;
pub mod store;
pub mod trace;
pub mod transport;

use std::sync::Arc;

use browser::{NoUserAgent, StaticUserAgent, UserAgentSource};
use config::TelemetryConfig;
use error::TelemetryError;
use reporter::Reporter;
use store::{FileStore, KvStore, MemoryStore, ReportQueue, TokenCell, TraceBuffer};
use transport::HttpTransport;

/// Explicit handle on the shim's state: the persistent report queue, the
/// session trace buffer, and the session token. Passed to `Reporter` and
/// `Instrumentor` constructors instead of living in ambient globals, so
/// tests and embeddings can run isolated contexts side by side.
#[derive(Clone)]
pub struct TelemetryContext {
    pub queue: ReportQueue,
    pub trace: TraceBuffer,
    pub token: TokenCell,
}

impl TelemetryContext {
    /// The queue lives in `persistent`; the trace buffer and token live in
    /// `session`, matching their browser-storage lifetimes.
    pub fn new(persistent: Arc<dyn KvStore>, session: Arc<dyn KvStore>) -> Self {
        Self {
            queue: ReportQueue::new(persistent),
            trace: TraceBuffer::new(session.clone()),
            token: TokenCell::new(session),
        }
    }

    /// File-backed queue under the configured data dir, fresh in-memory
    /// session state.
    pub fn open(config: &TelemetryConfig) -> Self {
        Self::new(
            Arc::new(FileStore::new(config.cache_path())),
            Arc::new(MemoryStore::new()),
        )
    }

    /// Everything in memory. Test and demo use.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }
}

/// Wire a production `Reporter` from config: file-backed context, reqwest
/// transport, configured user agent (or none), default backoff.
pub fn build_reporter(config: TelemetryConfig) -> Result<Reporter, TelemetryError> {
    let ctx = TelemetryContext::open(&config);
    let transport = Arc::new(HttpTransport::new()?);
    let user_agent: Arc<dyn UserAgentSource> = match &config.user_agent {
        Some(ua) => Arc::new(StaticUserAgent(ua.clone())),
        None => Arc::new(NoUserAgent),
    };
    Ok(Reporter::new(
        config,
        ctx,
        transport,
        user_agent,
        backoff::BackoffPolicy::default(),
    ))
}
