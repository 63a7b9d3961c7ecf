use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use faultline::config::TelemetryConfig;
use faultline::server;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "faultline",
    about = "Faultline — serves the error-telemetry client bundle",
    version
)]
struct Args {
    /// Bundle server port
    #[arg(long, env = "FAULTLINE_PORT")]
    port: Option<u16>,

    /// Directory holding the built client bundle
    #[arg(long, env = "FAULTLINE_BUNDLE_DIR")]
    dir: Option<PathBuf>,

    /// Data directory for config and the persistent error cache
    #[arg(long, env = "FAULTLINE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FAULTLINE_LOG", default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = TelemetryConfig::load(args.data_dir);
    // Priority: CLI / env > TOML > default (9000).
    let port = args.port.unwrap_or(config.port);
    let dir = args.dir.unwrap_or_else(|| config.bundle_dir.clone());

    server::serve(dir, port).await
}
