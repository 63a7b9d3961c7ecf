// server.rs — static bundle server.
//
// Serves the built client bundle directory with a permissive cross-origin
// header on every response, so pages on any origin can load the shim.
// No other routes.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::Router;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;

pub fn build_router(bundle_dir: PathBuf) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(bundle_dir))
        .layer(CorsLayer::permissive())
}

pub async fn serve(bundle_dir: PathBuf, port: u16) -> Result<()> {
    let addr: SocketAddr = SocketAddr::from(([0, 0, 0, 0], port));
    let router = build_router(bundle_dir.clone());

    info!(dir = %bundle_dir.display(), "bundle server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
