// Liveness endpoint for host-platform probing.
//
// A static string on GET / is all the hosting platform needs to keep the
// dyno alive; anything fancier belongs elsewhere.

use anyhow::Result;
use axum::{routing::get, Router};
use tokio::net::TcpListener;

async fn root() -> &'static str {
    "Server is running"
}

/// Serve the health endpoint on `0.0.0.0:{port}` until the process exits.
pub async fn serve(port: u16) -> Result<()> {
    let app = Router::new().route("/", get(root));
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "health endpoint listening");
    axum::serve(listener, app).await?;
    Ok(())
}
