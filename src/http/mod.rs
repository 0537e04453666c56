//! HTTP surface.
//!
//! A thin axum layer: each route maps onto one session manager or
//! orchestrator operation.

pub mod errors;
pub mod routes;

use std::net::SocketAddr;

pub use errors::ApiError;
pub use routes::{router, AppState};

/// Serve the API until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "HTTP server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
