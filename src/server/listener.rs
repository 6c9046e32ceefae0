use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::http::connection::Connection;
use crate::server::router::Router;

/// Binds `addr` and serves until accepting fails.
pub async fn run(addr: &str, router: Arc<Router>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    serve(listener, router).await
}

/// Accepts connections on an already bound listener, one task each.
pub async fn serve(listener: TcpListener, router: Arc<Router>) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        tracing::debug!("Accepted connection from {}", peer);

        let router = Arc::clone(&router);
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, router);
            if let Err(e) = conn.run().await {
                tracing::error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}
