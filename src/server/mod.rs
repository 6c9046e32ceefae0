//! HTTP surface of the service
//!
//! Wires the delivery middleware, the route table and the listener
//! together.

pub mod handlers;
pub mod listener;
pub mod middleware;
pub mod router;

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;

use crate::config::Config;
use crate::sink::{FluentSink, Sink};
use middleware::DeliveryMiddleware;
use router::Router;

/// Route table with `sink` and `tag` injected into every request.
pub fn build_router(sink: Arc<dyn Sink>, tag: impl Into<String>) -> Router {
    Router::new(DeliveryMiddleware::new(sink, tag))
}

/// Connects to the collector, then serves on the configured address until
/// `shutdown` resolves.
///
/// Any failure before the listener is bound is returned without serving.
pub async fn start<F>(config: &Config, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    config.validate()?;

    tracing::info!(collector = %config.sink.address(), tag = %config.sink.tag, "Connecting to collector");
    let sink = FluentSink::connect(&config.sink)
        .await
        .with_context(|| format!("cannot start collector client for {}", config.sink.address()))?;

    let router = Arc::new(build_router(Arc::new(sink), config.sink.tag.clone()));

    let result = tokio::select! {
        res = listener::run(&config.listen_addr, Arc::clone(&router)) => res,
        _ = shutdown => {
            tracing::info!("Shutdown signal received");
            Ok(())
        }
    };

    tracing::info!(registered = router.registered_feedback(), "Server stopped");
    result
}
