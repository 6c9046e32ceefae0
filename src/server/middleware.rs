use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::http::request::Request;
use crate::sink::{Sink, error::Result};

/// The sink and tag a handler delivers to, bound for one request.
#[derive(Clone)]
pub struct DeliveryContext {
    sink: Arc<dyn Sink>,
    tag: Arc<str>,
    registered: Arc<AtomicU64>,
}

impl DeliveryContext {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Posts `message` to the bound sink under the bound tag.
    ///
    /// Successful deliveries are counted; returns the new total.
    pub async fn deliver(&self, message: &serde_json::Value) -> Result<u64> {
        self.sink.post(&self.tag, message).await?;
        Ok(self.registered.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Hands every request the process-wide sink and tag.
pub struct DeliveryMiddleware {
    sink: Arc<dyn Sink>,
    tag: Arc<str>,
    registered: Arc<AtomicU64>,
}

impl DeliveryMiddleware {
    pub fn new(sink: Arc<dyn Sink>, tag: impl Into<String>) -> Self {
        Self {
            sink,
            tag: Arc::from(tag.into()),
            registered: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Feedback records delivered since startup.
    pub fn registered(&self) -> u64 {
        self.registered.load(Ordering::Relaxed)
    }

    /// Binds the delivery context for `req`. Never fails.
    pub fn attach(&self, req: &Request) -> DeliveryContext {
        tracing::debug!(
            method = req.method.as_str(),
            path = %req.route_path(),
            tag = %self.tag,
            "Attaching delivery context"
        );

        DeliveryContext {
            sink: Arc::clone(&self.sink),
            tag: Arc::clone(&self.tag),
            registered: Arc::clone(&self.registered),
        }
    }
}
