//! Downstream delivery of feedback records.
//!
//! Handlers only see the [`Sink`] trait. [`FluentSink`] is the production
//! implementation, talking to a Fluentd forward input over TCP.

pub mod error;
pub mod fluent;

use async_trait::async_trait;

pub use error::DeliveryError;
pub use fluent::FluentSink;

/// Something that accepts tagged, structured messages.
///
/// Implementations must tolerate concurrent calls from many connection
/// tasks.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Delivers `message` under `tag`, retrying internally as the
    /// implementation sees fit. Only the final outcome is reported.
    async fn post(&self, tag: &str, message: &serde_json::Value) -> error::Result<()>;
}
