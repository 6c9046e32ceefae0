//! Fluentd forward-protocol client
//!
//! Keeps one TCP connection to the collector and writes each event as a
//! JSON `[tag, time, record]` entry, which the forward input accepts next to
//! its msgpack form. Failed attempts drop the connection, back off and
//! reconnect.

use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::config::SinkConfig;
use crate::sink::Sink;
use crate::sink::error::{DeliveryError, Result};

/// Delivers events to a Fluentd forward input.
pub struct FluentSink {
    /// Collector address, `host:port`
    addr: String,

    /// Retries after the first failed attempt
    max_retry: u32,

    /// Backoff before the first retry; doubles after each one
    retry_wait: Duration,

    /// Backoff ceiling
    max_retry_wait: Duration,

    connect_timeout: Duration,
    write_timeout: Duration,

    /// Locked per attempt so concurrent posts never interleave bytes on
    /// the wire; never held across a backoff.
    conn: Mutex<Option<TcpStream>>,
}

impl FluentSink {
    /// Creates a sink for the configured collector.
    ///
    /// No connection is made until the first post.
    pub fn new(config: &SinkConfig) -> Self {
        Self {
            addr: config.address(),
            max_retry: config.max_retry,
            retry_wait: config.retry_wait(),
            max_retry_wait: config.max_retry_wait(),
            connect_timeout: config.connect_timeout(),
            write_timeout: config.write_timeout(),
            conn: Mutex::new(None),
        }
    }

    /// Creates a sink and connects eagerly, so an unreachable collector is
    /// reported at startup instead of on the first request.
    pub async fn connect(config: &SinkConfig) -> Result<Self> {
        let sink = Self::new(config);
        let stream = sink.dial().await?;
        *sink.conn.lock().await = Some(stream);
        Ok(sink)
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Backoff before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(31));
        self.retry_wait
            .checked_mul(factor)
            .unwrap_or(self.max_retry_wait)
            .min(self.max_retry_wait)
    }

    async fn dial(&self) -> Result<TcpStream> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| DeliveryError::timeout("connect", self.connect_timeout.as_millis() as u64))?
            .map_err(|e| DeliveryError::connect(&self.addr, e.to_string()))?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "Cannot set TCP_NODELAY on collector connection");
        }

        tracing::info!(collector = %self.addr, "Connected to collector");
        Ok(stream)
    }

    /// One attempt: connect if needed, then write the whole entry.
    ///
    /// The connection lock is held for this attempt only. On failure the
    /// connection is dropped, since a partial entry may be on the wire.
    async fn attempt(&self, entry: &[u8]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let result = self.send(&mut conn, entry).await;
        if result.is_err() {
            *conn = None;
        }
        result
    }

    async fn send(&self, conn: &mut Option<TcpStream>, entry: &[u8]) -> Result<()> {
        if matches!(conn, Some(stream) if peer_closed(stream)) {
            tracing::debug!(collector = %self.addr, "Collector closed the connection, redialing");
            *conn = None;
        }

        if conn.is_none() {
            *conn = Some(self.dial().await?);
        }

        let Some(stream) = conn.as_mut() else {
            return Err(DeliveryError::write("no connection"));
        };

        timeout(self.write_timeout, async {
            stream.write_all(entry).await?;
            stream.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await
        .map_err(|_| DeliveryError::timeout("write", self.write_timeout.as_millis() as u64))?
        .map_err(|e| DeliveryError::write(e.to_string()))
    }
}

/// Whether the collector has hung up on an idle connection.
///
/// The forward input never writes unprompted, so a readable EOF means the
/// peer closed; writing into such a socket can succeed and still lose data.
fn peer_closed(stream: &TcpStream) -> bool {
    let mut scratch = [0u8; 64];
    match stream.try_read(&mut scratch) {
        Ok(0) => true,
        Ok(_) => false,
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => false,
        Err(_) => true,
    }
}

/// Encodes one forward-protocol entry: `[tag, time, record]`.
pub fn encode_entry(tag: &str, time: u64, record: &serde_json::Value) -> Result<Vec<u8>> {
    serde_json::to_vec(&(tag, time, record)).map_err(|e| DeliveryError::encode(e.to_string()))
}

fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[async_trait]
impl Sink for FluentSink {
    async fn post(&self, tag: &str, message: &serde_json::Value) -> Result<()> {
        let entry = encode_entry(tag, unix_time(), message)?;
        let attempts = self.max_retry + 1;

        let mut attempt = 0;
        loop {
            attempt += 1;

            let err = match self.attempt(&entry).await {
                Ok(()) => {
                    tracing::debug!(tag, attempt, bytes = entry.len(), "Event delivered");
                    return Ok(());
                }
                Err(e) => e,
            };

            // The lock is already released; other posts proceed while this
            // one backs off.
            if attempt >= attempts || !err.is_retryable() {
                return Err(DeliveryError::retries_exhausted(attempt, err));
            }

            let wait = self.backoff(attempt - 1);
            tracing::warn!(
                collector = %self.addr,
                error = %err,
                attempt,
                max_attempts = attempts,
                wait_ms = wait.as_millis() as u64,
                "Delivery attempt failed, retrying"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink(retry_wait_ms: u64, max_retry_wait_ms: u64) -> FluentSink {
        let mut config = SinkConfig::new("127.0.0.1", 24224, "feedback");
        config.retry_wait_ms = retry_wait_ms;
        config.max_retry_wait_ms = max_retry_wait_ms;
        FluentSink::new(&config)
    }

    #[test]
    fn backoff_doubles_until_ceiling() {
        let sink = sink(500, 3_000);

        assert_eq!(sink.backoff(0), Duration::from_millis(500));
        assert_eq!(sink.backoff(1), Duration::from_millis(1_000));
        assert_eq!(sink.backoff(2), Duration::from_millis(2_000));
        assert_eq!(sink.backoff(3), Duration::from_millis(3_000));
        assert_eq!(sink.backoff(40), Duration::from_millis(3_000));
    }

    #[test]
    fn entry_is_tag_time_record_array() {
        let record = serde_json::json!({"model_id": "m"});
        let entry = encode_entry("feedback", 1_700_000_000, &record).unwrap();

        assert_eq!(
            String::from_utf8(entry).unwrap(),
            r#"["feedback",1700000000,{"model_id":"m"}]"#
        );
    }

    #[test]
    fn no_connection_until_first_post() {
        let sink = sink(1, 1);

        assert_eq!(sink.addr(), "127.0.0.1:24224");
        assert!(sink.conn.try_lock().unwrap().is_none());
    }
}
