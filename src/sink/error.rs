//! Error types for sink delivery.

use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Why a message did not reach the collector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// TCP connect to the collector failed.
    #[error("cannot connect to {addr}: {message}")]
    Connect {
        /// Collector address that was dialed
        addr: String,
        /// Underlying I/O error
        message: String,
    },

    /// A connect or write did not finish in time.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        /// Which step timed out ("connect" or "write")
        operation: &'static str,
        /// Configured limit in milliseconds
        after_ms: u64,
    },

    /// Writing to an established connection failed.
    #[error("write failed: {message}")]
    Write {
        /// Underlying I/O error
        message: String,
    },

    /// The message could not be encoded.
    #[error("cannot encode message: {message}")]
    Encode {
        /// Serializer error
        message: String,
    },

    /// Every attempt failed.
    #[error("delivery failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made, the first one included
        attempts: u32,
        /// Error from the final attempt
        last: Box<DeliveryError>,
    },
}

impl DeliveryError {
    pub fn connect(addr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect { addr: addr.into(), message: message.into() }
    }

    pub fn timeout(operation: &'static str, after_ms: u64) -> Self {
        Self::Timeout { operation, after_ms }
    }

    pub fn write(message: impl Into<String>) -> Self {
        Self::Write { message: message.into() }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode { message: message.into() }
    }

    pub fn retries_exhausted(attempts: u32, last: DeliveryError) -> Self {
        Self::RetriesExhausted { attempts, last: Box::new(last) }
    }

    /// Whether another attempt on a fresh connection could succeed.
    ///
    /// Encoding failures and exhausted retries are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } | Self::Write { .. } => true,
            Self::Encode { .. } | Self::RetriesExhausted { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_retryable() {
        assert!(DeliveryError::connect("127.0.0.1:24224", "refused").is_retryable());
        assert!(DeliveryError::timeout("write", 10).is_retryable());
        assert!(DeliveryError::write("broken pipe").is_retryable());

        assert!(!DeliveryError::encode("bad").is_retryable());
        assert!(!DeliveryError::retries_exhausted(6, DeliveryError::write("x")).is_retryable());
    }

    #[test]
    fn exhausted_error_names_last_cause() {
        let err = DeliveryError::retries_exhausted(
            6,
            DeliveryError::connect("127.0.0.1:24224", "connection refused"),
        );

        assert_eq!(
            err.to_string(),
            "delivery failed after 6 attempts: cannot connect to 127.0.0.1:24224: connection refused"
        );
    }
}
