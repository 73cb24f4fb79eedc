//! Error types for the skeleton relay pipeline.
//!
//! Every stage of the pipeline reports failures through [`RelayError`]. None of
//! them are fatal to the process: the pipeline is best-effort telemetry, so
//! callers log the error and carry on with the next frame or publish.
//!
//! ## Error Categories
//!
//! - **Sensor Errors**: malformed frames from the frame source (frame is skipped)
//! - **Transport Errors**: connect/send failures on the publisher (payload dropped)
//! - **Delivery Errors**: per-recipient failures on the relay server
//! - **Serialization Errors**: payloads that cannot be encoded or decoded
//! - **Configuration Errors**: unreadable or invalid configuration files
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use skeleton_relay::RelayError;
//!
//! let error = RelayError::connection_failed("ws://127.0.0.1:9001/ws", "connection refused");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// Main error type for relay operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RelayError {
    #[error("Malformed skeleton frame {frame_number}: {reason}")]
    MalformedFrame { frame_number: u32, reason: String },

    #[error("Frame source failed: {reason}")]
    Source {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to connect to {url}: {reason}")]
    Connection {
        url: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Send failed: {reason}")]
    Send {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Delivery to client {client_id} failed: {reason}")]
    Delivery { client_id: u64, reason: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Serialization error in {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Failed to bind relay server to {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RelayError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::Connection { .. } => true,
            RelayError::Send { .. } => true,
            RelayError::Timeout { .. } => true,
            RelayError::Delivery { .. } => true,
            RelayError::Source { .. } => true,
            RelayError::MalformedFrame { .. } => false,
            RelayError::Serialization { .. } => false,
            RelayError::Config { .. } => false,
            RelayError::Bind { .. } => false,
            RelayError::File { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RelayError::MalformedFrame { .. } => vec![
                "Check the sensor driver is delivering complete skeletons",
                "Verify the recording was captured with 20 joints per skeleton",
            ],
            RelayError::Source { .. } => vec![
                "Check the sensor is plugged in and powered",
                "Restart the frame source",
            ],
            RelayError::Connection { .. } => vec![
                "Ensure the relay server is running",
                "Check the publisher url and port",
                "Increase the connect timeout on slow networks",
            ],
            RelayError::Send { .. } => vec![
                "The next publish will reconnect automatically",
                "Check the relay server logs for closed connections",
            ],
            RelayError::Delivery { .. } => vec![
                "The client may be too slow to keep up with the broadcast rate",
                "Increase the per-client queue size",
            ],
            RelayError::Timeout { .. } => vec![
                "Increase timeout duration",
                "Check network latency to the relay server",
            ],
            RelayError::Serialization { .. } => vec![
                "Check the payload encoding",
                "Verify the message is a JSON object of joint coordinates",
            ],
            RelayError::Config { .. } => vec![
                "Check the configuration file against the documented fields",
                "Remove the field to fall back to its default",
            ],
            RelayError::Bind { .. } => vec![
                "Check no other process is listening on the port",
                "Choose a different listen address",
            ],
            RelayError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
        }
    }

    /// Helper constructor for malformed frame errors.
    pub fn malformed_frame(frame_number: u32, reason: impl Into<String>) -> Self {
        RelayError::MalformedFrame { frame_number, reason: reason.into() }
    }

    /// Helper constructor for frame source errors.
    pub fn source_failed(reason: impl Into<String>) -> Self {
        RelayError::Source { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        RelayError::Connection { url: url.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        url: impl Into<String>,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        RelayError::Connection { url: url.into(), reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for send errors.
    pub fn send_failed(
        reason: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        RelayError::Send { reason: reason.into(), source }
    }

    /// Helper constructor for per-recipient delivery errors.
    pub fn delivery_failed(client_id: u64, reason: impl Into<String>) -> Self {
        RelayError::Delivery { client_id, reason: reason.into() }
    }

    /// Helper constructor for serialization errors.
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        RelayError::Serialization { context: context.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        RelayError::Config { details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        RelayError::File { path, source }
    }
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization { context: "json".to_string(), source: err }
    }
}

impl From<serde_yaml_ng::Error> for RelayError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        RelayError::Config { details: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn messages_carry_their_context(
                reason in "[a-z ]{1,40}",
                frame_number in 0u32..100_000,
                client_id in 0u64..10_000,
                duration_ms in 1u64..60_000,
            ) {
                let malformed = RelayError::malformed_frame(frame_number, reason.clone());
                prop_assert!(malformed.to_string().contains(&reason));
                prop_assert!(malformed.to_string().contains(&frame_number.to_string()));

                let delivery = RelayError::delivery_failed(client_id, reason.clone());
                prop_assert!(delivery.to_string().contains(&client_id.to_string()));

                let timeout = RelayError::Timeout { duration: Duration::from_millis(duration_ms) };
                prop_assert!(!timeout.to_string().is_empty());
                prop_assert!(timeout.is_retryable());
            }

            #[test]
            fn io_errors_keep_their_message(message in "[a-zA-Z ]{1,40}") {
                let io_err = std::io::Error::other(message.clone());
                let converted: RelayError = io_err.into();
                match converted {
                    RelayError::File { source, .. } => prop_assert_eq!(source.to_string(), message),
                    _ => prop_assert!(false, "Expected File error from io::Error conversion"),
                }
            }
        }
    }

    #[test]
    fn retry_classification_matches_error_taxonomy() {
        assert!(RelayError::connection_failed("ws://x", "refused").is_retryable());
        assert!(RelayError::send_failed("closed", None).is_retryable());
        assert!(RelayError::delivery_failed(3, "queue full").is_retryable());
        assert!(!RelayError::malformed_frame(1, "short").is_retryable());
        assert!(!RelayError::config("bad").is_retryable());
    }

    #[test]
    fn every_variant_has_suggestions() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let errors = vec![
            RelayError::malformed_frame(1, "short"),
            RelayError::source_failed("unplugged"),
            RelayError::connection_failed("ws://x", "refused"),
            RelayError::send_failed("closed", None),
            RelayError::delivery_failed(1, "gone"),
            RelayError::Timeout { duration: Duration::from_millis(5) },
            RelayError::serialization("payload", json_err),
            RelayError::config("bad"),
            RelayError::file_error(
                PathBuf::from("/nope"),
                std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            ),
        ];

        for error in errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty(), "no suggestions for {error}");
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<RelayError>();

        let error = RelayError::connection_failed("ws://x", "refused");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn yaml_errors_become_config_errors() {
        let yaml_err = serde_yaml_ng::from_str::<u32>("not: [a number").unwrap_err();
        let converted: RelayError = yaml_err.into();
        assert!(matches!(converted, RelayError::Config { .. }));
    }
}
