//! Custom error types for the gateway.
//!
//! This module defines the primary error type, `GatewayError`, for the whole crate.
//! Using the `thiserror` crate, it provides one consistent way to describe the
//! failures that can stop the gateway, from configuration and start-up problems
//! to the handful of runtime conditions that are considered unrecoverable.
//!
//! ## Error Hierarchy
//!
//! `GatewayError` consolidates the error sources the scheduler may see:
//!
//! - **`Config`**: Wraps errors from `figment`, typically a malformed TOML file or an
//!   environment variable that does not deserialize into the expected type.
//! - **`Configuration`**: Semantic errors in a configuration that parsed fine but is
//!   logically wrong (e.g. a record size too small to hold a stamped object).
//! - **`Io`**: Wraps `std::io::Error` for file and device I/O at start-up.
//! - **`ByteSource`**: The serial line (or other byte source) failed with a real error,
//!   not merely "no data yet".
//! - **`UnknownHost`**: The collector host name could not be resolved.
//! - **`RingBuffer`**: A ring buffer operation failed, e.g. advancing an empty buffer.
//! - **`ResponseTooLarge`**: The collector's response filled the whole response buffer.
//! - **`TaskFailed`**: A scheduled task reported a fatal error; carries the task name.
//!
//! Recoverable conditions (framing failures, would-block I/O, rejected deliveries) are
//! logged inside their owning task and never become a `GatewayError`.

use crate::data::ring_buffer::RingBufferError;
use thiserror::Error;

/// Convenience alias for results using the gateway error type.
pub type AppResult<T> = std::result::Result<T, GatewayError>;

/// Errors that stop the gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration could not be loaded or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration loaded but failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte source failed with a non-transient error.
    #[error("Byte source error on '{source_name}': {error}")]
    ByteSource {
        /// Port path or reader description.
        source_name: String,
        /// Underlying cause.
        error: std::io::Error,
    },

    /// Serial support was compiled out.
    #[error("Serial support not enabled. Rebuild with --features serial")]
    SerialFeatureDisabled,

    /// Collector host name did not resolve to any address.
    #[error("Unknown host: {0}")]
    UnknownHost(String),

    /// Ring buffer misuse.
    #[error("Ring buffer error: {0}")]
    RingBuffer(#[from] RingBufferError),

    /// Response did not fit in the response buffer.
    #[error("Response too large: buffer of {capacity} bytes filled before completion")]
    ResponseTooLarge {
        /// Response buffer capacity in bytes.
        capacity: usize,
    },

    /// A scheduled task failed fatally.
    #[error("Task '{task}' failed: {source}")]
    TaskFailed {
        /// Name of the task that failed.
        task: &'static str,
        /// The fatal error reported by the task.
        #[source]
        source: Box<GatewayError>,
    },
}

impl From<figment::Error> for GatewayError {
    fn from(value: figment::Error) -> Self {
        GatewayError::Config(Box::new(value))
    }
}

impl GatewayError {
    /// Wrap this error with the name of the task that raised it.
    pub fn in_task(self, task: &'static str) -> Self {
        GatewayError::TaskFailed {
            task,
            source: Box::new(self),
        }
    }
}
