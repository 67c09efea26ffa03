//! # Telemetry Gateway Library
//!
//! This crate reads JSON telemetry objects from a serial line, stamps each one
//! with the UTC time of arrival and delivers it to an HTTP collector, keeping a
//! line-per-record copy on local storage as a fallback.
//!
//! Everything runs on one thread. A cooperative [`scheduler::Scheduler`] polls
//! a fixed set of non-blocking tasks, and the tasks hand records to each other
//! through fixed-size ring buffers.
//!
//! ## Crate Structure
//!
//! - **`clock`**: Monotonic time source, with a manual clock for tests.
//! - **`config`**: Layered configuration (defaults, TOML file, environment).
//! - **`data`**: The ring buffer and the set of buffers shared by the tasks.
//! - **`delivery`**: The request/response state machine and its TCP transport.
//! - **`error`**: The `GatewayError` enum for errors that stop the gateway.
//! - **`framer`**: Brace-matching extraction of JSON objects from raw chunks.
//! - **`gateway`**: Start-up wiring of sources, sinks and tasks.
//! - **`logging`**: `tracing-subscriber` setup.
//! - **`scheduler`**: The cooperative loop and its pacing.
//! - **`sink`**: Append-only record persistence.
//! - **`source`**: Serial and generic byte sources.
//! - **`tasks`**: The `Task` trait and the serial, framer and storage tasks.
//! - **`timestamp`**: UTC formatting and timestamp injection.

pub mod clock;
pub mod config;
pub mod data;
pub mod delivery;
pub mod error;
pub mod framer;
pub mod gateway;
pub mod logging;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod tasks;
pub mod timestamp;
