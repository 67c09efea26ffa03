//! Cooperatively scheduled gateway tasks.
//!
//! Every task is a poll function: it does a bounded amount of work, reports
//! how busy it is, and returns. The scheduler calls each task once per cycle in
//! a fixed order and uses the reported statuses to pace the loop.

pub mod framer;
pub mod serial;
pub mod storage;

use crate::data::PipelineBuffers;
use crate::error::GatewayError;

pub use framer::FramerTask;
pub use serial::SerialTask;
pub use storage::StorageTask;

/// What a task reports after one step.
#[derive(Debug)]
pub enum TaskStatus {
    /// Nothing to do.
    Idle,
    /// Did useful work, or is in the middle of a multi-step operation.
    Busy,
    /// Unrecoverable failure; the gateway stops.
    Fatal(GatewayError),
}

impl TaskStatus {
    /// True for [`TaskStatus::Busy`].
    pub fn is_busy(&self) -> bool {
        matches!(self, TaskStatus::Busy)
    }
}

impl From<Result<TaskStatus, GatewayError>> for TaskStatus {
    fn from(result: Result<TaskStatus, GatewayError>) -> Self {
        result.unwrap_or_else(TaskStatus::Fatal)
    }
}

/// A pollable unit of work.
pub trait Task {
    /// Short name used in logs and fatal error reports.
    fn name(&self) -> &'static str;

    /// Run one step against the shared buffers.
    fn run(&mut self, buffers: &mut PipelineBuffers) -> TaskStatus;
}
