//! Polls the byte source into the raw ring buffer.
use super::{Task, TaskStatus};
use crate::data::PipelineBuffers;
use crate::error::GatewayError;
use crate::source::ByteSource;
use tracing::{error, trace};

/// Moves newly arrived bytes from a [`ByteSource`] into `PipelineBuffers::raw`.
pub struct SerialTask<S> {
    source: S,
    chunk: Vec<u8>,
}

impl<S: ByteSource> SerialTask<S> {
    /// Read at most `chunk_size` bytes per poll.
    ///
    /// `chunk_size` should not exceed the raw buffer's record size.
    pub fn new(source: S, chunk_size: usize) -> Self {
        Self {
            source,
            chunk: vec![0u8; chunk_size],
        }
    }

    fn step(&mut self, buffers: &mut PipelineBuffers) -> Result<TaskStatus, GatewayError> {
        let n = self.source.poll(&mut self.chunk).map_err(|e| {
            error!(source = self.source.describe(), error = %e, "byte source failed");
            GatewayError::ByteSource {
                source_name: self.source.describe().to_string(),
                error: e,
            }
        })?;

        if n == 0 {
            return Ok(TaskStatus::Idle);
        }

        trace!(bytes = n, "raw chunk received");
        buffers.raw.write(&self.chunk[..n])?;
        Ok(TaskStatus::Busy)
    }
}

impl<S: ByteSource> Task for SerialTask<S> {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn run(&mut self, buffers: &mut PipelineBuffers) -> TaskStatus {
        self.step(buffers).into()
    }
}
