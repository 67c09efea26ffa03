//! Drains the storage ring buffer into a [`RecordSink`].
use super::{Task, TaskStatus};
use crate::data::PipelineBuffers;
use crate::sink::RecordSink;
use tracing::{trace, warn};

/// Persists one record per step.
///
/// Sink failures are logged and the record is dropped; persistence is a
/// fallback and never stops the gateway.
pub struct StorageTask<K> {
    sink: K,
    line: Vec<u8>,
}

impl<K: RecordSink> StorageTask<K> {
    /// Create the task around `sink`.
    pub fn new(sink: K) -> Self {
        Self {
            sink,
            line: Vec::new(),
        }
    }

    /// The wrapped sink.
    pub fn sink(&self) -> &K {
        &self.sink
    }
}

impl<K: RecordSink> Task for StorageTask<K> {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn run(&mut self, buffers: &mut PipelineBuffers) -> TaskStatus {
        if !buffers.storage.pop_into(&mut self.line) {
            return TaskStatus::Idle;
        }

        match self.sink.append_line(&self.line) {
            Ok(()) => trace!(bytes = self.line.len(), "record persisted"),
            Err(e) => warn!(error = %e, "failed to persist record"),
        }
        TaskStatus::Busy
    }
}
