//! Frames raw chunks into stamped JSON records.
use super::{Task, TaskStatus};
use crate::data::ring_buffer::{RingBuffer, RingBufferError};
use crate::data::PipelineBuffers;
use crate::error::GatewayError;
use crate::framer::JsonFramer;
use crate::timestamp;
use tracing::{debug, info, warn};

/// Takes raw chunks, extracts JSON objects, stamps them and fans them out to
/// the delivery buffer and, if enabled, the storage buffer.
///
/// One object at most is framed per step. When an object ends mid-chunk the
/// rest of the chunk is kept and scanned on the next step before a new chunk
/// is taken.
pub struct FramerTask {
    framer: JsonFramer,
    store_locally: bool,
    chunk: Vec<u8>,
    offset: usize,
}

impl FramerTask {
    /// Create the task.
    ///
    /// `store_locally` also copies every record into `PipelineBuffers::storage`.
    pub fn new(framer: JsonFramer, store_locally: bool) -> Self {
        Self {
            framer,
            store_locally,
            chunk: Vec::new(),
            offset: 0,
        }
    }

    fn step(&mut self, buffers: &mut PipelineBuffers) -> Result<TaskStatus, GatewayError> {
        if self.offset >= self.chunk.len() {
            self.offset = 0;
            if !buffers.raw.pop_into(&mut self.chunk) {
                return Ok(TaskStatus::Idle);
            }
        }

        let extraction = self.framer.extract(&self.chunk[self.offset..]);
        self.offset += extraction.consumed.max(1);

        if let Some(object) = extraction.object {
            let record = timestamp::inject_timestamp(&object, &timestamp::now_utc());
            info!(record = %String::from_utf8_lossy(&record), "record framed");

            publish(&mut buffers.delivery, &record)?;
            if self.store_locally {
                publish(&mut buffers.storage, &record)?;
            }
            debug!(
                delivery_read = buffers.delivery.read_index(),
                delivery_write = buffers.delivery.write_index(),
                storage_read = buffers.storage.read_index(),
                storage_write = buffers.storage.write_index(),
                "buffer indexes"
            );
        }

        Ok(TaskStatus::Busy)
    }
}

/// Oversize records are dropped with a warning, other errors propagate.
fn publish(buffer: &mut RingBuffer, record: &[u8]) -> Result<(), GatewayError> {
    match buffer.write(record) {
        Ok(_) => Ok(()),
        Err(err @ RingBufferError::RecordTooLarge { .. }) => {
            warn!(buffer = buffer.name(), error = %err, "record dropped");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

impl Task for FramerTask {
    fn name(&self) -> &'static str {
        "framer"
    }

    fn run(&mut self, buffers: &mut PipelineBuffers) -> TaskStatus {
        self.step(buffers).into()
    }
}
