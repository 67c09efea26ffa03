//! Record buffering between gateway tasks.
pub mod ring_buffer;

use crate::config::GatewayConfig;
use ring_buffer::{RingBuffer, RingBufferError};

/// The three ring buffers connecting the gateway tasks.
///
/// Owned by the scheduler and lent to each task for the duration of its step.
///
/// ```text
/// serial task --raw--> framer task --delivery--> delivery task
///                                  \--storage--> storage task
/// ```
#[derive(Debug)]
pub struct PipelineBuffers {
    /// Raw chunks read from the byte source
    pub raw: RingBuffer,
    /// Stamped records waiting to be delivered to the collector
    pub delivery: RingBuffer,
    /// Stamped records waiting to be persisted locally
    pub storage: RingBuffer,
}

impl PipelineBuffers {
    /// Allocate all buffers with the sizes given in the configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, RingBufferError> {
        Ok(Self {
            raw: RingBuffer::new(
                "raw",
                config.serial.buffer_capacity,
                config.serial.chunk_size,
            )?,
            delivery: RingBuffer::new(
                "delivery",
                config.delivery.buffer_capacity,
                config.delivery.record_size,
            )?,
            storage: RingBuffer::new(
                "storage",
                config.storage.buffer_capacity,
                config.delivery.record_size,
            )?,
        })
    }
}
