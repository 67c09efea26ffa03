//! Fixed-capacity ring buffer of fixed-size records.
//!
//! This is the only channel between gateway tasks. Every buffer has exactly one
//! producer task and one consumer task, and all tasks run on one thread, so the
//! read/write index protocol is the whole concurrency discipline.
//!
//! # Features
//! - One contiguous allocation made at construction, never resized
//! - Writes never block: when full, the oldest unread record is overwritten
//! - Non-destructive peek plus explicit read advance, so a consumer can hold a
//!   record until it has been acknowledged downstream
//!
//! # Memory Layout
//! ```text
//! [slot 0][slot 1] ... [slot capacity]     (capacity + 1 slots)
//!   each slot: record_size bytes, zero padded
//!
//! read == write        -> empty
//! write + 1 == read    -> full (capacity live records)
//! ```
//!
//! One slot is always left unused so that a full buffer can never look empty.

use thiserror::Error;
use tracing::warn;

/// Errors raised by [`RingBuffer`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RingBufferError {
    /// There is no unread record.
    #[error("ring buffer is empty")]
    Empty,

    /// The record does not fit in a slot.
    #[error("record of {len} bytes exceeds slot size of {record_size} bytes")]
    RecordTooLarge {
        /// Length of the rejected record.
        len: usize,
        /// Slot size of the buffer.
        record_size: usize,
    },

    /// Zero capacity or zero record size requested.
    #[error("invalid ring buffer geometry: capacity {capacity}, record size {record_size}")]
    InvalidGeometry {
        /// Requested number of records.
        capacity: usize,
        /// Requested slot size.
        record_size: usize,
    },
}

/// Result of a successful [`RingBuffer::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The record was stored in a free slot.
    Stored,
    /// The buffer was full; the oldest unread record was discarded first.
    Overwrote,
}

/// Circular store of `capacity` fixed-size records with overwrite-on-full semantics.
pub struct RingBuffer {
    /// Human readable name, used in log output
    name: &'static str,

    /// `(capacity + 1) * record_size` bytes
    storage: Box<[u8]>,

    record_size: usize,

    /// Number of slots (`capacity + 1`)
    slots: usize,

    read: usize,
    write: usize,
}

impl RingBuffer {
    /// Create a buffer able to hold `capacity` records of up to `record_size` bytes.
    ///
    /// # Example
    /// ```
    /// use telemetry_gateway::data::ring_buffer::RingBuffer;
    ///
    /// let mut rb = RingBuffer::new("requests", 4, 16).unwrap();
    /// rb.write(b"{\"a\":1}").unwrap();
    /// assert_eq!(rb.peek(), Some(&b"{\"a\":1}"[..]));
    /// ```
    pub fn new(
        name: &'static str,
        capacity: usize,
        record_size: usize,
    ) -> Result<Self, RingBufferError> {
        if capacity == 0 || record_size == 0 {
            return Err(RingBufferError::InvalidGeometry {
                capacity,
                record_size,
            });
        }
        let slots = capacity
            .checked_add(1)
            .ok_or(RingBufferError::InvalidGeometry {
                capacity,
                record_size,
            })?;
        let total = slots
            .checked_mul(record_size)
            .ok_or(RingBufferError::InvalidGeometry {
                capacity,
                record_size,
            })?;

        Ok(Self {
            name,
            storage: vec![0u8; total].into_boxed_slice(),
            record_size,
            slots,
            read: 0,
            write: 0,
        })
    }

    /// Store a record, discarding the oldest unread record if the buffer is full.
    ///
    /// Records longer than the slot size are rejected and leave the buffer untouched.
    pub fn write(&mut self, record: &[u8]) -> Result<WriteOutcome, RingBufferError> {
        if record.len() > self.record_size {
            return Err(RingBufferError::RecordTooLarge {
                len: record.len(),
                record_size: self.record_size,
            });
        }

        let next_write = self.next(self.write);
        let outcome = if next_write == self.read {
            self.read = self.next(self.read);
            warn!(buffer = self.name, "circular overwrite, oldest record discarded");
            WriteOutcome::Overwrote
        } else {
            WriteOutcome::Stored
        };

        let slot = self.slot_mut(self.write);
        slot[..record.len()].copy_from_slice(record);
        slot[record.len()..].fill(0);
        self.write = next_write;

        Ok(outcome)
    }

    /// Borrow the oldest unread record without consuming it.
    ///
    /// The returned slice ends at the first zero byte of the slot.
    pub fn peek(&self) -> Option<&[u8]> {
        if self.is_empty() {
            return None;
        }
        let slot = self.slot(self.read);
        let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
        Some(&slot[..end])
    }

    /// Move the read position past the oldest record.
    pub fn advance_read(&mut self) -> Result<(), RingBufferError> {
        if self.is_empty() {
            return Err(RingBufferError::Empty);
        }
        self.read = self.next(self.read);
        Ok(())
    }

    /// Copy the oldest record into `out` and consume it.
    ///
    /// `out` is cleared first. Returns `false` if the buffer was empty.
    pub fn pop_into(&mut self, out: &mut Vec<u8>) -> bool {
        out.clear();
        match self.peek() {
            Some(record) => {
                out.extend_from_slice(record);
                self.read = self.next(self.read);
                true
            }
            None => false,
        }
    }

    /// Number of unread records.
    pub fn len(&self) -> usize {
        (self.write + self.slots - self.read) % self.slots
    }

    /// True when there is no unread record.
    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    /// Maximum number of live records.
    pub fn capacity(&self) -> usize {
        self.slots - 1
    }

    /// Maximum record length in bytes.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Current read slot index.
    pub fn read_index(&self) -> usize {
        self.read
    }

    /// Current write slot index.
    pub fn write_index(&self) -> usize {
        self.write
    }

    /// Buffer name given at construction.
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn next(&self, idx: usize) -> usize {
        (idx + 1) % self.slots
    }

    fn slot(&self, idx: usize) -> &[u8] {
        let start = idx * self.record_size;
        &self.storage[start..start + self.record_size]
    }

    fn slot_mut(&mut self, idx: usize) -> &mut [u8] {
        let start = idx * self.record_size;
        &mut self.storage[start..start + self.record_size]
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("name", &self.name)
            .field("capacity", &self.capacity())
            .field("record_size", &self.record_size)
            .field("read", &self.read)
            .field("write", &self.write)
            .finish()
    }
}
