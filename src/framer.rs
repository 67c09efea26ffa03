//! Streaming extractor for top-level JSON objects.
//!
//! The serial line carries JSON objects mixed with boot banners, partial lines
//! and other noise, and an object may be split across several reads. The
//! framer counts brace depth byte by byte and copies everything between the
//! outermost `{` and its matching `}` into a fixed-capacity assembly buffer.
//!
//! It is a framer, not a parser: string contents are not tracked, so a brace
//! inside a string value counts like any other brace.
//!
//! # Example
//!
//! ```
//! use telemetry_gateway::framer::JsonFramer;
//!
//! let mut framer = JsonFramer::new(2, 256);
//!
//! // Object split over two reads
//! let first = framer.extract(br#"boot ok {"data":{"#);
//! assert!(first.object.is_none());
//!
//! let second = framer.extract(br#""t":1}} trailing"#);
//! assert_eq!(second.object.as_deref(), Some(&br#"{"data":{"t":1}}"#[..]));
//! ```

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

/// Assembly status of the object currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyStatus {
    /// Waiting for an opening brace.
    Idle,
    /// Inside an object, copying bytes.
    Copying,
    /// The closing brace was seen; copy it and emit.
    CopyingThenStop,
    /// The object outgrew the assembly buffer; braces are still counted until
    /// it closes, nothing is copied or emitted.
    Discarding,
}

impl AssemblyStatus {
    fn is_copying(self) -> bool {
        matches!(self, AssemblyStatus::Copying | AssemblyStatus::CopyingThenStop)
    }
}

/// Result of one [`JsonFramer::extract`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// The completed object, if one finished during this call.
    pub object: Option<Bytes>,
    /// Number of input bytes scanned. Bytes past this point were not looked at.
    pub consumed: usize,
}

impl Extraction {
    fn pending(consumed: usize) -> Self {
        Self {
            object: None,
            consumed,
        }
    }
}

/// Brace-depth framer holding one incoming object at a time.
#[derive(Debug)]
pub struct JsonFramer {
    assembly: BytesMut,
    capacity: usize,
    depth: u32,
    expected_depth: u32,
    /// Set once the object has been nested `expected_depth` levels deep
    depth_reached: bool,
    status: AssemblyStatus,
}

impl JsonFramer {
    /// Create a framer.
    ///
    /// # Arguments
    /// * `expected_depth` - nesting level an object must reach to be accepted
    ///   (2 means the payload is wrapped at least one level deep)
    /// * `capacity` - largest object in bytes; longer objects are dropped whole
    pub fn new(expected_depth: u32, capacity: usize) -> Self {
        Self {
            assembly: BytesMut::with_capacity(capacity),
            capacity,
            depth: 0,
            expected_depth,
            depth_reached: false,
            status: AssemblyStatus::Idle,
        }
    }

    /// Scan `chunk` until one object completes, the chunk ends, or framing fails.
    ///
    /// A zero byte is treated as the end of the chunk. State carries over
    /// between calls, so an object split over several chunks is reassembled.
    /// At most one object is returned per call; `consumed` tells the caller
    /// where scanning stopped.
    pub fn extract(&mut self, chunk: &[u8]) -> Extraction {
        for (i, &byte) in chunk.iter().enumerate() {
            match byte {
                b'{' => {
                    self.depth += 1;
                    if self.depth == 1 {
                        self.assembly.clear();
                        self.depth_reached = false;
                        self.status = AssemblyStatus::Copying;
                    }
                    if self.depth == self.expected_depth {
                        self.depth_reached = true;
                    }
                }
                b'}' => {
                    if self.depth == 0 {
                        debug!("stray closing brace, nothing in flight");
                        self.reset();
                        return Extraction::pending(i + 1);
                    }
                    self.depth -= 1;
                    if self.depth == 0 {
                        if self.status == AssemblyStatus::Discarding {
                            debug!("end of oversize object reached");
                            self.reset();
                            return Extraction::pending(i + 1);
                        }
                        if !self.depth_reached {
                            debug!(
                                expected_depth = self.expected_depth,
                                "object closed before reaching expected depth, dropped"
                            );
                            self.reset();
                            return Extraction::pending(i + 1);
                        }
                        self.status = AssemblyStatus::CopyingThenStop;
                    }
                }
                0 => return Extraction::pending(i),
                _ => {}
            }

            if self.status.is_copying() {
                if self.assembly.len() >= self.capacity {
                    warn!(
                        capacity = self.capacity,
                        "incoming object too long, assembly buffer full, dropped"
                    );
                    self.assembly.clear();
                    if self.depth == 0 {
                        // The overflowing byte was the closing brace
                        self.reset();
                        return Extraction::pending(i + 1);
                    }
                    self.status = AssemblyStatus::Discarding;
                    continue;
                }
                self.assembly.extend_from_slice(&[byte]);
            }

            if self.status == AssemblyStatus::CopyingThenStop {
                let object = self.assembly.split().freeze();
                self.status = AssemblyStatus::Idle;
                debug!(len = object.len(), "object framed");
                return Extraction {
                    object: Some(object),
                    consumed: i + 1,
                };
            }
        }

        Extraction::pending(chunk.len())
    }

    /// Drop whatever is in flight and return to idle.
    pub fn reset(&mut self) {
        self.assembly.clear();
        self.depth = 0;
        self.depth_reached = false;
        self.status = AssemblyStatus::Idle;
    }

    /// Current assembly status.
    pub fn status(&self) -> AssemblyStatus {
        self.status
    }

    /// Current nesting depth.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Bytes accumulated for the object in flight.
    pub fn buffered(&self) -> usize {
        self.assembly.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framer() -> JsonFramer {
        JsonFramer::new(2, 64)
    }

    #[test]
    fn test_extracts_object_between_noise() {
        let mut f = framer();
        let input = br#"noise{"a":{"b":1}}more"#;
        let out = f.extract(input);
        assert_eq!(out.object.as_deref(), Some(&br#"{"a":{"b":1}}"#[..]));
        assert_eq!(&input[out.consumed..], b"more");
        assert_eq!(f.status(), AssemblyStatus::Idle);

        // The tail holds no further object
        assert_eq!(f.extract(&input[out.consumed..]).object, None);
    }

    #[test]
    fn test_stray_close_brace_resets() {
        let mut f = framer();
        let out = f.extract(b"}");
        assert_eq!(out.object, None);
        assert_eq!(out.consumed, 1);
        assert_eq!(f.status(), AssemblyStatus::Idle);
        assert_eq!(f.depth(), 0);
    }

    #[test]
    fn test_split_object_is_reassembled() {
        let mut f = framer();
        let first = f.extract(br#"{"a":{"#);
        assert_eq!(first.object, None);
        assert_eq!(f.status(), AssemblyStatus::Copying);

        let second = f.extract(br#""b":2}}"#);
        assert_eq!(second.object.as_deref(), Some(&br#"{"a":{"b":2}}"#[..]));
    }

    #[test]
    fn test_oversize_object_is_dropped() {
        let mut f = JsonFramer::new(2, 16);
        let out = f.extract(br#"{"a":{"b":"0123456789abcdef"}}"#);
        assert_eq!(out.object, None);
        assert_eq!(f.status(), AssemblyStatus::Idle);
    }

    #[test]
    fn test_oversize_object_with_nested_tail_emits_nothing() {
        let input = br#"{"a":"0123456789abcdef","c":{"d":{"e":1}}}"#;
        let mut f = JsonFramer::new(2, 16);

        let mut offset = 0;
        let mut emitted = Vec::new();
        while offset < input.len() {
            let out = f.extract(&input[offset..]);
            offset += out.consumed.max(1);
            emitted.extend(out.object);
        }
        assert!(emitted.is_empty(), "fragment emitted: {emitted:?}");
        assert_eq!(f.status(), AssemblyStatus::Idle);
        assert_eq!(f.depth(), 0);
    }

    #[test]
    fn test_oversize_object_split_over_chunks_is_skipped() {
        let mut f = JsonFramer::new(2, 16);
        assert_eq!(f.extract(br#"{"a":"0123456789abcdef","#).object, None);
        assert_eq!(f.status(), AssemblyStatus::Discarding);

        let out = f.extract(br#""c":{"d":1}}{"x":{"y":2}}"#);
        assert_eq!(out.object, None);
        assert_eq!(f.status(), AssemblyStatus::Idle);

        // The next whole object after the oversize one is framed normally
        let tail = &br#""c":{"d":1}}{"x":{"y":2}}"#[out.consumed..];
        assert_eq!(
            f.extract(tail).object.as_deref(),
            Some(&br#"{"x":{"y":2}}"#[..])
        );
    }

    #[test]
    fn test_overflow_on_closing_brace_drops_object() {
        let object = br#"{"a":{"b":1}}"#;
        let mut f = JsonFramer::new(2, object.len() - 1);
        let out = f.extract(object);
        assert_eq!(out.object, None);
        assert_eq!(out.consumed, object.len());
        assert_eq!(f.status(), AssemblyStatus::Idle);
    }

    #[test]
    fn test_object_of_exact_capacity_is_kept() {
        let object = br#"{"a":{"b":1}}"#;
        let mut f = JsonFramer::new(2, object.len());
        assert_eq!(f.extract(object).object.as_deref(), Some(&object[..]));
    }

    #[test]
    fn test_shallow_object_is_dropped() {
        let mut f = framer();
        let out = f.extract(br#"{"a":1}{"b":{"c":2}}"#);
        assert_eq!(out.object, None);
        assert_eq!(out.consumed, 7);

        // Next object in the same chunk is still found from the tail
        let rest = &br#"{"a":1}{"b":{"c":2}}"#[out.consumed..];
        assert_eq!(
            f.extract(rest).object.as_deref(),
            Some(&br#"{"b":{"c":2}}"#[..])
        );
    }

    #[test]
    fn test_depth_one_accepts_flat_objects() {
        let mut f = JsonFramer::new(1, 64);
        assert_eq!(
            f.extract(br#"{"sensor":1}"#).object.as_deref(),
            Some(&br#"{"sensor":1}"#[..])
        );
    }

    #[test]
    fn test_zero_byte_stops_scan_and_keeps_state() {
        let mut f = framer();
        let out = f.extract(b"{\"a\":{\0\0\0");
        assert_eq!(out.object, None);
        assert_eq!(out.consumed, 6);
        assert_eq!(f.depth(), 2);
        assert_eq!(
            f.extract(b"}}").object.as_deref(),
            Some(&b"{\"a\":{}}"[..])
        );
    }

    #[test]
    fn test_one_object_per_call() {
        let mut f = framer();
        let input = br#"{"a":{}}{"b":{}}"#;
        let first = f.extract(input);
        assert_eq!(first.object.as_deref(), Some(&br#"{"a":{}}"#[..]));
        let second = f.extract(&input[first.consumed..]);
        assert_eq!(second.object.as_deref(), Some(&br#"{"b":{}}"#[..]));
    }

    #[test]
    fn test_recovers_after_overflow() {
        let mut f = JsonFramer::new(2, 12);
        assert_eq!(f.extract(br#"{"a":{"b":"long string"}}"#).object, None);
        f.reset();
        assert_eq!(
            f.extract(br#"{"a":{}}"#).object.as_deref(),
            Some(&br#"{"a":{}}"#[..])
        );
    }
}
