//! UTC receipt timestamps for framed records.
//!
//! Each completed object gets a `"timestamp"` field spliced in right after its
//! opening brace, so the gateway's receipt time stays separate from any time
//! the measuring station put into the payload itself.

use chrono::{DateTime, Utc};

/// ISO 8601, second resolution, always UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Bytes reserved in a record slot for the injected field.
///
/// The field is 35 bytes for four-digit years; the reserve leaves headroom.
pub const TIMESTAMP_FIELD_RESERVE: usize = 64;

/// Format a UTC time the way it appears in records and logs.
pub fn format_utc(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Current UTC time, formatted.
pub fn now_utc() -> String {
    format_utc(Utc::now())
}

/// Splice `"timestamp":"<stamp>"` in after the opening brace of `object`.
///
/// `object` must start with `{`, which the framer guarantees. An empty object
/// gets no trailing comma.
///
/// ```
/// use telemetry_gateway::timestamp::inject_timestamp;
///
/// let stamped = inject_timestamp(b"{\"a\":1}", "2024-01-01T00:00:00Z");
/// assert_eq!(stamped, b"{\"timestamp\":\"2024-01-01T00:00:00Z\",\"a\":1}");
/// ```
pub fn inject_timestamp(object: &[u8], stamp: &str) -> Vec<u8> {
    let body = object.strip_prefix(b"{").unwrap_or(object);
    let empty_body = body
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .map_or(true, |&b| b == b'}');

    let mut stamped = Vec::with_capacity(object.len() + stamp.len() + 16);
    stamped.extend_from_slice(b"{\"timestamp\":\"");
    stamped.extend_from_slice(stamp.as_bytes());
    stamped.push(b'"');
    if !empty_body {
        stamped.push(b',');
    }
    stamped.extend_from_slice(body);
    stamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_utc() {
        let t = Utc.with_ymd_and_hms(2019, 3, 7, 14, 5, 9).unwrap();
        assert_eq!(format_utc(t), "2019-03-07T14:05:09Z");
    }

    #[test]
    fn test_field_fits_reserve() {
        let field = format!("\"timestamp\":\"{}\",", now_utc());
        assert!(field.len() <= TIMESTAMP_FIELD_RESERVE);
    }

    #[test]
    fn test_inject_keeps_nested_body() {
        let stamped = inject_timestamp(br#"{"data":{"t":21.5}}"#, "2019-03-07T14:05:09Z");
        assert_eq!(
            stamped,
            br#"{"timestamp":"2019-03-07T14:05:09Z","data":{"t":21.5}}"#.to_vec()
        );
        let parsed: serde_json::Value = serde_json::from_slice(&stamped).unwrap();
        assert_eq!(parsed["data"]["t"], 21.5);
    }

    #[test]
    fn test_inject_into_empty_object() {
        let stamped = inject_timestamp(b"{ }", "2019-03-07T14:05:09Z");
        assert_eq!(stamped, br#"{"timestamp":"2019-03-07T14:05:09Z" }"#.to_vec());
        assert!(serde_json::from_slice::<serde_json::Value>(&stamped).is_ok());
    }
}
