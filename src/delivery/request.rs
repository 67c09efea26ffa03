//! Request envelope and response inspection.
//!
//! The collector speaks just enough HTTP/1.1 for one POST per record. The
//! response is not parsed; it is searched for the echoed record and for the
//! two status lines the collector is known to send.

/// Marker for an accepted record.
pub const STATUS_OK: &[u8] = b"200 OK";

/// Marker for a record the collector will never accept.
pub const STATUS_BAD_REQUEST: &[u8] = b"400 Bad Request";

/// Build the POST request carrying `body`.
///
/// ```
/// use telemetry_gateway::delivery::request::format_request;
///
/// let request = format_request("10.0.0.51", "/api/v1.0/measurement/", b"{}");
/// assert!(request.ends_with(b"Content-Length: 2\r\n\r\n{}\r\n\r\n"));
/// ```
pub fn format_request(host: &str, path: &str, body: &[u8]) -> Vec<u8> {
    let head = format!(
        "POST {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Content-Type: application/json; charset=utf-8\r\n\
         Content-Length: {}\r\n\r\n",
        body.len()
    );

    let mut request = Vec::with_capacity(head.len() + body.len() + 4);
    request.extend_from_slice(head.as_bytes());
    request.extend_from_slice(body);
    request.extend_from_slice(b"\r\n\r\n");
    request
}

/// What a response says about the record it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseCheck {
    /// The record content appears in the response.
    pub echoed: bool,
    /// `200 OK` appears in the response.
    pub ok: bool,
    /// `400 Bad Request` appears in the response.
    pub bad_request: bool,
}

impl ResponseCheck {
    /// Search `response` for `record` and the known status markers.
    pub fn inspect(response: &[u8], record: &[u8]) -> Self {
        Self {
            echoed: contains(response, record),
            ok: contains(response, STATUS_OK),
            bad_request: contains(response, STATUS_BAD_REQUEST),
        }
    }

    /// True when the record is settled, either confirmed or definitively rejected,
    /// and must not be sent again.
    pub fn resolves_record(&self) -> bool {
        self.echoed || self.bad_request
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}
