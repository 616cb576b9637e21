use crate::dispatcher::HandlerResponse;
use crate::ids::REQUEST_ID_HEADER;
use crate::response::{JSON_CONTENT_TYPE, PROTOBUF_CONTENT_TYPE};
use http::StatusCode;
use may_minihttp::Response;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// `may_minihttp` keeps at most this many headers per response.
pub const MAX_RESPONSE_HEADERS: usize = 16;

/// Upper bound on leaked header lines for the life of the process.
pub const MAX_INTERNED_HEADER_LINES: usize = 64;

const FALLBACK_CONTENT_TYPE: &str = "Content-Type: application/octet-stream";

/// Header lines outside the built-in set, leaked once each since
/// `may_minihttp` only accepts `&'static str` headers.
static HEADER_LINES: Lazy<Mutex<HashSet<&'static str>>> =
    Lazy::new(|| Mutex::new(HashSet::new()));

fn status_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

fn static_line(name: &str, value: &str) -> Option<&'static str> {
    if !name.eq_ignore_ascii_case("content-type") {
        return None;
    }
    match value {
        JSON_CONTENT_TYPE => Some("Content-Type: application/json"),
        PROTOBUF_CONTENT_TYPE => Some("Content-Type: application/x-protobuf"),
        "text/plain" => Some("Content-Type: text/plain"),
        "text/plain; charset=utf-8" => Some("Content-Type: text/plain; charset=utf-8"),
        _ => None,
    }
}

/// The `&'static str` form of a header, or `None` once the intern table is
/// full. A full table still yields a content type, the octet-stream one.
fn header_line(name: &str, value: &str) -> Option<&'static str> {
    if let Some(line) = static_line(name, value) {
        return Some(line);
    }
    let line = format!("{name}: {value}");
    let mut lines = HEADER_LINES.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = lines.get(line.as_str()) {
        return Some(*existing);
    }
    if lines.len() >= MAX_INTERNED_HEADER_LINES {
        warn!(
            header = %name,
            value = %value,
            "Header line table full, header not written as given"
        );
        return name
            .eq_ignore_ascii_case("content-type")
            .then_some(FALLBACK_CONTENT_TYPE);
    }
    let leaked: &'static str = Box::leak(line.into_boxed_str());
    lines.insert(leaked);
    Some(leaked)
}

/// The header lines written for `resp`.
///
/// `x-request-id` is left out: its value differs on every request and
/// interned lines live for the whole process. The id is in the request logs.
#[must_use]
pub fn wire_header_lines(resp: &HandlerResponse) -> Vec<&'static str> {
    resp.headers
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case(REQUEST_ID_HEADER))
        .filter_map(|(name, value)| header_line(name, value))
        .take(MAX_RESPONSE_HEADERS)
        .collect()
}

/// Write a pipeline response onto the wire.
pub fn write_handler_response(res: &mut Response, resp: HandlerResponse) {
    res.status_code(usize::from(resp.status), status_reason(resp.status));
    for line in wire_header_lines(&resp) {
        res.header(line);
    }
    res.body_vec(resp.body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RequestId;
    use std::sync::Arc;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(799), "Unknown");
    }

    #[test]
    fn test_header_lines_interned() {
        assert_eq!(
            header_line("content-type", JSON_CONTENT_TYPE),
            Some("Content-Type: application/json")
        );
        let a = header_line("content-type", "text/csv").unwrap();
        let b = header_line("content-type", "text/csv").unwrap();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_request_id_not_written() {
        let mut resp = HandlerResponse::json(200, &serde_json::json!({}));
        resp.set_header(REQUEST_ID_HEADER, RequestId::new().to_string());
        assert_eq!(wire_header_lines(&resp), vec!["Content-Type: application/json"]);
    }

    #[test]
    fn test_intern_table_bounded() {
        for i in 0..MAX_INTERNED_HEADER_LINES + 8 {
            let value = format!("multipart/mixed; boundary=b{i}");
            let line = header_line("content-type", &value).unwrap();
            assert!(
                line.starts_with("content-type: multipart/mixed") || line == FALLBACK_CONTENT_TYPE,
                "{line}"
            );
            let _ = header_line("x-trace", &format!("t{i}"));
        }
        let lines = HEADER_LINES.lock().unwrap_or_else(PoisonError::into_inner);
        assert!(lines.len() <= MAX_INTERNED_HEADER_LINES);
    }

    #[test]
    fn test_header_count_capped() {
        let mut resp = HandlerResponse::new(200, Vec::new());
        for _ in 0..MAX_RESPONSE_HEADERS + 4 {
            resp.headers
                .push((Arc::from("content-type"), "text/plain".to_string()));
        }
        assert_eq!(wire_header_lines(&resp).len(), MAX_RESPONSE_HEADERS);
    }
}
