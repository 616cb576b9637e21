use crate::dispatcher::HeaderVec;
use crate::router::ParamVec;
use http::Method;
use may_minihttp::Request;
use std::io::{self, Read};
use std::sync::Arc;
use tracing::{debug, info};

/// HTTP request data used by `AppService`, independent of the wire library.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    pub method: Method,
    /// Request path without the query string
    pub path: String,
    /// Decoded query parameters in request order
    pub query_params: ParamVec,
    /// HTTP headers (lowercase names)
    pub headers: HeaderVec,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl ParsedRequest {
    /// A request for `target`, which may carry a query string.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method,
            path: path.to_string(),
            query_params: parse_query_params(query),
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.to_string()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// A JSON body with its content type.
    #[must_use]
    pub fn json(self, body: &serde_json::Value) -> Self {
        self.header("content-type", "application/json")
            .body(body.to_string())
    }

    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn split_target(target: &str) -> (&str, &str) {
    match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    }
}

/// Parse a query string (without the leading `?`), URL-decoding names and
/// values. Repeated names are all kept, in order.
#[must_use]
pub fn parse_query_params(query: &str) -> ParamVec {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
        .collect()
}

/// Extract everything the pipeline needs from a `may_minihttp::Request`.
pub fn parse_request(req: Request) -> io::Result<ParsedRequest> {
    let method = Method::from_bytes(req.method().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let (path, query) = split_target(req.path());
    let path = path.to_string();
    let query_params = parse_query_params(query);

    let headers: HeaderVec = req
        .headers()
        .iter()
        .map(|h| {
            (
                Arc::from(h.name.to_ascii_lowercase()),
                String::from_utf8_lossy(h.value).into_owned(),
            )
        })
        .collect();
    debug!(
        header_count = headers.len(),
        param_count = query_params.len(),
        "Headers and query params extracted"
    );

    let mut body = Vec::new();
    req.body().read_to_end(&mut body)?;

    info!(
        method = %method,
        path = %path,
        body_size_bytes = body.len(),
        "HTTP request parsed"
    );

    Ok(ParsedRequest {
        method,
        path,
        query_params,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_params() {
        let q = parse_query_params("x=1&y=a%20b&x=2");
        assert_eq!(q.len(), 3);
        assert_eq!(q[1].1, "a b");
        assert_eq!(q[2], (Arc::from("x"), "2".to_string()));
    }

    #[test]
    fn test_new_splits_target() {
        let req = ParsedRequest::new(Method::GET, "/users?email=a%40b.c").header("Host", "h");
        assert_eq!(req.path, "/users");
        assert_eq!(req.query_params[0].1, "a@b.c");
        assert_eq!(req.get_header("host"), Some("h"));
    }
}
