use crate::ids::RequestId;
use crate::middleware::Middleware;
use crate::response::{build_response, HandlerReply, JSON_CONTENT_TYPE};
use crate::router::ParamVec;
use crate::spec::{OperationSpec, Specification};
use http::{Method, StatusCode};
use serde_json::{json, Value};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Maximum inline headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header storage; names are `Arc<str>` since the same few names repeat on
/// every request.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// A registered handler.
pub type Handler = Arc<dyn Fn(&HandlerRequest) -> HandlerReply + Send + Sync>;

/// Request data passed to a handler
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    /// Unique request ID for tracing and correlation
    pub request_id: RequestId,
    pub method: Method,
    /// Request path as received
    pub path: String,
    /// Name of the handler that should process this request
    pub handler_name: String,
    /// Path parameters extracted from the URL
    pub path_params: ParamVec,
    /// Query string parameters, decoded, in request order
    pub query_params: ParamVec,
    pub headers: HeaderVec,
    /// Raw request body
    pub body: Vec<u8>,
    /// The operation spec of the matched route, when it documents one
    pub operation: Option<Arc<OperationSpec>>,
}

impl HandlerRequest {
    /// Get a path parameter by name
    ///
    /// Uses "last write wins" semantics when a name repeats.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name
    ///
    /// Uses "last write wins" semantics: `?limit=10&limit=20` yields `20`.
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The body parsed as JSON; an empty body reads as `null`.
    pub fn json_body(&self) -> Result<Value, serde_json::Error> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body)
    }

    /// Decode the body as a protobuf message.
    pub fn protobuf<M>(&self) -> Result<M, prost::DecodeError>
    where
        M: prost::Message + Default,
    {
        M::decode(self.body.as_slice())
    }
}

/// Response data produced for one request
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    pub headers: HeaderVec,
    /// Serialized body
    pub body: Vec<u8>,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body,
        }
    }

    /// Create a JSON response
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string().into_bytes()).with_content_type(JSON_CONTENT_TYPE)
    }

    /// Create an error response in the shared `ErrorResponse` shape:
    /// `{"code": 400, "name": "Bad Request", "description": "..."}`.
    #[must_use]
    pub fn error(status: u16, description: &str) -> Self {
        let name = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Error");
        Self::json(
            status,
            &json!({
                "code": status,
                "name": name,
                "description": description,
            }),
        )
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.set_header("content-type", content_type.to_string());
        self
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// The body parsed as JSON.
    pub fn json_body(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Routes requests to registered handlers through the middleware chain
///
/// Handlers run on the calling coroutine; `may_minihttp` already gives each
/// connection its own. A handler panic is caught and answered with a 500.
#[derive(Clone)]
pub struct Dispatcher {
    spec: Arc<Specification>,
    /// Map of handler names to handlers
    pub handlers: HashMap<String, Handler>,
    /// Ordered list of middleware to apply to requests/responses
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl Dispatcher {
    /// Create a dispatcher with no handlers over `spec`.
    #[must_use]
    pub fn new(spec: Arc<Specification>) -> Self {
        Dispatcher {
            spec,
            handlers: HashMap::new(),
            middlewares: Vec::new(),
        }
    }

    #[must_use]
    pub fn spec(&self) -> &Arc<Specification> {
        &self.spec
    }

    /// Register `handler` under `name`, replacing any previous handler.
    pub fn register_handler<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&HandlerRequest) -> HandlerReply + Send + Sync + 'static,
    {
        if self
            .handlers
            .insert(name.to_string(), Arc::new(handler))
            .is_some()
        {
            warn!(handler_name = %name, "Replaced existing handler");
        }
        info!(
            handler_name = %name,
            total_handlers = self.handlers.len(),
            "Handler registered successfully"
        );
    }

    /// Add middleware to the processing pipeline
    ///
    /// `before` hooks run in insertion order; the first to answer stops the
    /// handler from running. `after` hooks run in insertion order over
    /// every response.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    fn run_handler(&self, handler: &Handler, request: &HandlerRequest) -> HandlerResponse {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(request)));
        match outcome {
            Ok(reply) => build_response(reply, request.operation.as_deref(), &self.spec),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    request_id = %request.request_id,
                    handler_name = %request.handler_name,
                    panic_message = %message,
                    "Handler panicked - CRITICAL"
                );
                HandlerResponse::error(500, "Internal Server Error")
            }
        }
    }

    /// Dispatch a request to its handler
    ///
    /// Returns `None` if no handler is registered under the request's
    /// handler name.
    #[must_use]
    pub fn dispatch(&self, request: HandlerRequest) -> Option<HandlerResponse> {
        let Some(handler) = self.handlers.get(&request.handler_name) else {
            let available_handlers: Vec<&String> = self.handlers.keys().collect();
            error!(
                handler_name = %request.handler_name,
                available_handlers = ?available_handlers,
                "Handler not found - CRITICAL"
            );
            return None;
        };

        let mut early_resp: Option<HandlerResponse> = None;
        for (idx, mw) in self.middlewares.iter().enumerate() {
            early_resp = mw.before(&request);
            if early_resp.is_some() {
                debug!(
                    request_id = %request.request_id,
                    middleware_idx = idx,
                    "Middleware returned early response"
                );
                break;
            }
        }

        let (mut resp, latency) = match early_resp {
            Some(r) => (r, Duration::ZERO),
            None => {
                debug!(
                    request_id = %request.request_id,
                    handler_name = %request.handler_name,
                    method = %request.method,
                    path = %request.path,
                    "Request dispatched to handler"
                );
                let start = Instant::now();
                let resp = self.run_handler(handler, &request);
                (resp, start.elapsed())
            }
        };

        for mw in &self.middlewares {
            mw.after(&request, &mut resp, latency);
        }

        Some(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RouteRegistry;
    use crate::spec::build_spec;

    fn request(handler_name: &str) -> HandlerRequest {
        HandlerRequest {
            request_id: RequestId::new(),
            method: Method::GET,
            path: "/x".to_string(),
            handler_name: handler_name.to_string(),
            path_params: ParamVec::new(),
            query_params: ParamVec::new(),
            headers: HeaderVec::new(),
            body: Vec::new(),
            operation: None,
        }
    }

    fn dispatcher() -> Dispatcher {
        let spec = build_spec(json!({}), &RouteRegistry::new(), "").unwrap();
        Dispatcher::new(Arc::new(spec))
    }

    #[test]
    fn test_error_body_shape() {
        let resp = HandlerResponse::error(400, "Missing request-body");
        assert_eq!(
            resp.json_body().unwrap(),
            json!({"code": 400, "name": "Bad Request", "description": "Missing request-body"})
        );
        assert_eq!(resp.get_header("Content-Type"), Some(JSON_CONTENT_TYPE));
    }

    #[test]
    fn test_unknown_handler() {
        assert!(dispatcher().dispatch(request("missing")).is_none());
    }

    #[test]
    fn test_panic_becomes_500() {
        let mut d = dispatcher();
        d.register_handler("boom", |_req: &HandlerRequest| -> HandlerReply { panic!("boom") });
        let resp = d.dispatch(request("boom")).unwrap();
        assert_eq!(resp.status, 500);
    }

    #[test]
    fn test_query_param_last_wins() {
        let mut req = request("x");
        req.query_params.push((Arc::from("limit"), "10".to_string()));
        req.query_params.push((Arc::from("limit"), "20".to_string()));
        assert_eq!(req.get_query_param("limit"), Some("20"));
    }

    #[test]
    fn test_empty_body_is_null() {
        let mut req = request("x");
        assert_eq!(req.json_body().unwrap(), Value::Null);
        req.body = b"{\"a\":1}".to_vec();
        assert_eq!(req.json_body().unwrap(), json!({"a": 1}));
    }
}
