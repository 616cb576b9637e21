use super::request::{parse_request, ParsedRequest};
use super::response::write_handler_response;
use crate::dispatcher::{Dispatcher, HandlerRequest, HandlerResponse};
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::router::Router;
use crate::spec::Specification;
use http::Method;
use may_minihttp::{HttpService, Request, Response};
use serde_json::json;
use std::io;
use std::sync::Arc;
use tracing::{error, warn};

/// Path of the built-in liveness endpoint.
pub const HEALTH_PATH: &str = "/health";

/// The request pipeline: built-in endpoints, routing, dispatch.
///
/// Cheap to clone; `may_minihttp` clones it per connection.
#[derive(Clone)]
pub struct AppService {
    pub router: Arc<Router>,
    pub dispatcher: Arc<Dispatcher>,
    pub spec: Arc<Specification>,
    /// Path the merged specification is served on
    pub spec_endpoint: String,
}

impl AppService {
    #[must_use]
    pub fn new(
        router: Arc<Router>,
        dispatcher: Arc<Dispatcher>,
        spec: Arc<Specification>,
        spec_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            router,
            dispatcher,
            spec,
            spec_endpoint: spec_endpoint.into(),
        }
    }

    /// Answer one request.
    #[must_use]
    pub fn handle(&self, req: ParsedRequest) -> HandlerResponse {
        let request_id = RequestId::from_header_or_new(req.get_header(REQUEST_ID_HEADER));
        let mut resp = self.respond(req, request_id);
        resp.set_header(REQUEST_ID_HEADER, request_id.to_string());
        resp
    }

    fn respond(&self, req: ParsedRequest, request_id: RequestId) -> HandlerResponse {
        if req.method == Method::GET && req.path == HEALTH_PATH {
            return health_endpoint();
        }
        if req.method == Method::GET && req.path == self.spec_endpoint {
            return spec_endpoint(&self.spec, req.get_header("host"));
        }

        let Some(route_match) = self.router.route(&req.method, &req.path) else {
            if self.router.has_path(&req.path) {
                return HandlerResponse::error(
                    405,
                    &format!("Method {} not allowed on {}", req.method, req.path),
                );
            }
            return HandlerResponse::error(404, &format!("No route for {}", req.path));
        };

        let ParsedRequest {
            method,
            path,
            query_params,
            headers,
            body,
        } = req;
        let request = HandlerRequest {
            request_id,
            method,
            path,
            handler_name: route_match.handler_name,
            path_params: route_match.path_params,
            query_params,
            headers,
            body,
            operation: route_match.route.operation.clone(),
        };
        let handler_name = request.handler_name.clone();

        match self.dispatcher.dispatch(request) {
            Some(resp) => resp,
            None => {
                error!(
                    request_id = %request_id,
                    handler_name = %handler_name,
                    "Route has no registered handler"
                );
                HandlerResponse::error(500, "Internal Server Error")
            }
        }
    }
}

/// Liveness endpoint returning `{"status": "ok"}`.
#[must_use]
pub fn health_endpoint() -> HandlerResponse {
    HandlerResponse::json(200, &json!({ "status": "ok" }))
}

/// The merged specification as JSON, `host` set to the caller's host header.
#[must_use]
pub fn spec_endpoint(spec: &Specification, host: Option<&str>) -> HandlerResponse {
    let host = host.unwrap_or("localhost");
    HandlerResponse::json(200, &spec.with_host(host))
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let resp = match parse_request(req) {
            Ok(parsed) => self.handle(parsed),
            Err(e) => {
                warn!(error = %e, "Unparsable request");
                HandlerResponse::error(400, &e.to_string())
            }
        };
        write_handler_response(res, resp);
        Ok(())
    }
}
