//! HTTP adapter on `may_minihttp`.
//!
//! [`AppService`] holds the whole pipeline. Its [`AppService::handle`] works
//! on a [`ParsedRequest`] and returns a
//! [`HandlerResponse`](crate::dispatcher::HandlerResponse), so the pipeline
//! can be driven without a socket; the `HttpService` impl only converts to
//! and from the wire types.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_query_params, parse_request, ParsedRequest};
pub use service::{health_endpoint, spec_endpoint, AppService, HEALTH_PATH};
