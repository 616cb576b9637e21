//! # Dispatcher Module
//!
//! Looks up the handler named by the matched route, runs the middleware
//! chain around it and turns the handler's [`HandlerReply`](crate::response::HandlerReply)
//! into a [`HandlerResponse`].
//!
//! ## Request Flow
//!
//! 1. Router matches the incoming request to a route and its handler name
//! 2. Every middleware `before` hook sees the request; the first one that
//!    answers short-circuits the handler
//! 3. The handler runs with panic recovery and its reply is serialized
//! 4. Every middleware `after` hook sees (and may replace) the response
//!
//! ## Error Handling
//!
//! - Missing handlers yield `None`, which the service answers with 404
//! - Handler panics are caught and answered with a 500 in the
//!   `ErrorResponse` shape

mod core;

pub use self::core::{
    Dispatcher, Handler, HandlerRequest, HandlerResponse, HeaderVec, MAX_INLINE_HEADERS,
};
