//! # Swaggerware
//!
//! **Swaggerware** validates HTTP traffic against a Swagger 2.0 document that
//! is assembled from the documentation of the handlers themselves, and shapes
//! handler return values into the JSON the document promises.
//!
//! ## Overview
//!
//! Each route is registered with a path template, its methods, a handler
//! name and documentation text. Everything after a `---` line in that text
//! is a YAML Swagger operation. At startup the fragments are merged into a
//! base document (`info`, `definitions`, security definitions) to produce one
//! [`spec::Specification`]. From then on:
//!
//! - requests are checked before their handler runs; a non-conforming
//!   request is answered with a 400 and never reaches the handler
//! - handlers return a [`response::HandlerReply`]: a protobuf message, a
//!   model to shape by the response schema, or raw bytes
//! - responses are checked after the handler runs; a non-conforming
//!   response is replaced by a 500
//!
//! ## Architecture
//!
//! - **[`registry`]** - route registry: templates, methods, handler names, documentation
//! - **[`spec`]** - fragment parsing and merging into the specification
//! - **[`format`]** - format checkers, registered by name
//! - **[`schema`]** - schema validation with nullable support
//! - **[`validator_cache`]** - compiled validators shared across requests
//! - **[`validator`]** - request and response validation
//! - **[`transform`]** - shaping records by schema
//! - **[`response`]** - handler replies and their wire form
//! - **[`router`]** - path matching and parameter extraction
//! - **[`dispatcher`]** - handler table, middleware chain, panic recovery
//! - **[`middleware`]** - validation and tracing middleware
//! - **[`server`]** - the `may_minihttp` adapter and built-in endpoints
//! - **[`app`]** - wiring all of the above together
//! - **[`config`]**, **[`logging`]**, **[`cli`]** - the process around it
//! - **[`demo`]** - a small users and quiz API
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Service as AppService
//!     participant Router
//!     participant Dispatcher
//!     participant Swagger as SwaggerMiddleware
//!     participant Handler
//!
//!     Client->>Service: GET /api/v1/users/search?email=a@b.c
//!     Service->>Router: route(GET, path)
//!     alt No Route Match
//!         Router-->>Client: 404 / 405
//!     end
//!     Router-->>Service: RouteMatch (handler, params, operation)
//!     Service->>Dispatcher: dispatch(HandlerRequest)
//!     Dispatcher->>Swagger: before(request)
//!     alt Request Invalid
//!         Swagger-->>Client: 400 ErrorResponse
//!     end
//!     Dispatcher->>Handler: handler(request)
//!     Handler-->>Dispatcher: HandlerReply
//!     Dispatcher->>Dispatcher: shape model by response schema
//!     Dispatcher->>Swagger: after(request, response)
//!     alt Response Invalid
//!         Swagger->>Swagger: replace with 500 ErrorResponse
//!     end
//!     Dispatcher-->>Client: HTTP response
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use swaggerware::app::App;
//! use swaggerware::config::AppConfig;
//! use swaggerware::demo;
//! use swaggerware::server::HttpServer;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = AppConfig::default();
//! let registry = demo::registry(&config.spec.base_path);
//! let mut app = App::build(demo::base_document()?, &registry, &config)?;
//! demo::register_handlers(app.dispatcher_mut(), Arc::new(demo::Store::seeded()));
//!
//! let handle = HttpServer(app.into_service()).start("127.0.0.1:8080")?;
//! let _ = handle.join();
//! # Ok(())
//! # }
//! ```
//!
//! ## Runtime Considerations
//!
//! Requests are served by `may` coroutines, not tokio. Handlers run on the
//! coroutine of their connection, so they should use `may`'s blocking
//! facilities. The coroutine stack size is configurable (`server.stack_size`
//! or `SWAGGERWARE_STACK_SIZE`).

pub mod app;
pub mod cli;
pub mod config;
pub mod demo;
pub mod dispatcher;
pub mod format;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod registry;
pub mod response;
pub mod router;
pub mod schema;
pub mod server;
pub mod spec;
pub mod transform;
pub mod validator;
pub mod validator_cache;

pub use registry::{Route, RouteRegistry};
pub use response::{HandlerReply, Reply};
pub use spec::{build_spec, load_spec, OperationSpec, SpecError, SpecIssue, Specification};
pub use transform::{Record, RecordValue};
pub use validator::{ValidationError, Validator};
