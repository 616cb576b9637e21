//! # Router Module
//!
//! Regex-based path matching. At startup each registered route template
//! (`/users/<id>` or `/users/{id}`) is compiled into a regex that captures
//! its placeholders; each request is then tested against the compiled
//! patterns until one matches, yielding the handler name, the extracted
//! path parameters and the handler's operation spec.
//!
//! ```rust
//! use swaggerware::registry::{Route, RouteRegistry};
//! use swaggerware::router::Router;
//! use swaggerware::spec::build_spec;
//! use http::Method;
//! use serde_json::json;
//!
//! let mut registry = RouteRegistry::new();
//! registry.add(Route::new(Method::GET, "/pets/<id>", "get_pet"));
//! let spec = build_spec(json!({}), &registry, "").unwrap();
//! let router = Router::new(&registry, &spec).unwrap();
//!
//! let matched = router.route(&Method::GET, "/pets/123").unwrap();
//! assert_eq!(matched.handler_name, "get_pet");
//! assert_eq!(matched.get_path_param("id"), Some("123"));
//! ```

mod core;

pub use self::core::{ParamVec, RouteEntry, RouteMatch, Router, MAX_INLINE_PARAMS};
