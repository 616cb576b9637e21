use crate::registry::RouteRegistry;
use crate::spec::{OperationSpec, Specification};
use http::Method;
use regex::Regex;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, info};

/// Maximum number of path/query parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Parameter storage for the hot path.
///
/// Param names are `Arc<str>` shared with the route table; values are
/// per-request strings.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// One servable (method, template) pair.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub method: Method,
    /// Full template as registered, placeholders written `{name}`
    pub template: String,
    pub handler_name: String,
    /// Operation spec of the handler, when its documentation carries one
    pub operation: Option<Arc<OperationSpec>>,
}

/// Result of successfully matching a request path to a route
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<RouteEntry>,
    /// Path parameters extracted from the URL, percent-decoded
    pub path_params: ParamVec,
    pub handler_name: String,
}

impl RouteMatch {
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
}

struct CompiledRoute {
    entry: Arc<RouteEntry>,
    regex: Regex,
    param_names: Vec<Arc<str>>,
}

/// Matches HTTP requests to handlers by method and path template.
///
/// Routes with fewer placeholders are tried first, so `/users/me` wins over
/// `/users/{id}`.
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.routes
                    .iter()
                    .map(|r| format!("{} {}", r.entry.method, r.entry.template)),
            )
            .finish()
    }
}

impl Router {
    /// Build the routing table for every method of every registered route.
    pub fn new(registry: &RouteRegistry, spec: &Specification) -> Result<Self, regex::Error> {
        let mut routes = Vec::new();
        for route in registry.iter() {
            let template = route.template();
            let operation = spec.operation(&route.handler_name);
            for method in &route.methods {
                let (regex, param_names) = Self::path_to_regex(&template)?;
                routes.push(CompiledRoute {
                    entry: Arc::new(RouteEntry {
                        method: method.clone(),
                        template: template.clone(),
                        handler_name: route.handler_name.clone(),
                        operation: operation.clone(),
                    }),
                    regex,
                    param_names,
                });
            }
        }
        routes.sort_by(|a, b| {
            a.param_names
                .len()
                .cmp(&b.param_names.len())
                .then_with(|| b.entry.template.len().cmp(&a.entry.template.len()))
        });
        info!(routes = routes.len(), "Routing table built");
        Ok(Self { routes })
    }

    /// Find the route serving `method` on `path`.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        for compiled in &self.routes {
            if compiled.entry.method != *method {
                continue;
            }
            let Some(captures) = compiled.regex.captures(path) else {
                continue;
            };
            let mut path_params = ParamVec::new();
            for (i, name) in compiled.param_names.iter().enumerate() {
                if let Some(raw) = captures.get(i + 1) {
                    let value = urlencoding::decode(raw.as_str())
                        .map_or_else(|_| raw.as_str().to_string(), |v| v.into_owned());
                    path_params.push((Arc::clone(name), value));
                }
            }
            debug!(
                handler_name = %compiled.entry.handler_name,
                template = %compiled.entry.template,
                "Route matched"
            );
            return Some(RouteMatch {
                route: Arc::clone(&compiled.entry),
                path_params,
                handler_name: compiled.entry.handler_name.clone(),
            });
        }
        None
    }

    /// Whether any method serves `path`; used to tell 405 from 404.
    #[must_use]
    pub fn has_path(&self, path: &str) -> bool {
        self.routes.iter().any(|r| r.regex.is_match(path))
    }

    pub(crate) fn path_to_regex(path: &str) -> Result<(Regex, Vec<Arc<str>>), regex::Error> {
        if path == "/" {
            return Ok((Regex::new(r"^/$")?, Vec::new()));
        }

        let mut pattern = String::with_capacity(path.len() + 8);
        pattern.push('^');
        let mut param_names = Vec::with_capacity(path.matches('{').count());

        for segment in path.split('/') {
            if segment.starts_with('{') && segment.ends_with('}') {
                let param_name = segment.trim_start_matches('{').trim_end_matches('}');
                pattern.push_str("/([^/]+)");
                param_names.push(Arc::from(param_name));
            } else if !segment.is_empty() {
                pattern.push('/');
                pattern.push_str(&regex::escape(segment));
            }
        }

        pattern.push_str("/?$");
        Ok((Regex::new(&pattern)?, param_names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Route;
    use crate::spec::build_spec;
    use serde_json::json;

    fn router() -> Router {
        let mut registry = RouteRegistry::new();
        registry.add(Route::new(Method::GET, "/api/v1/users/<id>", "get_user"));
        registry.add(Route::new(Method::GET, "/api/v1/users/me", "me"));
        registry.add(Route::new(Method::GET, "/api/v1/users", "list_users").method(Method::POST));
        let spec = build_spec(json!({}), &registry, "/api/v1").unwrap();
        Router::new(&registry, &spec).unwrap()
    }

    #[test]
    fn test_literal_beats_placeholder() {
        let r = router();
        assert_eq!(r.route(&Method::GET, "/api/v1/users/me").unwrap().handler_name, "me");
        let m = r.route(&Method::GET, "/api/v1/users/42").unwrap();
        assert_eq!(m.handler_name, "get_user");
        assert_eq!(m.get_path_param("id"), Some("42"));
    }

    #[test]
    fn test_path_params_decoded() {
        let r = router();
        let m = r.route(&Method::GET, "/api/v1/users/a%40b.com").unwrap();
        assert_eq!(m.get_path_param("id"), Some("a@b.com"));
    }

    #[test]
    fn test_method_mismatch() {
        let r = router();
        assert!(r.route(&Method::DELETE, "/api/v1/users").is_none());
        assert!(r.has_path("/api/v1/users"));
        assert!(r.route(&Method::POST, "/api/v1/users").is_some());
        assert!(!r.has_path("/nope"));
    }

    #[test]
    fn test_path_to_regex() {
        let (re, names) = Router::path_to_regex("/a.b/{x}/c").unwrap();
        assert!(re.is_match("/a.b/1/c"));
        assert!(!re.is_match("/aXb/1/c"));
        assert_eq!(names, vec![Arc::<str>::from("x")]);
    }
}
