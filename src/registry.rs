//! Route registry
//!
//! The table the specification is built from: one [`Route`] per URL template,
//! naming the handler that serves it and carrying the handler's documentation
//! text. Documentation may embed a Swagger operation fragment after a `---`
//! line; routes without one are served but never validated.
//!
//! ```rust
//! use swaggerware::registry::{Route, RouteRegistry};
//! use http::Method;
//!
//! const GET_USER_DOC: &str = "Return one user.\n---\nresponses:\n  200:\n    description: ok\n";
//!
//! let mut registry = RouteRegistry::new();
//! registry.add(Route::new(Method::GET, "/api/v1/users/<id>", "get_user").doc(GET_USER_DOC));
//! assert_eq!(registry.len(), 1);
//! ```

use http::Method;

#[derive(Debug, Clone)]
pub struct Route {
    /// URL template; placeholders may be written `<name>`, `<int:name>` or `{name}`
    pub path: String,
    pub methods: Vec<Method>,
    pub handler_name: String,
    pub doc: Option<String>,
    pub requires_auth: bool,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>, handler_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            methods: vec![method],
            handler_name: handler_name.into(),
            doc: None,
            requires_auth: false,
        }
    }

    /// Serve an additional method with the same handler.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }

    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Flag the route as authenticated; its operation spec gains a 401 entry.
    #[must_use]
    pub fn requires_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// The template with every placeholder written `{name}`.
    #[must_use]
    pub fn template(&self) -> String {
        normalize_template(&self.path)
    }
}

/// Rewrite `<name>` and `<converter:name>` placeholders as `{name}`.
#[must_use]
pub fn normalize_template(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        match rest[start..].find('>') {
            Some(end) => {
                let inner = &rest[start + 1..start + end];
                let name = inner.rsplit(':').next().unwrap_or(inner);
                out.push('{');
                out.push_str(name);
                out.push('}');
                rest = &rest[start + end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Ordered collection of routes.
#[derive(Debug, Clone, Default)]
pub struct RouteRegistry {
    routes: Vec<Route>,
}

impl RouteRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, route: Route) -> &mut Self {
        self.routes.push(route);
        self
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_template() {
        assert_eq!(normalize_template("/users/<id>"), "/users/{id}");
        assert_eq!(normalize_template("/users/<int:id>/days"), "/users/{id}/days");
        assert_eq!(normalize_template("/users/{id}"), "/users/{id}");
        assert_eq!(normalize_template("/a/<x>/<y>"), "/a/{x}/{y}");
        assert_eq!(normalize_template("/broken/<x"), "/broken/<x");
    }

    #[test]
    fn test_route_methods_deduplicated() {
        let route = Route::new(Method::GET, "/x", "x")
            .method(Method::POST)
            .method(Method::GET);
        assert_eq!(route.methods, vec![Method::GET, Method::POST]);
    }
}
