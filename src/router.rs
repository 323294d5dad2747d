//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup, plus a single not-found
//! slot for everything that matches no route.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler};

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Every registration returns `self` so calls chain.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    not_found: Option<BoxedHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), not_found: None }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax — `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered. Routes are fixed at startup, so this surfaces immediately.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Handler for requests no route matches. Without one they get a bare 404.
    pub fn not_found(mut self, handler: impl Handler) -> Self {
        self.not_found = Some(handler.into_boxed_handler());
        self
    }

    pub(crate) fn set_not_found(&mut self, handler: BoxedHandler) {
        self.not_found = Some(handler);
    }

    /// The matching handler and its path parameters, falling back to the
    /// not-found handler with no parameters.
    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let matched = self.routes.get(method).and_then(|tree| tree.at(path).ok());
        match matched {
            Some(m) => {
                let params = m.params.iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect();
                Some((Arc::clone(m.value), params))
            }
            None => self.not_found.clone().map(|h| (h, HashMap::new())),
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{Request, Response};

    async fn ok(_req: Request) -> Response {
        Response::text("ok")
    }

    #[test]
    fn matches_method_and_params() {
        let router = Router::new().get("/users/{id}", ok);

        let (_, params) = router.lookup(&Method::GET, "/users/42").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
        assert!(router.lookup(&Method::POST, "/users/42").is_none());
    }

    #[test]
    fn unmatched_falls_back_to_not_found() {
        let router = Router::new().get("/", ok);
        assert!(router.lookup(&Method::GET, "/missing").is_none());

        let router = router.not_found(ok);
        let (_, params) = router.lookup(&Method::DELETE, "/missing").unwrap();
        assert!(params.is_empty());
    }
}
