//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Method, Uri};

use crate::context::Context;

/// An incoming HTTP request with its body fully read.
///
/// Carries the connection's [`Context`], already merged with the request's
/// own `traceparent` header.
pub struct Request {
    parts: Parts,
    body: Bytes,
    params: HashMap<String, String>,
    ctx: Context,
}

impl Request {
    pub(crate) fn new(
        parts: Parts,
        body: Bytes,
        params: HashMap<String, String>,
        ctx: Context,
    ) -> Self {
        Self { parts, body, params, ctx }
    }

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// The request's context: base hooks, connection hooks, inbound trace ids.
    pub fn context(&self) -> &Context { &self.ctx }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}
