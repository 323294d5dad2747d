//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Build a [`Response`] in your handler and return it — or return an abort
//! signal's response via [`abort::respond`](crate::abort::respond).

use bytes::Bytes;
use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderValue, StatusCode};
use http_body_util::Full;

const JSON: &str = "application/json";
const TEXT: &str = "text/plain; charset=utf-8";

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// ```rust
/// use tether::Response;
/// use http::StatusCode;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
/// ```
#[derive(Debug)]
pub struct Response(http::Response<Full<Bytes>>);

impl Response {
    /// `200 OK` — `application/json`.
    pub fn json(body: Vec<u8>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK` — `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self::builder().status(code).no_body()
    }

    /// Bodiless redirect to `location`.
    ///
    /// A location that is not a valid header value degrades to a bare
    /// `500` rather than a redirect to nowhere.
    pub fn redirect(code: StatusCode, location: &str) -> Self {
        match HeaderValue::from_str(location) {
            Ok(value) => {
                let mut res = Self::status(code);
                res.0.headers_mut().insert(LOCATION, value);
                res
            }
            Err(_) => Self::status(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { inner: http::Response::builder().status(StatusCode::OK) }
    }

    pub fn status_code(&self) -> StatusCode {
        self.0.status()
    }

    pub fn headers(&self) -> &http::HeaderMap {
        self.0.headers()
    }

    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        self.0
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`. Terminated by a
/// typed body method. An invalid header name or value turns the whole
/// response into a bare `500`.
pub struct ResponseBuilder {
    inner: http::response::Builder,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.inner = self.inner.status(code);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.inner = self.inner.header(name, value);
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: Vec<u8>) -> Response {
        self.finish(Some(JSON), Bytes::from(body))
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(Some(TEXT), Bytes::from(body.into()))
    }

    /// Terminate with no body (e.g. `204 No Content`, redirects).
    pub fn no_body(self) -> Response {
        self.finish(None, Bytes::new())
    }

    fn finish(self, content_type: Option<&'static str>, body: Bytes) -> Response {
        let mut inner = self.inner;
        if let Some(content_type) = content_type {
            inner = inner.header(CONTENT_TYPE, content_type);
        }
        match inner.body(Full::new(body)) {
            Ok(res) => Response(res),
            Err(_) => {
                let mut res = http::Response::new(Full::new(Bytes::new()));
                *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                Response(res)
            }
        }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_sets_content_type() {
        let res = Response::text("hi");
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_TYPE], TEXT);
    }

    #[test]
    fn redirect_sets_location_without_body_type() {
        let res = Response::redirect(StatusCode::FOUND, "/login");
        assert_eq!(res.status_code(), StatusCode::FOUND);
        assert_eq!(res.headers()[LOCATION], "/login");
        assert!(res.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn invalid_header_degrades_to_500() {
        let res = Response::builder().header("bad header", "x").text("nope");
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let res = Response::redirect(StatusCode::FOUND, "/a\nb");
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
