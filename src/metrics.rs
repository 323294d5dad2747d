//! Request/response label tuples for external instrumentation.
//!
//! tether does not collect metrics. It derives one fixed-arity label tuple
//! per call and emits it as a `tracing` event on the [`TARGET`] target when
//! the context's metric flag is on; a subscriber or exporter turns those
//! events into whatever backend it likes.

use std::time::Duration;

use http::header::HOST;
use http::Method;

/// `tracing` target of metric events.
pub const TARGET: &str = "tether::metrics";

/// Label names, in tuple order.
pub const LABEL_NAMES: [&str; 5] = ["method", "host", "path", "status", "duration"];

/// Method, host and path of an outbound request.
///
/// The outbound wrapper stores one in every response's extensions so the
/// response alone is enough to label the call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestOrigin {
    method: Method,
    host: String,
    path: String,
}

impl RequestOrigin {
    /// Host is the URI's `host[:port]`, else the `host` header, else empty.
    /// Userinfo in the URI never reaches the label.
    pub fn of<B>(req: &http::Request<B>) -> Self {
        let uri = req.uri();
        let host = match (uri.host(), uri.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_owned(),
            (None, _) => req
                .headers()
                .get(HOST)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_owned(),
        };
        Self {
            method: req.method().clone(),
            host,
            path: req.uri().path().to_owned(),
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn host(&self) -> &str { &self.host }
    pub fn path(&self) -> &str { &self.path }
}

/// `[method, host, path, status, duration_ms]`, all as strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricLabels([String; 5]);

impl MetricLabels {
    pub(crate) fn new(origin: &RequestOrigin, status: u16, elapsed: Duration) -> Self {
        Self([
            origin.method.as_str().to_owned(),
            origin.host.clone(),
            origin.path.clone(),
            status.to_string(),
            elapsed.as_millis().to_string(),
        ])
    }

    pub fn method(&self) -> &str { &self.0[0] }
    pub fn host(&self) -> &str { &self.0[1] }
    pub fn path(&self) -> &str { &self.0[2] }
    pub fn status(&self) -> &str { &self.0[3] }
    pub fn duration_ms(&self) -> &str { &self.0[4] }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// `(name, value)` pairs, in [`LABEL_NAMES`] order.
    pub fn pairs(&self) -> impl Iterator<Item = (&'static str, &str)> {
        LABEL_NAMES.into_iter().zip(self.0.iter().map(String::as_str))
    }

    pub(crate) fn emit(&self) {
        tracing::info!(
            target: TARGET,
            method = self.method(),
            host = self.host(),
            path = self.path(),
            status = self.status(),
            duration_ms = self.duration_ms(),
            "http call"
        );
    }
}

impl PartialEq<[&str; 5]> for MetricLabels {
    fn eq(&self, other: &[&str; 5]) -> bool {
        self.0.iter().zip(other).all(|(a, b)| a == b)
    }
}

/// Labels for one call.
///
/// Without a request, the response's [`RequestOrigin`] stands in. Without
/// either there is nothing to label. A missing response reports status `0`.
pub fn metric_labels<Req, Res>(
    req: Option<&http::Request<Req>>,
    res: Option<&http::Response<Res>>,
    elapsed: Duration,
) -> Option<MetricLabels> {
    let origin = match req {
        Some(req) => RequestOrigin::of(req),
        None => res?.extensions().get::<RequestOrigin>()?.clone(),
    };
    let status = res.map_or(0, |r| r.status().as_u16());
    Some(MetricLabels::new(&origin, status, elapsed))
}
