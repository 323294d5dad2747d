//! Outbound HTTP calls that carry the caller's context.
//!
//! [`send`] and [`send_with`] do exactly one thing on top of the underlying
//! client: when tracing is enabled on the context and the request has no
//! `traceparent` yet, they add one. No retries and no timeouts: whatever the
//! client and request already carry is what applies.
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use http_body_util::Full;
//! use tether::{client, flags, trace, Context};
//!
//! # async fn run() -> Result<(), tether::Error> {
//! let ctx = flags::enable_trace(&Context::background());
//! let req = http::Request::get("http://inventory.internal/items")
//!     .body(Full::new(Bytes::new()))
//!     .unwrap();
//!
//! let res = client::send(&ctx, Some(req)).await?;
//! let ctx = trace::fulfill_trace(&ctx, Some(&res));
//! # Ok(()) }
//! ```

use std::future::Future;
use std::sync::LazyLock;
use std::time::Instant;

use bytes::Bytes;
use http::HeaderValue;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::{Connect, HttpConnector};
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use crate::context::Context;
use crate::error::Error;
use crate::flags::{has_enabled_log, has_enabled_metric, has_enabled_trace};
use crate::metrics::{RequestOrigin, metric_labels};
use crate::trace::{self, TRACEPARENT, traceparent_value};

/// Body type of outbound requests.
pub type Body = Full<Bytes>;

/// Anything that can perform one HTTP exchange.
///
/// Implemented for hyper-util's pooled [`Client`]; implement it yourself to
/// route calls through something else (a test double, a proxy, a mesh
/// sidecar client).
pub trait Transport: Send + Sync {
    type Body;

    fn send(
        &self,
        req: http::Request<Body>,
    ) -> impl Future<Output = Result<http::Response<Self::Body>, Error>> + Send;
}

impl<C> Transport for Client<C, Body>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    type Body = Incoming;

    fn send(
        &self,
        req: http::Request<Body>,
    ) -> impl Future<Output = Result<http::Response<Incoming>, Error>> + Send {
        let fut = self.request(req);
        async move { fut.await.map_err(|e| Error::Transport(Box::new(e))) }
    }
}

/// Process-wide pooled client used by [`send`].
static DEFAULT_CLIENT: LazyLock<Client<HttpConnector, Body>> =
    LazyLock::new(|| Client::builder(TokioExecutor::new()).build_http());

/// Sends `req` through the process-wide client.
pub async fn send(
    ctx: &Context,
    req: Option<http::Request<Body>>,
) -> Result<http::Response<Incoming>, Error> {
    send_with(ctx, req, Some(&*DEFAULT_CLIENT)).await
}

/// Sends `req` through `client`.
///
/// Fails with [`Error::InvalidRequest`] without a request, then with
/// [`Error::InvalidClient`] without a client. Transport failures come back
/// as the transport reported them.
///
/// The response carries a [`RequestOrigin`] extension describing `req`.
pub async fn send_with<T: Transport>(
    ctx: &Context,
    req: Option<http::Request<Body>>,
    client: Option<&T>,
) -> Result<http::Response<T::Body>, Error> {
    let mut req = req.ok_or(Error::InvalidRequest)?;
    let client = client.ok_or(Error::InvalidClient)?;

    if has_enabled_trace(ctx) && !req.headers().contains_key(TRACEPARENT) {
        if let Ok(value) = HeaderValue::from_str(&traceparent_value(ctx)) {
            req.headers_mut().insert(TRACEPARENT, value);
        }
    }

    let origin = RequestOrigin::of(&req);
    if has_enabled_log(ctx) {
        debug!(
            method = %origin.method(),
            uri = %req.uri(),
            trace_id = trace::trace_id(ctx),
            "outbound request"
        );
    }

    let started = Instant::now();
    let mut res = match client.send(req).await {
        Ok(res) => res,
        Err(e) => {
            if has_enabled_log(ctx) {
                debug!(host = origin.host(), path = origin.path(), "outbound request failed: {e}");
            }
            return Err(e);
        }
    };
    res.extensions_mut().insert(origin);

    if has_enabled_metric(ctx) {
        if let Some(labels) = metric_labels::<Body, _>(None, Some(&res), started.elapsed()) {
            labels.emit();
        }
    }

    Ok(res)
}
