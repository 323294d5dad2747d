//! HTTP server, context wiring and graceful shutdown.
//!
//! # Where contexts come from
//!
//! 1. Once the listener is bound, the base hooks fold over a root context
//!    stamped with the listener's start second. The result is shared by every
//!    connection.
//! 2. Each accepted connection folds the connection hooks over the base
//!    context, independently of all other connections.
//! 3. Each request on that connection gets the connection context, filled
//!    with the trace ids from its own `traceparent` header.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server stops accepting and tells every open
//! connection to wind down: requests already in flight complete, idle
//! keep-alive connections close. [`Server::serve`] returns once the last
//! connection is gone.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::abort;
use crate::context::Context;
use crate::error::Error;
use crate::flags::{has_enabled_log, has_enabled_metric};
use crate::handler::{BoxedHandler, Handler};
use crate::hooks::Hooks;
use crate::metrics::{MetricLabels, RequestOrigin};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::startup::StartupToken;
use crate::trace;

enum Bind {
    Addr(String),
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    bind: Bind,
    fallback: Option<BoxedHandler>,
    hooks: &'static Hooks,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called. An unresolvable or unavailable address surfaces as the
    /// error `serve` returns.
    ///
    /// ```rust,no_run
    /// use tether::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: impl Into<String>) -> Self {
        Self::with_bind(Bind::Addr(addr.into()))
    }

    /// Serves on an already bound listener.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self::with_bind(Bind::Listener(listener))
    }

    fn with_bind(bind: Bind) -> Self {
        Self { bind, fallback: None, hooks: Hooks::global() }
    }

    /// Handler for requests no route matches; replaces the router's own.
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.fallback = Some(handler.into_boxed_handler());
        self
    }

    /// Hook registry to build contexts from. Defaults to the process-wide one.
    pub fn hooks(mut self, hooks: &'static Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns after a full graceful shutdown on SIGTERM or Ctrl-C, or with
    /// the bind error.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but shuts down when `signal` resolves.
    pub async fn serve_with_shutdown(
        self,
        mut router: Router,
        signal: impl Future<Output = ()> + Send,
    ) -> Result<(), Error> {
        let listener = match self.bind {
            Bind::Addr(addr) => TcpListener::bind(addr).await?,
            Bind::Listener(listener) => listener,
        };
        if let Some(fallback) = self.fallback {
            router.set_not_found(fallback);
        }
        let router = Arc::new(router);

        let token = StartupToken::now();
        let base = self.hooks.base_context(token);
        let hooks = self.hooks;

        info!(addr = %listener.local_addr()?, started_at = token.started_at(), "tether listening");

        let mut tasks = tokio::task::JoinSet::new();
        // Flipped to `true` once; every connection task watches it.
        let (stop_tx, stop_rx) = watch::channel(false);

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM stops accepting even
                // while connections are still queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let base = base.clone();
                    let mut stop = stop_rx.clone();
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let conn_ctx = hooks.conn_context(&base, token);

                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            let conn_ctx = conn_ctx.clone();
                            async move { dispatch(router, conn_ctx, req).await }
                        });

                        let builder = ConnBuilder::new(TokioExecutor::new());
                        let conn = builder.serve_connection(io, svc);
                        tokio::pin!(conn);

                        let res = tokio::select! {
                            res = conn.as_mut() => res,
                            _ = stop.changed() => {
                                // Finish the in-flight request, refuse the next one.
                                conn.as_mut().graceful_shutdown();
                                conn.await
                            }
                        };
                        if let Err(e) = res {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);
        stop_tx.send_replace(true);
        while tasks.join_next().await.is_some() {}

        info!("tether stopped");
        Ok(())
    }
}

/// Serves `router` on `addr` using the process-wide hooks.
///
/// A `fallback` becomes the router's not-found handler. Returns the
/// server's terminal error unchanged.
pub async fn listen_and_serve(
    addr: &str,
    mut router: Router,
    fallback: Option<BoxedHandler>,
) -> Result<(), Error> {
    if let Some(fallback) = fallback {
        router.set_not_found(fallback);
    }
    Server::bind(addr).serve(router).await
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request and produces one response. Every failure becomes a
/// response, so hyper never sees an error.
///
/// A context already aborted by a base or connection hook answers with its
/// signal; the router is never consulted.
async fn dispatch(
    router: Arc<Router>,
    conn_ctx: Context,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let origin = RequestOrigin::of(&req);
    let ctx = trace::merge_headers(&conn_ctx, req.headers());

    let response = match abort::respond(&ctx) {
        Some(aborted) => aborted,
        None => route(&router, &ctx, &origin, req).await,
    };

    let status = response.status_code().as_u16();
    if has_enabled_log(&ctx) {
        info!(
            method = %origin.method(),
            path = origin.path(),
            status,
            trace_id = trace::trace_id(&ctx),
            latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "request"
        );
    }
    if has_enabled_metric(&ctx) {
        MetricLabels::new(&origin, status, started.elapsed()).emit();
    }

    Ok(response.into_inner())
}

async fn route(
    router: &Router,
    ctx: &Context,
    origin: &RequestOrigin,
    req: hyper::Request<hyper::body::Incoming>,
) -> Response {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(path = origin.path(), "failed to read request body: {e}");
            return Response::status(StatusCode::BAD_REQUEST);
        }
    };

    match router.lookup(&parts.method, parts.uri.path()) {
        Some((handler, params)) => handler.call(Request::new(parts, body, params, ctx.clone())).await,
        None => Response::status(StatusCode::NOT_FOUND),
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C only, off Unix).
///
/// A signal handler that cannot be installed leaves its arm pending instead
/// of failing the server.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
