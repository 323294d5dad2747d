//! # tether
//!
//! Context propagation and lifecycle hooks for hyper servers and clients.
//!
//! ## What it does
//!
//! - **Immutable request context** — a typed value chain every handler
//!   receives. Descendants never change their ancestors.
//! - **Abort / redirect signals** — short-circuit a request by deriving a
//!   context, not by panicking or threading errors through every layer.
//! - **Lifecycle hooks** — enrich the context once per listener and once per
//!   connection. Hooks that return a context not derived from the base
//!   context are caught and skipped.
//! - **Trace propagation** — W3C `traceparent` in from requests and
//!   downstream responses, out on outbound calls. Never overwrites an id the
//!   context already knows.
//! - **Label tuples** — `(method, host, path, status, duration)` per call, as
//!   `tracing` events, for whatever metrics backend listens.
//!
//! What it does not do: it is not a middleware framework, not a tracing SDK,
//! and not a metrics collector.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tether::{abort, flags, hooks, trace, Context, ContextHook, Request, Response, Router, Server};
//!
//! struct Region(&'static str);
//!
//! #[tokio::main]
//! async fn main() {
//!     hooks::add_base_hooks([
//!         (|ctx: Context| ctx.with_value(Region("eu-west-1"))).boxed(),
//!         (|ctx: Context| flags::enable_log(&ctx)).boxed(),
//!     ]);
//!
//!     let app = Router::new().get("/users/{id}", get_user);
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let ctx = req.context();
//!     if req.param("id") == Some("0") {
//!         let ctx = abort::redirect(ctx, 302, "/users");
//!         return abort::respond(&ctx).unwrap();
//!     }
//!     let region = ctx.value::<Region>().map_or("unknown", |r| r.0);
//!     Response::text(format!("{region} {}", trace::trace_id(ctx)))
//! }
//! ```

mod context;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;
mod startup;

pub mod abort;
pub mod client;
pub mod flags;
pub mod hooks;
pub mod metrics;
pub mod trace;

pub use context::Context;
pub use error::Error;
pub use handler::{BoxedHandler, Handler};
pub use hooks::{BoxedHook, ContextHook, Hooks};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::{Server, listen_and_serve};
