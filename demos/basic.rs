//! Minimal tether demo — hooks, abort signals and trace propagation.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/orders/42
//!   curl -i http://localhost:3000/orders/0          # 404 via abort signal
//!   curl -i http://localhost:3000/legacy/orders     # 301 redirect
//!   curl -i http://localhost:3000/orders/42 \
//!        -H 'traceparent: 00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01'
//!   curl -i http://localhost:3000/anything-else     # fallback

use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::Full;
use tether::{
    Context, ContextHook, Handler, Request, Response, Router, abort, client, flags, hooks,
    listen_and_serve, trace,
};

/// Attached once, by a base hook.
struct Service {
    name: &'static str,
    booted: Instant,
}

/// Attached per connection, by a connection hook.
struct ConnSerial(u64);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    hooks::add_base_hooks([
        (|ctx: Context| ctx.with_value(Service { name: "orders", booted: Instant::now() })).boxed(),
        (|ctx: Context| flags::enable_log(&flags::enable_trace(&ctx))).boxed(),
    ]);
    hooks::add_conn_hooks([(|ctx: Context| ctx.with_value(ConnSerial(fastrand::u64(..)))).boxed()]);

    let app = Router::new()
        .get("/orders/{id}", get_order)
        .get("/legacy/orders", legacy)
        .get("/upstream", call_upstream);

    if let Err(e) = listen_and_serve("0.0.0.0:3000", app, Some(fallback.into_boxed_handler())).await {
        eprintln!("server error: {e}");
    }
}

// GET /orders/{id}
async fn get_order(req: Request) -> Result<Response, Context> {
    let ctx = req.context();
    let id = req.param("id").unwrap_or_default();
    if id == "0" {
        return Err(abort::abort_with_status_reason(ctx, 404, "order 0 does not exist"));
    }

    let service = ctx.value::<Service>().map_or("?", |s| s.name);
    let uptime = ctx.value::<Service>().map_or(Duration::ZERO, |s| s.booted.elapsed());
    let conn = ctx.value::<ConnSerial>().map_or(0, |c| c.0);
    Ok(Response::json(
        format!(
            r#"{{"id":"{id}","service":"{service}","uptime_s":{},"conn":"{conn:x}","trace_id":"{}"}}"#,
            uptime.as_secs(),
            trace::trace_id(ctx),
        )
        .into_bytes(),
    ))
}

// GET /legacy/orders → 301 /orders/1
async fn legacy(req: Request) -> Context {
    abort::redirect(req.context(), 301, "/orders/1")
}

// GET /upstream — calls ourselves, carrying the trace along.
async fn call_upstream(req: Request) -> Response {
    let outbound = http::Request::get("http://127.0.0.1:3000/orders/7")
        .body(Full::new(Bytes::new()));
    let Ok(outbound) = outbound else {
        return Response::status(http::StatusCode::INTERNAL_SERVER_ERROR);
    };

    match client::send(req.context(), Some(outbound)).await {
        Ok(res) => {
            let ctx = trace::fulfill_trace(req.context(), Some(&res));
            Response::text(format!("upstream said {} in trace {}", res.status(), trace::trace_id(&ctx)))
        }
        Err(e) => {
            let ctx = abort::abort_with_error(req.context(), 502, Some(&e));
            abort::respond(&ctx).unwrap_or_else(|| Response::text("unreachable"))
        }
    }
}

async fn fallback(req: Request) -> Response {
    Response::builder()
        .status(http::StatusCode::NOT_FOUND)
        .text(format!("nothing at {}", req.path()))
}
