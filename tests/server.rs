//! End-to-end: a real server on an ephemeral port, called through the
//! outbound wrapper.

use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http::header::LOCATION;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tether::{
    Context, ContextHook, Error, Hooks, Request, Response, Router, Server, abort, client, flags,
    listen_and_serve, trace,
};

const TRACE: &str = "0af7651916cd43dd8448eb211c80319c";
const SPAN: &str = "b7ad6b7169203331";

static HOOKS: Hooks = Hooks::new();
static BANNED: Hooks = Hooks::new();

struct Region(&'static str);

async fn whoami(req: Request) -> Response {
    let ctx = req.context();
    let region = ctx.value::<Region>().map_or("none", |r| r.0);
    Response::text(format!(
        "{region} {} {} {}",
        trace::trace_id(ctx),
        trace::span_id(ctx),
        flags::has_enabled_metric(ctx),
    ))
}

async fn moved(req: Request) -> Context {
    abort::redirect(req.context(), 308, "/whoami")
}

async fn missing(req: Request) -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .text(format!("no route for {}", req.path()))
}

fn get(url: String) -> http::Request<client::Body> {
    http::Request::get(url).body(Full::new(Bytes::new())).unwrap()
}

async fn body_text(res: http::Response<hyper::body::Incoming>) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn contexts_flow_from_hooks_and_headers_to_handlers() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    HOOKS.add_base_hooks([
        (|ctx: Context| ctx.with_value(Region("eu"))).boxed(),
        // Returns a disconnected context; must be skipped.
        (|_ctx: Context| Context::background().with_value(Region("lost"))).boxed(),
    ]);
    HOOKS.add_conn_hooks([(|ctx: Context| flags::enable_log(&flags::enable_metric(&ctx))).boxed()]);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().get("/whoami", whoami).get("/old", moved);
    let server = Server::from_listener(listener).hooks(&HOOKS).fallback(missing);
    let serving = tokio::spawn(server.serve(app));

    let http: Client<HttpConnector, client::Body> =
        Client::builder(TokioExecutor::new()).build_http();

    // Inbound traceparent reaches the handler.
    let mut req = get(format!("http://{addr}/whoami"));
    req.headers_mut().insert(
        trace::TRACEPARENT,
        format!("00-{TRACE}-{SPAN}-01").parse().unwrap(),
    );
    let res = client::send_with(&Context::background(), Some(req), Some(&http)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(res).await, format!("eu {TRACE} {SPAN} true"));

    // Outbound injection from the caller's context, end to end.
    let caller = flags::enable_trace(&trace::with_span_id(
        &trace::with_trace_id(&Context::background(), TRACE),
        SPAN,
    ));
    let res = client::send_with(&caller, Some(get(format!("http://{addr}/whoami"))), Some(&http))
        .await
        .unwrap();
    assert_eq!(body_text(res).await, format!("eu {TRACE} {SPAN} true"));

    // No trace anywhere: empty ids.
    let res = client::send_with(&Context::background(), Some(get(format!("http://{addr}/whoami"))), Some(&http))
        .await
        .unwrap();
    assert_eq!(body_text(res).await, "eu   true");

    // Redirect signal becomes a redirect response.
    let res = client::send_with(&Context::background(), Some(get(format!("http://{addr}/old"))), Some(&http))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(res.headers()[LOCATION], "/whoami");

    // Fallback answers unmatched routes.
    let res = client::send_with(&Context::background(), Some(get(format!("http://{addr}/nope"))), Some(&http))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(res).await, "no route for /nope");

    serving.abort();
}

#[tokio::test]
async fn aborted_connection_context_answers_before_routing() {
    BANNED.add_conn_hooks([
        (|ctx: Context| abort::abort_with_status_reason(&ctx, 403, "banned")).boxed(),
    ]);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().get("/", whoami);
    let serving = tokio::spawn(Server::from_listener(listener).hooks(&BANNED).serve(app));

    let http: Client<HttpConnector, client::Body> =
        Client::builder(TokioExecutor::new()).build_http();
    for path in ["/", "/unrouted"] {
        let res = client::send_with(&Context::background(), Some(get(format!("http://{addr}{path}"))), Some(&http))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_text(res).await, "banned");
    }

    serving.abort();
}

#[tokio::test]
async fn shutdown_closes_idle_keep_alive_connections() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let serving = tokio::spawn(
        Server::from_listener(listener).serve_with_shutdown(
            Router::new().get("/whoami", whoami),
            async {
                let _ = stopped.await;
            },
        ),
    );

    let mut conn = TcpStream::connect(addr).await.unwrap();
    conn.write_all(b"GET /whoami HTTP/1.1\r\nhost: test\r\n\r\n").await.unwrap();
    let mut buf = [0u8; 1024];
    let n = conn.read(&mut buf).await.unwrap();
    assert!(buf[..n].starts_with(b"HTTP/1.1 200"));

    // The connection is idle but still open.
    stop.send(()).unwrap();
    let served = tokio::time::timeout(Duration::from_secs(5), serving).await;
    assert!(matches!(served, Ok(Ok(Ok(())))), "server did not stop: {served:?}");

    assert!(matches!(conn.read(&mut buf).await, Ok(0) | Err(_)));
}

#[tokio::test]
async fn bind_failure_is_returned() {
    let err = listen_and_serve("not an address", Router::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)), "unexpected error: {err}");
}
