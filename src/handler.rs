//! Handlers and what they may answer with.
//!
//! A handler is any `async fn(Request) -> impl IntoResponse`. Beyond plain
//! responses, a handler can answer with the [`Context`] it derived from the
//! request's own:
//!
//! ```rust
//! use tether::{abort, Context, Request, Response};
//!
//! async fn old_home(req: Request) -> Context {
//!     abort::redirect(req.context(), 301, "/home")
//! }
//!
//! async fn order(req: Request) -> Result<Response, Context> {
//!     let id = req.param("id").ok_or_else(|| abort::abort_with_status(req.context(), 400))?;
//!     Ok(Response::text(id.to_owned()))
//! }
//! ```
//!
//! | Handler returns | Response |
//! |---|---|
//! | aborted `Context` | the signal's response |
//! | any other `Context` | `204 No Content` |
//! | `Err(ctx)`, `ctx` aborted | the signal's response |
//! | `Err(ctx)`, `ctx` not aborted | `500` with the default abort reason |

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;

use crate::abort;
use crate::context::Context;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Object-safe face of a [`Handler`], as stored by the router.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
///
/// Obtain one with [`Handler::into_boxed_handler`]; pass it where a handler
/// has to be optional, e.g. the fallback of
/// [`listen_and_serve`](crate::listen_and_serve).
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every `async fn(Request) -> impl IntoResponse`.
pub trait Handler: Send + Sync + 'static {
    fn into_boxed_handler(self) -> BoxedHandler;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(Endpoint(self))
    }
}

struct Endpoint<F>(F);

impl<F, Fut, R> ErasedHandler for Endpoint<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let answer = (self.0)(req);
        Box::pin(async move { answer.await.into_response() })
    }
}

// ── Context answers ───────────────────────────────────────────────────────────

impl IntoResponse for Context {
    fn into_response(self) -> Response {
        abort::respond(&self).unwrap_or_else(|| Response::status(StatusCode::NO_CONTENT))
    }
}

impl<T: IntoResponse> IntoResponse for Result<T, Context> {
    fn into_response(self) -> Response {
        match self {
            Ok(answer) => answer.into_response(),
            Err(ctx) if abort::is_aborted(&ctx) => ctx.into_response(),
            Err(ctx) => abort::abort(&ctx).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use bytes::Bytes;
    use http::header::LOCATION;

    fn request(ctx: Context) -> Request {
        let (parts, ()) = http::Request::get("/x").body(()).unwrap().into_parts();
        Request::new(parts, Bytes::new(), HashMap::new(), ctx)
    }

    async fn run(handler: impl Handler, ctx: Context) -> Response {
        handler.into_boxed_handler().call(request(ctx)).await
    }

    #[tokio::test]
    async fn aborted_context_answer_becomes_its_signal() {
        async fn moved(req: Request) -> Context {
            abort::redirect(req.context(), 308, "/y")
        }

        let res = run(moved, Context::background()).await;
        assert_eq!(res.status_code(), StatusCode::PERMANENT_REDIRECT);
        assert_eq!(res.headers()[LOCATION], "/y");
    }

    #[tokio::test]
    async fn plain_context_answer_is_no_content() {
        async fn touch(req: Request) -> Context {
            req.context().with_value(7u8)
        }

        let res = run(touch, Context::background()).await;
        assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn err_context_answers() {
        async fn teapot(req: Request) -> Result<&'static str, Context> {
            Err(abort::abort_with_status(req.context(), 418))
        }
        async fn bail(req: Request) -> Result<&'static str, Context> {
            Err(req.context().clone())
        }
        async fn fine(_req: Request) -> Result<&'static str, Context> {
            Ok("fine")
        }

        assert_eq!(run(teapot, Context::background()).await.status_code(), StatusCode::IM_A_TEAPOT);
        assert_eq!(
            run(bail, Context::background()).await.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(run(fine, Context::background()).await.status_code(), StatusCode::OK);
    }
}
