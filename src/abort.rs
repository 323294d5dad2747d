//! Abort and redirect signalling.
//!
//! A handler that wants to short-circuit does not panic and does not return
//! an error. It derives a new [`Context`] carrying an [`AbortSignal`] and
//! lets the response-writing code decide what to send:
//!
//! ```rust
//! use tether::{abort, Context};
//!
//! let ctx = Context::background();
//! let ctx = abort::abort_with_status_reason(&ctx, 403, "tenant suspended");
//!
//! assert!(abort::is_aborted(&ctx));
//! let res = abort::respond(&ctx).unwrap();
//! assert_eq!(res.status_code(), 403);
//! ```
//!
//! Every constructor returns a descendant; the context passed in is never
//! changed. When the same lineage aborts twice, the later signal shadows the
//! earlier one. Sibling branches are independent and never reconciled.

use std::error::Error as StdError;

use http::StatusCode;

use crate::context::Context;
use crate::response::{IntoResponse, Response};

/// Reason used by [`abort`] and [`abort_with_status`].
pub const DEFAULT_REASON: &str = "Server encountered an error";

/// An instruction to the response layer to short-circuit the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbortSignal {
    status: u16,
    reason: String,
    redirect: bool,
}

impl AbortSignal {
    /// Status code to respond with. `0` never counts as aborted.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Free-form message, or the redirect target for redirects.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn is_redirect(&self) -> bool {
        self.redirect
    }
}

fn attach(ctx: &Context, status: u16, reason: String, redirect: bool) -> Context {
    ctx.with_value(AbortSignal { status, reason, redirect })
}

/// Aborts with `500` and [`DEFAULT_REASON`].
pub fn abort(ctx: &Context) -> Context {
    attach(ctx, StatusCode::INTERNAL_SERVER_ERROR.as_u16(), DEFAULT_REASON.to_owned(), false)
}

/// Aborts with `status` and [`DEFAULT_REASON`].
pub fn abort_with_status(ctx: &Context, status: u16) -> Context {
    attach(ctx, status, DEFAULT_REASON.to_owned(), false)
}

pub fn abort_with_status_reason(
    ctx: &Context,
    status: u16,
    reason: impl Into<String>,
) -> Context {
    attach(ctx, status, reason.into(), false)
}

/// Aborts with `status`, using the error's message as reason. No error means
/// an empty reason.
pub fn abort_with_error(
    ctx: &Context,
    status: u16,
    err: Option<&dyn StdError>,
) -> Context {
    let reason = err.map(|e| e.to_string()).unwrap_or_default();
    attach(ctx, status, reason, false)
}

/// Redirects to `path` with `status` (typically 301, 302, 303, 307 or 308).
pub fn redirect(ctx: &Context, status: u16, path: impl Into<String>) -> Context {
    attach(ctx, status, path.into(), true)
}

/// The signal visible from `ctx`, aborted or not.
pub fn signal(ctx: &Context) -> Option<&AbortSignal> {
    ctx.value::<AbortSignal>()
}

/// True iff `ctx` carries a signal with a non-zero status.
pub fn is_aborted(ctx: &Context) -> bool {
    signal(ctx).is_some_and(|s| s.status != 0)
}

/// The response an aborted context asks for, or `None` when not aborted.
pub fn respond(ctx: &Context) -> Option<Response> {
    signal(ctx)
        .filter(|s| s.status != 0)
        .map(|s| s.clone().into_response())
}

impl IntoResponse for AbortSignal {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.redirect {
            Response::redirect(status, &self.reason)
        } else {
            Response::builder().status(status).text(self.reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::header::LOCATION;

    #[test]
    fn background_is_not_aborted() {
        assert!(!is_aborted(&Context::background()));
        assert!(respond(&Context::background()).is_none());
    }

    #[test]
    fn abort_defaults_to_500() {
        let ctx = abort(&Context::background());
        let s = signal(&ctx).unwrap();
        assert_eq!(s.status(), 500);
        assert_eq!(s.reason(), DEFAULT_REASON);
        assert!(!s.is_redirect());
        assert!(is_aborted(&ctx));
    }

    #[test]
    fn zero_status_reads_as_not_aborted() {
        for status in [0u16, 200, 404, 503] {
            let ctx = abort_with_status_reason(&Context::background(), status, "r");
            assert_eq!(is_aborted(&ctx), status != 0, "status {status}");
        }
    }

    #[test]
    fn accepts_status_code() {
        let ctx = abort_with_status(&Context::background(), StatusCode::TOO_MANY_REQUESTS.as_u16());
        assert_eq!(signal(&ctx).unwrap().status(), 429);
        assert_eq!(signal(&ctx).unwrap().reason(), DEFAULT_REASON);
    }

    #[test]
    fn plain_abort_answers_500_with_default_reason() {
        let res = respond(&abort(&Context::background())).unwrap();
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(DEFAULT_REASON, "Server encountered an error");
    }

    #[test]
    fn error_message_becomes_reason() {
        let err = std::io::Error::other("disk on fire");
        let ctx = abort_with_error(&Context::background(), 503, Some(&err));
        assert_eq!(signal(&ctx).unwrap().reason(), "disk on fire");

        let ctx = abort_with_error(&Context::background(), 503, None);
        assert_eq!(signal(&ctx).unwrap().reason(), "");
        assert!(is_aborted(&ctx));
    }

    #[test]
    fn redirect_carries_path() {
        let ctx = redirect(&Context::background(), 302, "/x");
        let s = signal(&ctx).unwrap();
        assert!(s.is_redirect());
        assert_eq!(s.reason(), "/x");
        assert_eq!(s.status(), 302);

        let res = respond(&ctx).unwrap();
        assert_eq!(res.status_code(), StatusCode::FOUND);
        assert_eq!(res.headers()[LOCATION], "/x");
    }

    #[test]
    fn later_abort_in_lineage_wins_and_parent_is_untouched() {
        let parent = abort_with_status(&Context::background(), 401);
        let child = redirect(&parent, 303, "/login");

        assert_eq!(signal(&parent).unwrap().status(), 401);
        assert!(!signal(&parent).unwrap().is_redirect());
        assert_eq!(signal(&child).unwrap().status(), 303);
    }

    #[test]
    fn out_of_range_status_responds_500() {
        let ctx = abort_with_status_reason(&Context::background(), 42u16, "odd");
        let res = respond(&ctx).unwrap();
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
