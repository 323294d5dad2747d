//! W3C Trace Context propagation.
//!
//! Only the `traceparent` header is understood:
//!
//! ```text
//! traceparent: {version}-{trace-id}-{parent-id}-{trace-flags}
//! traceparent: 00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01
//! ```
//!
//! `tracestate` is recognised by name and passed through untouched.
//!
//! Trace and span ids live in the [`Context`]. Merging from a header only
//! *fills gaps*: an id the context already knows is never overwritten.
//! Every failure here (missing header, garbage header) is a silent no-op:
//! tracing is additive instrumentation, not something a request should fail
//! over.

use std::fmt;

use http::HeaderMap;

use crate::context::Context;

/// Header carrying version, trace id, span id and flags.
pub const TRACEPARENT: &str = "traceparent";

/// Vendor-specific companion header. Reserved, never parsed.
pub const TRACESTATE: &str = "tracestate";

const VERSION: &str = "00";
const FLAG_SAMPLED: u8 = 0x01;

// ── Header value ──────────────────────────────────────────────────────────────

/// A parsed `traceparent` header value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Traceparent {
    trace_id: String,
    span_id: String,
    flags: u8,
}

impl Traceparent {
    /// Parses a header value. Ids are normalised to lowercase.
    ///
    /// Version `00` must have exactly four fields. Later versions may append
    /// fields, which are ignored. Version `ff` is invalid. All-zero ids are
    /// invalid.
    pub fn parse(header: &str) -> Option<Self> {
        let parts: Vec<&str> = header.trim().split('-').collect();
        if parts.len() < 4 {
            return None;
        }

        let version = parts[0];
        if version.len() != 2 || !is_hex(version) || version.eq_ignore_ascii_case("ff") {
            return None;
        }
        if version == VERSION && parts.len() != 4 {
            return None;
        }

        let (trace_id, span_id, flags) = (parts[1], parts[2], parts[3]);
        if trace_id.len() != 32 || !is_hex(trace_id) || is_all_zeros(trace_id) {
            return None;
        }
        if span_id.len() != 16 || !is_hex(span_id) || is_all_zeros(span_id) {
            return None;
        }
        if flags.len() != 2 || !is_hex(flags) {
            return None;
        }

        Some(Self {
            trace_id: trace_id.to_ascii_lowercase(),
            span_id: span_id.to_ascii_lowercase(),
            flags: u8::from_str_radix(flags, 16).ok()?,
        })
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    #[inline]
    pub fn is_sampled(&self) -> bool {
        self.flags & FLAG_SAMPLED != 0
    }
}

impl fmt::Display for Traceparent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{VERSION}-{}-{}-{:02x}", self.trace_id, self.span_id, self.flags)
    }
}

// ── Ids in the context ────────────────────────────────────────────────────────

struct TraceIdKey(String);
struct SpanIdKey(String);

/// The context's trace id, or `""` when not yet known.
pub fn trace_id(ctx: &Context) -> &str {
    ctx.value::<TraceIdKey>().map_or("", |k| k.0.as_str())
}

/// The context's span id, or `""` when not yet known.
pub fn span_id(ctx: &Context) -> &str {
    ctx.value::<SpanIdKey>().map_or("", |k| k.0.as_str())
}

pub fn with_trace_id(ctx: &Context, id: impl Into<String>) -> Context {
    ctx.with_value(TraceIdKey(id.into()))
}

pub fn with_span_id(ctx: &Context, id: impl Into<String>) -> Context {
    ctx.with_value(SpanIdKey(id.into()))
}

/// `traceparent` value describing `ctx`. Ids the context lacks are freshly
/// generated; the sampled flag is always set.
///
/// Generated ids are not kept anywhere, so a later [`fulfill_trace`] cannot
/// relate to them. Use [`with_traceparent`] when the caller needs to.
pub fn traceparent_value(ctx: &Context) -> String {
    with_traceparent(ctx).1
}

/// Like [`traceparent_value`], also returning `ctx` filled with whichever
/// ids had to be generated.
pub fn with_traceparent(ctx: &Context) -> (Context, String) {
    let mut ctx = ctx.clone();
    if trace_id(&ctx).is_empty() {
        ctx = with_trace_id(&ctx, generate_trace_id());
    }
    if span_id(&ctx).is_empty() {
        ctx = with_span_id(&ctx, generate_span_id());
    }
    let value = Traceparent {
        trace_id: trace_id(&ctx).to_owned(),
        span_id: span_id(&ctx).to_owned(),
        flags: FLAG_SAMPLED,
    }
    .to_string();
    (ctx, value)
}

// ── Merge ─────────────────────────────────────────────────────────────────────

/// Fills missing trace/span ids in `ctx` from a `traceparent` in `headers`.
pub(crate) fn merge_headers(ctx: &Context, headers: &HeaderMap) -> Context {
    let Some(parent) = headers
        .get(TRACEPARENT)
        .and_then(|v| v.to_str().ok())
        .and_then(Traceparent::parse)
    else {
        return ctx.clone();
    };

    let mut merged = ctx.clone();
    if trace_id(&merged).is_empty() {
        merged = with_trace_id(&merged, parent.trace_id);
    }
    if span_id(&merged).is_empty() {
        merged = with_span_id(&merged, parent.span_id);
    }
    merged
}

fn merge_trace<B>(ctx: &Context, res: Option<&http::Response<B>>) -> Context {
    match res {
        Some(res) => merge_headers(ctx, res.headers()),
        None => ctx.clone(),
    }
}

/// A fresh context carrying whatever trace ids `res` reports.
///
/// Use when there is no caller context yet.
pub fn inherit_trace<B>(res: Option<&http::Response<B>>) -> Context {
    merge_trace(&Context::background(), res)
}

/// Fills the caller's context with trace ids reported by a downstream
/// response. Ids already in `ctx` win.
pub fn fulfill_trace<B>(ctx: &Context, res: Option<&http::Response<B>>) -> Context {
    merge_trace(ctx, res)
}

// ── Id generation ─────────────────────────────────────────────────────────────

fn generate_trace_id() -> String {
    format!("{:016x}{:016x}", fastrand::u64(1..), fastrand::u64(..))
}

fn generate_span_id() -> String {
    format!("{:016x}", fastrand::u64(1..))
}

#[inline]
fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[inline]
fn is_all_zeros(s: &str) -> bool {
    s.bytes().all(|b| b == b'0')
}
