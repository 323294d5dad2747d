//! Listener start stamp.
//!
//! The base context is stamped with the unix second the listener started.
//! The token type is private to this crate, so a context that carries the
//! right token can only have been derived from the stamped root. A hook that
//! builds a fresh context from scratch loses it.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::context::Context;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct StartupToken(i64);

impl StartupToken {
    /// Token for "now". Never zero or negative, even on a clock set before
    /// the epoch.
    pub(crate) fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or(1);
        Self(secs.max(1))
    }

    #[cfg(test)]
    pub(crate) fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub(crate) fn started_at(self) -> i64 {
        self.0
    }

    /// A descendant of `ctx` carrying this token.
    pub(crate) fn stamp(self, ctx: &Context) -> Context {
        ctx.with_value(self)
    }
}

/// Whether `ctx` descends from a stamped root.
///
/// Fails when no token is present, when the token is not positive, or when
/// `expected` is given and differs from the token.
pub(crate) fn is_valid_context(ctx: &Context, expected: Option<i64>) -> bool {
    match ctx.value::<StartupToken>() {
        Some(token) if token.0 > 0 => expected.is_none_or(|ts| ts == token.0),
        _ => false,
    }
}
