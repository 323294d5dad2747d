//! Context enrichment hooks.
//!
//! Two ordered hook lists shape the context every handler sees:
//!
//! | List | Runs | Starts from |
//! |---|---|---|
//! | **base** | once per listener, before the first accept | a fresh root stamped with the startup token |
//! | **connection** | once per accepted connection | the shared base context |
//!
//! ```rust
//! use tether::{hooks, ContextHook, Context};
//!
//! struct Region(&'static str);
//!
//! fn with_region(ctx: Context) -> Context {
//!     ctx.with_value(Region("eu-west-1"))
//! }
//!
//! hooks::add_base_hooks([with_region.boxed()]);
//! ```
//!
//! A hook must return a descendant of the context it was given. One that
//! returns something else (typically `Context::background()`) would throw
//! away everything earlier hooks attached, so its result is dropped with a
//! warning and the fold carries on with the previous context.
//!
//! Each list's lock is held for the whole fold. Connection hooks therefore
//! run one connection at a time: keep them cheap and never block in them.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::context::Context;
use crate::startup::{StartupToken, is_valid_context};

// ── Hook trait ────────────────────────────────────────────────────────────────

/// Implemented for every `Fn(Context) -> Context + Send + Sync + 'static`.
pub trait ContextHook: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> Context;

    /// Type-erases the hook so hooks of different types can share one list.
    fn boxed(self) -> BoxedHook
    where
        Self: Sized,
    {
        Arc::new(self)
    }
}

impl<F> ContextHook for F
where
    F: Fn(Context) -> Context + Send + Sync + 'static,
{
    fn call(&self, ctx: Context) -> Context {
        self(ctx)
    }
}

/// A type-erased hook, shareable across threads.
pub type BoxedHook = Arc<dyn ContextHook>;

// ── HookList ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
enum Stage {
    Base,
    Conn,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Base => "base",
            Self::Conn => "connection",
        })
    }
}

/// Append-only, ordered list of hooks behind a mutex.
struct HookList {
    hooks: Mutex<Vec<BoxedHook>>,
}

impl HookList {
    const fn new() -> Self {
        Self { hooks: Mutex::new(Vec::new()) }
    }

    fn extend(&self, hooks: impl IntoIterator<Item = BoxedHook>) {
        let mut list = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
        list.extend(hooks);
    }

    fn len(&self) -> usize {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Runs every hook in registration order, threading the accumulator.
    ///
    /// A panicking hook poisons the lock; later folds recover the list
    /// rather than taking the server down.
    fn fold(&self, init: Context, token: StartupToken, stage: Stage) -> Context {
        let list = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ctx = init;
        for (index, hook) in list.iter().enumerate() {
            let candidate = hook.call(ctx.clone());
            if !is_valid_context(&candidate, Some(token.started_at())) {
                warn!(%stage, index, "hook returned a context not derived from the base context, ignoring it");
                continue;
            }
            ctx = candidate;
        }
        ctx
    }
}

// ── Hooks registry ────────────────────────────────────────────────────────────

/// A pair of base and connection hook lists.
///
/// Most programs use the process-wide registry through [`add_base_hooks`] and
/// [`add_conn_hooks`]. A separate registry can be declared as a `static` and
/// handed to [`Server::hooks`](crate::Server::hooks).
pub struct Hooks {
    base: HookList,
    conn: HookList,
}

static GLOBAL: Hooks = Hooks::new();

impl Hooks {
    pub const fn new() -> Self {
        Self { base: HookList::new(), conn: HookList::new() }
    }

    /// The process-wide registry.
    pub fn global() -> &'static Hooks {
        &GLOBAL
    }

    /// Appends hooks that run once per listener.
    ///
    /// Register before serving; a listener that already built its base
    /// context will not see later additions.
    pub fn add_base_hooks(&self, hooks: impl IntoIterator<Item = BoxedHook>) {
        self.base.extend(hooks);
    }

    /// Appends hooks that run once per accepted connection.
    pub fn add_conn_hooks(&self, hooks: impl IntoIterator<Item = BoxedHook>) {
        self.conn.extend(hooks);
    }

    pub fn base_len(&self) -> usize {
        self.base.len()
    }

    pub fn conn_len(&self) -> usize {
        self.conn.len()
    }

    /// Builds the base context: a stamped root folded through the base hooks.
    pub(crate) fn base_context(&self, token: StartupToken) -> Context {
        let root = token.stamp(&Context::background());
        self.base.fold(root, token, Stage::Base)
    }

    /// Builds one connection's context from the shared base context.
    pub(crate) fn conn_context(&self, base: &Context, token: StartupToken) -> Context {
        self.conn.fold(base.clone(), token, Stage::Conn)
    }
}

impl Default for Hooks {
    fn default() -> Self { Self::new() }
}

/// Appends hooks to the process-wide base list.
pub fn add_base_hooks(hooks: impl IntoIterator<Item = BoxedHook>) {
    GLOBAL.add_base_hooks(hooks);
}

/// Appends hooks to the process-wide connection list.
pub fn add_conn_hooks(hooks: impl IntoIterator<Item = BoxedHook>) {
    GLOBAL.add_conn_hooks(hooks);
}
