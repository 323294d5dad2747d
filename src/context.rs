//! Immutable, request-scoped value chain.
//!
//! A [`Context`] is a singly linked list of typed values. Every
//! [`Context::with_value`] call returns a *new* context whose head points at
//! the old one; nothing reachable from an existing context ever changes.
//! That makes a context safe to hand to any number of tasks at once, and it
//! means a handler deep in the stack can never rewrite what an outer layer
//! already decided.
//!
//! ```text
//!  background ◄── StartupToken ◄── Region("eu") ◄── TraceId ◄── AbortSignal
//!                                                              ▲
//!                                                      ctx.value::<T>() starts here
//! ```
//!
//! Values are keyed by their Rust type. Lookup walks from the newest node
//! towards the root, so the most recent value of a type shadows older ones.
//! Keep key types private to the module that owns them and expose typed
//! accessor functions instead. This crate stores its own
//! reserved values (abort signals, trace ids, flags, the startup token).

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// An immutable, cheaply cloneable chain of typed values.
///
/// Cloning is one atomic increment. Two clones share the same nodes.
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Node>>,
}

struct Node {
    parent: Option<Arc<Node>>,
    key: TypeId,
    value: Box<dyn Any + Send + Sync>,
}

impl Context {
    /// The empty root context. Carries no values.
    pub fn background() -> Self {
        Self { head: None }
    }

    /// Returns a descendant of `self` carrying `value`.
    ///
    /// `self` is left untouched.
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        let node = Node {
            parent: self.head.clone(),
            key: TypeId::of::<T>(),
            value: Box::new(value),
        };
        Self { head: Some(Arc::new(node)) }
    }

    /// The most recently attached value of type `T`, if any.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        let key = TypeId::of::<T>();
        let mut cursor = self.head.as_deref();
        while let Some(node) = cursor {
            if node.key == key {
                return node.value.downcast_ref::<T>();
            }
            cursor = node.parent.as_deref();
        }
        None
    }

    /// Number of values in the chain, shadowed ones included.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cursor = self.head.as_deref();
        while let Some(node) = cursor {
            depth += 1;
            cursor = node.parent.as_deref();
        }
        depth
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("depth", &self.depth()).finish()
    }
}
