//! Core types shared by the registry, the dispatcher and the deferred wrapper.
//!
//! # Overview
//!
//! Every handler sees the same shape of call:
//! - an explicit **context** (`&C`), read from the registry at dispatch time
//! - the trigger's positional **arguments** (`&[Value]`)
//!
//! and answers with an `anyhow::Result<Value>`. Dispatch collects one
//! [`Outcome`] per invoked handler: either the handler's value, or an
//! [`AsyncResult`] placeholder when the handler was registered as deferred.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::deferred::AsyncResult;

/// Positional arguments of one trigger.
pub type Args = Vec<Value>;

/// Opaque id of one (event, handler) registration.
///
/// Ids are handed out by a registry in strictly increasing order and are
/// never reused for the lifetime of that registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw numeric id.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type HandlerFn<C> = dyn Fn(&C, &[Value]) -> anyhow::Result<Value>;

/// A shareable handler callback.
///
/// Cloning a `Handler` is cheap and keeps its identity: two clones compare
/// equal under [`Handler::ptr_eq`], which is what removal by
/// (name, handler) matches on.
///
/// # Example
///
/// ```ignore
/// use evently::Handler;
/// use serde_json::{json, Value};
///
/// let greet: Handler<String> = Handler::new(|ctx: &String, args: &[Value]| {
///     Ok(json!(format!("{} greets {}", ctx, args[0])))
/// });
/// ```
pub struct Handler<C> {
    inner: Rc<HandlerFn<C>>,
}

impl<C> Handler<C> {
    /// Wrap a closure as a handler.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&C, &[Value]) -> anyhow::Result<Value> + 'static,
    {
        Self { inner: Rc::new(f) }
    }

    /// Invoke the handler.
    pub fn call(&self, context: &C, args: &[Value]) -> anyhow::Result<Value> {
        (self.inner)(context, args)
    }

    /// Check whether two handlers are the same callback.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<C> Clone for Handler<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for Handler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("ptr", &Rc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

/// What one handler produced for one trigger.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A synchronous handler's return value.
    Value(Value),
    /// A deferred handler's placeholder, resolved once the callback runs.
    Pending(AsyncResult),
}

impl Outcome {
    /// True only for a synchronous `false` return.
    ///
    /// This is the value that stops a `stopOnFalse` dispatch. A pending
    /// placeholder is never `false`, whatever it later resolves to.
    pub fn is_false(&self) -> bool {
        matches!(self, Outcome::Value(Value::Bool(false)))
    }

    /// Get the synchronous value, if any.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Outcome::Value(value) => Some(value),
            Outcome::Pending(_) => None,
        }
    }

    /// Get the deferred placeholder, if any.
    pub fn as_pending(&self) -> Option<&AsyncResult> {
        match self {
            Outcome::Value(_) => None,
            Outcome::Pending(result) => Some(result),
        }
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Value(value)
    }
}

impl PartialEq<Value> for Outcome {
    fn eq(&self, other: &Value) -> bool {
        self.as_value() == Some(other)
    }
}
