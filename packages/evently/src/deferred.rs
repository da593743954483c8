//! Deferred handlers and their result placeholders.
//!
//! A handler registered with `add_event_async` is wrapped in a
//! [`DeferredHandler`]. When a trigger reaches the wrapper it does not call
//! the real callback; it schedules the call and hands back an
//! [`AsyncResult`] straight away. The trigger's result list therefore holds
//! [`Outcome::Pending`](crate::Outcome::Pending) for that slot.
//!
//! # Coalescing
//!
//! With `only_last`, a new trigger cancels the run still pending for the
//! same registration before scheduling its own, so a burst of triggers
//! collapses into a single run carrying the latest arguments:
//!
//! ```text
//! trigger(1) ─► schedule run(1)
//! trigger(2) ─► cancel run(1), schedule run(2)
//! trigger(3) ─► cancel run(2), schedule run(3)
//!        ... next opportunity ...
//!              run(3) ─► resolve
//! ```
//!
//! Cancelled runs never execute. Their placeholders are abandoned: queued
//! consumers are dropped uncalled and [`AsyncResult::value`] yields `None`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{trace, warn};

use crate::core::{HandleId, Handler};
use crate::error::EventError;
use crate::scheduler::{ScheduledTask, Scheduler};

// =============================================================================
// AsyncResult
// =============================================================================

type Consumer = Box<dyn FnOnce(Value) + 'static>;

#[derive(Default)]
struct ResultState {
    value: Option<Value>,
    resolved: bool,
    abandoned: bool,
    consumers: VecDeque<Consumer>,
}

/// Single-assignment placeholder for a deferred handler's return value.
///
/// Clones share the same slot.
///
/// `resolved` is tracked explicitly: a placeholder whose consumer queue was
/// emptied by a flush is resolved, while one with an empty queue that was
/// never resolved is not. Late subscribers to a resolved placeholder are
/// called immediately with the stored value.
#[derive(Clone, Default)]
pub struct AsyncResult {
    state: Rc<RefCell<ResultState>>,
}

impl AsyncResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self) -> bool {
        self.state.borrow().resolved
    }

    /// True once the run behind this placeholder was cancelled or failed.
    pub fn is_abandoned(&self) -> bool {
        self.state.borrow().abandoned
    }

    /// The stored value, if resolved.
    pub fn get(&self) -> Option<Value> {
        self.state.borrow().value.clone()
    }

    /// Store `value` and flush every queued consumer in FIFO order.
    ///
    /// Fails on a placeholder that is already resolved or abandoned.
    ///
    /// Consumers run after the internal borrow is released, so they may
    /// subscribe again; those late subscribers run immediately.
    pub fn resolve(&self, value: Value) -> Result<(), EventError> {
        let consumers = {
            let mut state = self.state.borrow_mut();
            if state.resolved {
                return Err(EventError::AlreadyResolved);
            }
            if state.abandoned {
                return Err(EventError::Abandoned);
            }
            state.value = Some(value.clone());
            state.resolved = true;
            std::mem::take(&mut state.consumers)
        };

        for consumer in consumers {
            consumer(value.clone());
        }
        Ok(())
    }

    /// Call `consumer` with the value: now if resolved, otherwise once
    /// [`resolve`](Self::resolve) runs.
    ///
    /// Consumers of an abandoned placeholder are never called.
    pub fn subscribe(&self, consumer: impl FnOnce(Value) + 'static) {
        let ready = {
            let mut state = self.state.borrow_mut();
            if state.resolved {
                state.value.clone()
            } else {
                if !state.abandoned {
                    state.consumers.push_back(Box::new(consumer));
                }
                return;
            }
        };

        if let Some(value) = ready {
            consumer(value);
        }
    }

    /// Wait for the value.
    ///
    /// Returns `None` if the placeholder is abandoned, either before or
    /// while waiting.
    pub async fn value(&self) -> Option<Value> {
        if let Some(value) = self.get() {
            return Some(value);
        }
        if self.is_abandoned() {
            return None;
        }

        let (tx, rx) = oneshot::channel();
        self.subscribe(move |value| {
            let _ = tx.send(value);
        });
        rx.await.ok()
    }

    /// Give up on an unresolved placeholder, dropping its consumers.
    pub(crate) fn abandon(&self) {
        let dropped = {
            let mut state = self.state.borrow_mut();
            if state.resolved {
                return;
            }
            state.abandoned = true;
            std::mem::take(&mut state.consumers)
        };
        drop(dropped);
    }
}

impl fmt::Debug for AsyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("AsyncResult")
            .field("value", &state.value)
            .field("resolved", &state.resolved)
            .field("abandoned", &state.abandoned)
            .field("pending_consumers", &state.consumers.len())
            .finish()
    }
}

/// Abandons its placeholder when dropped unresolved.
///
/// Owned by the scheduled task, so it fires both when a cancelled task is
/// dropped without running and when a run fails.
struct PendingRun {
    result: AsyncResult,
}

impl Drop for PendingRun {
    fn drop(&mut self) {
        self.result.abandon();
    }
}

// =============================================================================
// DeferredHandler
// =============================================================================

/// Wrapper that schedules a handler instead of calling it inline.
pub(crate) struct DeferredHandler<C> {
    handler: Handler<C>,
    only_last: bool,
    pending: Rc<RefCell<Option<ScheduledTask>>>,
}

impl<C: Clone + 'static> DeferredHandler<C> {
    pub(crate) fn new(handler: Handler<C>, only_last: bool) -> Self {
        Self {
            handler,
            only_last,
            pending: Rc::new(RefCell::new(None)),
        }
    }

    pub(crate) fn handler(&self) -> &Handler<C> {
        &self.handler
    }

    /// Schedule one run with this dispatch's context and arguments.
    pub(crate) fn invoke(
        &self,
        event: &str,
        handle: HandleId,
        context: &C,
        args: &[Value],
        scheduler: &dyn Scheduler,
    ) -> AsyncResult {
        if self.only_last {
            let previous = self.pending.borrow_mut().take();
            if let Some(previous) = previous {
                trace!(event, %handle, "coalescing pending deferred run");
                previous.cancel();
            }
        }

        let result = AsyncResult::new();
        let guard = PendingRun {
            result: result.clone(),
        };
        let handler = self.handler.clone();
        let context = context.clone();
        let args = args.to_vec();
        let pending = self.only_last.then(|| Rc::clone(&self.pending));
        let event = event.to_string();

        let task = scheduler.schedule(Box::new(move || {
            if let Some(pending) = pending {
                pending.borrow_mut().take();
            }
            match handler.call(&context, &args) {
                Ok(value) => {
                    // The guard is the only other owner and never resolves.
                    let _ = guard.result.resolve(value);
                }
                Err(e) => {
                    warn!(event = %event, %handle, error = %e, "deferred handler failed");
                }
            }
            drop(guard);
        }));

        if self.only_last {
            *self.pending.borrow_mut() = Some(task);
        }
        result
    }
}
