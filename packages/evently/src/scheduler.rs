//! Schedulers for deferred handlers.
//!
//! A deferred handler never runs inside the trigger that reached it. The
//! wrapper hands its run to a [`Scheduler`], which executes it at the next
//! scheduling opportunity on the same thread, strictly after the triggering
//! call has returned.
//!
//! Two schedulers are provided:
//!
//! - [`DeferredQueue`] (default): a FIFO queue the host drains itself with
//!   [`DeferredQueue::run_pending`]. Needs no runtime.
//! - [`LocalSpawner`]: spawns onto the current tokio
//!   [`LocalSet`](tokio::task::LocalSet). The run happens the next time the
//!   local set is polled. Opt in with `EventsBuilder::with_scheduler`.
//!
//! Both run tasks in scheduling order. Cancelling a [`ScheduledTask`] before
//! it runs drops the task without running it.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Executes deferred work at the next scheduling opportunity.
pub trait Scheduler {
    /// Schedule `task` and return a handle that can cancel it.
    fn schedule(&self, task: Task) -> ScheduledTask;
}

/// Handle to a scheduled task.
///
/// Dropping the handle does **not** cancel the task; call
/// [`ScheduledTask::cancel`] for that.
pub struct ScheduledTask {
    cancel: Box<dyn FnOnce() + 'static>,
}

impl ScheduledTask {
    /// Create a handle from a cancellation closure.
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    /// Cancel the task. No-op if it already ran.
    pub fn cancel(self) {
        (self.cancel)()
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask").finish_non_exhaustive()
    }
}

// =============================================================================
// LocalSpawner
// =============================================================================

/// Scheduler backed by `tokio::task::spawn_local`.
///
/// # Panics
///
/// Scheduling panics when called outside of a
/// [`LocalSet`](tokio::task::LocalSet) context.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalSpawner;

impl Scheduler for LocalSpawner {
    fn schedule(&self, task: Task) -> ScheduledTask {
        let handle = tokio::task::spawn_local(async move { task() });
        ScheduledTask::new(move || handle.abort())
    }
}

// =============================================================================
// DeferredQueue
// =============================================================================

#[derive(Default)]
struct QueueState {
    next_id: u64,
    tasks: VecDeque<(u64, Task)>,
}

/// Host-driven FIFO scheduler.
///
/// Clones share the same queue.
///
/// # Example
///
/// ```ignore
/// let queue = DeferredQueue::new();
/// let events = Events::builder(())
///     .with_scheduler(queue.clone())
///     .build();
///
/// events.add_event_async("resize", handler, true)?;
/// events.trigger_event("resize", vec![json!(800)])?;
/// events.trigger_event("resize", vec![json!(1024)])?;
///
/// assert_eq!(queue.run_pending(), 1);
/// ```
#[derive(Clone, Default)]
pub struct DeferredQueue {
    state: Rc<RefCell<QueueState>>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run.
    pub fn len(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the tasks that were queued before this call, in FIFO order.
    ///
    /// Tasks scheduled while this runs wait for the next call. Returns the
    /// number of tasks run.
    pub fn run_pending(&self) -> usize {
        let limit = self.state.borrow().next_id;
        let mut ran = 0;

        loop {
            let task = {
                let mut state = self.state.borrow_mut();
                let due = matches!(state.tasks.front(), Some((id, _)) if *id < limit);
                if due {
                    state.tasks.pop_front().map(|(_, t)| t)
                } else {
                    None
                }
            };
            let Some(task) = task else {
                break;
            };
            task();
            ran += 1;
        }

        trace!(ran, "deferred queue drained");
        ran
    }

    /// Keep running until no task is left, including tasks scheduled by
    /// tasks. Returns the total number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.run_pending();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
    }
}

fn cancel_queued(state: &Weak<RefCell<QueueState>>, id: u64) {
    let Some(state) = state.upgrade() else {
        return;
    };
    // Drop the task after the borrow ends; its captures may run arbitrary
    // drop code.
    let removed = {
        let mut state = state.borrow_mut();
        state
            .tasks
            .iter()
            .position(|(queued, _)| *queued == id)
            .and_then(|pos| state.tasks.remove(pos))
    };
    drop(removed);
}

impl Scheduler for DeferredQueue {
    fn schedule(&self, task: Task) -> ScheduledTask {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id;
            state.next_id += 1;
            state.tasks.push_back((id, task));
            id
        };

        let state = Rc::downgrade(&self.state);
        ScheduledTask::new(move || cancel_queued(&state, id))
    }
}

impl fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("pending", &self.len())
            .finish()
    }
}
