//! The public event registry handle.
//!
//! [`Events`] is a cheap, clonable handle to one host's registry. Clones
//! share state, so a handler can capture a handle (preferably a
//! [`WeakEvents`]) and trigger, add or remove handlers on the same registry
//! while a dispatch is running.
//!
//! # Example
//!
//! ```ignore
//! use evently::{Events, Handler};
//! use serde_json::json;
//!
//! let events = Events::new("page");
//! events.new_event("ready", "once memory")?;
//!
//! events.trigger_event("ready", vec![json!("loaded")])?;
//!
//! // Registered late, still observes the earlier trigger.
//! events.add_event("ready", Handler::new(|ctx, args| {
//!     println!("{} ready: {}", ctx, args[0]);
//!     Ok(json!(true))
//! }))?;
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::core::{Args, HandleId, Handler, Outcome};
use crate::deferred::DeferredHandler;
use crate::dispatch;
use crate::error::EventError;
use crate::flags::{Flag, FlagSet};
use crate::registry::{Callback, Registry};
use crate::removal::Removal;
use crate::scheduler::{DeferredQueue, Scheduler};

// =============================================================================
// Events
// =============================================================================

/// Handle to one host's event registry.
pub struct Events<C> {
    registry: Rc<RefCell<Registry<C>>>,
    scheduler: Rc<dyn Scheduler>,
    /// Built-in queue, present when no scheduler was configured.
    queue: Option<DeferredQueue>,
}

impl<C: Clone + 'static> Events<C> {
    /// Create a registry whose deferred handlers wait in a built-in queue,
    /// drained with [`run_pending`](Self::run_pending).
    pub fn new(context: C) -> Self {
        Self::builder(context).build()
    }

    /// Start building a registry.
    pub fn builder(context: C) -> EventsBuilder<C> {
        EventsBuilder::new(context)
    }

    /// Create a weak handle that does not keep the registry alive.
    pub fn downgrade(&self) -> WeakEvents<C> {
        WeakEvents {
            registry: Rc::downgrade(&self.registry),
            scheduler: Rc::clone(&self.scheduler),
            queue: self.queue.clone(),
        }
    }

    /// Run the deferred handlers queued before this call.
    ///
    /// Only drains the built-in queue; with a configured scheduler this is
    /// a no-op returning 0.
    pub fn run_pending(&self) -> usize {
        self.queue.as_ref().map_or(0, DeferredQueue::run_pending)
    }

    // -------------------------------------------------------------------------
    // Context
    // -------------------------------------------------------------------------

    /// Replace the context passed to handlers.
    ///
    /// Applies to every later dispatch, including for handlers that are
    /// already registered.
    pub fn set_event_context(&self, context: C) {
        self.registry.borrow_mut().context = context;
    }

    /// A clone of the current context.
    pub fn context(&self) -> C {
        self.registry.borrow().context.clone()
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    /// Configure `event` from a space-delimited flag specification.
    ///
    /// Reconfiguring an event replaces its flags and discards its replay
    /// history.
    pub fn new_event(&self, event: &str, spec: &str) -> Result<(), EventError> {
        let flags = FlagSet::parse(spec)?;
        self.configure(event, flags);
        Ok(())
    }

    /// Configure `event` with an already built flag set.
    pub fn configure(&self, event: &str, flags: FlagSet) {
        self.registry.borrow_mut().configure(event, flags);
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Register a handler at level 0.
    ///
    /// If `event` remembers past triggers, the handler is run once per
    /// remembered trigger before this returns.
    pub fn add_event(&self, event: &str, handler: Handler<C>) -> Result<HandleId, EventError> {
        self.add_event_with_level(event, handler, 0)
    }

    /// Register a handler with a level. Under `sort`, higher levels run
    /// earlier.
    pub fn add_event_with_level(
        &self,
        event: &str,
        handler: Handler<C>,
        level: i32,
    ) -> Result<HandleId, EventError> {
        self.register(event, Callback::Sync(handler), level)
    }

    /// Register a deferred handler at level 0.
    ///
    /// Dispatch schedules the handler instead of running it, and the
    /// trigger's result slot holds an [`Outcome::Pending`]. With
    /// `only_last`, a run still pending for this registration is cancelled
    /// by the next trigger.
    pub fn add_event_async(
        &self,
        event: &str,
        handler: Handler<C>,
        only_last: bool,
    ) -> Result<HandleId, EventError> {
        self.add_event_async_with_level(event, handler, only_last, 0)
    }

    /// Register a deferred handler with a level.
    pub fn add_event_async_with_level(
        &self,
        event: &str,
        handler: Handler<C>,
        only_last: bool,
        level: i32,
    ) -> Result<HandleId, EventError> {
        let deferred = DeferredHandler::new(handler, only_last);
        self.register(event, Callback::Deferred(deferred), level)
    }

    fn register(
        &self,
        event: &str,
        callback: Callback<C>,
        level: i32,
    ) -> Result<HandleId, EventError> {
        let registration = self.registry.borrow_mut().insert(event, callback, level);

        for args in &registration.replay {
            trace!(event, handle = %registration.entry.handle, "replaying remembered trigger");
            dispatch::invoke(
                event,
                &registration.entry,
                &registration.context,
                args,
                self.scheduler.as_ref(),
            )?;
        }

        Ok(registration.entry.handle)
    }

    // -------------------------------------------------------------------------
    // Removal
    // -------------------------------------------------------------------------

    /// Remove handlers. Returns how many registrations were removed; a
    /// request matching nothing is a no-op returning 0.
    pub fn remove_event(&self, removal: impl Into<Removal<C>>) -> usize {
        self.registry.borrow_mut().remove(removal.into())
    }

    // -------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------

    /// Trigger `event` and collect one outcome per handler that ran.
    ///
    /// An event that was never configured behaves as having no flags. The
    /// first failing handler stops the dispatch and its error is returned.
    pub fn trigger_event(&self, event: &str, args: Args) -> Result<Vec<Outcome>, EventError> {
        let delivery = self.registry.borrow_mut().accept_trigger(event, &args);
        let Some(delivery) = delivery else {
            return Ok(Vec::new());
        };

        let results = dispatch::deliver(event, &delivery, &args, self.scheduler.as_ref())?;

        if delivery.flags.contains(Flag::Clear) {
            let cleared = self.registry.borrow_mut().detach_event(event);
            trace!(event, cleared, "cleared handlers after dispatch");
        }

        Ok(results)
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    /// Number of handlers currently registered for `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.registry.borrow().handler_count(event)
    }

    /// Whether `handle` still identifies a registration.
    pub fn is_registered(&self, handle: HandleId) -> bool {
        self.registry.borrow().handler_index.contains_key(&handle)
    }

    /// The flags configured for `event`, if any.
    pub fn flags(&self, event: &str) -> Option<FlagSet> {
        self.registry.borrow().flags.get(event).copied()
    }

    /// The remembered triggers of `event`; `None` if it does not remember.
    pub fn memory(&self, event: &str) -> Option<Vec<Args>> {
        self.registry.borrow().memory_cache.get(event).cloned()
    }

    /// Whether a `once` event is still waiting for its single delivery.
    pub fn is_once_pending(&self, event: &str) -> bool {
        self.registry.borrow().once_run.contains(event)
    }
}

impl<C> Clone for Events<C> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
            scheduler: Rc::clone(&self.scheduler),
            queue: self.queue.clone(),
        }
    }
}

impl<C> fmt::Debug for Events<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.registry.try_borrow() {
            Ok(registry) => f
                .debug_struct("Events")
                .field("events", &registry.events.len())
                .field("handlers", &registry.handler_index.len())
                .finish(),
            Err(_) => f.debug_struct("Events").finish_non_exhaustive(),
        }
    }
}

// =============================================================================
// WeakEvents
// =============================================================================

/// Non-owning handle, for handlers that refer back to their own registry.
pub struct WeakEvents<C> {
    registry: Weak<RefCell<Registry<C>>>,
    scheduler: Rc<dyn Scheduler>,
    queue: Option<DeferredQueue>,
}

impl<C> WeakEvents<C> {
    /// Get a strong handle if the registry is still alive.
    pub fn upgrade(&self) -> Option<Events<C>> {
        Some(Events {
            registry: self.registry.upgrade()?,
            scheduler: Rc::clone(&self.scheduler),
            queue: self.queue.clone(),
        })
    }
}

impl<C> Clone for WeakEvents<C> {
    fn clone(&self) -> Self {
        Self {
            registry: Weak::clone(&self.registry),
            scheduler: Rc::clone(&self.scheduler),
            queue: self.queue.clone(),
        }
    }
}

impl<C> fmt::Debug for WeakEvents<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEvents")
            .field("alive", &(self.registry.strong_count() > 0))
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`Events`].
///
/// # Example
///
/// ```ignore
/// let queue = DeferredQueue::new();
/// let events = Events::builder(context)
///     .with_scheduler(queue.clone())
///     .build();
/// ```
pub struct EventsBuilder<C> {
    context: C,
    scheduler: Option<Rc<dyn Scheduler>>,
}

impl<C: Clone + 'static> EventsBuilder<C> {
    pub fn new(context: C) -> Self {
        Self {
            context,
            scheduler: None,
        }
    }

    /// Use a custom scheduler for deferred handlers, such as
    /// [`LocalSpawner`](crate::LocalSpawner) inside a tokio `LocalSet`.
    pub fn with_scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Use a scheduler shared with other registries.
    pub fn with_shared_scheduler(mut self, scheduler: Rc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn build(self) -> Events<C> {
        let (scheduler, queue) = match self.scheduler {
            Some(scheduler) => (scheduler, None),
            None => {
                let queue = DeferredQueue::new();
                let scheduler: Rc<dyn Scheduler> = Rc::new(queue.clone());
                (scheduler, Some(queue))
            }
        };

        Events {
            registry: Rc::new(RefCell::new(Registry::new(self.context))),
            scheduler,
            queue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::LocalSpawner;
    use serde_json::{json, Value};
    use std::cell::Cell;

    type Log = Rc<RefCell<Vec<Args>>>;

    fn recording(log: &Log, ret: Value) -> Handler<()> {
        let log = log.clone();
        Handler::new(move |_, args| {
            log.borrow_mut().push(args.to_vec());
            Ok(ret.clone())
        })
    }

    fn queued() -> (Events<()>, DeferredQueue) {
        let queue = DeferredQueue::new();
        let events = Events::builder(()).with_scheduler(queue.clone()).build();
        (events, queue)
    }

    #[test]
    fn test_sorted_dispatch_order_and_ties() {
        let events = Events::new(());
        events.new_event("e", "sort").unwrap();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (name, level) in [("three", 3), ("one", 1), ("two", 2), ("two-b", 2)] {
            let order = order.clone();
            events
                .add_event_with_level(
                    "e",
                    Handler::new(move |_, _| {
                        order.borrow_mut().push(name);
                        Ok(Value::Null)
                    }),
                    level,
                )
                .unwrap();
        }

        events.trigger_event("e", vec![]).unwrap();
        assert_eq!(*order.borrow(), vec!["three", "two", "two-b", "one"]);
    }

    #[test]
    fn test_stop_on_false() {
        let events = Events::new(());
        events.new_event("validate", "stopOnFalse").unwrap();
        let log = Log::default();
        events.add_event("validate", recording(&log, json!(1))).unwrap();
        events.add_event("validate", recording(&log, json!(false))).unwrap();
        events.add_event("validate", recording(&log, json!(2))).unwrap();

        let results = events.trigger_event("validate", vec![]).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0], json!(1));
        assert_eq!(results[1], json!(false));
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_once_with_memory_replays_first_trigger_only() {
        let events = Events::new(());
        events.new_event("ready", "once memory").unwrap();

        assert_eq!(events.trigger_event("ready", vec![json!(1)]).unwrap().len(), 0);
        assert!(!events.is_once_pending("ready"));
        assert!(events.trigger_event("ready", vec![json!(2)]).unwrap().is_empty());

        let log = Log::default();
        events.add_event("ready", recording(&log, Value::Null)).unwrap();
        assert_eq!(*log.borrow(), vec![vec![json!(1)]]);
    }

    #[test]
    fn test_once_without_memory_never_replays() {
        let events = Events::new(());
        events.new_event("ready", "once").unwrap();
        events.trigger_event("ready", vec![json!(1)]).unwrap();

        let log = Log::default();
        events.add_event("ready", recording(&log, Value::Null)).unwrap();
        assert!(log.borrow().is_empty());

        assert!(events.trigger_event("ready", vec![json!(2)]).unwrap().is_empty());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_once_delivers_to_live_handlers_once() {
        let events = Events::new(());
        events.new_event("ready", "once").unwrap();
        let log = Log::default();
        events.add_event("ready", recording(&log, json!("ok"))).unwrap();

        assert_eq!(events.trigger_event("ready", vec![json!(1)]).unwrap().len(), 1);
        assert!(events.trigger_event("ready", vec![json!(2)]).unwrap().is_empty());
        assert_eq!(*log.borrow(), vec![vec![json!(1)]]);
    }

    #[test]
    fn test_memory_replays_all_in_order() {
        let events = Events::new(());
        events.new_event("scroll", "memory").unwrap();
        events.trigger_event("scroll", vec![json!(1)]).unwrap();
        events.trigger_event("scroll", vec![json!(2)]).unwrap();

        let log = Log::default();
        events.add_event("scroll", recording(&log, Value::Null)).unwrap();
        assert_eq!(*log.borrow(), vec![vec![json!(1)], vec![json!(2)]]);
    }

    #[test]
    fn test_memory_last_replays_latest_only() {
        let events = Events::new(());
        events.new_event("city", "memoryLast").unwrap();
        events.trigger_event("city", vec![json!(1)]).unwrap();
        events.trigger_event("city", vec![json!(2)]).unwrap();

        let log = Log::default();
        events.add_event("city", recording(&log, Value::Null)).unwrap();
        assert_eq!(*log.borrow(), vec![vec![json!(2)]]);
        assert_eq!(events.memory("city"), Some(vec![vec![json!(2)]]));
    }

    #[test]
    fn test_clear_removes_handlers_after_dispatch() {
        let events = Events::new(());
        events.new_event("submit", "clear memory").unwrap();
        let log = Log::default();
        let a = events.add_event("submit", recording(&log, json!("a"))).unwrap();
        let b = events.add_event("submit", recording(&log, json!("b"))).unwrap();

        assert_eq!(events.trigger_event("submit", vec![json!(1)]).unwrap().len(), 2);
        assert_eq!(events.handler_count("submit"), 0);
        assert!(!events.is_registered(a));
        assert!(!events.is_registered(b));

        assert!(events.trigger_event("submit", vec![json!(2)]).unwrap().is_empty());
        assert_eq!(log.borrow().len(), 2);
        // Flags and memory survive the clear.
        assert!(events.flags("submit").unwrap().contains(Flag::Clear));
        assert_eq!(events.memory("submit").unwrap().len(), 2);
    }

    #[test]
    fn test_unconfigured_event_is_silent() {
        let events = Events::new(());
        assert!(events.trigger_event("nobody", vec![json!(1)]).unwrap().is_empty());

        let log = Log::default();
        events.add_event("nobody", recording(&log, json!(1))).unwrap();
        let results = events.trigger_event("nobody", vec![]).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(events.flags("nobody"), None);
        assert_eq!(events.memory("nobody"), None);
    }

    #[test]
    fn test_remove_by_handle_leaves_siblings() {
        let events = Events::new(());
        let log = Log::default();
        let shared = recording(&log, json!("shared"));
        let first = events.add_event("e", shared.clone()).unwrap();
        events.add_event("e", shared).unwrap();
        events.add_event("e", recording(&log, json!("other"))).unwrap();

        assert_eq!(events.remove_event(first), 1);
        assert_eq!(events.remove_event(first), 0);
        assert_eq!(events.remove_event(first), 0);
        assert_eq!(events.handler_count("e"), 2);
        assert_eq!(events.trigger_event("e", vec![]).unwrap().len(), 2);
    }

    #[test]
    fn test_context_is_read_at_dispatch_time() {
        let events = Events::new(String::from("before"));
        events
            .add_event("e", Handler::new(|ctx: &String, _| Ok(json!(ctx))))
            .unwrap();

        events.set_event_context(String::from("after"));
        let results = events.trigger_event("e", vec![]).unwrap();
        assert_eq!(results[0], json!("after"));
        assert_eq!(events.context(), "after");
    }

    #[test]
    fn test_replay_failure_is_returned_but_registration_stays() {
        let events = Events::new(());
        events.new_event("e", "memory").unwrap();
        events.trigger_event("e", vec![json!(1)]).unwrap();

        let err = events
            .add_event("e", Handler::new(|_, _| Err(anyhow::anyhow!("nope"))))
            .unwrap_err();
        assert!(matches!(err, EventError::Handler { .. }));
        assert_eq!(events.handler_count("e"), 1);
    }

    #[test]
    fn test_trigger_error_skips_clear() {
        let events = Events::new(());
        events.new_event("e", "clear").unwrap();
        events
            .add_event("e", Handler::new(|_, _| Err(anyhow::anyhow!("fail"))))
            .unwrap();

        assert!(events.trigger_event("e", vec![]).is_err());
        assert_eq!(events.handler_count("e"), 1);
    }

    #[test]
    fn test_unknown_flag_leaves_event_unconfigured() {
        let events = Events::new(());
        assert!(events.new_event("e", "memory forever").is_err());
        assert_eq!(events.flags("e"), None);
    }

    #[test]
    fn test_handler_can_remove_later_sibling_mid_dispatch() {
        let events = Events::new(());
        let log = Log::default();
        let victim_handle = Rc::new(Cell::new(None));

        let weak = events.downgrade();
        let target = victim_handle.clone();
        events
            .add_event(
                "e",
                Handler::new(move |_, _| {
                    if let (Some(events), Some(handle)) = (weak.upgrade(), target.get()) {
                        events.remove_event(handle);
                    }
                    Ok(json!("remover"))
                }),
            )
            .unwrap();
        let victim = events.add_event("e", recording(&log, json!("victim"))).unwrap();
        victim_handle.set(Some(victim));

        let results = events.trigger_event("e", vec![]).unwrap();
        assert_eq!(results.len(), 1);
        assert!(log.borrow().is_empty());
        assert!(!events.is_registered(victim));
    }

    #[test]
    fn test_handler_added_mid_dispatch_waits_for_next_trigger() {
        let events = Events::new(());
        let log = Log::default();
        let weak = events.downgrade();
        let late = recording(&log, json!("late"));
        let added = Rc::new(Cell::new(false));

        let flag = added.clone();
        events
            .add_event(
                "e",
                Handler::new(move |_, _| {
                    if !flag.replace(true) {
                        if let Some(events) = weak.upgrade() {
                            events.add_event("e", late.clone())?;
                        }
                    }
                    Ok(Value::Null)
                }),
            )
            .unwrap();

        assert_eq!(events.trigger_event("e", vec![]).unwrap().len(), 1);
        assert!(log.borrow().is_empty());
        assert_eq!(events.trigger_event("e", vec![]).unwrap().len(), 2);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_reentrant_trigger_of_another_event() {
        let events = Events::new(());
        let log = Log::default();
        events.add_event("inner", recording(&log, json!("inner"))).unwrap();

        let weak = events.downgrade();
        events
            .add_event(
                "outer",
                Handler::new(move |_, args| {
                    let events = weak.upgrade().expect("registry alive");
                    let inner = events.trigger_event("inner", args.to_vec())?;
                    Ok(json!(inner.len()))
                }),
            )
            .unwrap();

        let results = events.trigger_event("outer", vec![json!("x")]).unwrap();
        assert_eq!(results[0], json!(1));
        assert_eq!(*log.borrow(), vec![vec![json!("x")]]);
    }

    #[test]
    fn test_async_only_last_coalesces_burst() {
        let (events, queue) = queued();
        let log = Log::default();
        events
            .add_event_async("resize", recording(&log, json!("rendered")), true)
            .unwrap();

        let mut pending = Vec::new();
        for width in [640, 800, 1024] {
            let results = events.trigger_event("resize", vec![json!(width)]).unwrap();
            pending.push(results[0].as_pending().cloned().unwrap());
        }
        assert!(log.borrow().is_empty());

        assert_eq!(queue.run_until_idle(), 1);
        assert_eq!(*log.borrow(), vec![vec![json!(1024)]]);
        assert!(pending[0].is_abandoned());
        assert!(pending[1].is_abandoned());
        assert_eq!(pending[2].get(), Some(json!("rendered")));
    }

    #[test]
    fn test_async_handlers_coalesce_independently() {
        let (events, queue) = queued();
        let log_a = Log::default();
        let log_b = Log::default();
        events.add_event_async("e", recording(&log_a, json!("a")), true).unwrap();
        events.add_event_async("e", recording(&log_b, json!("b")), false).unwrap();

        events.trigger_event("e", vec![json!(1)]).unwrap();
        events.trigger_event("e", vec![json!(2)]).unwrap();

        assert_eq!(queue.run_pending(), 3);
        assert_eq!(*log_a.borrow(), vec![vec![json!(2)]]);
        assert_eq!(*log_b.borrow(), vec![vec![json!(1)], vec![json!(2)]]);
    }

    #[test]
    fn test_async_handler_uses_context_of_its_dispatch() {
        let queue = DeferredQueue::new();
        let events = Events::builder(1_i64).with_scheduler(queue.clone()).build();
        events
            .add_event_async("e", Handler::new(|ctx: &i64, _| Ok(json!(*ctx))), false)
            .unwrap();

        let results = events.trigger_event("e", vec![]).unwrap();
        events.set_event_context(2);
        queue.run_pending();

        assert_eq!(results[0].as_pending().unwrap().get(), Some(json!(1)));
    }

    #[test]
    fn test_async_memory_replay_is_scheduled() {
        let (events, queue) = queued();
        events.new_event("e", "memory").unwrap();
        events.trigger_event("e", vec![json!(1)]).unwrap();
        events.trigger_event("e", vec![json!(2)]).unwrap();

        let log = Log::default();
        events.add_event_async("e", recording(&log, Value::Null), false).unwrap();
        assert!(log.borrow().is_empty());

        queue.run_pending();
        assert_eq!(*log.borrow(), vec![vec![json!(1)], vec![json!(2)]]);
    }

    #[test]
    fn test_pending_never_stops_dispatch() {
        let (events, _queue) = queued();
        events.new_event("e", "stopOnFalse").unwrap();
        let log = Log::default();
        events
            .add_event_async("e", recording(&log, json!(false)), false)
            .unwrap();
        events.add_event("e", recording(&log, json!(true))).unwrap();

        assert_eq!(events.trigger_event("e", vec![]).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_async_with_local_spawner() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let events = Events::builder(()).with_scheduler(LocalSpawner).build();
                let log = Log::default();
                events
                    .add_event_async("resize", recording(&log, json!("done")), true)
                    .unwrap();

                let mut last = None;
                for n in 1..=3 {
                    let results = events.trigger_event("resize", vec![json!(n)]).unwrap();
                    last = results[0].as_pending().cloned();
                }
                assert!(log.borrow().is_empty());

                let value = last.unwrap().value().await;
                assert_eq!(value, Some(json!("done")));
                assert_eq!(*log.borrow(), vec![vec![json!(3)]]);
            })
            .await;
    }

    #[test]
    fn test_default_registry_queues_async_handlers() {
        let events = Events::new(());
        let log = Log::default();
        events
            .add_event_async("e", recording(&log, json!("ok")), true)
            .unwrap();

        let results = events.trigger_event("e", vec![json!(1)]).unwrap();
        assert!(log.borrow().is_empty());

        assert_eq!(events.run_pending(), 1);
        assert_eq!(*log.borrow(), vec![vec![json!(1)]]);
        assert_eq!(results[0].as_pending().unwrap().get(), Some(json!("ok")));
    }

    #[test]
    fn test_default_registry_queues_memory_replay() {
        let events = Events::new(());
        events.new_event("e", "memory").unwrap();
        events.trigger_event("e", vec![json!(1)]).unwrap();

        let log = Log::default();
        events
            .add_event_async("e", recording(&log, Value::Null), false)
            .unwrap();
        assert!(log.borrow().is_empty());

        let weak = events.downgrade();
        assert_eq!(weak.upgrade().unwrap().run_pending(), 1);
        assert_eq!(*log.borrow(), vec![vec![json!(1)]]);
    }

    #[test]
    fn test_run_pending_is_noop_with_custom_scheduler() {
        let (events, queue) = queued();
        let log = Log::default();
        events
            .add_event_async("e", recording(&log, Value::Null), false)
            .unwrap();
        events.trigger_event("e", vec![]).unwrap();

        assert_eq!(events.run_pending(), 0);
        assert_eq!(queue.run_pending(), 1);
    }

    #[test]
    fn test_weak_handle_does_not_keep_registry_alive() {
        let events = Events::new(());
        let weak = events.downgrade();
        assert!(weak.upgrade().is_some());
        drop(events);
        assert!(weak.upgrade().is_none());
    }
}
