//! The `Evented` mixin.
//!
//! Any host type gains the event API by embedding an [`EventSlot`] and
//! implementing two methods of [`Evented`]. The registry behind the slot is
//! created on first use, owned by the host, and dropped with it.
//!
//! # Example
//!
//! ```ignore
//! use evently::{EventSlot, Evented, Handler};
//! use serde_json::json;
//!
//! struct MapView {
//!     name: String,
//!     events: EventSlot<String>,
//! }
//!
//! impl Evented for MapView {
//!     type Context = String;
//!
//!     fn event_slot(&self) -> &EventSlot<String> {
//!         &self.events
//!     }
//!
//!     fn default_event_context(&self) -> String {
//!         self.name.clone()
//!     }
//! }
//!
//! let view = MapView { name: "main".into(), events: EventSlot::new() };
//! view.new_event("zoom", "memoryLast")?;
//! view.trigger_event("zoom", vec![json!(12)])?;
//! ```

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use crate::core::{Args, HandleId, Handler, Outcome};
use crate::error::EventError;
use crate::events::Events;
use crate::removal::Removal;
use crate::scheduler::Scheduler;

/// Lazily created registry storage for a host.
pub struct EventSlot<C> {
    events: OnceCell<Events<C>>,
    scheduler: Option<Rc<dyn Scheduler>>,
}

impl<C: Clone + 'static> EventSlot<C> {
    /// A slot whose registry queues deferred handlers until
    /// [`Evented::run_pending`].
    pub fn new() -> Self {
        Self {
            events: OnceCell::new(),
            scheduler: None,
        }
    }

    /// A slot whose registry will use `scheduler` for deferred handlers.
    pub fn with_scheduler(scheduler: impl Scheduler + 'static) -> Self {
        Self {
            events: OnceCell::new(),
            scheduler: Some(Rc::new(scheduler)),
        }
    }

    /// The registry, if it was created already.
    pub fn get(&self) -> Option<&Events<C>> {
        self.events.get()
    }

    fn get_or_init(&self, context: impl FnOnce() -> C) -> &Events<C> {
        self.events.get_or_init(|| {
            let builder = Events::builder(context());
            match &self.scheduler {
                Some(scheduler) => builder.with_shared_scheduler(Rc::clone(scheduler)).build(),
                None => builder.build(),
            }
        })
    }
}

impl<C: Clone + 'static> Default for EventSlot<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for EventSlot<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSlot")
            .field("initialized", &self.events.get().is_some())
            .finish()
    }
}

/// Grants a host type named events.
///
/// Implementors provide the slot and the initial context; every other
/// method has a default that forwards to the host's [`Events`].
pub trait Evented {
    /// The value passed to every handler of this host.
    type Context: Clone + 'static;

    fn event_slot(&self) -> &EventSlot<Self::Context>;

    /// Context used when the registry is created, until
    /// [`set_event_context`](Self::set_event_context) replaces it.
    fn default_event_context(&self) -> Self::Context;

    /// The host's registry, created on first use.
    fn events(&self) -> &Events<Self::Context> {
        self.event_slot().get_or_init(|| self.default_event_context())
    }

    fn set_event_context(&self, context: Self::Context) {
        self.events().set_event_context(context);
    }

    fn new_event(&self, event: &str, spec: &str) -> Result<(), EventError> {
        self.events().new_event(event, spec)
    }

    fn add_event(
        &self,
        event: &str,
        handler: Handler<Self::Context>,
    ) -> Result<HandleId, EventError> {
        self.events().add_event(event, handler)
    }

    fn add_event_with_level(
        &self,
        event: &str,
        handler: Handler<Self::Context>,
        level: i32,
    ) -> Result<HandleId, EventError> {
        self.events().add_event_with_level(event, handler, level)
    }

    fn add_event_async(
        &self,
        event: &str,
        handler: Handler<Self::Context>,
        only_last: bool,
    ) -> Result<HandleId, EventError> {
        self.events().add_event_async(event, handler, only_last)
    }

    fn add_event_async_with_level(
        &self,
        event: &str,
        handler: Handler<Self::Context>,
        only_last: bool,
        level: i32,
    ) -> Result<HandleId, EventError> {
        self.events()
            .add_event_async_with_level(event, handler, only_last, level)
    }

    /// Remove handlers. A host that never used events has nothing to
    /// remove, and its registry is not created.
    fn remove_event(&self, removal: impl Into<Removal<Self::Context>>) -> usize
    where
        Self: Sized,
    {
        match self.event_slot().get() {
            Some(events) => events.remove_event(removal),
            None => 0,
        }
    }

    fn trigger_event(&self, event: &str, args: Args) -> Result<Vec<Outcome>, EventError> {
        self.events().trigger_event(event, args)
    }

    /// Run queued deferred handlers; see [`Events::run_pending`].
    fn run_pending(&self) -> usize {
        self.event_slot().get().map_or(0, Events::run_pending)
    }
}
