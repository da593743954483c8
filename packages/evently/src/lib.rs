//! # Evently
//!
//! An in-process event dispatcher: named events, per-event delivery flags,
//! replay to late binders, and deferred handlers, for any host object.
//!
//! ## Core Concepts
//!
//! - [`Events`] = one host's registry (handlers, flags, history)
//! - [`FlagSet`] = how an event delivers (`memory`, `once`, `stopOnFalse`, ...)
//! - [`Handler`] = a callback taking the host's context and the trigger's
//!   arguments
//! - [`Evented`] = mixin trait that gives a host type the whole API
//!
//! ## Architecture
//!
//! ```text
//! Host
//!   │
//!   ├─► new_event(name, "memory once") ─► FlagSet (process-wide cache)
//!   │
//!   ├─► add_event(name, handler) ──────► Registry ─► replay history
//!   │                                        │
//!   ├─► trigger_event(name, args) ─────► accept (once/memory rules)
//!   │                                        │
//!   │                                        ▼ snapshot
//!   │                                   Dispatcher
//!   │                                        │
//!   │                     ┌──────────────────┴──────────┐
//!   │                     ▼                             ▼
//!   │              Handler::call()            DeferredHandler ─► Scheduler
//!   │                     │                             │
//!   │                     ▼                             ▼
//!   │              Outcome::Value             Outcome::Pending(AsyncResult)
//!   │
//!   └─► remove_event(Removal::...)
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Handles are never reused** - strictly increasing per registry
//! 2. **History follows flags** - an event has a replay cache iff it has
//!    `memory` or `memoryLast`
//! 3. **Once means once** - a `once` event delivers a single trigger
//! 4. **Snapshots** - a dispatch runs the handlers present when it started,
//!    minus any removed along the way
//! 5. **Fail fast** - a handler error stops the dispatch and is returned
//!
//! ## Execution Model
//!
//! Single-threaded. [`Events`] is `!Send`; handlers may call back into the
//! registry at any time. Deferred handlers run through a [`Scheduler`]. By
//! default they wait in a built-in [`DeferredQueue`] drained with
//! [`Events::run_pending`]; inside a tokio `LocalSet`, [`LocalSpawner`]
//! runs them on the local task set instead.
//!
//! ## Example
//!
//! ```ignore
//! use evently::{Events, Handler, Removal};
//! use serde_json::json;
//!
//! let events = Events::new(());
//! events.new_event("validate", "stopOnFalse sort")?;
//!
//! events.add_event_with_level("validate", Handler::new(|_, args| {
//!     Ok(json!(args[0].as_str().is_some_and(|s| !s.is_empty())))
//! }), 10)?;
//! let audit = events.add_event("validate", Handler::new(|_, _| Ok(json!("audited"))))?;
//!
//! let results = events.trigger_event("validate", vec![json!("")])?;
//! assert_eq!(results.len(), 1); // stopped at the `false`
//!
//! events.remove_event(audit);
//! events.remove_event(Removal::event("validate"));
//! ```

// Core modules
mod core;
mod deferred;
mod dispatch;
mod error;
mod events;
mod flags;
mod mixin;
mod registry;
mod removal;
mod scheduler;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;


// Re-export core types
pub use crate::core::{Args, HandleId, Handler, Outcome};

// Re-export error types
pub use crate::error::EventError;

// Re-export flag types
pub use flags::{Flag, FlagSet};

// Re-export registry handle types
pub use events::{Events, EventsBuilder, WeakEvents};

// Re-export deferred types
pub use deferred::AsyncResult;

// Re-export scheduler types
pub use scheduler::{DeferredQueue, LocalSpawner, ScheduledTask, Scheduler, Task};

// Re-export removal types
pub use removal::Removal;

// Re-export mixin types
pub use mixin::{EventSlot, Evented};
