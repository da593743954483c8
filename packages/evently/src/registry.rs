//! Per-host registry state.
//!
//! The registry is plain data: it never calls user code. [`Events`] borrows
//! it to take a snapshot, releases the borrow, and only then runs handlers,
//! so handlers are free to call back into the same registry.
//!
//! [`Events`]: crate::Events

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::core::{Args, HandleId, Handler};
use crate::deferred::DeferredHandler;
use crate::flags::{Flag, FlagSet};

/// What a registration runs when dispatched.
pub(crate) enum Callback<C> {
    Sync(Handler<C>),
    Deferred(DeferredHandler<C>),
}

impl<C: Clone + 'static> Callback<C> {
    /// The user's handler, for identity comparisons.
    pub(crate) fn handler(&self) -> &Handler<C> {
        match self {
            Callback::Sync(handler) => handler,
            Callback::Deferred(deferred) => deferred.handler(),
        }
    }
}

/// One registration in an event's handler list.
pub(crate) struct Entry<C> {
    pub(crate) handle: HandleId,
    pub(crate) level: i32,
    pub(crate) callback: Callback<C>,
    removed: Cell<bool>,
}

impl<C> Entry<C> {
    pub(crate) fn is_removed(&self) -> bool {
        self.removed.get()
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.set(true);
    }
}

/// Index record for one handle.
pub(crate) struct IndexEntry<C> {
    pub(crate) event: String,
    pub(crate) handler: Handler<C>,
}

/// State captured when a trigger is accepted.
pub(crate) struct Delivery<C> {
    pub(crate) entries: Vec<Rc<Entry<C>>>,
    pub(crate) context: C,
    pub(crate) flags: FlagSet,
}

/// State captured when a handler is added.
pub(crate) struct Registration<C> {
    pub(crate) entry: Rc<Entry<C>>,
    pub(crate) context: C,
    pub(crate) replay: Vec<Args>,
}

pub(crate) struct Registry<C> {
    pub(crate) context: C,
    pub(crate) events: HashMap<String, Vec<Rc<Entry<C>>>>,
    pub(crate) flags: HashMap<String, FlagSet>,
    pub(crate) once_run: HashSet<String>,
    pub(crate) memory_cache: HashMap<String, Vec<Args>>,
    pub(crate) handler_index: BTreeMap<HandleId, IndexEntry<C>>,
    last_handle: u64,
}

impl<C: Clone + 'static> Registry<C> {
    pub(crate) fn new(context: C) -> Self {
        Self {
            context,
            events: HashMap::new(),
            flags: HashMap::new(),
            once_run: HashSet::new(),
            memory_cache: HashMap::new(),
            handler_index: BTreeMap::new(),
            last_handle: 0,
        }
    }

    /// Flags for `event`; the empty set if it was never configured.
    pub(crate) fn flags_for(&self, event: &str) -> FlagSet {
        self.flags.get(event).copied().unwrap_or_default()
    }

    /// Install or replace the flags of `event`.
    ///
    /// Reconfiguring discards the event's replay history and re-arms `once`.
    /// Registered handlers are kept.
    pub(crate) fn configure(&mut self, event: &str, flags: FlagSet) {
        self.flags.insert(event.to_string(), flags);

        if flags.contains(Flag::Once) {
            self.once_run.insert(event.to_string());
        } else {
            self.once_run.remove(event);
        }

        if flags.remembers() {
            self.memory_cache.insert(event.to_string(), Vec::new());
        } else {
            self.memory_cache.remove(event);
        }

        debug!(event, flags = %flags, "event configured");
    }

    /// Append a registration and return what the caller needs to replay
    /// history through it.
    pub(crate) fn insert(
        &mut self,
        event: &str,
        callback: Callback<C>,
        level: i32,
    ) -> Registration<C> {
        self.last_handle += 1;
        let handle = HandleId::new(self.last_handle);
        let flags = self.flags_for(event);

        self.handler_index.insert(
            handle,
            IndexEntry {
                event: event.to_string(),
                handler: callback.handler().clone(),
            },
        );

        let entry = Rc::new(Entry {
            handle,
            level,
            callback,
            removed: Cell::new(false),
        });

        let list = self.events.entry(event.to_string()).or_default();
        list.push(Rc::clone(&entry));
        if flags.contains(Flag::Sort) {
            // Vec::sort_by is stable: equal levels keep insertion order.
            list.sort_by(|a, b| b.level.cmp(&a.level));
        }

        let replay = if flags.remembers() {
            self.memory_cache.get(event).cloned().unwrap_or_default()
        } else {
            Vec::new()
        };

        debug!(event, %handle, level, replay = replay.len(), "handler added");

        Registration {
            entry,
            context: self.context.clone(),
            replay,
        }
    }

    /// Apply the once/memory rules for a trigger and snapshot the handlers.
    ///
    /// Returns `None` when a `once` event has already fired.
    pub(crate) fn accept_trigger(&mut self, event: &str, args: &[Value]) -> Option<Delivery<C>> {
        let flags = self.flags_for(event);

        if flags.contains(Flag::Once) {
            if !self.once_run.remove(event) {
                debug!(event, "once event already fired, skipping delivery");
                return None;
            }
            if flags.remembers() {
                self.memory_cache
                    .insert(event.to_string(), vec![args.to_vec()]);
            }
        } else if flags.contains(Flag::MemoryLast) {
            self.memory_cache
                .insert(event.to_string(), vec![args.to_vec()]);
        } else if flags.contains(Flag::Memory) {
            self.memory_cache
                .entry(event.to_string())
                .or_default()
                .push(args.to_vec());
        }

        Some(Delivery {
            entries: self.events.get(event).cloned().unwrap_or_default(),
            context: self.context.clone(),
            flags,
        })
    }

    /// Detach every handler of `event` and drop their index entries.
    ///
    /// Flags, once-state and memory are left alone.
    pub(crate) fn detach_event(&mut self, event: &str) -> usize {
        let Some(list) = self.events.get_mut(event) else {
            return 0;
        };
        let detached = std::mem::take(list);
        for entry in &detached {
            entry.mark_removed();
        }
        self.handler_index.retain(|_, indexed| indexed.event != event);
        detached.len()
    }

    /// Detach one registration by handle.
    pub(crate) fn detach_handle(&mut self, event: &str, handle: HandleId) -> usize {
        self.handler_index.remove(&handle);
        let Some(list) = self.events.get_mut(event) else {
            return 0;
        };
        match list.iter().position(|entry| entry.handle == handle) {
            Some(pos) => {
                list.remove(pos).mark_removed();
                1
            }
            None => 0,
        }
    }

    pub(crate) fn handler_count(&self, event: &str) -> usize {
        self.events.get(event).map_or(0, Vec::len)
    }
}
