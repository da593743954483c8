//! Handler removal.
//!
//! Removal requests come in four shapes, modelled as [`Removal`]:
//!
//! | Variant              | Handlers removed                       | Also drops              |
//! |----------------------|----------------------------------------|-------------------------|
//! | `ByHandle`           | exactly that registration              | its index entry         |
//! | `ByNameAndHandler`   | first registration of that handler     | its index entry         |
//! | `ByName`             | every registration of the event        | index entries, history  |
//! | `All`                | every registration of every event      | the whole index         |
//!
//! `All` leaves flags and replay history untouched, while `ByName` reclaims
//! the event's history. Flags and once-state always survive.
//!
//! Every variant is a silent no-op when nothing matches.

use tracing::debug;

use crate::core::{HandleId, Handler};
use crate::registry::Registry;

/// A removal request.
#[derive(Debug, Clone)]
pub enum Removal<C> {
    /// Remove the registration behind a handle.
    ByHandle(HandleId),
    /// Remove the first registration of `handler` on an event.
    ByNameAndHandler(String, Handler<C>),
    /// Remove every registration on an event.
    ByName(String),
    /// Remove every registration on every event.
    All,
}

impl<C> Removal<C> {
    /// Remove the registration behind `handle`.
    pub fn handle(handle: HandleId) -> Self {
        Removal::ByHandle(handle)
    }

    /// Remove the first registration of `handler` on `event`.
    pub fn handler(event: impl Into<String>, handler: &Handler<C>) -> Self {
        Removal::ByNameAndHandler(event.into(), handler.clone())
    }

    /// Remove every registration on `event` and its replay history.
    pub fn event(event: impl Into<String>) -> Self {
        Removal::ByName(event.into())
    }
}

impl<C> From<HandleId> for Removal<C> {
    fn from(handle: HandleId) -> Self {
        Removal::ByHandle(handle)
    }
}

impl<C: Clone + 'static> Registry<C> {
    /// Apply a removal request. Returns how many registrations went away.
    pub(crate) fn remove(&mut self, removal: Removal<C>) -> usize {
        match removal {
            Removal::ByHandle(handle) => {
                let removed = self.remove_handle(handle);
                debug!(%handle, removed, "handler removed by handle");
                removed
            }
            Removal::ByNameAndHandler(event, handler) => {
                let removed = self.remove_handler(&event, &handler);
                debug!(event = %event, removed, "handler removed");
                removed
            }
            Removal::ByName(event) => {
                let removed = self.remove_event(&event);
                debug!(event = %event, removed, "event handlers removed");
                removed
            }
            Removal::All => {
                let removed = self.remove_all();
                debug!(removed, "all handlers removed");
                removed
            }
        }
    }

    fn remove_handle(&mut self, handle: HandleId) -> usize {
        let Some(event) = self
            .handler_index
            .get(&handle)
            .map(|indexed| indexed.event.clone())
        else {
            return 0;
        };
        self.detach_handle(&event, handle)
    }

    fn remove_handler(&mut self, event: &str, handler: &Handler<C>) -> usize {
        let handle = self.events.get(event).and_then(|list| {
            list.iter()
                .find(|entry| entry.callback.handler().ptr_eq(handler))
                .map(|entry| entry.handle)
        });
        match handle {
            Some(handle) => self.detach_handle(event, handle),
            None => 0,
        }
    }

    fn remove_event(&mut self, event: &str) -> usize {
        let removed = self.detach_event(event);
        // History is reclaimed, but the cache stays present while the
        // event still remembers, so later triggers keep recording.
        if let Some(history) = self.memory_cache.get_mut(event) {
            history.clear();
            history.shrink_to_fit();
        }
        removed
    }

    fn remove_all(&mut self) -> usize {
        let removed = self.handler_index.len();
        for entry in self.events.values().flatten() {
            entry.mark_removed();
        }
        self.events.clear();
        self.handler_index.clear();
        removed
    }
}
