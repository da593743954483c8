//! Structured error type for evently.
//!
//! Handlers report failures as plain `anyhow::Error`; the registry wraps them
//! in [`EventError::Handler`] together with the event name and the handle of
//! the registration that failed, so callers can match on where it came from.
//!
//! # The Propagation Rule
//!
//! > **A failing handler is never swallowed.**
//!
//! - A failure during `trigger_event` stops the remaining deliveries for that
//!   trigger and is returned to the caller.
//! - A failure while replaying memory to a new handler is returned from
//!   `add_event`.
//! - Deferred callbacks have no caller left to return to; their failures are
//!   logged and the corresponding [`AsyncResult`](crate::AsyncResult) is
//!   abandoned.
//!
//! # Example
//!
//! ```ignore
//! use evently::EventError;
//!
//! match events.trigger_event("submit", vec![form]) {
//!     Ok(results) => println!("{} handlers ran", results.len()),
//!     Err(EventError::Handler { event, handle, source }) => {
//!         eprintln!("handler {} for {} failed: {:#}", handle, event, source);
//!     }
//!     Err(e) => eprintln!("other evently error: {}", e),
//! }
//! ```

use thiserror::Error;

use crate::core::HandleId;

/// Errors returned by evently operations.
#[derive(Debug, Error)]
pub enum EventError {
    /// A handler returned an error while being invoked.
    #[error("handler {handle} for event `{event}` failed")]
    Handler {
        /// The event being dispatched or replayed.
        event: String,
        /// The registration whose handler failed.
        handle: HandleId,
        /// What the handler returned.
        #[source]
        source: anyhow::Error,
    },

    /// A flag specification contained a word that is not a known flag.
    #[error("unknown event flag `{word}`")]
    UnknownFlag {
        /// The offending word.
        word: String,
    },

    /// A structured flag specification could not be decoded.
    #[error("invalid event flags: {0}")]
    InvalidFlags(#[from] serde_json::Error),

    /// An [`AsyncResult`](crate::AsyncResult) was resolved twice.
    #[error("async result already resolved")]
    AlreadyResolved,

    /// An [`AsyncResult`](crate::AsyncResult) was resolved after its run
    /// was cancelled or failed.
    #[error("async result was abandoned")]
    Abandoned,
}

impl EventError {
    /// The event name, for errors raised while handling a specific event.
    pub fn event(&self) -> Option<&str> {
        match self {
            EventError::Handler { event, .. } => Some(event),
            _ => None,
        }
    }

    /// The failing registration, for handler errors.
    pub fn handle(&self) -> Option<HandleId> {
        match self {
            EventError::Handler { handle, .. } => Some(*handle),
            _ => None,
        }
    }
}
