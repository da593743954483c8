//! Handler execution for one trigger.
//!
//! The dispatcher walks the snapshot taken when the trigger was accepted:
//! 1. Entries removed since the snapshot are skipped
//! 2. Each remaining entry runs with the trigger's context and arguments
//! 3. Outcomes are collected in list order
//! 4. Under `stopOnFalse`, the walk ends right after a `false` outcome
//!
//! A handler error ends the walk and is returned; later entries never run.

use serde_json::Value;
use tracing::trace;

use crate::core::Outcome;
use crate::error::EventError;
use crate::flags::Flag;
use crate::registry::{Callback, Delivery, Entry};
use crate::scheduler::Scheduler;

/// Run one registration.
pub(crate) fn invoke<C: Clone + 'static>(
    event: &str,
    entry: &Entry<C>,
    context: &C,
    args: &[Value],
    scheduler: &dyn Scheduler,
) -> Result<Outcome, EventError> {
    match &entry.callback {
        Callback::Sync(handler) => handler
            .call(context, args)
            .map(Outcome::Value)
            .map_err(|source| EventError::Handler {
                event: event.to_string(),
                handle: entry.handle,
                source,
            }),
        Callback::Deferred(deferred) => Ok(Outcome::Pending(deferred.invoke(
            event,
            entry.handle,
            context,
            args,
            scheduler,
        ))),
    }
}

/// Run every handler of an accepted trigger.
pub(crate) fn deliver<C: Clone + 'static>(
    event: &str,
    delivery: &Delivery<C>,
    args: &[Value],
    scheduler: &dyn Scheduler,
) -> Result<Vec<Outcome>, EventError> {
    let stop_on_false = delivery.flags.contains(Flag::StopOnFalse);
    let mut results = Vec::with_capacity(delivery.entries.len());

    for entry in &delivery.entries {
        if entry.is_removed() {
            trace!(event, handle = %entry.handle, "skipping handler removed mid-dispatch");
            continue;
        }

        let outcome = invoke(event, entry, &delivery.context, args, scheduler)?;
        let stop = stop_on_false && outcome.is_false();
        results.push(outcome);

        if stop {
            trace!(event, handle = %entry.handle, "handler returned false, stopping");
            break;
        }
    }

    trace!(event, delivered = results.len(), "dispatch complete");
    Ok(results)
}
