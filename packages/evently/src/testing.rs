//! Testing utilities for evently hosts.
//!
//! # Feature Flag
//!
//! This module is only available with the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! evently = { version = "0.1", features = ["testing"] }
//! ```
//!
//! # Using `Recorder`
//!
//! A [`Recorder`] hands out labelled handlers and remembers every call they
//! receive, in order, across all of them:
//!
//! ```ignore
//! use evently::testing::Recorder;
//!
//! let recorder = Recorder::new();
//! events.add_event("save", recorder.handler("first", json!(1)))?;
//! events.add_event("save", recorder.handler("second", json!(false)))?;
//!
//! events.trigger_event("save", vec![json!("doc")])?;
//!
//! assert_eq!(recorder.labels(), vec!["first", "second"]);
//! assert_eq!(recorder.args_for("first"), vec![vec![json!("doc")]]);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::core::{Args, Handler};

/// One recorded handler call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub label: String,
    pub args: Args,
}

/// Shared log of handler calls. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Rc<RefCell<Vec<Call>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler that records its call under `label` and returns `ret`.
    pub fn handler<C: 'static>(&self, label: &str, ret: Value) -> Handler<C> {
        let calls = Rc::clone(&self.calls);
        let label = label.to_string();
        Handler::new(move |_: &C, args: &[Value]| {
            calls.borrow_mut().push(Call {
                label: label.clone(),
                args: args.to_vec(),
            });
            Ok(ret.clone())
        })
    }

    /// A handler that records its call under `label` and then fails.
    pub fn failing<C: 'static>(&self, label: &str, message: &str) -> Handler<C> {
        let calls = Rc::clone(&self.calls);
        let label = label.to_string();
        let message = message.to_string();
        Handler::new(move |_: &C, args: &[Value]| {
            calls.borrow_mut().push(Call {
                label: label.clone(),
                args: args.to_vec(),
            });
            Err(anyhow::anyhow!("{}", message))
        })
    }

    /// Every call so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Labels of every call so far, oldest first.
    pub fn labels(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.label.clone()).collect()
    }

    /// Argument tuples received by the handler(s) labelled `label`.
    pub fn args_for(&self, label: &str) -> Vec<Args> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.label == label)
            .map(|c| c.args.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}
