//! Event flags - per-event delivery semantics.
//!
//! A [`FlagSet`] is an immutable set of capabilities attached to one event
//! name. It is usually written as space-delimited words:
//!
//! ```text
//! "memory once"
//! "memoryLast stopOnFalse sort"
//! ```
//!
//! | Flag          | Effect                                                     |
//! |---------------|------------------------------------------------------------|
//! | `memory`      | replay every past trigger to each newly added handler      |
//! | `memoryLast`  | replay only the most recent trigger                        |
//! | `once`        | deliver at most one trigger to the live handlers           |
//! | `clear`       | drop all handlers right after a dispatch                   |
//! | `stopOnFalse` | stop a dispatch once a handler returns exactly `false`     |
//! | `sort`        | keep handlers ordered by level, highest first              |
//!
//! Parsed specifications are memoized process-wide, keyed by the literal
//! string, so identical configurations across hosts are parsed once. The
//! cache is never evicted; the set of distinct specifications a program
//! uses is small and static.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EventError;

static FLAG_CACHE: LazyLock<DashMap<String, FlagSet>> = LazyLock::new(DashMap::new);

/// A single event flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Memory,
    MemoryLast,
    Once,
    Clear,
    StopOnFalse,
    Sort,
}

impl Flag {
    /// All flags, in declaration order.
    pub const ALL: [Flag; 6] = [
        Flag::Memory,
        Flag::MemoryLast,
        Flag::Once,
        Flag::Clear,
        Flag::StopOnFalse,
        Flag::Sort,
    ];

    /// The word used for this flag in a textual specification.
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Memory => "memory",
            Flag::MemoryLast => "memoryLast",
            Flag::Once => "once",
            Flag::Clear => "clear",
            Flag::StopOnFalse => "stopOnFalse",
            Flag::Sort => "sort",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flag {
    type Err = EventError;

    fn from_str(word: &str) -> Result<Self, Self::Err> {
        Flag::ALL
            .into_iter()
            .find(|flag| flag.as_str() == word)
            .ok_or_else(|| EventError::UnknownFlag {
                word: word.to_string(),
            })
    }
}

/// Immutable set of delivery flags for one event.
///
/// The default set is empty: every handler runs, in insertion order, for
/// every trigger, with no replay. That is also how an event that was never
/// configured behaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct FlagSet {
    memory: bool,
    memory_last: bool,
    once: bool,
    clear: bool,
    stop_on_false: bool,
    sort: bool,
}

impl FlagSet {
    /// The empty set.
    pub const EMPTY: FlagSet = FlagSet {
        memory: false,
        memory_last: false,
        once: false,
        clear: false,
        stop_on_false: false,
        sort: false,
    };

    /// Parse a space-delimited specification, going through the
    /// process-wide cache.
    pub fn parse(spec: &str) -> Result<Self, EventError> {
        if let Some(cached) = FLAG_CACHE.get(spec) {
            return Ok(*cached);
        }

        let flags = spec
            .split_whitespace()
            .map(Flag::from_str)
            .try_fold(FlagSet::EMPTY, |set, flag| flag.map(|f| set.with(f)))?;

        FLAG_CACHE.insert(spec.to_string(), flags);
        Ok(flags)
    }

    /// Decode an object-style specification such as
    /// `{"memory": true, "once": true}`.
    pub fn from_json(value: Value) -> Result<Self, EventError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Return a copy of this set with `flag` added.
    pub fn with(mut self, flag: Flag) -> Self {
        match flag {
            Flag::Memory => self.memory = true,
            Flag::MemoryLast => self.memory_last = true,
            Flag::Once => self.once = true,
            Flag::Clear => self.clear = true,
            Flag::StopOnFalse => self.stop_on_false = true,
            Flag::Sort => self.sort = true,
        }
        self
    }

    /// Check whether `flag` is set.
    pub fn contains(&self, flag: Flag) -> bool {
        match flag {
            Flag::Memory => self.memory,
            Flag::MemoryLast => self.memory_last,
            Flag::Once => self.once,
            Flag::Clear => self.clear,
            Flag::StopOnFalse => self.stop_on_false,
            Flag::Sort => self.sort,
        }
    }

    /// True if either replay flag is set, i.e. the event keeps history.
    pub fn remembers(&self) -> bool {
        self.memory || self.memory_last
    }

    pub fn is_empty(&self) -> bool {
        *self == FlagSet::EMPTY
    }

    /// Iterate over the flags that are set.
    pub fn iter(&self) -> impl Iterator<Item = Flag> + '_ {
        Flag::ALL.into_iter().filter(move |flag| self.contains(*flag))
    }
}

impl FromStr for FlagSet {
    type Err = EventError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        FlagSet::parse(spec)
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        iter.into_iter().fold(FlagSet::EMPTY, FlagSet::with)
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words: Vec<&str> = self.iter().map(|flag| flag.as_str()).collect();
        f.write_str(&words.join(" "))
    }
}

#[cfg(test)]
pub(crate) fn is_cached(spec: &str) -> bool {
    FLAG_CACHE.contains_key(spec)
}
