//! Month-windowed event cache.
//!
//! The cache holds the events of at most one month. An actor task owns the
//! state; callers talk to it through the cloneable [`EventCacheHandle`].
//!
//! Remote calls run on spawned tasks and report back to the actor, so a
//! slow fetch never blocks navigation. Every month fetch is tagged with a
//! generation number and a response whose generation is no longer current
//! is dropped, which keeps a late answer for an abandoned month from
//! overwriting the month that is now selected.
//!
//! Mutations are committed to the resident set only after the remote store
//! confirms them. There is no optimistic apply and therefore nothing to
//! roll back.

mod actor;
mod handle;

pub use handle::EventCacheHandle;

use crate::components::event_remote::{Event, MonthKey};
use crate::utils::time::compare_times;
use chrono::NaiveDate;

/// What the cache currently holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState {
    /// No month requested yet, or the cache was reset
    Empty,
    /// A fetch for the month is in flight
    Loading(MonthKey),
    /// The resident set of the month
    Ready { key: MonthKey, events: Vec<Event> },
    /// The last fetch for the month failed
    Error { key: MonthKey, cause: String },
}

impl CacheState {
    /// Month the state refers to
    pub fn key(&self) -> Option<MonthKey> {
        match self {
            CacheState::Empty => None,
            CacheState::Loading(key) => Some(*key),
            CacheState::Ready { key, .. } | CacheState::Error { key, .. } => Some(*key),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, CacheState::Loading(_))
    }

    /// Resident events, empty unless the state is `Ready`
    pub fn events(&self) -> &[Event] {
        match self {
            CacheState::Ready { events, .. } => events,
            _ => &[],
        }
    }

    /// Resident events on one day, ordered by start time
    pub fn events_on(&self, date: NaiveDate) -> Vec<Event> {
        let mut day: Vec<Event> = self
            .events()
            .iter()
            .filter(|e| e.date == date)
            .cloned()
            .collect();
        day.sort_by(|a, b| compare_times(&a.time, &b.time));
        day
    }
}

/// Result of a month selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Fetched from the remote store
    Loaded(Vec<Event>),
    /// The month was already resident, nothing was fetched
    AlreadyLoaded(Vec<Event>),
    /// Another month was selected before this one arrived
    Superseded,
}

impl SelectOutcome {
    pub fn events(&self) -> Option<&[Event]> {
        match self {
            SelectOutcome::Loaded(events) | SelectOutcome::AlreadyLoaded(events) => Some(events),
            SelectOutcome::Superseded => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, SelectOutcome::Superseded)
    }
}

/// Result of a confirmed update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The event as stored remotely
    pub event: Event,
    /// The new date lies outside the month the update was issued against
    pub moved_out: bool,
}
