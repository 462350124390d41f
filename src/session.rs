//! Staleness guard for overlapping fetches: a selection change invalidates
//! every fetch started before it, so a slow stale result can never clobber a
//! newer snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::models::Enrollment;

#[derive(Clone, Default)]
pub struct SelectionGuard {
    current: Arc<AtomicU64>,
}

/// Handle pinned to the generation a fetch was started under.
pub struct FetchTicket {
    current: Arc<AtomicU64>,
    generation: u64,
}

impl SelectionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> FetchTicket {
        FetchTicket {
            current: Arc::clone(&self.current),
            generation: self.current.load(Ordering::SeqCst),
        }
    }

    /// Invalidate every ticket handed out so far and start a new generation.
    pub fn supersede(&self) -> FetchTicket {
        self.current.fetch_add(1, Ordering::SeqCst);
        self.begin()
    }
}

impl FetchTicket {
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}

#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub course_id: String,
    pub enrollments: Vec<Enrollment>,
    pub fetched_at: DateTime<Utc>,
}

/// Shared snapshot slot for the periodic refresh loop. Results regenerate
/// the snapshot wholesale; stale results are discarded, never merged.
#[derive(Clone, Default)]
pub struct LiveProgress {
    guard: SelectionGuard,
    snapshot: Arc<Mutex<Option<ProgressSnapshot>>>,
}

impl LiveProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a refresh, superseding any fetch still in flight.
    pub fn start_refresh(&self) -> FetchTicket {
        self.guard.supersede()
    }

    /// Commit a fetched snapshot unless the ticket has been superseded.
    /// Returns whether the snapshot was stored.
    pub fn commit(&self, ticket: &FetchTicket, snapshot: ProgressSnapshot) -> bool {
        if !ticket.is_current() {
            return false;
        }
        *self.snapshot.lock().unwrap() = Some(snapshot);
        true
    }

    pub fn latest(&self) -> Option<ProgressSnapshot> {
        self.snapshot.lock().unwrap().clone()
    }
}
