use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::catalog::{CatalogClient, CatalogRecord};
use crate::error::CatalogError;

/// Identifies one search started through a [`SearchSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome<T> {
    /// The search was still the latest one and its result was applied.
    Applied(T),
    /// A newer search started, or the session was closed, before this one finished.
    Stale,
}

impl<T> SearchOutcome<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self, SearchOutcome::Stale)
    }

    pub fn applied(self) -> Option<T> {
        match self {
            SearchOutcome::Applied(value) => Some(value),
            SearchOutcome::Stale => None,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    generation: u64,
    closed: bool,
}

/// Guards one search surface against out-of-order responses.
///
/// Every search takes a ticket; only the holder of the newest ticket may apply its
/// result, and nothing is applied once the surface has been closed. The check and the
/// apply callback run under the same lock, so a newer search cannot slip in between.
#[derive(Debug, Default)]
pub struct SearchSession {
    state: Mutex<SessionState>,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> SearchTicket {
        let mut state = self.lock();
        state.generation += 1;
        SearchTicket {
            generation: state.generation,
        }
    }

    pub fn is_current(&self, ticket: SearchTicket) -> bool {
        let state = self.lock();
        !state.closed && state.generation == ticket.generation
    }

    /// Tears the session down; in-flight searches finish as [`SearchOutcome::Stale`].
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.generation += 1;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Applies `value` if `ticket` is still the latest search.
    pub fn complete<T, R>(
        &self,
        ticket: SearchTicket,
        value: T,
        apply: impl FnOnce(T) -> R,
    ) -> SearchOutcome<R> {
        let state = self.lock();
        if state.closed || state.generation != ticket.generation {
            log::debug!(
                "dropping stale search result generation={} latest={}",
                ticket.generation,
                state.generation
            );
            return SearchOutcome::Stale;
        }
        SearchOutcome::Applied(apply(value))
    }

    /// Runs a catalog search and hands the records to `apply` unless the search was
    /// superseded while in flight. Errors of a superseded search are dropped as well.
    pub fn search<R>(
        &self,
        catalog: &CatalogClient,
        query: &str,
        apply: impl FnOnce(Vec<CatalogRecord>) -> R,
    ) -> Result<SearchOutcome<R>, CatalogError> {
        if self.is_closed() {
            return Ok(SearchOutcome::Stale);
        }
        let ticket = self.begin();
        let result = catalog.search(query);
        if !self.is_current(ticket) {
            return Ok(SearchOutcome::Stale);
        }
        let records = result?;
        Ok(self.complete(ticket, records, apply))
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
