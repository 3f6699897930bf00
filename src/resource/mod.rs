//! Server-paginated list resources.
//!
//! A [`PaginatedResource`] owns the [`TableState`] of one list, builds the
//! endpoint's query from it, fetches through the [`ApiClient`] and writes
//! the reported totals back. Answers to superseded requests are dropped.

mod contract;
pub mod registry;
mod sequence;

pub use contract::{PageContract, PageData};
pub use registry::{find, find_by_route, registry, ResourceDef};
pub use sequence::Sequencer;

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::table::{Table, TableState, TableView};

#[derive(Debug, Clone, Serialize)]
pub struct PageSnapshot {
    pub seq: u64,
    pub state: TableState,
    pub rows: Vec<Value>,
    /// The requested page was past the last page and was pulled back.
    pub clamped: bool,
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Applied(PageSnapshot),
    /// A newer request was issued while this one was in flight.
    Stale { seq: u64 },
}

impl FetchOutcome {
    pub fn applied(self) -> Option<PageSnapshot> {
        match self {
            FetchOutcome::Applied(snapshot) => Some(snapshot),
            FetchOutcome::Stale { .. } => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, FetchOutcome::Stale { .. })
    }
}

#[derive(Debug)]
struct Inner {
    state: TableState,
    rows: Vec<Value>,
}

#[derive(Debug)]
pub struct PaginatedResource {
    contract: PageContract,
    inner: Mutex<Inner>,
    seq: Sequencer,
}

impl PaginatedResource {
    pub fn new(contract: PageContract, state: TableState) -> Self {
        Self {
            contract,
            inner: Mutex::new(Inner {
                state,
                rows: Vec::new(),
            }),
            seq: Sequencer::new(),
        }
    }

    pub fn contract(&self) -> &PageContract {
        &self.contract
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> TableState {
        self.lock().state.clone()
    }

    pub fn rows(&self) -> Vec<Value> {
        self.lock().rows.clone()
    }

    /// Mutate the state (page, size, search, filters) before the next fetch.
    pub fn update<R>(&self, f: impl FnOnce(&mut TableState) -> R) -> R {
        f(&mut self.lock().state)
    }

    pub fn view(&self, table: &Table) -> TableView {
        let inner = self.lock();
        table.view(&inner.rows, &inner.state)
    }

    /// Fetch the page the state currently points at.
    pub async fn fetch(&self, client: &ApiClient) -> Result<FetchOutcome, ApiError> {
        let (seq, query) = {
            let mut inner = self.lock();
            inner.state.loading = true;
            (self.seq.issue(), self.contract.query(&inner.state))
        };

        let result = client.get_json::<Value>(&self.contract.endpoint, &query).await;

        // `issue()` runs under this lock; staleness is checked under it too.
        let mut inner = self.lock();
        if !self.seq.is_current(seq) {
            tracing::debug!("Dropping stale {} response (seq {}, latest {})", self.contract.endpoint, seq, self.seq.latest());
            return Ok(FetchOutcome::Stale { seq });
        }

        let page = result.and_then(|body| self.contract.extract(&body));
        inner.state.loading = false;
        let page = page?;

        let clamped = inner
            .state
            .apply_server_page(page.total_pages, page.current_page, page.total_count);
        inner.rows = page.rows;

        if clamped {
            tracing::debug!(
                "{} has {} pages, moved to page {}",
                self.contract.endpoint,
                inner.state.total_pages,
                inner.state.current_page
            );
        }

        Ok(FetchOutcome::Applied(PageSnapshot {
            seq,
            state: inner.state.clone(),
            rows: inner.rows.clone(),
            clamped,
        }))
    }

    /// Fetch, and fetch once more when the page had to be clamped so the
    /// rows match the page now shown.
    pub async fn refresh(&self, client: &ApiClient) -> Result<FetchOutcome, ApiError> {
        match self.fetch(client).await? {
            FetchOutcome::Applied(snapshot) if snapshot.clamped => self.fetch(client).await,
            outcome => Ok(outcome),
        }
    }
}
