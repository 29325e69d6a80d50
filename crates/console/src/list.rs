//! Paginated, searchable, tenant-scoped list pages.
//!
//! Every entity list page shares this controller: 1-based page, fixed page
//! size, debounced free-text search, and the tenant scope resolved by
//! [`TenantSelectionStore`]. A fetch runs whenever the query those four
//! produce changes; responses are normalized by [`normalize_list`] so pages
//! never see which payload shape the backend chose.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::backend::{BackendError, ConsoleBackend, ListQuery};
use crate::session::SessionStore;
use crate::tenant::TenantSelectionStore;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Canonical list page, whatever the backend returned.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub total_pages: u32,
}

/// Number of pages needed for `total` items; never less than one.
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    let size = u64::from(page_size.max(1));
    let pages = total.div_ceil(size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    data: Vec<Value>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    total_pages: Option<u32>,
}

/// Normalize a list payload into a [`Page`].
///
/// - `{data, total, totalPages?}`: `data` is the requested page; a missing or
///   zero `totalPages` is derived from `total` (or from `data` if `total` is
///   missing too).
/// - bare array: the full result set; the requested page is sliced out here.
pub fn normalize_list<T: DeserializeOwned>(
    payload: Value,
    page: u32,
    page_size: u32,
) -> Result<Page<T>, BackendError> {
    let page_size = page_size.max(1);
    let (rows, total, reported_pages) = match payload {
        Value::Array(all) => {
            let total = all.len() as u64;
            let start = (page.max(1) as usize - 1).saturating_mul(page_size as usize);
            let rows: Vec<Value> = all.into_iter().skip(start).take(page_size as usize).collect();
            (rows, total, None)
        }
        Value::Object(_) => {
            let envelope: Envelope =
                serde_json::from_value(payload).map_err(|e| BackendError::Decode(e.to_string()))?;
            let total = envelope.total.unwrap_or(envelope.data.len() as u64);
            (envelope.data, total, envelope.total_pages.filter(|p| *p > 0))
        }
        other => {
            return Err(BackendError::Decode(format!(
                "expected list or {{data, total}} object, got {other}"
            )));
        }
    };

    let items = rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| BackendError::Decode(e.to_string()))?;

    Ok(Page {
        items,
        total,
        total_pages: reported_pages.unwrap_or_else(|| total_pages(total, page_size)),
    })
}

/// Observable list state.
#[derive(Debug, Clone, PartialEq)]
pub struct ListState<T> {
    pub page: u32,
    pub page_size: u32,
    pub search_term: String,
    pub debounced_search_term: String,
    pub total: u64,
    pub total_pages: u32,
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> ListState<T> {
    fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            search_term: String::new(),
            debounced_search_term: String::new(),
            total: 0,
            total_pages: 1,
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }

    pub fn can_go_previous(&self) -> bool {
        self.page > 1
    }

    pub fn can_go_next(&self) -> bool {
        self.page < self.total_pages
    }
}

pub struct ListController<T> {
    resource: String,
    backend: Arc<dyn ConsoleBackend>,
    session: Arc<SessionStore>,
    tenants: Arc<TenantSelectionStore>,
    debounce: Duration,
    state: Mutex<ListState<T>>,
    last_query: Mutex<Option<ListQuery>>,
    debounce_task: Mutex<Option<JoinHandle<()>>>,
    scope_task: Mutex<Option<JoinHandle<()>>>,
}

impl<T> ListController<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(
        resource: impl Into<String>,
        page_size: u32,
        debounce: Duration,
        backend: Arc<dyn ConsoleBackend>,
        session: Arc<SessionStore>,
        tenants: Arc<TenantSelectionStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            resource: resource.into(),
            backend,
            session,
            tenants,
            debounce,
            state: Mutex::new(ListState::new(page_size)),
            last_query: Mutex::new(None),
            debounce_task: Mutex::new(None),
            scope_task: Mutex::new(None),
        })
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn snapshot(&self) -> ListState<T> {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Start following tenant-scope changes and run the first fetch.
    pub async fn mount(self: &Arc<Self>) {
        let mut scope = self.tenants.subscribe_scope();
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while scope.changed().await.is_ok() {
                let Some(this) = weak.upgrade() else { break };
                this.refresh_if_changed().await;
            }
        });
        replace_task(&self.scope_task, Some(task));

        self.refresh_if_changed().await;
    }

    /// Stop following scope changes and drop any pending search timer.
    pub fn unmount(&self) {
        replace_task(&self.debounce_task, None);
        replace_task(&self.scope_task, None);
    }

    /// Record a keystroke; the search applies after the quiet period.
    ///
    /// Each call restarts the timer. A fetch already started by an earlier
    /// timer is left to finish.
    pub fn set_search_term(self: &Arc<Self>, term: impl Into<String>) {
        let term = term.into();
        self.with_state(|s| s.search_term = term.clone());

        let weak = Arc::downgrade(self);
        let delay = self.debounce;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(this) = weak.upgrade() {
                tokio::spawn(async move { this.apply_search(term).await });
            }
        });
        replace_task(&self.debounce_task, Some(task));
    }

    /// Jump to `page`, clamped to the known page range.
    pub async fn set_page(&self, page: u32) {
        self.with_state(|s| s.page = page.clamp(1, s.total_pages.max(1)));
        self.refresh_if_changed().await;
    }

    pub async fn next_page(&self) {
        let state = self.snapshot();
        if state.can_go_next() {
            self.set_page(state.page + 1).await;
        }
    }

    pub async fn previous_page(&self) {
        let state = self.snapshot();
        if state.can_go_previous() {
            self.set_page(state.page - 1).await;
        }
    }

    /// Refetch the current query even though nothing changed.
    ///
    /// Child actions (delete, mark-as-read, status toggle) call this after
    /// their own mutation succeeds.
    pub async fn handle_list_data(&self) {
        let query = self.current_query();
        self.fetch(query).await;
    }

    /// Apply a local edit to the loaded items (optimistic updates).
    pub fn update_items(&self, edit: impl FnOnce(&mut Vec<T>)) {
        self.with_state(|s| edit(&mut s.items));
    }

    async fn apply_search(&self, term: String) {
        let changed = self.with_state(|s| {
            if s.debounced_search_term == term {
                return false;
            }
            s.debounced_search_term = term.clone();
            s.page = 1;
            true
        });
        if changed {
            tracing::debug!(resource = %self.resource, search = %term, "search applied");
            self.refresh_if_changed().await;
        }
    }

    async fn refresh_if_changed(&self) {
        let query = self.current_query();
        let unchanged = self
            .last_query
            .lock()
            .map(|last| last.as_ref() == Some(&query))
            .unwrap_or(false);
        if !unchanged {
            self.fetch(query).await;
        }
    }

    fn current_query(&self) -> ListQuery {
        let state = self.snapshot();
        let search = state.debounced_search_term.trim();
        ListQuery {
            page: state.page,
            page_size: state.page_size,
            search: (!search.is_empty()).then(|| search.to_string()),
            tenant_scope: self.tenants.resolved_scope(),
        }
    }

    async fn fetch(&self, query: ListQuery) {
        if let Ok(mut last) = self.last_query.lock() {
            *last = Some(query.clone());
        }
        self.with_state(|s| s.loading = true);

        let result = match self.backend.fetch_list(&self.resource, &query).await {
            Ok(payload) => normalize_list::<T>(payload, query.page, query.page_size),
            Err(e) => Err(e),
        };

        // Last response wins; overlapping fetches are not sequenced.
        match result {
            Ok(page) => self.with_state(|s| {
                s.items = page.items;
                s.total = page.total;
                s.total_pages = page.total_pages;
                s.loading = false;
                s.error = None;
            }),
            Err(e) => {
                self.session.handle_failure(&e);
                if e.is_expected() || e.is_session_expired() {
                    tracing::debug!(resource = %self.resource, error = %e, "list fetch rejected");
                } else {
                    tracing::error!(resource = %self.resource, error = %e, "list fetch failed");
                }
                self.with_state(|s| {
                    s.loading = false;
                    s.error = Some(e.user_message());
                });
            }
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ListState<T>) -> R) -> R {
        match self.state.lock() {
            Ok(mut state) => f(&mut state),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl<T> Drop for ListController<T> {
    fn drop(&mut self) {
        replace_task(&self.debounce_task, None);
        replace_task(&self.scope_task, None);
    }
}

fn replace_task(slot: &Mutex<Option<JoinHandle<()>>>, next: Option<JoinHandle<()>>) {
    let previous = match slot.lock() {
        Ok(mut slot) => std::mem::replace(&mut *slot, next),
        Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
    };
    if let Some(task) = previous {
        task.abort();
    }
}
