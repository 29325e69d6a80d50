//! Super-administrator tenant selection.
//!
//! The selection is meaningful only while the active principal holds the
//! privileged role. It is re-evaluated on every session transition and
//! cleared (memory and storage) in the same transition that drops the role.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::watch;

use condo_core::TenantId;

use crate::backend::{BackendError, ConsoleBackend, TenantSummary};
use crate::session::{SessionObserver, SessionState};
use crate::storage::{LocalStorage, StorageError, TENANT_SELECTION_KEY};

#[derive(Debug, Error)]
pub enum TenantSelectionError {
    #[error("only the super-administrator can select a tenant")]
    NotPrivileged,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug)]
struct Selection {
    /// The session had resolved (not `checking`) when last observed.
    resolved: bool,
    privileged: bool,
    selected: Option<TenantId>,
}

pub struct TenantSelectionStore {
    storage: Arc<dyn LocalStorage>,
    inner: Mutex<Selection>,
    scope: watch::Sender<Option<TenantId>>,
}

impl TenantSelectionStore {
    /// Build the store against the current session state.
    ///
    /// Storage is read only when the role already qualifies. A resolved
    /// non-privileged session clears any leftover key without reading it.
    pub fn new(session: &SessionState, storage: Arc<dyn LocalStorage>) -> Self {
        let privileged = is_privileged(session);
        let resolved = !session.is_checking();

        let selected = if privileged {
            hydrate(storage.as_ref())
        } else {
            if resolved {
                remove_key(storage.as_ref());
            }
            None
        };

        let (scope, _) = watch::channel(selected.clone());
        Self {
            storage,
            inner: Mutex::new(Selection {
                resolved,
                privileged,
                selected,
            }),
            scope,
        }
    }

    pub fn is_privileged_role(&self) -> bool {
        self.inner.lock().map(|s| s.privileged).unwrap_or(false)
    }

    /// Whether tenant-selection UI renders at all.
    pub fn should_show_selector(&self) -> bool {
        self.is_privileged_role()
    }

    pub fn selected_tenant_id(&self) -> Option<TenantId> {
        self.inner
            .lock()
            .ok()
            .and_then(|s| if s.privileged { s.selected.clone() } else { None })
    }

    /// Tenant to pass to scoped fetches; `None` lets the backend infer scope
    /// from the session.
    pub fn resolved_scope(&self) -> Option<TenantId> {
        self.selected_tenant_id()
    }

    /// Observe [`TenantSelectionStore::resolved_scope`] changes.
    pub fn subscribe_scope(&self) -> watch::Receiver<Option<TenantId>> {
        self.scope.subscribe()
    }

    /// Select (or with `None`, deselect) a tenant and persist the choice.
    pub fn select(&self, tenant: Option<TenantId>) -> Result<(), TenantSelectionError> {
        let mut inner = self.inner.lock().map_err(|_| StorageError::Poisoned)?;

        if !inner.privileged {
            if tenant.is_none() {
                return Ok(());
            }
            tracing::warn!("tenant selection attempted by a non-privileged session");
            return Err(TenantSelectionError::NotPrivileged);
        }

        match &tenant {
            Some(id) => self.storage.set_item(TENANT_SELECTION_KEY, id.as_str())?,
            None => self.storage.remove_item(TENANT_SELECTION_KEY)?,
        }

        tracing::info!(tenant = ?tenant.as_ref().map(TenantId::as_str), "tenant selection changed");
        inner.selected = tenant.clone();
        drop(inner);

        self.scope.send_if_modified(|current| replace_if_changed(current, tenant));
        Ok(())
    }

    /// Tenants the privileged role may pick from; empty for everyone else.
    pub async fn load_tenants(&self, backend: &dyn ConsoleBackend) -> Result<Vec<TenantSummary>, BackendError> {
        if !self.is_privileged_role() {
            return Ok(Vec::new());
        }
        backend.list_tenants().await
    }

    fn reevaluate(&self, session: &SessionState) {
        let Ok(mut inner) = self.inner.lock() else {
            tracing::error!("tenant selection lock poisoned");
            return;
        };

        let privileged = is_privileged(session);
        let was_resolved = inner.resolved;
        inner.resolved = !session.is_checking();

        if !privileged {
            if inner.privileged || inner.selected.is_some() {
                tracing::info!("privileged role lost; clearing tenant selection");
            }
            inner.privileged = false;
            inner.selected = None;
            if inner.resolved {
                remove_key(self.storage.as_ref());
            }
        } else if !inner.privileged {
            inner.privileged = true;
            // Only the first resolution after a `checking` construction may
            // pick up a persisted selection.
            inner.selected = if was_resolved { None } else { hydrate(self.storage.as_ref()) };
        }

        let scope = if inner.privileged { inner.selected.clone() } else { None };
        drop(inner);

        self.scope.send_if_modified(|current| replace_if_changed(current, scope));
    }
}

impl SessionObserver for TenantSelectionStore {
    fn session_changed(&self, state: &SessionState) {
        self.reevaluate(state);
    }
}

impl core::fmt::Debug for TenantSelectionStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TenantSelectionStore").field("inner", &self.inner).finish()
    }
}

fn is_privileged(session: &SessionState) -> bool {
    session.role().is_some_and(|role| role.is_privileged())
}

fn hydrate(storage: &dyn LocalStorage) -> Option<TenantId> {
    let raw = storage.get_item(TENANT_SELECTION_KEY)?;
    match TenantId::new(raw) {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(error = %e, "discarding invalid persisted tenant selection");
            remove_key(storage);
            None
        }
    }
}

fn remove_key(storage: &dyn LocalStorage) {
    if let Err(e) = storage.remove_item(TENANT_SELECTION_KEY) {
        tracing::error!(error = %e, "failed to clear persisted tenant selection");
    }
}

fn replace_if_changed(current: &mut Option<TenantId>, next: Option<TenantId>) -> bool {
    if *current == next {
        return false;
    }
    *current = next;
    true
}
