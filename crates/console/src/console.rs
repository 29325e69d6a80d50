//! Application shell: boots the session, wires the stores together and
//! hands out per-page controllers.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::backend::{BackendError, ConsoleBackend, TenantSummary};
use crate::config::ConsoleConfig;
use crate::guard::{GuardDecision, TenantGuard};
use crate::list::ListController;
use crate::notifications::{NotificationActions, NotificationBadge, SignalChannel};
use crate::password_reset::PasswordResetFlow;
use crate::routes::{Navigator, Route, RouteDecision, RouteGate, RouterState};
use crate::session::{LoginResult, SessionObserver, SessionState, SessionStore};
use crate::storage::LocalStorage;
use crate::tenant::TenantSelectionStore;

pub struct Console {
    config: ConsoleConfig,
    backend: Arc<dyn ConsoleBackend>,
    storage: Arc<dyn LocalStorage>,
    session: Arc<SessionStore>,
    tenants: Arc<TenantSelectionStore>,
    router: Arc<RouterState>,
    signals: Arc<SignalChannel>,
}

/// Sends the user to the login page whenever the session ends.
struct LoginRedirect {
    router: Arc<RouterState>,
}

impl SessionObserver for LoginRedirect {
    fn session_changed(&self, state: &SessionState) {
        if matches!(state, SessionState::Anonymous) && !self.router.current().is_public() {
            self.router.navigate(Route::Login);
        }
    }
}

impl Console {
    /// Resolve the session, then build the stores that depend on it.
    ///
    /// The tenant store is created after the session check so a persisted
    /// selection survives a reload for privileged users.
    pub async fn boot(
        config: ConsoleConfig,
        backend: Arc<dyn ConsoleBackend>,
        storage: Arc<dyn LocalStorage>,
    ) -> Arc<Self> {
        let session = SessionStore::start(backend.clone()).await;
        let state = session.state();

        let tenants = Arc::new(TenantSelectionStore::new(&state, storage.clone()));
        session.add_observer(tenants.clone());

        let initial = match state.role() {
            Some(role) => Route::home_for(role),
            None => Route::Login,
        };
        let router = Arc::new(RouterState::new(initial));
        session.add_observer(Arc::new(LoginRedirect { router: router.clone() }));

        tracing::info!(session = state.name(), route = initial.path(), "console booted");

        Arc::new(Self {
            config,
            backend,
            storage,
            session,
            tenants,
            router,
            signals: Arc::new(SignalChannel::new()),
        })
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn tenants(&self) -> &Arc<TenantSelectionStore> {
        &self.tenants
    }

    pub fn router(&self) -> &Arc<RouterState> {
        &self.router
    }

    pub fn signals(&self) -> &Arc<SignalChannel> {
        &self.signals
    }

    /// Sign in and, on success, land on the home page for the fresh role.
    pub async fn login(&self, email: &str, password: &str) -> LoginResult {
        let result = self.session.login(email, password).await;
        if let Some(target) = result.redirect_target() {
            self.router.navigate(target);
        }
        result
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }

    /// Navigate through the session gate and, for tenant-scoped pages, the
    /// tenant guard.
    pub fn navigate_to(&self, route: Route) -> RouteDecision {
        let decision = RouteGate::enforce(&self.session.state(), route, self.router.as_ref());
        if decision != RouteDecision::Render {
            return decision;
        }

        if route.is_tenant_scoped() {
            if let GuardDecision::SelectionRequired(prompt) = self.tenant_guard().render() {
                return RouteDecision::Redirect(prompt.link);
            }
        }

        self.router.navigate(route);
        RouteDecision::Render
    }

    /// Tenants for the selector; empty unless the role may select one.
    pub async fn load_tenants(&self) -> Result<Vec<TenantSummary>, BackendError> {
        let result = self.tenants.load_tenants(self.backend.as_ref()).await;
        if let Err(e) = &result {
            self.session.handle_failure(e);
        }
        result
    }

    pub fn tenant_guard(&self) -> TenantGuard {
        let navigator: Arc<dyn Navigator> = self.router.clone();
        TenantGuard::new(self.tenants.clone(), navigator)
    }

    pub fn list_controller<T>(&self, resource: &str) -> Arc<ListController<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        ListController::new(
            resource,
            self.config.page_size,
            self.config.search_debounce,
            self.backend.clone(),
            self.session.clone(),
            self.tenants.clone(),
        )
    }

    pub fn notification_badge(&self) -> Arc<NotificationBadge> {
        NotificationBadge::new(
            self.backend.clone(),
            self.session.clone(),
            self.signals.clone(),
            self.config.poll_interval,
        )
    }

    pub fn notification_actions(&self) -> NotificationActions {
        NotificationActions::new(self.backend.clone(), self.session.clone(), self.signals.clone())
    }

    pub fn password_reset(&self) -> PasswordResetFlow {
        PasswordResetFlow::new(self.backend.clone(), self.storage.clone(), self.config.reset_code_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ListQuery, LoginResponse};
    use crate::storage::{InMemoryStorage, TENANT_SELECTION_KEY};
    use crate::test_support::{Call, StubBackend, profile, settle};
    use condo_core::TenantId;
    use serde_json::{Value, json};
    use std::path::PathBuf;
    use std::time::Duration;

    fn config() -> ConsoleConfig {
        ConsoleConfig {
            api_url: "http://localhost:3333".into(),
            storage_path: PathBuf::from("/tmp/condo-console-test.json"),
            poll_interval: Duration::from_secs(30),
            search_debounce: Duration::from_millis(300),
            page_size: 10,
            reset_code_ttl: chrono::Duration::minutes(15),
            log_format: Default::default(),
        }
    }

    async fn boot(backend: &Arc<StubBackend>, storage: &Arc<InMemoryStorage>) -> Arc<Console> {
        Console::boot(config(), backend.clone(), storage.clone()).await
    }

    fn list_queries(backend: &StubBackend) -> Vec<ListQuery> {
        backend
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::FetchList { query, .. } => Some(query),
                _ => None,
            })
            .collect()
    }

    fn cond(id: &str) -> TenantId {
        TenantId::new(id).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn superadmin_without_selection_is_sent_to_picker() {
        let backend = Arc::new(StubBackend::authenticated("superadmin"));
        backend.set_list_payload(json!([{ "id": 1 }]));
        let storage = Arc::new(InMemoryStorage::new());
        let console = boot(&backend, &storage).await;

        let guard = console.tenant_guard();
        assert!(matches!(guard.decide(), GuardDecision::SelectionRequired(_)));
        assert_eq!(
            console.navigate_to(Route::Units),
            RouteDecision::Redirect(Route::TenantHome)
        );
        assert_eq!(console.router().current(), Route::TenantHome);
        assert!(!console.router().history().contains(&Route::Units));

        console.tenants().select(Some(cond("cond-123"))).unwrap();
        assert_eq!(guard.render(), GuardDecision::RenderChildren);
        assert_eq!(console.navigate_to(Route::Units), RouteDecision::Render);
        assert_eq!(console.router().current(), Route::Units);

        let list = console.list_controller::<Value>("unidades");
        list.mount().await;
        settle().await;
        assert_eq!(list_queries(&backend).last().unwrap().tenant_scope, Some(cond("cond-123")));
        assert_eq!(storage.get_item(TENANT_SELECTION_KEY).as_deref(), Some("cond-123"));
    }

    #[tokio::test]
    async fn selection_survives_reload() {
        let backend = Arc::new(StubBackend::authenticated("superadmin"));
        let storage = Arc::new(InMemoryStorage::new());

        let first = boot(&backend, &storage).await;
        first.tenants().select(Some(cond("cond-123"))).unwrap();
        drop(first);

        let second = boot(&backend, &storage).await;
        assert_eq!(second.tenants().selected_tenant_id(), Some(cond("cond-123")));
        assert_eq!(second.tenant_guard().decide(), GuardDecision::RenderChildren);
    }

    #[tokio::test(start_paused = true)]
    async fn resident_never_scopes_and_clears_leftovers() {
        let backend = Arc::new(StubBackend::authenticated("morador"));
        let storage = Arc::new(InMemoryStorage::new());
        storage.set_item(TENANT_SELECTION_KEY, "cond-999").unwrap();

        let console = boot(&backend, &storage).await;
        assert_eq!(storage.get_item(TENANT_SELECTION_KEY), None);
        assert!(!console.tenants().should_show_selector());
        assert_eq!(console.tenant_guard().render(), GuardDecision::RenderChildren);
        assert_eq!(console.router().current(), Route::ResidentHome);
        assert_eq!(console.navigate_to(Route::Notifications), RouteDecision::Render);

        let list = console.list_controller::<Value>("unidades");
        list.mount().await;
        assert_eq!(list_queries(&backend)[0].tenant_scope, None);
    }

    #[tokio::test]
    async fn logout_clears_selection_and_returns_to_login() {
        let backend = Arc::new(StubBackend::authenticated("superadmin"));
        let storage = Arc::new(InMemoryStorage::new());
        let console = boot(&backend, &storage).await;
        console.tenants().select(Some(cond("cond-123"))).unwrap();

        console.logout().await;

        assert_eq!(console.tenants().selected_tenant_id(), None);
        assert_eq!(storage.get_item(TENANT_SELECTION_KEY), None);
        assert_eq!(console.router().current(), Route::Login);
    }

    #[tokio::test]
    async fn login_lands_on_home_for_fresh_role() {
        let backend = Arc::new(StubBackend::new());
        let storage = Arc::new(InMemoryStorage::new());
        let console = boot(&backend, &storage).await;
        assert_eq!(console.router().current(), Route::Login);

        backend.set_login(Ok(LoginResponse {
            user: Some(profile("condominio")),
        }));
        let result = console.login("condominio@example.com", "secret").await;

        assert!(result.is_success());
        assert_eq!(console.router().current(), Route::CondominiumHome);
    }

    #[tokio::test]
    async fn anonymous_navigation_is_gated() {
        let backend = Arc::new(StubBackend::new());
        let console = boot(&backend, &Arc::new(InMemoryStorage::new())).await;

        assert_eq!(console.navigate_to(Route::Residents), RouteDecision::Redirect(Route::Login));
        assert_eq!(console.navigate_to(Route::ForgotPassword), RouteDecision::Render);
        assert_eq!(console.router().current(), Route::ForgotPassword);
    }
}
