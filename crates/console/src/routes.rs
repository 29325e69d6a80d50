//! Console routes, navigation, and the session-level route gate.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::watch;

use condo_auth::Role;

use crate::session::SessionState;

/// Every page the console can navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    ForgotPassword,
    ResetPassword,
    /// Generic landing page for roles without a dedicated home.
    Dashboard,
    /// Super-administrator landing page; also where a tenant is selected.
    TenantHome,
    CondominiumHome,
    ResidentHome,
    Notifications,
    Residents,
    Units,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::ForgotPassword => "/esqueci-senha",
            Route::ResetPassword => "/redefinir-senha",
            Route::Dashboard => "/dashboard",
            Route::TenantHome => "/superadmin/home",
            Route::CondominiumHome => "/condominio/home",
            Route::ResidentHome => "/morador/home",
            Route::Notifications => "/notificacoes",
            Route::Residents => "/moradores",
            Route::Units => "/unidades",
        }
    }

    /// Where a freshly authenticated principal lands.
    pub fn home_for(role: Role) -> Route {
        match role {
            Role::SuperAdmin => Route::TenantHome,
            Role::Condominium => Route::CondominiumHome,
            Role::Resident => Route::ResidentHome,
            Role::Unrecognized => Route::Dashboard,
        }
    }

    /// Pages reachable without a session.
    pub fn is_public(&self) -> bool {
        matches!(self, Route::Login | Route::ForgotPassword | Route::ResetPassword)
    }

    /// Pages whose data is filtered to a single tenant.
    pub fn is_tenant_scoped(&self) -> bool {
        matches!(self, Route::Residents | Route::Units)
    }

    /// Whether `role` may reach this (non-public) page.
    pub fn allows(&self, role: Role) -> bool {
        match self {
            Route::Login | Route::ForgotPassword | Route::ResetPassword | Route::Dashboard => true,
            Route::TenantHome => role == Role::SuperAdmin,
            Route::CondominiumHome => role == Role::Condominium,
            Route::ResidentHome => role == Role::Resident,
            Route::Notifications => role.receives_notifications(),
            Route::Residents | Route::Units => matches!(role, Role::SuperAdmin | Role::Condominium),
        }
    }
}

impl core::fmt::Display for Route {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.path())
    }
}

/// Side-effecting navigation.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Routes kept in [`RouterState::history`].
pub const HISTORY_LIMIT: usize = 50;

/// In-process router: remembers the current route and its recent history.
#[derive(Debug)]
pub struct RouterState {
    current: watch::Sender<Route>,
    history: Mutex<VecDeque<Route>>,
}

impl RouterState {
    pub fn new(initial: Route) -> Self {
        let (current, _) = watch::channel(initial);
        Self {
            current,
            history: Mutex::new(VecDeque::from([initial])),
        }
    }

    pub fn current(&self) -> Route {
        *self.current.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.current.subscribe()
    }

    /// The last [`HISTORY_LIMIT`] routes visited, oldest first.
    pub fn history(&self) -> Vec<Route> {
        self.history
            .lock()
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Navigator for RouterState {
    fn navigate(&self, route: Route) {
        tracing::debug!(path = route.path(), "navigate");
        if let Ok(mut history) = self.history.lock() {
            if history.len() == HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(route);
        }
        self.current.send_replace(route);
    }
}

/// What the shell does with a requested route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Session still resolving: render nothing at all.
    Blank,
    Render,
    Redirect(Route),
}

/// Session-level gate in front of every page.
pub struct RouteGate;

impl RouteGate {
    pub fn check(state: &SessionState, route: Route) -> RouteDecision {
        match state {
            SessionState::Checking => RouteDecision::Blank,
            SessionState::Anonymous if route.is_public() => RouteDecision::Render,
            SessionState::Anonymous => RouteDecision::Redirect(Route::Login),
            SessionState::Authenticated(principal) => {
                let role = principal.role();
                if matches!(route, Route::Login) || !route.allows(role) {
                    RouteDecision::Redirect(Route::home_for(role))
                } else {
                    RouteDecision::Render
                }
            }
        }
    }

    /// Check and, for redirects, navigate.
    pub fn enforce(state: &SessionState, route: Route, navigator: &dyn Navigator) -> RouteDecision {
        let decision = Self::check(state, route);
        if let RouteDecision::Redirect(target) = decision {
            navigator.navigate(target);
        }
        decision
    }
}
