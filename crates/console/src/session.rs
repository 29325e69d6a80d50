//! Authentication session lifecycle.
//!
//! `checking → {authenticated, anonymous}`, `authenticated → anonymous`
//! (logout, failed re-check, expiry), `anonymous → authenticated` (login).
//! The principal is replaced whole on every transition.

use std::sync::{Arc, RwLock};

use tokio::sync::watch;

use condo_auth::{Principal, Role};

use crate::backend::{BackendError, ConsoleBackend, Credentials};
use crate::routes::Route;

/// Message returned when login fails without a usable server explanation.
pub const GENERIC_LOGIN_ERROR: &str = "Unable to sign in. Please try again.";

/// Message returned when login is attempted without credentials.
pub const MISSING_CREDENTIALS: &str = "Email and password are required.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Initial session check in flight; the shell renders nothing.
    Checking,
    Authenticated(Principal),
    Anonymous,
}

impl SessionState {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            SessionState::Authenticated(principal) => Some(principal),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.principal().map(Principal::role)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Checking => "checking",
            SessionState::Authenticated(_) => "authenticated",
            SessionState::Anonymous => "anonymous",
        }
    }

    pub fn is_checking(&self) -> bool {
        matches!(self, SessionState::Checking)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

/// Synchronous hook run on every session transition, after the new state is
/// visible through [`SessionStore::state`].
pub trait SessionObserver: Send + Sync {
    fn session_changed(&self, state: &SessionState);
}

/// Outcome of [`SessionStore::login`].
///
/// Success carries the principal resolved by this very call; redirect
/// decisions must use it rather than a state read taken earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginResult {
    Success(Principal),
    Failure { message: String },
}

impl LoginResult {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginResult::Success(_))
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            LoginResult::Success(principal) => Some(principal),
            LoginResult::Failure { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            LoginResult::Success(_) => None,
            LoginResult::Failure { message } => Some(message),
        }
    }

    /// Home route for the freshly returned role.
    pub fn redirect_target(&self) -> Option<Route> {
        self.principal().map(|p| Route::home_for(p.role()))
    }
}

/// Single source of truth for "is someone logged in, and who".
pub struct SessionStore {
    backend: Arc<dyn ConsoleBackend>,
    state: watch::Sender<SessionState>,
    observers: RwLock<Vec<Arc<dyn SessionObserver>>>,
}

impl SessionStore {
    /// A store in the `checking` state. Call [`SessionStore::check`] to
    /// resolve it, or use [`SessionStore::start`].
    pub fn new(backend: Arc<dyn ConsoleBackend>) -> Self {
        let (state, _) = watch::channel(SessionState::Checking);
        Self {
            backend,
            state,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Construct and immediately run the initial session check.
    pub async fn start(backend: Arc<dyn ConsoleBackend>) -> Arc<Self> {
        let store = Arc::new(Self::new(backend));
        store.check().await;
        store
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.state.borrow().principal().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) {
        match self.observers.write() {
            Ok(mut observers) => observers.push(observer),
            Err(_) => tracing::error!("session observer registry poisoned; observer dropped"),
        }
    }

    /// Ask the backend whether a session exists.
    ///
    /// Any failure resolves to anonymous; nothing is retried.
    pub async fn check(&self) -> SessionState {
        let next = match self.backend.session_check().await {
            Ok(check) if check.is_authenticated => match check.user.map(Principal::from_profile) {
                Some(Ok(principal)) => SessionState::Authenticated(principal),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "session check returned unusable user data");
                    SessionState::Anonymous
                }
                None => {
                    tracing::warn!("session check reported a session without user data");
                    SessionState::Anonymous
                }
            },
            Ok(_) => SessionState::Anonymous,
            Err(e) if e.is_session_expired() || e.is_expected() => {
                tracing::debug!(error = %e, "no active session");
                SessionState::Anonymous
            }
            Err(e) => {
                tracing::error!(error = %e, "session check failed; assuming anonymous");
                SessionState::Anonymous
            }
        };

        self.transition(next.clone());
        next
    }

    /// Authenticate with email and password.
    ///
    /// Never navigates; the caller redirects using the returned principal.
    pub async fn login(&self, email: &str, password: &str) -> LoginResult {
        if email.trim().is_empty() || password.is_empty() {
            return LoginResult::Failure {
                message: MISSING_CREDENTIALS.to_string(),
            };
        }

        let credentials = Credentials::new(email.trim(), password);
        match self.backend.login(&credentials).await {
            Ok(response) => match response.user.map(Principal::from_profile) {
                Some(Ok(principal)) => {
                    tracing::info!(
                        subject = %principal.subject_id(),
                        role = %principal.role(),
                        "login succeeded"
                    );
                    self.transition(SessionState::Authenticated(principal.clone()));
                    LoginResult::Success(principal)
                }
                _ => {
                    tracing::warn!("login succeeded without usable user data");
                    LoginResult::Failure {
                        message: GENERIC_LOGIN_ERROR.to_string(),
                    }
                }
            },
            Err(e) => LoginResult::Failure {
                message: login_failure_message(&e),
            },
        }
    }

    /// Log out locally, then tell the backend.
    ///
    /// The local reset happens first and unconditionally; a failing backend
    /// call is logged and otherwise ignored.
    pub async fn logout(&self) {
        self.transition(SessionState::Anonymous);
        tracing::info!("logged out");

        if let Err(e) = self.backend.logout().await {
            tracing::warn!(error = %e, "backend logout failed; local session already cleared");
        }
    }

    /// Apply the session-level consequence of a failed backend call.
    ///
    /// A 401 on an authenticated call is an implicit logout. Returns whether
    /// the session was ended.
    pub fn handle_failure(&self, error: &BackendError) -> bool {
        if !error.is_session_expired() || !self.state.borrow().is_authenticated() {
            return false;
        }
        tracing::info!("session expired; clearing local session");
        self.transition(SessionState::Anonymous);
        true
    }

    fn transition(&self, next: SessionState) {
        let previous = self.state.send_replace(next.clone());
        if previous == next {
            return;
        }
        tracing::debug!(
            from = previous.name(),
            to = next.name(),
            "session transition"
        );

        let observers = match self.observers.read() {
            Ok(observers) => observers.clone(),
            Err(_) => {
                tracing::error!("session observer registry poisoned");
                return;
            }
        };
        for observer in observers {
            observer.session_changed(&next);
        }
    }
}

impl core::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionStore").field("state", &*self.state.borrow()).finish()
    }
}

fn login_failure_message(error: &BackendError) -> String {
    match error {
        BackendError::Rejected { message: Some(m), .. } if error.is_expected() && !m.trim().is_empty() => {
            tracing::debug!(error = %error, "login rejected");
            m.clone()
        }
        _ if error.is_expected() => {
            tracing::debug!(error = %error, "login rejected");
            GENERIC_LOGIN_ERROR.to_string()
        }
        _ => {
            tracing::error!(error = %error, "login failed");
            GENERIC_LOGIN_ERROR.to_string()
        }
    }
}
