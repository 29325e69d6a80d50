//! Scripted backend and fixtures for unit tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use condo_auth::{Principal, UserProfile};
use condo_core::{NotificationId, SubjectId};

use crate::backend::{
    BackendError, ConsoleBackend, Credentials, ListQuery, LoginResponse, Notification, PasswordReset,
    SessionCheck, TenantSummary,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SessionCheck,
    Login(String),
    Logout,
    ListTenants,
    UnreadCount,
    MarkRead(NotificationId),
    FetchList { resource: String, query: ListQuery },
    RequestReset(String),
    VerifyReset { email: String, code: String },
    ResetPassword(PasswordReset),
}

struct Script {
    session_check: Result<SessionCheck, BackendError>,
    login: Result<LoginResponse, BackendError>,
    logout: Result<(), BackendError>,
    tenants: Vec<TenantSummary>,
    list_payload: Value,
    list_failure: Option<BackendError>,
    notifications: Vec<Notification>,
    mark_read_failure: Option<BackendError>,
    unread_failure: Option<BackendError>,
    reset_failure: Option<BackendError>,
    calls: Vec<Call>,
}

pub struct StubBackend {
    script: Mutex<Script>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                session_check: Ok(SessionCheck::default()),
                login: Err(BackendError::Rejected {
                    status: 401,
                    message: Some("Credenciais inválidas".into()),
                }),
                logout: Ok(()),
                tenants: Vec::new(),
                list_payload: Value::Array(Vec::new()),
                list_failure: None,
                notifications: Vec::new(),
                mark_read_failure: None,
                unread_failure: None,
                reset_failure: None,
                calls: Vec::new(),
            }),
        }
    }

    /// A backend whose session check reports a user with `role_label`.
    pub fn authenticated(role_label: &str) -> Self {
        let stub = Self::new();
        stub.set_session_check(Ok(SessionCheck {
            is_authenticated: true,
            user: Some(profile(role_label)),
        }));
        stub
    }

    pub fn set_session_check(&self, outcome: Result<SessionCheck, BackendError>) {
        self.script.lock().unwrap().session_check = outcome;
    }

    pub fn set_login(&self, outcome: Result<LoginResponse, BackendError>) {
        self.script.lock().unwrap().login = outcome;
    }

    pub fn set_logout(&self, outcome: Result<(), BackendError>) {
        self.script.lock().unwrap().logout = outcome;
    }

    pub fn set_tenants(&self, tenants: Vec<TenantSummary>) {
        self.script.lock().unwrap().tenants = tenants;
    }

    pub fn set_list_payload(&self, payload: Value) {
        let mut script = self.script.lock().unwrap();
        script.list_payload = payload;
        script.list_failure = None;
    }

    pub fn fail_lists_with(&self, error: BackendError) {
        self.script.lock().unwrap().list_failure = Some(error);
    }

    /// Replace the notification inbox with `unread` unread entries.
    ///
    /// While seeded, the `notificacoes` list serves the inbox.
    pub fn seed_notifications(&self, unread: usize) {
        self.script.lock().unwrap().notifications = (1..=unread)
            .map(|n| Notification {
                id: NotificationId::new(format!("n-{n}")).unwrap(),
                title: format!("Aviso {n}"),
                message: String::new(),
                read: false,
                created_at: None,
            })
            .collect();
    }

    pub fn fail_mark_read_with(&self, error: BackendError) {
        self.script.lock().unwrap().mark_read_failure = Some(error);
    }

    pub fn fail_unread_with(&self, error: BackendError) {
        self.script.lock().unwrap().unread_failure = Some(error);
    }

    /// Applies to both code verification and the final reset.
    pub fn fail_reset_with(&self, error: BackendError) {
        self.script.lock().unwrap().reset_failure = Some(error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    fn record(&self, call: Call) -> std::sync::MutexGuard<'_, Script> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(call);
        script
    }
}

#[async_trait]
impl ConsoleBackend for StubBackend {
    async fn session_check(&self) -> Result<SessionCheck, BackendError> {
        self.record(Call::SessionCheck).session_check.clone()
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, BackendError> {
        self.record(Call::Login(credentials.email.clone())).login.clone()
    }

    async fn logout(&self) -> Result<(), BackendError> {
        self.record(Call::Logout).logout.clone()
    }

    async fn list_tenants(&self) -> Result<Vec<TenantSummary>, BackendError> {
        Ok(self.record(Call::ListTenants).tenants.clone())
    }

    async fn unread_notification_count(&self) -> Result<u64, BackendError> {
        let script = self.record(Call::UnreadCount);
        match &script.unread_failure {
            Some(error) => Err(error.clone()),
            None => Ok(script.notifications.iter().filter(|n| !n.read).count() as u64),
        }
    }

    async fn mark_notification_read(&self, id: &NotificationId) -> Result<(), BackendError> {
        let mut script = self.record(Call::MarkRead(id.clone()));
        if let Some(error) = &script.mark_read_failure {
            return Err(error.clone());
        }
        match script.notifications.iter_mut().find(|n| &n.id == id) {
            Some(notification) => {
                notification.read = true;
                Ok(())
            }
            None => Err(BackendError::Rejected {
                status: 404,
                message: Some("Notificação não encontrada".into()),
            }),
        }
    }

    async fn fetch_list(&self, resource: &str, query: &ListQuery) -> Result<Value, BackendError> {
        let script = self.record(Call::FetchList {
            resource: resource.to_string(),
            query: query.clone(),
        });
        if let Some(error) = &script.list_failure {
            return Err(error.clone());
        }
        if resource == "notificacoes" && !script.notifications.is_empty() {
            return serde_json::to_value(&script.notifications).map_err(|e| BackendError::Decode(e.to_string()));
        }
        Ok(script.list_payload.clone())
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), BackendError> {
        self.record(Call::RequestReset(email.to_string()));
        Ok(())
    }

    async fn verify_reset_code(&self, email: &str, code: &str) -> Result<(), BackendError> {
        let script = self.record(Call::VerifyReset {
            email: email.to_string(),
            code: code.to_string(),
        });
        script.reset_failure.clone().map_or(Ok(()), Err)
    }

    async fn reset_password(&self, reset: &PasswordReset) -> Result<(), BackendError> {
        let script = self.record(Call::ResetPassword(reset.clone()));
        script.reset_failure.clone().map_or(Ok(()), Err)
    }
}

/// A backend user profile for `role_label`, e-mailed at `<label>@example.com`.
pub fn profile(role_label: &str) -> UserProfile {
    let slug = role_label.to_lowercase();
    UserProfile {
        id: SubjectId::new(format!("user-{slug}")).unwrap(),
        email: format!("{slug}@example.com"),
        role: role_label.to_string(),
        name: None,
        avatar: None,
    }
}

pub fn principal(role_label: &str) -> Principal {
    Principal::from_profile(profile(role_label)).unwrap()
}

/// Let spawned tasks run to their next await point.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
