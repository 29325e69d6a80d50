//! REST backend boundary.
//!
//! The console consumes, but does not define, the backend. This module names
//! the calls it depends on and the shapes it expects back; `crate::http`
//! provides the reqwest implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use condo_auth::{UserProfile, lenient_profile};
use condo_core::{NotificationId, TenantId};

/// Generic message for failures whose cause is not shown to the user.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Transport-level failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The session is missing or expired (401 outside of login).
    #[error("session expired")]
    Unauthorized,

    /// The backend answered with a non-success status.
    #[error("backend rejected request ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Rejected { status: u16, message: Option<String> },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The response body did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl BackendError {
    /// Expected failures (bad credentials, not found, validation) are shown
    /// inline and never logged as exceptional.
    pub fn is_expected(&self) -> bool {
        matches!(self, BackendError::Rejected { status, .. } if (400..500).contains(status))
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, BackendError::Unauthorized)
    }

    /// Message suitable for the user: the server's own words for expected
    /// failures, a generic sentence otherwise.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Rejected { message: Some(m), .. } if self.is_expected() && !m.trim().is_empty() => {
                m.clone()
            }
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Login request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// `GET session-check` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCheck {
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default, deserialize_with = "lenient_profile")]
    pub user: Option<UserProfile>,
}

/// `POST login` success response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    #[serde(default, deserialize_with = "lenient_profile")]
    pub user: Option<UserProfile>,
}

/// One entry of the tenant list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSummary {
    pub id: TenantId,
    pub name: String,
}

/// A notification as listed by the notifications page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default, rename = "createdAt")]
    pub created_at: Option<String>,
}

/// Final password reset body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordReset {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// Query parameters for paginated list endpoints.
///
/// `condominio_id` is omitted when the backend should infer scope from the
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ListQuery {
    pub page: u32,
    #[serde(rename = "limit")]
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(rename = "condominioId", skip_serializing_if = "Option::is_none")]
    pub tenant_scope: Option<TenantId>,
}

/// The REST calls the console depends on.
#[async_trait]
pub trait ConsoleBackend: Send + Sync {
    async fn session_check(&self) -> Result<SessionCheck, BackendError>;

    /// Rejections (including 401 for bad credentials) come back as
    /// [`BackendError::Rejected`], never as `Unauthorized`.
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, BackendError>;

    async fn logout(&self) -> Result<(), BackendError>;

    async fn list_tenants(&self) -> Result<Vec<TenantSummary>, BackendError>;

    async fn unread_notification_count(&self) -> Result<u64, BackendError>;

    async fn mark_notification_read(&self, id: &NotificationId) -> Result<(), BackendError>;

    /// Raw list payload; normalized by `crate::list::normalize_list`.
    async fn fetch_list(&self, resource: &str, query: &ListQuery) -> Result<serde_json::Value, BackendError>;

    async fn request_password_reset(&self, email: &str) -> Result<(), BackendError>;

    async fn verify_reset_code(&self, email: &str, code: &str) -> Result<(), BackendError>;

    async fn reset_password(&self, reset: &PasswordReset) -> Result<(), BackendError>;
}
