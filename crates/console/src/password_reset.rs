//! Password-reset flow: request a code, verify it, then set a new password.
//!
//! The verified code is parked in local storage so the reset page can gate
//! itself on a client-side "code still valid" check. The server validates
//! the code again on the final call.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use condo_auth::{ResetCode, validate_reset_code};
use condo_core::{DomainError, DomainResult};

use crate::backend::{BackendError, ConsoleBackend, PasswordReset};
use crate::storage::{LocalStorage, RESET_CODE_KEY, StorageError};

pub const DEFAULT_RESET_CODE_TTL_MINS: i64 = 15;

#[derive(Debug, Error)]
pub enum ResetFlowError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("no verified reset code")]
    NoPendingCode,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct PasswordResetFlow {
    backend: Arc<dyn ConsoleBackend>,
    storage: Arc<dyn LocalStorage>,
    ttl: Duration,
}

impl PasswordResetFlow {
    pub fn new(backend: Arc<dyn ConsoleBackend>, storage: Arc<dyn LocalStorage>, ttl: Duration) -> Self {
        Self { backend, storage, ttl }
    }

    /// Ask the backend to send a reset code to `email`.
    pub async fn request_code(&self, email: &str) -> Result<(), ResetFlowError> {
        let email = required(email, "email")?;
        self.backend.request_password_reset(email).await?;
        tracing::info!("password reset code requested");
        Ok(())
    }

    /// Verify `code` with the backend and remember it for the reset step.
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<(), ResetFlowError> {
        let email = required(email, "email")?;
        let code = required(code, "code")?;

        self.backend.verify_reset_code(email, code).await?;

        let pending = ResetCode::issue(email, code, Utc::now(), self.ttl);
        let encoded = serde_json::to_string(&pending).map_err(|e| StorageError::Encode(e.to_string()))?;
        self.storage.set_item(RESET_CODE_KEY, &encoded)?;
        Ok(())
    }

    /// The remembered code, if still inside its window.
    ///
    /// Expired or unreadable codes are removed.
    pub fn pending_code(&self) -> Option<ResetCode> {
        self.pending_code_at(Utc::now())
    }

    pub fn pending_code_at(&self, now: DateTime<Utc>) -> Option<ResetCode> {
        let raw = self.storage.get_item(RESET_CODE_KEY)?;
        let code = match serde_json::from_str::<ResetCode>(&raw) {
            Ok(code) => code,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable reset code");
                self.discard();
                return None;
            }
        };

        match validate_reset_code(&code, now) {
            Ok(()) => Some(code),
            Err(e) => {
                tracing::debug!(error = %e, "stored reset code no longer valid");
                self.discard();
                None
            }
        }
    }

    /// Client-side gate for the reset page.
    pub fn has_valid_code(&self) -> bool {
        self.pending_code().is_some()
    }

    /// Set the new password using the remembered code.
    ///
    /// The code is cleared only once the backend accepts the reset.
    pub async fn reset_password(&self, new_password: &str) -> Result<(), ResetFlowError> {
        if new_password.is_empty() {
            return Err(DomainError::validation("new password is required").into());
        }
        let pending = self.pending_code().ok_or(ResetFlowError::NoPendingCode)?;

        self.backend
            .reset_password(&PasswordReset {
                email: pending.email,
                code: pending.code,
                new_password: new_password.to_string(),
            })
            .await?;

        self.storage.remove_item(RESET_CODE_KEY)?;
        tracing::info!("password reset completed");
        Ok(())
    }

    pub fn discard(&self) {
        if let Err(e) = self.storage.remove_item(RESET_CODE_KEY) {
            tracing::error!(error = %e, "failed to clear reset code");
        }
    }
}

fn required<'a>(value: &'a str, field: &str) -> DomainResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(trimmed)
}
