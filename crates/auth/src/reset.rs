use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A password-reset code the server has confirmed, kept client-side until
/// the final reset call.
///
/// Not a credential: the server validates the code again on reset. The time
/// window only gates the client-side "token valid" check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetCode {
    pub email: String,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ResetCode {
    pub fn issue(
        email: impl Into<String>,
        code: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            email: email.into(),
            code: code.into(),
            issued_at: now,
            expires_at: now + ttl,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResetCodeError {
    #[error("reset code has expired")]
    Expired,

    #[error("reset code not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid reset code time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("reset code is empty")]
    Empty,
}

/// Deterministically validate a stored reset code against `now`.
pub fn validate_reset_code(code: &ResetCode, now: DateTime<Utc>) -> Result<(), ResetCodeError> {
    if code.code.trim().is_empty() || code.email.trim().is_empty() {
        return Err(ResetCodeError::Empty);
    }
    if code.expires_at <= code.issued_at {
        return Err(ResetCodeError::InvalidTimeWindow);
    }
    if now < code.issued_at {
        return Err(ResetCodeError::NotYetValid);
    }
    if now >= code.expires_at {
        return Err(ResetCodeError::Expired);
    }
    Ok(())
}
