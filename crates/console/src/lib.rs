//! `condo-console`: client core of the multi-tenant condominium console.
//!
//! Session and tenant state, route gating, the notification badge and the
//! shared list-page controller. Pages are expected to sit on top of
//! [`Console`]; nothing here renders.

pub mod backend;
pub mod config;
pub mod console;
pub mod guard;
pub mod http;
pub mod list;
pub mod notifications;
pub mod password_reset;
pub mod routes;
pub mod session;
pub mod storage;
pub mod tenant;

#[cfg(test)]
mod test_support;

pub use backend::{BackendError, ConsoleBackend, ListQuery, Notification, TenantSummary};
pub use config::{ConfigError, ConsoleConfig};
pub use console::Console;
pub use guard::{GuardDecision, TenantGuard};
pub use http::HttpBackend;
pub use list::{ListController, ListState, Page, normalize_list};
pub use notifications::{BadgeMount, NotificationActions, NotificationBadge};
pub use password_reset::{PasswordResetFlow, ResetFlowError};
pub use routes::{Navigator, Route, RouteDecision, RouteGate, RouterState};
pub use session::{LoginResult, SessionObserver, SessionState, SessionStore};
pub use storage::{FileStorage, InMemoryStorage, LocalStorage, StorageError};
pub use tenant::{TenantSelectionError, TenantSelectionStore};
