use serde::{Deserialize, Serialize};

/// Process-wide signals broadcast between console components.
///
/// Signals carry no payload beyond their kind: receivers always re-derive
/// state from the backend rather than trusting the sender's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleSignal {
    /// Something changed the read/unread state of notifications.
    NotificationsChanged,
}
