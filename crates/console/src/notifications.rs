//! Unread-notification badge and the mark-as-read action.
//!
//! The header badge and the notification list are mounted independently.
//! They meet only on the signal bus: the list publishes
//! [`ConsoleSignal::NotificationsChanged`] after a successful mutation and
//! the badge re-reads the count from the backend. The badge also polls on a
//! fixed period; both refreshes are idempotent reads, so the last response
//! wins.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use condo_core::NotificationId;
use condo_events::{ConsoleSignal, InMemorySignalBus, RecvError, SignalBus};

use crate::backend::{BackendError, ConsoleBackend, Notification};
use crate::list::ListController;
use crate::session::SessionStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

pub type SignalChannel = InMemorySignalBus<ConsoleSignal>;

/// Header badge holding the eventually-consistent unread count.
pub struct NotificationBadge {
    backend: Arc<dyn ConsoleBackend>,
    session: Arc<SessionStore>,
    signals: Arc<SignalChannel>,
    interval: Duration,
    count: watch::Sender<u64>,
}

impl NotificationBadge {
    pub fn new(
        backend: Arc<dyn ConsoleBackend>,
        session: Arc<SessionStore>,
        signals: Arc<SignalChannel>,
        interval: Duration,
    ) -> Arc<Self> {
        let (count, _) = watch::channel(0);
        Arc::new(Self {
            backend,
            session,
            signals,
            interval,
            count,
        })
    }

    pub fn count(&self) -> u64 {
        *self.count.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.count.subscribe()
    }

    /// Re-read the unread count. Failures read as zero.
    pub async fn refresh(&self) -> u64 {
        let count = match self.backend.unread_notification_count().await {
            Ok(count) => count,
            Err(e) => {
                self.session.handle_failure(&e);
                log_failure(&e, "unread count fetch failed; assuming zero");
                0
            }
        };
        self.count.send_replace(count);
        count
    }

    /// Start polling and listening, if the current role gets notifications.
    ///
    /// The first poll tick fires immediately. Polling stops on unmount, or
    /// by itself once the session no longer qualifies.
    pub fn mount(self: &Arc<Self>) -> Option<BadgeMount> {
        let role = self.session.state().role()?;
        if !role.receives_notifications() {
            tracing::debug!(%role, "role has no notification badge");
            return None;
        }

        // Subscribe before spawning so no signal published after mount is missed.
        let mut signals = self.signals.subscribe();
        let mut session = self.session.subscribe();
        let shutdown = Arc::new(Notify::new());
        let stop = shutdown.clone();
        let this = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut bus_open = true;

            tracing::debug!("notification badge mounted");
            loop {
                tokio::select! {
                    _ = stop.notified() => break,
                    _ = ticker.tick() => {
                        this.refresh().await;
                    }
                    signal = signals.recv(), if bus_open => match signal {
                        Ok(ConsoleSignal::NotificationsChanged) | Err(RecvError::Lagged(_)) => {
                            this.refresh().await;
                        }
                        Err(RecvError::Closed) => bus_open = false,
                    },
                    changed = session.changed() => {
                        let qualifies = changed.is_ok()
                            && session.borrow().role().is_some_and(|r| r.receives_notifications());
                        if !qualifies {
                            this.count.send_replace(0);
                            break;
                        }
                    }
                }
            }
            tracing::debug!("notification badge stopped");
        });

        Some(BadgeMount {
            shutdown,
            handle: Some(handle),
        })
    }
}

/// A mounted badge. Dropping it stops polling and releases the subscription.
pub struct BadgeMount {
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl BadgeMount {
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop and wait until the timer and subscription are released.
    pub async fn unmount(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::error!(error = %e, "notification badge task failed");
                }
            }
        }
    }
}

impl Drop for BadgeMount {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Mutations performed from notification lists.
pub struct NotificationActions {
    backend: Arc<dyn ConsoleBackend>,
    session: Arc<SessionStore>,
    signals: Arc<SignalChannel>,
}

impl NotificationActions {
    pub fn new(backend: Arc<dyn ConsoleBackend>, session: Arc<SessionStore>, signals: Arc<SignalChannel>) -> Self {
        Self {
            backend,
            session,
            signals,
        }
    }

    /// Mark one notification read.
    ///
    /// Order: local update, server round-trip, broadcast, list refresh. On
    /// failure nothing is broadcast and the list is reloaded to undo the
    /// local update.
    pub async fn mark_read(
        &self,
        id: &NotificationId,
        list: &ListController<Notification>,
    ) -> Result<(), BackendError> {
        list.update_items(|items| {
            for item in items.iter_mut().filter(|n| &n.id == id) {
                item.read = true;
            }
        });

        if let Err(e) = self.backend.mark_notification_read(id).await {
            self.session.handle_failure(&e);
            log_failure(&e, "mark as read failed");
            list.handle_list_data().await;
            return Err(e);
        }

        let Ok(()) = self.signals.publish(ConsoleSignal::NotificationsChanged);

        list.handle_list_data().await;
        Ok(())
    }
}

fn log_failure(error: &BackendError, context: &'static str) {
    if error.is_expected() || error.is_session_expired() {
        tracing::debug!(error = %error, "{context}");
    } else {
        tracing::error!(error = %error, "{context}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::DEFAULT_SEARCH_DEBOUNCE;
    use crate::session::SessionState;
    use crate::storage::InMemoryStorage;
    use crate::tenant::TenantSelectionStore;
    use crate::test_support::{Call, StubBackend, settle};

    struct Fixture {
        backend: Arc<StubBackend>,
        session: Arc<SessionStore>,
        signals: Arc<SignalChannel>,
        badge: Arc<NotificationBadge>,
    }

    async fn fixture(role: &str) -> Fixture {
        let backend = Arc::new(StubBackend::authenticated(role));
        let session = SessionStore::start(backend.clone()).await;
        let signals = Arc::new(SignalChannel::new());
        let badge = NotificationBadge::new(backend.clone(), session.clone(), signals.clone(), DEFAULT_POLL_INTERVAL);
        Fixture {
            backend,
            session,
            signals,
            badge,
        }
    }

    fn count_fetches(backend: &StubBackend) -> usize {
        backend.calls().iter().filter(|c| **c == Call::UnreadCount).count()
    }

    #[tokio::test(start_paused = true)]
    async fn mount_fetches_then_polls() {
        let f = fixture("condominio").await;
        f.backend.seed_notifications(3);

        let mount = f.badge.mount().expect("condominio gets a badge");
        settle().await;
        assert_eq!(f.badge.count(), 3);
        assert_eq!(count_fetches(&f.backend), 1);

        f.backend.seed_notifications(5);
        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(f.badge.count(), 5);
        assert_eq!(count_fetches(&f.backend), 2);

        mount.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn privileged_role_has_no_badge() {
        let f = fixture("superadmin").await;
        assert!(f.badge.mount().is_none());
        assert_eq!(count_fetches(&f.backend), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mark_read_converges_before_next_poll() {
        let f = fixture("morador").await;
        f.backend.seed_notifications(3);

        let tenants = Arc::new(TenantSelectionStore::new(&f.session.state(), Arc::new(InMemoryStorage::new())));
        let list: Arc<ListController<Notification>> = ListController::new(
            "notificacoes",
            10,
            DEFAULT_SEARCH_DEBOUNCE,
            f.backend.clone(),
            f.session.clone(),
            tenants,
        );
        list.mount().await;

        let mount = f.badge.mount().unwrap();
        settle().await;
        assert_eq!(f.badge.count(), 3);

        let first = list.snapshot().items[0].id.clone();
        let actions = NotificationActions::new(f.backend.clone(), f.session.clone(), f.signals.clone());
        actions.mark_read(&first, &list).await.unwrap();
        settle().await;

        assert_eq!(f.badge.count(), 2);
        assert!(list.snapshot().items.iter().find(|n| n.id == first).unwrap().read);

        let calls = f.backend.calls();
        let marked = calls.iter().position(|c| *c == Call::MarkRead(first.clone())).unwrap();
        let refetched = calls
            .iter()
            .rposition(|c| matches!(c, Call::FetchList { .. }))
            .unwrap();
        assert!(refetched > marked);

        mount.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_mark_read_does_not_broadcast() {
        let f = fixture("morador").await;
        f.backend.seed_notifications(1);
        f.backend.fail_mark_read_with(BackendError::Network("down".into()));

        let mut watcher = f.signals.subscribe();
        let tenants = Arc::new(TenantSelectionStore::new(&f.session.state(), Arc::new(InMemoryStorage::new())));
        let list: Arc<ListController<Notification>> = ListController::new(
            "notificacoes",
            10,
            DEFAULT_SEARCH_DEBOUNCE,
            f.backend.clone(),
            f.session.clone(),
            tenants,
        );
        list.mount().await;

        let id = list.snapshot().items[0].id.clone();
        let actions = NotificationActions::new(f.backend.clone(), f.session.clone(), f.signals.clone());
        assert!(actions.mark_read(&id, &list).await.is_err());

        assert_eq!(watcher.try_recv(), Ok(None));
        assert!(!list.snapshot().items[0].read);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_releases_timer_and_subscription() {
        let f = fixture("condominio").await;
        let mount = f.badge.mount().unwrap();
        assert_eq!(f.signals.subscriber_count(), 1);

        mount.unmount().await;
        assert_eq!(f.signals.subscriber_count(), 0);

        let before = count_fetches(&f.backend);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(count_fetches(&f.backend), before);
    }

    #[tokio::test(start_paused = true)]
    async fn count_failure_reads_as_zero_and_expiry_logs_out() {
        let f = fixture("condominio").await;
        f.backend.seed_notifications(4);
        assert_eq!(f.badge.refresh().await, 4);

        f.backend.fail_unread_with(BackendError::Network("down".into()));
        assert_eq!(f.badge.refresh().await, 0);
        assert!(f.session.state().is_authenticated());

        f.backend.fail_unread_with(BackendError::Unauthorized);
        f.badge.refresh().await;
        assert_eq!(f.session.state(), SessionState::Anonymous);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_stops_polling() {
        let f = fixture("condominio").await;
        let mount = f.badge.mount().unwrap();
        settle().await;

        f.session.logout().await;
        settle().await;
        assert!(!mount.is_active());
        assert_eq!(f.badge.count(), 0);
    }
}
