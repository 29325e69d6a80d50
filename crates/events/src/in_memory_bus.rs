//! In-memory signal bus backed by a tokio broadcast channel.

use core::convert::Infallible;

use tokio::sync::broadcast;

use crate::bus::{SignalBus, Subscription};

const DEFAULT_CAPACITY: usize = 64;

/// In-memory pub/sub bus.
///
/// - No IO
/// - Best-effort fan-out
/// - Publishing never fails, even with no subscribers
#[derive(Debug)]
pub struct InMemorySignalBus<M> {
    sender: broadcast::Sender<M>,
}

impl<M: Clone> InMemorySignalBus<M> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<M: Clone> Default for InMemorySignalBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> SignalBus<M> for InMemorySignalBus<M>
where
    M: Clone + core::fmt::Debug + Send + Sync + 'static,
{
    type Error = Infallible;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        match self.sender.send(message) {
            Ok(receivers) => {
                tracing::trace!(receivers, "signal published");
            }
            Err(broadcast::error::SendError(message)) => {
                tracing::trace!(?message, "signal published with no subscribers");
            }
        }
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        Subscription::new(self.sender.subscribe())
    }
}
