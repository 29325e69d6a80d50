//! Signal publishing/subscription abstraction (mechanics only).
//!
//! Broadcast semantics: every live subscription receives a copy of every
//! message published after it subscribed. Delivery is lossy for slow
//! subscribers (they observe [`RecvError::Lagged`]), so receivers must treat
//! messages as hints to re-read state, never as the state itself.

use std::sync::Arc;

use tokio::sync::broadcast;

/// Why a subscription could not yield a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecvError {
    /// The subscriber fell behind and `n` messages were dropped.
    #[error("subscription lagged by {0} messages")]
    Lagged(u64),

    /// Every publisher is gone; no further messages will arrive.
    #[error("bus closed")]
    Closed,
}

/// A subscription to a signal stream.
///
/// Dropping the subscription unsubscribes it.
///
/// ```ignore
/// let mut subscription = bus.subscribe();
/// loop {
///     match subscription.recv().await {
///         Ok(signal) => handle(signal),
///         Err(RecvError::Lagged(_)) => resync(),
///         Err(RecvError::Closed) => break,
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: broadcast::Receiver<M>,
}

impl<M: Clone> Subscription<M> {
    pub fn new(receiver: broadcast::Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Wait until the next message is available.
    pub async fn recv(&mut self) -> Result<M, RecvError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Lagged(n) => RecvError::Lagged(n),
            broadcast::error::RecvError::Closed => RecvError::Closed,
        })
    }

    /// Try to receive a message without waiting.
    ///
    /// Returns `Ok(None)` when nothing is pending.
    pub fn try_recv(&mut self) -> Result<Option<M>, RecvError> {
        match self.receiver.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Err(RecvError::Lagged(n)),
            Err(broadcast::error::TryRecvError::Closed) => Err(RecvError::Closed),
        }
    }
}

/// Transport-agnostic pub/sub channel.
///
/// Implementations must be safe to share across tasks; publishing never
/// blocks the caller.
pub trait SignalBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> SignalBus<M> for Arc<B>
where
    B: SignalBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
