use std::fmt;

use thiserror::Error;

/// [`Sender::send`](crate::Sender::send) failed because the channel is closed.
///
/// Carries the message that could not be delivered.
#[derive(PartialEq, Eq, Clone, Copy, Error)]
#[error("sending on a closed channel")]
pub struct SendError<T>(pub T);

/// [`Sender::try_send`](crate::Sender::try_send) could not deliver the message right away.
#[derive(PartialEq, Eq, Clone, Copy, Error)]
pub enum TrySendError<T> {
    /// No room in the buffer, or no receiver waiting on a rendezvous channel.
    #[error("sending on a full channel")]
    Full(T),

    /// The channel is closed.
    #[error("sending on a closed channel")]
    Closed(T),
}

/// [`Sender::send_timeout`](crate::Sender::send_timeout) did not deliver the message.
#[derive(PartialEq, Eq, Clone, Copy, Error)]
pub enum SendTimeoutError<T> {
    /// The timeout elapsed first.
    #[error("timed out waiting on send operation")]
    Timeout(T),

    /// The channel is closed.
    #[error("sending on a closed channel")]
    Closed(T),
}

/// [`Receiver::recv`](crate::Receiver::recv) found the channel closed and drained.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Error)]
#[error("receiving on an empty and closed channel")]
pub struct RecvError;

/// [`Receiver::try_recv`](crate::Receiver::try_recv) found nothing to take.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Error)]
pub enum TryRecvError {
    /// Nothing queued, or no sender waiting on a rendezvous channel.
    #[error("receiving on an empty channel")]
    Empty,

    /// The channel is closed and drained.
    #[error("receiving on an empty and closed channel")]
    Closed,
}

/// [`Receiver::recv_timeout`](crate::Receiver::recv_timeout) received nothing.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Error)]
pub enum RecvTimeoutError {
    /// The timeout elapsed first.
    #[error("timed out waiting on receive operation")]
    Timeout,

    /// The channel is closed and drained.
    #[error("channel is empty and closed")]
    Closed,
}

/// [`Select::try_wait`](crate::Select::try_wait) found no operation ready.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Error)]
#[error("all operations in select would block")]
pub struct TrySelectError;

/// [`Select::wait_timeout`](crate::Select::wait_timeout) saw no operation become ready in time.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Error)]
#[error("timed out waiting on select")]
pub struct SelectTimeoutError;

// Debug output never shows the message, so `T` needs no `Debug` bound.

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("SendError(..)")
    }
}

impl<T> fmt::Debug for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(_) => f.pad("Full(..)"),
            TrySendError::Closed(_) => f.pad("Closed(..)"),
        }
    }
}

impl<T> fmt::Debug for SendTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendTimeoutError::Timeout(_) => f.pad("Timeout(..)"),
            SendTimeoutError::Closed(_) => f.pad("Closed(..)"),
        }
    }
}

impl<T> SendError<T> {
    /// Gives back the undelivered message.
    ///
    /// ```
    /// use handoff::unbounded;
    ///
    /// let (s, r) = unbounded();
    /// drop(r);
    /// assert_eq!(s.send("hello").unwrap_err().into_inner(), "hello");
    /// ```
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> TrySendError<T> {
    /// Gives back the undelivered message.
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(msg) | TrySendError::Closed(msg) => msg,
        }
    }

    /// Returns `true` for [`TrySendError::Full`].
    pub fn is_full(&self) -> bool {
        matches!(self, TrySendError::Full(_))
    }

    /// Returns `true` for [`TrySendError::Closed`].
    pub fn is_closed(&self) -> bool {
        matches!(self, TrySendError::Closed(_))
    }
}

impl<T> SendTimeoutError<T> {
    /// Gives back the undelivered message.
    pub fn into_inner(self) -> T {
        match self {
            SendTimeoutError::Timeout(msg) | SendTimeoutError::Closed(msg) => msg,
        }
    }

    /// Returns `true` for [`SendTimeoutError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, SendTimeoutError::Timeout(_))
    }

    /// Returns `true` for [`SendTimeoutError::Closed`].
    pub fn is_closed(&self) -> bool {
        matches!(self, SendTimeoutError::Closed(_))
    }
}

impl TryRecvError {
    /// Returns `true` for [`TryRecvError::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, TryRecvError::Empty)
    }

    /// Returns `true` for [`TryRecvError::Closed`].
    pub fn is_closed(&self) -> bool {
        matches!(self, TryRecvError::Closed)
    }
}

impl RecvTimeoutError {
    /// Returns `true` for [`RecvTimeoutError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, RecvTimeoutError::Timeout)
    }

    /// Returns `true` for [`RecvTimeoutError::Closed`].
    pub fn is_closed(&self) -> bool {
        matches!(self, RecvTimeoutError::Closed)
    }
}

impl<T> From<SendError<T>> for TrySendError<T> {
    fn from(SendError(msg): SendError<T>) -> Self {
        TrySendError::Closed(msg)
    }
}

impl<T> From<SendError<T>> for SendTimeoutError<T> {
    fn from(SendError(msg): SendError<T>) -> Self {
        SendTimeoutError::Closed(msg)
    }
}

impl From<RecvError> for TryRecvError {
    fn from(_: RecvError) -> Self {
        TryRecvError::Closed
    }
}

impl From<RecvError> for RecvTimeoutError {
    fn from(_: RecvError) -> Self {
        RecvTimeoutError::Closed
    }
}
