//! Unbounded channel backed by a growable queue.
//!
//! Sending never blocks. Receivers block while the queue is empty and the channel is open.

use std::collections::VecDeque;
use std::time::Instant;

use crate::err::{RecvTimeoutError, SendTimeoutError, TryRecvError, TrySendError};
use crate::notify::{Context, Selected, SyncWaker};
use crate::utils::{Backoff, Spinlock};

/// Inner representation of an unbounded channel.
struct Inner<T> {
    /// Queued messages, oldest at the front.
    queue: VecDeque<T>,

    /// Equals `true` when the channel is closed.
    is_closed: bool,
}

/// Unbounded channel.
pub struct Channel<T> {
    /// Inner representation of the channel.
    inner: Spinlock<Inner<T>>,

    /// Receivers waiting while the channel is empty and not closed.
    receivers: SyncWaker,
}

impl<T> Channel<T> {
    /// Creates a new unbounded channel.
    pub fn new() -> Self {
        Channel {
            inner: Spinlock::new(Inner {
                queue: VecDeque::new(),
                is_closed: false,
            }),
            receivers: SyncWaker::new(),
        }
    }

    /// Attempts to send a message into the channel.
    pub fn try_send(&self, msg: T) -> Result<(), TrySendError<T>> {
        let mut inner = self.inner.lock();
        if inner.is_closed {
            return Err(TrySendError::Closed(msg));
        }
        inner.queue.push_back(msg);
        drop(inner);

        // Wake a sleeping receiver.
        self.receivers.notify();
        Ok(())
    }

    /// Sends a message into the channel.
    ///
    /// The deadline is ignored because sending never blocks.
    pub fn send(&self, msg: T, _deadline: Option<Instant>) -> Result<(), SendTimeoutError<T>> {
        self.try_send(msg).map_err(|err| match err {
            TrySendError::Closed(msg) => SendTimeoutError::Closed(msg),
            TrySendError::Full(_) => unreachable!("unbounded channel is never full"),
        })
    }

    /// Attempts to receive a message without blocking.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let mut inner = self.inner.lock();
        match inner.queue.pop_front() {
            Some(msg) => Ok(msg),
            None if inner.is_closed => Err(TryRecvError::Closed),
            None => Err(TryRecvError::Empty),
        }
    }

    /// Receives a message from the channel.
    pub fn recv(&self, deadline: Option<Instant>) -> Result<T, RecvTimeoutError> {
        loop {
            // Try receiving a message several times.
            let backoff = Backoff::new();
            loop {
                match self.try_recv() {
                    Ok(msg) => return Ok(msg),
                    Err(TryRecvError::Closed) => return Err(RecvTimeoutError::Closed),
                    Err(TryRecvError::Empty) => {}
                }

                if backoff.is_completed() {
                    break;
                } else {
                    backoff.snooze();
                }
            }

            if deadline.map_or(false, |d| Instant::now() >= d) {
                return Err(RecvTimeoutError::Timeout);
            }

            Context::with(|cx| {
                self.receivers.register(cx);

                // A send may have landed between the last try_recv and registering.
                if self.can_recv() {
                    let _ = cx.try_select(Selected::Aborted);
                }

                match cx.wait_until(deadline) {
                    Selected::Waiting => unreachable!(),
                    Selected::Aborted | Selected::Closed => {
                        self.receivers.unregister(cx);
                    }
                    Selected::Operation => {}
                }
            });
        }
    }

    /// Closes the channel and wakes up all blocked receivers and selects.
    ///
    /// Returns `true` if this call closed the channel.
    pub fn disconnect(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.is_closed {
            return false;
        }
        inner.is_closed = true;
        drop(inner);

        self.receivers.close();
        true
    }

    /// Returns `true` if the channel is closed.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_closed
    }

    /// Returns the current number of messages inside the channel.
    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Returns `true` if a receive operation would complete or fail right now.
    pub fn can_recv(&self) -> bool {
        let inner = self.inner.lock();
        !inner.queue.is_empty() || inner.is_closed
    }
}

impl<T> crate::channel::Channel<T> for Channel<T> {
    fn try_send(&self, msg: T) -> Result<(), TrySendError<T>> {
        self.try_send(msg)
    }

    fn send(&self, msg: T, deadline: Option<Instant>) -> Result<(), SendTimeoutError<T>> {
        self.send(msg, deadline)
    }

    fn try_recv(&self) -> Result<T, TryRecvError> {
        self.try_recv()
    }

    fn recv(&self, deadline: Option<Instant>) -> Result<T, RecvTimeoutError> {
        self.recv(deadline)
    }

    fn disconnect(&self) -> bool {
        self.disconnect()
    }

    fn is_closed(&self) -> bool {
        self.is_closed()
    }

    fn len(&self) -> usize {
        self.len()
    }

    fn capacity(&self) -> Option<usize> {
        None
    }

    // Sending always completes or fails immediately.
    fn can_send(&self) -> bool {
        true
    }

    fn can_recv(&self) -> bool {
        self.can_recv()
    }

    fn watch_send(&self, _cx: &Context) {}

    fn unwatch_send(&self, _cx: &Context) {}

    fn watch_recv(&self, cx: &Context) {
        self.receivers.watch(cx)
    }

    fn unwatch_recv(&self, cx: &Context) {
        self.receivers.unwatch(cx)
    }
}
