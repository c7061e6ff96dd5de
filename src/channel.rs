//! Channel handles and constructors.

use std::fmt;
use std::iter::FusedIterator;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::time::{Duration, Instant};

use crate::counter;
use crate::err::{RecvError, RecvTimeoutError, SendError, SendTimeoutError, TryRecvError, TrySendError};
use crate::flavors;
use crate::notify::Context;

/// Operations every channel flavor provides.
///
/// The watch methods register a select as an observer that is woken whenever the readiness of
/// the corresponding side may have changed.
pub trait Channel<T> {
    fn try_send(&self, msg: T) -> Result<(), TrySendError<T>>;
    fn send(&self, msg: T, deadline: Option<Instant>) -> Result<(), SendTimeoutError<T>>;
    fn try_recv(&self) -> Result<T, TryRecvError>;
    fn recv(&self, deadline: Option<Instant>) -> Result<T, RecvTimeoutError>;
    fn disconnect(&self) -> bool;
    fn is_closed(&self) -> bool;
    fn len(&self) -> usize;
    fn capacity(&self) -> Option<usize>;
    fn can_send(&self) -> bool;
    fn can_recv(&self) -> bool;
    fn watch_send(&self, cx: &Context);
    fn unwatch_send(&self, cx: &Context);
    fn watch_recv(&self, cx: &Context);
    fn unwatch_recv(&self, cx: &Context);
}

enum SenderFlavor<T> {
    Array(counter::Sender<flavors::array::Channel<T>>),
    List(counter::Sender<flavors::list::Channel<T>>),
    Zero(counter::Sender<flavors::zero::Channel<T>>),
}

enum ReceiverFlavor<T> {
    Array(counter::Receiver<flavors::array::Channel<T>>),
    List(counter::Receiver<flavors::list::Channel<T>>),
    Zero(counter::Receiver<flavors::zero::Channel<T>>),
}

/// Creates a channel that never runs out of room.
///
/// Sends always complete at once; only receivers ever wait.
///
/// # Examples
///
/// ```
/// use std::thread;
/// use handoff::unbounded;
///
/// let (s, r) = unbounded();
///
/// let greeter = thread::spawn(move || {
///     s.send("hello").unwrap();
///     s.send("world").unwrap();
/// });
///
/// greeter.join().unwrap();
/// assert_eq!(r.iter().collect::<Vec<_>>(), ["hello", "world"]);
/// ```
pub fn unbounded<T>() -> (Sender<T>, Receiver<T>) {
    let (s, r) = counter::new(flavors::list::Channel::new());
    let s = Sender {
        flavor: SenderFlavor::List(s),
    };
    let r = Receiver {
        flavor: ReceiverFlavor::List(r),
    };
    (s, r)
}

/// Creates a channel that holds at most `cap` messages.
///
/// With `cap == 0` nothing is ever stored: each send waits for a receive to pair with, and the
/// message passes directly from one thread to the other.
///
/// # Examples
///
/// A single slot lets a thread hand a value to itself:
///
/// ```
/// use handoff::bounded;
///
/// let (s, r) = bounded(1);
/// s.send(10).unwrap();
/// assert_eq!(r.recv(), Ok(10));
/// ```
///
/// A rendezvous needs a second thread:
///
/// ```
/// use std::thread;
/// use handoff::bounded;
///
/// let (s, r) = bounded(0);
/// thread::spawn(move || s.send(4 * 4).unwrap());
/// assert_eq!(r.recv(), Ok(16));
/// ```
pub fn bounded<T>(cap: usize) -> (Sender<T>, Receiver<T>) {
    if cap == 0 {
        let (s, r) = counter::new(flavors::zero::Channel::new());
        let s = Sender {
            flavor: SenderFlavor::Zero(s),
        };
        let r = Receiver {
            flavor: ReceiverFlavor::Zero(r),
        };
        (s, r)
    } else {
        let (s, r) = counter::new(flavors::array::Channel::with_capacity(cap));
        let s = Sender {
            flavor: SenderFlavor::Array(s),
        };
        let r = Receiver {
            flavor: ReceiverFlavor::Array(r),
        };
        (s, r)
    }
}

/// The sending half of a channel.
///
/// Senders can be cloned and shared between threads. The channel closes when the last one is
/// dropped or when any of them calls [`close`](Sender::close).
pub struct Sender<T> {
    flavor: SenderFlavor<T>,
}

unsafe impl<T: Send> Send for Sender<T> {}
unsafe impl<T: Send> Sync for Sender<T> {}

impl<T> UnwindSafe for Sender<T> {}
impl<T> RefUnwindSafe for Sender<T> {}

impl<T> Sender<T> {
    pub(crate) fn chan(&self) -> &dyn Channel<T> {
        match &self.flavor {
            SenderFlavor::Array(chan) => &**chan,
            SenderFlavor::List(chan) => &**chan,
            SenderFlavor::Zero(chan) => &**chan,
        }
    }

    /// Sends `msg` only if that is possible right now.
    ///
    /// On a rendezvous channel this succeeds only when a receiver is already blocked waiting.
    /// Failure hands `msg` back inside the error.
    ///
    /// ```
    /// use handoff::{bounded, TrySendError};
    ///
    /// let (s, r) = bounded(1);
    /// assert_eq!(s.try_send('a'), Ok(()));
    /// assert_eq!(s.try_send('b'), Err(TrySendError::Full('b')));
    ///
    /// drop(r);
    /// assert_eq!(s.try_send('c'), Err(TrySendError::Closed('c')));
    /// ```
    pub fn try_send(&self, msg: T) -> Result<(), TrySendError<T>> {
        self.chan().try_send(msg)
    }

    /// Sends `msg`, waiting for room or for a receiver as long as it takes.
    ///
    /// Fails, handing `msg` back, once the channel is closed.
    pub fn send(&self, msg: T) -> Result<(), SendError<T>> {
        self.chan().send(msg, None).map_err(|err| match err {
            SendTimeoutError::Closed(msg) => SendError(msg),
            SendTimeoutError::Timeout(_) => unreachable!("send without a deadline timed out"),
        })
    }

    /// Like [`send`](Sender::send), but gives up after `timeout`.
    ///
    /// ```
    /// use std::time::Duration;
    /// use handoff::{bounded, SendTimeoutError};
    ///
    /// let (s, _r) = bounded(0);
    /// assert_eq!(
    ///     s.send_timeout(1, Duration::from_millis(20)),
    ///     Err(SendTimeoutError::Timeout(1)),
    /// );
    /// ```
    pub fn send_timeout(&self, msg: T, timeout: Duration) -> Result<(), SendTimeoutError<T>> {
        let deadline = Instant::now() + timeout;
        self.chan().send(msg, Some(deadline))
    }

    /// Closes the channel.
    ///
    /// Further sends fail with the message handed back. Receivers still get every message queued
    /// before the call and then observe the closure. Blocked senders, receivers and selects are
    /// woken up.
    ///
    /// Returns `true` if this call closed the channel, `false` if it was already closed.
    ///
    /// # Examples
    ///
    /// ```
    /// use handoff::{bounded, RecvError, SendError};
    ///
    /// let (s, r) = bounded(2);
    /// s.send(1).unwrap();
    ///
    /// assert!(s.close());
    /// assert_eq!(s.send(2), Err(SendError(2)));
    ///
    /// assert_eq!(r.recv(), Ok(1));
    /// assert_eq!(r.recv(), Err(RecvError));
    /// ```
    pub fn close(&self) -> bool {
        self.chan().disconnect()
    }

    /// Returns `true` once the channel is closed.
    pub fn is_closed(&self) -> bool {
        self.chan().is_closed()
    }

    /// Number of messages waiting to be received. Always zero for a rendezvous channel.
    pub fn len(&self) -> usize {
        self.chan().len()
    }

    /// Returns `true` if no messages are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if a send would have to wait. A rendezvous channel is always full.
    pub fn is_full(&self) -> bool {
        self.capacity().map_or(false, |cap| self.len() >= cap)
    }

    /// Maximum number of stored messages, or `None` for an unbounded channel.
    pub fn capacity(&self) -> Option<usize> {
        self.chan().capacity()
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        unsafe {
            match &self.flavor {
                SenderFlavor::Array(chan) => chan.release(|c| c.disconnect()),
                SenderFlavor::List(chan) => chan.release(|c| c.disconnect()),
                SenderFlavor::Zero(chan) => chan.release(|c| c.disconnect()),
            }
        }
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        let flavor = match &self.flavor {
            SenderFlavor::Array(chan) => SenderFlavor::Array(chan.acquire()),
            SenderFlavor::List(chan) => SenderFlavor::List(chan.acquire()),
            SenderFlavor::Zero(chan) => SenderFlavor::Zero(chan.acquire()),
        };
        Sender { flavor }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("Sender { .. }")
    }
}

/// The receiving half of a channel.
///
/// Receivers can be cloned and shared between threads; each message goes to exactly one of
/// them. When the last receiver is dropped the channel closes and senders start failing.
pub struct Receiver<T> {
    flavor: ReceiverFlavor<T>,
}

unsafe impl<T: Send> Send for Receiver<T> {}
unsafe impl<T: Send> Sync for Receiver<T> {}

impl<T> UnwindSafe for Receiver<T> {}
impl<T> RefUnwindSafe for Receiver<T> {}

impl<T> Receiver<T> {
    pub(crate) fn chan(&self) -> &dyn Channel<T> {
        match &self.flavor {
            ReceiverFlavor::Array(chan) => &**chan,
            ReceiverFlavor::List(chan) => &**chan,
            ReceiverFlavor::Zero(chan) => &**chan,
        }
    }

    /// Takes a message only if one is available right now.
    ///
    /// On a rendezvous channel this succeeds only when a sender is already blocked waiting.
    ///
    /// ```
    /// use handoff::{unbounded, TryRecvError};
    ///
    /// let (s, r) = unbounded();
    /// assert_eq!(r.try_recv(), Err(TryRecvError::Empty));
    ///
    /// s.send(5).unwrap();
    /// s.close();
    /// assert_eq!(r.try_recv(), Ok(5));
    /// assert_eq!(r.try_recv(), Err(TryRecvError::Closed));
    /// ```
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.chan().try_recv()
    }

    /// Waits for a message.
    ///
    /// Fails only when the channel is both closed and drained.
    pub fn recv(&self) -> Result<T, RecvError> {
        self.chan().recv(None).map_err(|_| RecvError)
    }

    /// Like [`recv`](Receiver::recv), but gives up after `timeout`.
    ///
    /// ```
    /// use std::time::Duration;
    /// use handoff::{unbounded, RecvTimeoutError};
    ///
    /// let (s, r) = unbounded::<u8>();
    /// assert_eq!(r.recv_timeout(Duration::from_millis(20)), Err(RecvTimeoutError::Timeout));
    ///
    /// drop(s);
    /// assert_eq!(r.recv_timeout(Duration::from_millis(20)), Err(RecvTimeoutError::Closed));
    /// ```
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        let deadline = Instant::now() + timeout;
        self.chan().recv(Some(deadline))
    }

    /// Returns `true` once the channel is closed, even if messages are still queued.
    pub fn is_closed(&self) -> bool {
        self.chan().is_closed()
    }

    /// Number of messages waiting to be received.
    pub fn len(&self) -> usize {
        self.chan().len()
    }

    /// Returns `true` if no messages are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of stored messages, or `None` for an unbounded channel.
    pub fn capacity(&self) -> Option<usize> {
        self.chan().capacity()
    }

    /// Iterates over messages as they arrive, ending once the channel is closed and drained.
    ///
    /// ```
    /// use std::thread;
    /// use handoff::bounded;
    ///
    /// let (s, r) = bounded(0);
    /// thread::spawn(move || {
    ///     for n in 1..=3 {
    ///         s.send(n).unwrap();
    ///     }
    /// });
    ///
    /// assert_eq!(r.iter().sum::<i32>(), 6);
    /// ```
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { receiver: self }
    }

    /// Iterates over the messages available right now, without waiting.
    pub fn try_iter(&self) -> TryIter<'_, T> {
        TryIter { receiver: self }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        unsafe {
            match &self.flavor {
                ReceiverFlavor::Array(chan) => chan.release(|c| c.disconnect()),
                ReceiverFlavor::List(chan) => chan.release(|c| c.disconnect()),
                ReceiverFlavor::Zero(chan) => chan.release(|c| c.disconnect()),
            }
        }
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        let flavor = match &self.flavor {
            ReceiverFlavor::Array(chan) => ReceiverFlavor::Array(chan.acquire()),
            ReceiverFlavor::List(chan) => ReceiverFlavor::List(chan.acquire()),
            ReceiverFlavor::Zero(chan) => ReceiverFlavor::Zero(chan.acquire()),
        };
        Receiver { flavor }
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("Receiver { .. }")
    }
}

impl<'a, T> IntoIterator for &'a Receiver<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> IntoIterator for Receiver<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter { receiver: self }
    }
}

/// Borrowing, blocking iterator returned by [`Receiver::iter`].
pub struct Iter<'a, T> {
    receiver: &'a Receiver<T>,
}

impl<T> FusedIterator for Iter<'_, T> {}

impl<T> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

impl<T> fmt::Debug for Iter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("Iter { .. }")
    }
}

/// Borrowing, non-blocking iterator returned by [`Receiver::try_iter`].
pub struct TryIter<'a, T> {
    receiver: &'a Receiver<T>,
}

impl<T> Iterator for TryIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.try_recv().ok()
    }
}

impl<T> fmt::Debug for TryIter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("TryIter { .. }")
    }
}

/// Owning, blocking iterator; ends once the channel is closed and drained.
pub struct IntoIter<T> {
    receiver: Receiver<T>,
}

impl<T> FusedIterator for IntoIter<T> {}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

impl<T> fmt::Debug for IntoIter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("IntoIter { .. }")
    }
}
