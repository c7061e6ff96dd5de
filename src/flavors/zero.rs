//! Rendezvous channel.
//!
//! Nothing is buffered. The side that arrives first parks with a packet on its own stack; the
//! side that arrives second claims it from the waker and moves the message through the packet.

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::err::{RecvTimeoutError, SendTimeoutError, TryRecvError, TrySendError};
use crate::notify::{Context, Entry, Selected, Waker};
use crate::utils::{Backoff, Spinlock};

/// Where a message changes hands.
struct Packet<T> {
    /// Set by the claiming side once it has written or taken the message.
    ready: AtomicBool,
    msg: UnsafeCell<Option<T>>,
}

impl<T> Packet<T> {
    fn new(msg: Option<T>) -> Packet<T> {
        Packet {
            ready: AtomicBool::new(false),
            msg: UnsafeCell::new(msg),
        }
    }

    fn addr(&self) -> usize {
        self as *const Packet<T> as usize
    }

    /// Spins until the claiming side is done with the packet.
    fn wait_ready(&self) {
        let backoff = Backoff::new();
        while !self.ready.load(Ordering::Acquire) {
            backoff.snooze();
        }
    }

    /// # Safety
    ///
    /// No other thread may touch the message concurrently.
    unsafe fn take(&self) -> Option<T> {
        (*self.msg.get()).take()
    }
}

struct Inner {
    /// Parked senders, each with a full packet.
    senders: Waker,

    /// Parked receivers, each with an empty packet.
    receivers: Waker,

    is_closed: bool,
}

/// Rendezvous channel.
pub struct Channel<T> {
    inner: Spinlock<Inner>,
    _marker: PhantomData<T>,
}

impl<T> Channel<T> {
    pub fn new() -> Self {
        Channel {
            inner: Spinlock::new(Inner {
                senders: Waker::new(),
                receivers: Waker::new(),
                is_closed: false,
            }),
            _marker: PhantomData,
        }
    }

    /// Fills the packet of a receiver claimed from `receivers`.
    fn write(receiver: Entry, msg: T) {
        unsafe {
            let packet = &*(receiver.packet as *const Packet<T>);
            *packet.msg.get() = Some(msg);
            packet.ready.store(true, Ordering::Release);
        }
    }

    /// Empties the packet of a sender claimed from `senders`.
    fn read(sender: Entry) -> Option<T> {
        unsafe {
            let packet = &*(sender.packet as *const Packet<T>);
            let msg = packet.take();
            packet.ready.store(true, Ordering::Release);
            msg
        }
    }

    pub fn try_send(&self, msg: T) -> Result<(), TrySendError<T>> {
        let mut inner = self.inner.lock();

        if let Some(receiver) = inner.receivers.try_select() {
            drop(inner);
            Self::write(receiver, msg);
            Ok(())
        } else if inner.is_closed {
            Err(TrySendError::Closed(msg))
        } else {
            Err(TrySendError::Full(msg))
        }
    }

    pub fn send(&self, msg: T, deadline: Option<Instant>) -> Result<(), SendTimeoutError<T>> {
        let mut inner = self.inner.lock();

        if let Some(receiver) = inner.receivers.try_select() {
            drop(inner);
            Self::write(receiver, msg);
            return Ok(());
        }

        if inner.is_closed {
            return Err(SendTimeoutError::Closed(msg));
        }

        Context::with(|cx| {
            let packet = Packet::new(Some(msg));
            inner.senders.register_with_packet(packet.addr(), cx);
            // Selects receiving on this channel can pair with us now.
            inner.senders.notify_observers();
            drop(inner);

            let sel = cx.wait_until(deadline);
            if sel == Selected::Operation {
                // The packet must outlive the receiver's read.
                packet.wait_ready();
                return Ok(());
            }

            self.inner.lock().senders.unregister(cx);
            // Nobody claimed us, so the message is still in the packet.
            match unsafe { packet.take() } {
                Some(msg) if sel == Selected::Aborted => Err(SendTimeoutError::Timeout(msg)),
                Some(msg) => Err(SendTimeoutError::Closed(msg)),
                None => unreachable!("unclaimed packet lost its message"),
            }
        })
    }

    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let mut inner = self.inner.lock();

        if let Some(sender) = inner.senders.try_select() {
            drop(inner);
            Self::read(sender).ok_or(TryRecvError::Empty)
        } else if inner.is_closed {
            Err(TryRecvError::Closed)
        } else {
            Err(TryRecvError::Empty)
        }
    }

    pub fn recv(&self, deadline: Option<Instant>) -> Result<T, RecvTimeoutError> {
        let mut inner = self.inner.lock();

        if let Some(sender) = inner.senders.try_select() {
            drop(inner);
            return Self::read(sender).ok_or(RecvTimeoutError::Closed);
        }

        if inner.is_closed {
            return Err(RecvTimeoutError::Closed);
        }

        Context::with(|cx| {
            let packet = Packet::<T>::new(None);
            inner.receivers.register_with_packet(packet.addr(), cx);
            // Selects sending on this channel can pair with us now.
            inner.receivers.notify_observers();
            drop(inner);

            match cx.wait_until(deadline) {
                Selected::Waiting => unreachable!(),
                Selected::Operation => {
                    packet.wait_ready();
                    unsafe { packet.take() }.ok_or(RecvTimeoutError::Closed)
                }
                sel => {
                    self.inner.lock().receivers.unregister(cx);
                    if sel == Selected::Aborted {
                        Err(RecvTimeoutError::Timeout)
                    } else {
                        Err(RecvTimeoutError::Closed)
                    }
                }
            }
        })
    }

    /// Closes the channel and wakes every parked thread and select.
    ///
    /// Returns `true` if this call closed it.
    pub fn disconnect(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.is_closed {
            return false;
        }

        inner.is_closed = true;
        inner.senders.close();
        inner.receivers.close();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_closed
    }

    /// A send completes or fails at once only against a parked receiver or a closed channel.
    pub fn can_send(&self) -> bool {
        let inner = self.inner.lock();
        inner.receivers.can_select() || inner.is_closed
    }

    pub fn can_recv(&self) -> bool {
        let inner = self.inner.lock();
        inner.senders.can_select() || inner.is_closed
    }

    /// Wakes `cx` once a receiver parks or the channel closes.
    pub fn watch_send(&self, cx: &Context) {
        self.inner.lock().receivers.watch(cx);
    }

    pub fn unwatch_send(&self, cx: &Context) {
        self.inner.lock().receivers.unwatch(cx);
    }

    /// Wakes `cx` once a sender parks or the channel closes.
    pub fn watch_recv(&self, cx: &Context) {
        self.inner.lock().senders.watch(cx);
    }

    pub fn unwatch_recv(&self, cx: &Context) {
        self.inner.lock().senders.unwatch(cx);
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
        0
    }

    fn capacity(&self) -> Option<usize> {
        Some(0)
    }

    fn can_send(&self) -> bool {
        self.can_send()
    }

    fn can_recv(&self) -> bool {
        self.can_recv()
    }

    fn watch_send(&self, cx: &Context) {
        self.watch_send(cx)
    }

    fn unwatch_send(&self, cx: &Context) {
        self.unwatch_send(cx)
    }

    fn watch_recv(&self, cx: &Context) {
        self.watch_recv(cx)
    }

    fn unwatch_recv(&self, cx: &Context) {
        self.unwatch_recv(cx)
    }
}
