//! Bounded channel on a fixed ring of slots.
//!
//! The ring is Dmitry Vyukov's bounded MPMC queue
//! (<http://www.1024cores.net/home/lock-free-algorithms/queues/bounded-mpmc-queue>).
//!
//! Head and tail are stamps: the low bits index into the ring, the bit above them marks the
//! channel as closed (tail only) and everything higher counts laps around the ring. Each slot
//! carries its own stamp saying whose turn it is: a slot with stamp equal to the tail is free for
//! that push, and a slot with stamp `head + 1` holds the message for that pop.

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::sync::atomic::{self, AtomicUsize, Ordering};
use std::time::Instant;

use crate::err::{RecvTimeoutError, SendTimeoutError, TryRecvError, TrySendError};
use crate::notify::{Context, Selected, SyncWaker};
use crate::utils::{Backoff, CachePadded};

struct Slot<T> {
    stamp: AtomicUsize,
    msg: UnsafeCell<MaybeUninit<T>>,
}

/// Bounded channel.
pub struct Channel<T> {
    /// Next slot to pop from.
    head: CachePadded<AtomicUsize>,

    /// Next slot to push into. Carries the closed mark.
    tail: CachePadded<AtomicUsize>,

    buffer: Box<[Slot<T>]>,

    cap: usize,

    /// Stamp of `{ lap: 1, mark: 0, index: 0 }`.
    one_lap: usize,

    /// Set in the tail once the channel is closed.
    mark_bit: usize,

    /// Senders waiting for room.
    senders: SyncWaker,

    /// Receivers waiting for a message.
    receivers: SyncWaker,

    _marker: PhantomData<T>,
}

impl<T> Channel<T> {
    /// Creates a channel with room for `cap` messages.
    ///
    /// # Panics
    ///
    /// Panics if `cap` is zero.
    pub fn with_capacity(cap: usize) -> Self {
        assert!(cap > 0, "capacity must be positive");

        let mark_bit = (cap + 1).next_power_of_two();
        let one_lap = mark_bit * 2;

        // Slot `i` starts out free for the push with stamp `{ lap: 0, index: i }`.
        let buffer: Box<[Slot<T>]> = (0..cap)
            .map(|i| Slot {
                stamp: AtomicUsize::new(i),
                msg: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();

        Channel {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            buffer,
            cap,
            one_lap,
            mark_bit,
            senders: SyncWaker::new(),
            receivers: SyncWaker::new(),
            _marker: PhantomData,
        }
    }

    fn index(&self, stamp: usize) -> usize {
        stamp & (self.mark_bit - 1)
    }

    /// The stamp following `stamp`: next index, or index zero of the next lap.
    fn advance(&self, stamp: usize) -> usize {
        if self.index(stamp) + 1 < self.cap {
            stamp + 1
        } else {
            (stamp & !(self.one_lap - 1)).wrapping_add(self.one_lap)
        }
    }

    /// Number of messages between `head` and `tail`.
    fn occupied(&self, head: usize, tail: usize) -> usize {
        let hix = self.index(head);
        let tix = self.index(tail);

        if hix < tix {
            tix - hix
        } else if hix > tix {
            self.cap - hix + tix
        } else if (tail & !self.mark_bit) == head {
            0
        } else {
            self.cap
        }
    }

    pub fn try_send(&self, msg: T) -> Result<(), TrySendError<T>> {
        let backoff = Backoff::new();
        let mut tail = self.tail.load(Ordering::Relaxed);

        loop {
            if tail & self.mark_bit != 0 {
                return Err(TrySendError::Closed(msg));
            }

            let slot = &self.buffer[self.index(tail)];
            let stamp = slot.stamp.load(Ordering::Acquire);

            if tail == stamp {
                // Our turn on this slot: claim it by moving the tail.
                match self.tail.compare_exchange_weak(
                    tail,
                    self.advance(tail),
                    Ordering::SeqCst,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe {
                            slot.msg.get().write(MaybeUninit::new(msg));
                        }
                        slot.stamp.store(tail + 1, Ordering::Release);

                        self.receivers.notify();
                        return Ok(());
                    }
                    Err(t) => {
                        tail = t;
                        backoff.spin();
                    }
                }
            } else if stamp.wrapping_add(self.one_lap) == tail + 1 {
                // The slot still holds last lap's message. Full, unless a pop is under way.
                atomic::fence(Ordering::SeqCst);
                let head = self.head.load(Ordering::Relaxed);

                if head.wrapping_add(self.one_lap) == tail {
                    return Err(TrySendError::Full(msg));
                }

                backoff.spin();
                tail = self.tail.load(Ordering::Relaxed);
            } else {
                // Another push claimed the slot and has not published its stamp yet.
                backoff.snooze();
                tail = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    pub fn send(&self, mut msg: T, deadline: Option<Instant>) -> Result<(), SendTimeoutError<T>> {
        loop {
            let backoff = Backoff::new();
            loop {
                match self.try_send(msg) {
                    Ok(()) => return Ok(()),
                    Err(TrySendError::Closed(m)) => return Err(SendTimeoutError::Closed(m)),
                    Err(TrySendError::Full(m)) => msg = m,
                }

                if backoff.is_completed() {
                    break;
                }
                backoff.snooze();
            }

            if deadline.map_or(false, |d| Instant::now() >= d) {
                return Err(SendTimeoutError::Timeout(msg));
            }

            self.park(&self.senders, || !self.is_full() || self.is_closed(), deadline);
        }
    }

    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let backoff = Backoff::new();
        let mut head = self.head.load(Ordering::Relaxed);

        loop {
            let slot = &self.buffer[self.index(head)];
            let stamp = slot.stamp.load(Ordering::Acquire);

            if head + 1 == stamp {
                // A message is waiting in this slot: claim it by moving the head.
                match self.head.compare_exchange_weak(
                    head,
                    self.advance(head),
                    Ordering::SeqCst,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let msg = unsafe { slot.msg.get().read().assume_init() };
                        // Hand the slot to the push one lap ahead.
                        slot.stamp
                            .store(head.wrapping_add(self.one_lap), Ordering::Release);

                        self.senders.notify();
                        return Ok(msg);
                    }
                    Err(h) => {
                        head = h;
                        backoff.spin();
                    }
                }
            } else if stamp == head {
                // Nothing written here yet. Empty, unless a push is under way.
                atomic::fence(Ordering::SeqCst);
                let tail = self.tail.load(Ordering::Relaxed);

                if (tail & !self.mark_bit) == head {
                    return if tail & self.mark_bit != 0 {
                        Err(TryRecvError::Closed)
                    } else {
                        Err(TryRecvError::Empty)
                    };
                }

                backoff.spin();
                head = self.head.load(Ordering::Relaxed);
            } else {
                // Another pop claimed the slot and has not released it yet.
                backoff.snooze();
                head = self.head.load(Ordering::Relaxed);
            }
        }
    }

    pub fn recv(&self, deadline: Option<Instant>) -> Result<T, RecvTimeoutError> {
        loop {
            let backoff = Backoff::new();
            loop {
                match self.try_recv() {
                    Ok(msg) => return Ok(msg),
                    Err(TryRecvError::Closed) => return Err(RecvTimeoutError::Closed),
                    Err(TryRecvError::Empty) => {}
                }

                if backoff.is_completed() {
                    break;
                }
                backoff.snooze();
            }

            if deadline.map_or(false, |d| Instant::now() >= d) {
                return Err(RecvTimeoutError::Timeout);
            }

            // A closed channel may still hold messages; the next try_recv drains them.
            self.park(&self.receivers, || !self.is_empty() || self.is_closed(), deadline);
        }
    }

    /// Sleeps on `waker` until woken, unless `ready` already holds once registered.
    fn park(&self, waker: &SyncWaker, ready: impl Fn() -> bool, deadline: Option<Instant>) {
        Context::with(|cx| {
            waker.register(cx);

            if ready() {
                let _ = cx.try_select(Selected::Aborted);
            }

            match cx.wait_until(deadline) {
                Selected::Waiting => unreachable!(),
                Selected::Aborted | Selected::Closed => {
                    waker.unregister(cx);
                }
                // The waking side already removed our entry.
                Selected::Operation => {}
            }
        });
    }

    /// Closes the channel and wakes every blocked thread and select.
    ///
    /// Returns `true` if this call closed it.
    pub fn disconnect(&self) -> bool {
        let tail = self.tail.fetch_or(self.mark_bit, Ordering::SeqCst);

        if tail & self.mark_bit == 0 {
            self.senders.close();
            self.receivers.close();
            true
        } else {
            false
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tail.load(Ordering::SeqCst) & self.mark_bit != 0
    }

    // A head or tail that moves between the two loads only ever makes these answers stale in the
    // safe direction: the channel was, for a moment, not empty (or not full).

    pub fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::SeqCst);
        let tail = self.tail.load(Ordering::SeqCst);
        (tail & !self.mark_bit) == head
    }

    pub fn is_full(&self) -> bool {
        let tail = self.tail.load(Ordering::SeqCst);
        let head = self.head.load(Ordering::SeqCst);
        head.wrapping_add(self.one_lap) == tail & !self.mark_bit
    }

    pub fn len(&self) -> usize {
        loop {
            let tail = self.tail.load(Ordering::SeqCst);
            let head = self.head.load(Ordering::SeqCst);

            // Retry until head was read against a stable tail.
            if self.tail.load(Ordering::SeqCst) == tail {
                return self.occupied(head, tail);
            }
        }
    }
}

impl<T> Drop for Channel<T> {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        let hix = self.index(head);

        for i in 0..self.occupied(head, tail) {
            let index = (hix + i) % self.cap;
            unsafe {
                self.buffer[index].msg.get_mut().assume_init_drop();
            }
        }
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
        Some(self.cap)
    }

    fn can_send(&self) -> bool {
        !self.is_full() || self.is_closed()
    }

    fn can_recv(&self) -> bool {
        !self.is_empty() || self.is_closed()
    }

    fn watch_send(&self, cx: &Context) {
        self.senders.watch(cx)
    }

    fn unwatch_send(&self, cx: &Context) {
        self.senders.unwatch(cx)
    }

    fn watch_recv(&self, cx: &Context) {
        self.receivers.watch(cx)
    }

    fn unwatch_recv(&self, cx: &Context) {
        self.receivers.unwatch(cx)
    }
}
