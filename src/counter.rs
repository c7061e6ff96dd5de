//! Shared ownership of a channel by its senders and receivers.
//!
//! Each side keeps its own count. When a side's count drops to zero the channel is disconnected,
//! and when both sides are gone the allocation is freed.

use std::ops;
use std::process;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

struct Counter<C> {
    senders: AtomicUsize,
    receivers: AtomicUsize,

    /// Set by the first side to run out of references; the second side frees the counter.
    destroy: AtomicBool,

    chan: C,
}

impl<C> Counter<C> {
    /// Bumps `count` for a new handle.
    fn acquire(count: &AtomicUsize) {
        // Leaked clones could otherwise wrap the count around.
        if count.fetch_add(1, Ordering::Relaxed) > isize::MAX as usize {
            process::abort();
        }
    }

    /// Drops one reference counted by `count`.
    ///
    /// # Safety
    ///
    /// `counter` must point to a live counter and the caller's reference must not be used again.
    unsafe fn release<F>(
        counter: *mut Counter<C>,
        count: fn(&Counter<C>) -> &AtomicUsize,
        disconnect: F,
    ) where
        F: FnOnce(&C) -> bool,
    {
        let this = &*counter;
        if count(this).fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }

        disconnect(&this.chan);

        if this.destroy.swap(true, Ordering::AcqRel) {
            drop(Box::from_raw(counter));
        }
    }
}

/// Wraps `chan` and returns the first sender and receiver handles to it.
pub fn new<C>(chan: C) -> (Sender<C>, Receiver<C>) {
    let counter = Box::into_raw(Box::new(Counter {
        senders: AtomicUsize::new(1),
        receivers: AtomicUsize::new(1),
        destroy: AtomicBool::new(false),
        chan,
    }));
    (Sender { counter }, Receiver { counter })
}

pub struct Sender<C> {
    counter: *mut Counter<C>,
}

impl<C> Sender<C> {
    fn counter(&self) -> &Counter<C> {
        unsafe { &*self.counter }
    }

    pub fn acquire(&self) -> Sender<C> {
        Counter::<C>::acquire(&self.counter().senders);
        Sender {
            counter: self.counter,
        }
    }

    /// Releases this handle, calling `disconnect` if it was the last sender.
    ///
    /// # Safety
    ///
    /// Must be called exactly once per handle, which must not be used afterwards.
    pub unsafe fn release<F: FnOnce(&C) -> bool>(&self, disconnect: F) {
        Counter::release(self.counter, |c| &c.senders, disconnect);
    }
}

impl<C> ops::Deref for Sender<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.counter().chan
    }
}

pub struct Receiver<C> {
    counter: *mut Counter<C>,
}

impl<C> Receiver<C> {
    fn counter(&self) -> &Counter<C> {
        unsafe { &*self.counter }
    }

    pub fn acquire(&self) -> Receiver<C> {
        Counter::<C>::acquire(&self.counter().receivers);
        Receiver {
            counter: self.counter,
        }
    }

    /// Releases this handle, calling `disconnect` if it was the last receiver.
    ///
    /// # Safety
    ///
    /// Must be called exactly once per handle, which must not be used afterwards.
    pub unsafe fn release<F: FnOnce(&C) -> bool>(&self, disconnect: F) {
        Counter::release(self.counter, |c| &c.receivers, disconnect);
    }
}

impl<C> ops::Deref for Receiver<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.counter().chan
    }
}
