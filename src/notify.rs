//! Parking and waking threads that wait on channels.
//!
//! A thread about to block takes its [`Context`], registers it with a channel's [`Waker`] and
//! parks. Whoever makes progress on the other side picks an entry, moves its context out of
//! `Waiting` and unparks it. Exactly one transition out of `Waiting` wins, so a thread woken by a
//! counterpart cannot also time out, and the other way round.
//!
//! Selects do not register as blocked operations. They register as observers and are all woken
//! whenever readiness may have changed, then retry on their own.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread, ThreadId};
use std::time::Instant;

use crate::utils::{Backoff, Spinlock};

/// How a wait ended, or `Waiting` while it has not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selected {
    Waiting,

    /// Gave up: the deadline passed or readiness was noticed before parking.
    Aborted,

    /// The channel closed.
    Closed,

    /// A counterpart completed the operation, or an observed channel changed.
    Operation,
}

impl From<usize> for Selected {
    #[inline]
    fn from(val: usize) -> Selected {
        match val {
            0 => Selected::Waiting,
            1 => Selected::Aborted,
            2 => Selected::Closed,
            3 => Selected::Operation,
            _ => unreachable!("invalid `Selected` state: {}", val),
        }
    }
}

impl From<Selected> for usize {
    #[inline]
    fn from(sel: Selected) -> usize {
        match sel {
            Selected::Waiting => 0,
            Selected::Aborted => 1,
            Selected::Closed => 2,
            Selected::Operation => 3,
        }
    }
}

/// A registered waiter.
pub struct Entry {
    /// Address of the waiter's packet on its stack, or zero if it has none.
    pub packet: usize,

    pub cx: Context,
}

/// Waiters on one side of a channel.
pub struct Waker {
    /// Threads blocked in `send` or `recv`; woken one at a time.
    selectors: Vec<Entry>,

    /// Selects watching this side; woken all at once.
    observers: Vec<Entry>,
}

impl Waker {
    #[inline]
    pub fn new() -> Self {
        Waker {
            selectors: Vec::new(),
            observers: Vec::new(),
        }
    }

    #[inline]
    pub fn register(&mut self, cx: &Context) {
        self.register_with_packet(0, cx);
    }

    #[inline]
    pub fn register_with_packet(&mut self, packet: usize, cx: &Context) {
        self.selectors.push(Entry {
            packet,
            cx: cx.clone(),
        });
    }

    #[inline]
    pub fn unregister(&mut self, cx: &Context) -> Option<Entry> {
        let i = self.selectors.iter().position(|entry| &entry.cx == cx)?;
        Some(self.selectors.remove(i))
    }

    /// Claims the first waiter of another thread that is still waiting, hands it its packet and
    /// wakes it. The claimed entry is removed and returned.
    #[inline]
    pub fn try_select(&mut self) -> Option<Entry> {
        let me = current_thread_id();

        let i = self.selectors.iter().position(|entry| {
            entry.cx.thread_id() != me && entry.cx.try_select(Selected::Operation).is_ok()
        })?;

        let entry = self.selectors.remove(i);
        entry.cx.store_packet(entry.packet);
        entry.cx.unpark();
        Some(entry)
    }

    /// Returns `true` if [`try_select`](Waker::try_select) would find a waiter right now.
    #[inline]
    pub fn can_select(&self) -> bool {
        let me = current_thread_id();
        self.selectors
            .iter()
            .any(|entry| entry.cx.thread_id() != me && entry.cx.selected() == Selected::Waiting)
    }

    #[inline]
    pub fn watch(&mut self, cx: &Context) {
        self.observers.push(Entry {
            packet: 0,
            cx: cx.clone(),
        });
    }

    #[inline]
    pub fn unwatch(&mut self, cx: &Context) {
        self.observers.retain(|entry| &entry.cx != cx);
    }

    /// Wakes and forgets every observer.
    #[inline]
    pub fn notify_observers(&mut self) {
        for entry in self.observers.drain(..) {
            if entry.cx.try_select(Selected::Operation).is_ok() {
                entry.cx.unpark();
            }
        }
    }

    /// Wakes everyone with `Closed`.
    ///
    /// Blocked threads stay registered and unregister themselves once awake.
    #[inline]
    pub fn close(&mut self) {
        for entry in &self.selectors {
            if entry.cx.try_select(Selected::Closed).is_ok() {
                entry.cx.unpark();
            }
        }

        self.notify_observers();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty() && self.observers.is_empty()
    }
}

impl Drop for Waker {
    #[inline]
    fn drop(&mut self) {
        debug_assert!(self.selectors.is_empty());
        debug_assert!(self.observers.is_empty());
    }
}

/// A [`Waker`] behind a spin lock, with a flag that lets `notify` skip the lock when nobody waits.
pub struct SyncWaker {
    inner: Spinlock<Waker>,
    is_empty: AtomicBool,
}

impl SyncWaker {
    #[inline]
    pub fn new() -> Self {
        SyncWaker {
            inner: Spinlock::new(Waker::new()),
            is_empty: AtomicBool::new(true),
        }
    }

    /// Runs `f` on the locked waker and refreshes the emptiness flag.
    #[inline]
    fn update<R>(&self, f: impl FnOnce(&mut Waker) -> R) -> R {
        let mut inner = self.inner.lock();
        let res = f(&mut inner);
        self.is_empty.store(inner.is_empty(), Ordering::SeqCst);
        res
    }

    #[inline]
    pub fn register(&self, cx: &Context) {
        self.update(|w| w.register(cx));
    }

    #[inline]
    pub fn unregister(&self, cx: &Context) -> Option<Entry> {
        self.update(|w| w.unregister(cx))
    }

    #[inline]
    pub fn watch(&self, cx: &Context) {
        self.update(|w| w.watch(cx));
    }

    #[inline]
    pub fn unwatch(&self, cx: &Context) {
        self.update(|w| w.unwatch(cx));
    }

    /// Wakes one blocked thread of another thread and every observer.
    #[inline]
    pub fn notify(&self) {
        if !self.is_empty.load(Ordering::SeqCst) {
            self.update(|w| {
                w.try_select();
                w.notify_observers();
            });
        }
    }

    #[inline]
    pub fn close(&self) {
        self.update(Waker::close);
    }
}

impl Drop for SyncWaker {
    #[inline]
    fn drop(&mut self) {
        debug_assert!(self.is_empty.load(Ordering::SeqCst));
    }
}

#[inline]
fn current_thread_id() -> ThreadId {
    thread_local! {
        static THREAD_ID: ThreadId = thread::current().id();
    }

    THREAD_ID
        .try_with(|id| *id)
        .unwrap_or_else(|_| thread::current().id())
}

/// A thread's waiting slot: its selection state, its packet and a handle to unpark it.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    select: AtomicUsize,
    packet: AtomicUsize,
    thread: Thread,
    thread_id: ThreadId,
}

impl Context {
    /// Runs `f` with this thread's context, reset to `Waiting`.
    ///
    /// The context is cached per thread. A nested call gets a fresh one.
    #[inline]
    pub fn with<F, R>(f: F) -> R
    where
        F: FnOnce(&Context) -> R,
    {
        thread_local! {
            static CONTEXT: Cell<Option<Context>> = Cell::new(Some(Context::new()));
        }

        let cx = match CONTEXT.try_with(|cell| cell.take()).ok().flatten() {
            Some(cx) => {
                cx.reset();
                cx
            }
            None => Context::new(),
        };

        let res = f(&cx);
        let _ = CONTEXT.try_with(|cell| cell.set(Some(cx)));
        res
    }

    #[cold]
    fn new() -> Context {
        let thread = thread::current();
        let thread_id = thread.id();

        Context {
            inner: Arc::new(Inner {
                select: AtomicUsize::new(Selected::Waiting.into()),
                packet: AtomicUsize::new(0),
                thread,
                thread_id,
            }),
        }
    }

    #[inline]
    fn reset(&self) {
        self.inner
            .select
            .store(Selected::Waiting.into(), Ordering::Release);
        self.inner.packet.store(0, Ordering::Release);
    }

    /// Moves the context out of `Waiting`. Fails with the current state if someone else already
    /// did.
    #[inline]
    pub fn try_select(&self, select: Selected) -> Result<(), Selected> {
        self.inner
            .select
            .compare_exchange(
                Selected::Waiting.into(),
                select.into(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(Selected::from)
    }

    #[inline]
    pub fn selected(&self) -> Selected {
        Selected::from(self.inner.select.load(Ordering::Acquire))
    }

    /// Only the thread whose `try_select` succeeded may store a packet.
    #[inline]
    pub fn store_packet(&self, packet: usize) {
        if packet != 0 {
            self.inner.packet.store(packet, Ordering::Release);
        }
    }

    /// Blocks until the context leaves `Waiting`, aborting it once `deadline` passes.
    #[inline]
    pub fn wait_until(&self, deadline: Option<Instant>) -> Selected {
        let backoff = Backoff::new();

        loop {
            let sel = self.selected();
            if sel != Selected::Waiting {
                return sel;
            }

            if !backoff.is_completed() {
                backoff.snooze();
                continue;
            }

            match deadline {
                None => thread::park(),
                Some(end) => {
                    let now = Instant::now();
                    if now < end {
                        thread::park_timeout(end - now);
                    } else {
                        // Lost the race if someone selected us in the meantime.
                        return match self.try_select(Selected::Aborted) {
                            Ok(()) => Selected::Aborted,
                            Err(sel) => sel,
                        };
                    }
                }
            }
        }
    }

    #[inline]
    pub fn unpark(&self) {
        self.inner.thread.unpark();
    }

    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.inner.thread_id
    }
}

impl PartialEq for Context {
    #[inline]
    fn eq(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
