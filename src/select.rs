//! Waiting on several channel operations at once.

use std::fmt;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::channel::{Receiver, Sender};
use crate::err::{RecvError, SelectTimeoutError, SendError, TryRecvError, TrySelectError, TrySendError};
use crate::notify::{Context, Selected};

/// One operation registered with a `Select`.
trait Arm<R> {
    /// Attempts the operation without blocking.
    ///
    /// Returns the mapped result if the operation completed, or failed because the channel is
    /// closed.
    fn attempt(&mut self) -> Option<R>;

    /// Returns `true` if `attempt` is likely to complete right now.
    fn is_ready(&self) -> bool;

    fn watch(&self, cx: &Context);

    fn unwatch(&self, cx: &Context);
}

struct SendArm<'a, T, F> {
    sender: &'a Sender<T>,
    msg: Option<T>,
    then: Option<F>,
}

impl<T, F, R> Arm<R> for SendArm<'_, T, F>
where
    F: FnOnce(Result<(), SendError<T>>) -> R,
{
    fn attempt(&mut self) -> Option<R> {
        let msg = self.msg.take()?;
        let res = match self.sender.try_send(msg) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(msg)) => Err(SendError(msg)),
            Err(TrySendError::Full(msg)) => {
                self.msg = Some(msg);
                return None;
            }
        };
        self.then.take().map(|then| then(res))
    }

    fn is_ready(&self) -> bool {
        self.sender.chan().can_send()
    }

    fn watch(&self, cx: &Context) {
        self.sender.chan().watch_send(cx)
    }

    fn unwatch(&self, cx: &Context) {
        self.sender.chan().unwatch_send(cx)
    }
}

struct RecvArm<'a, T, F> {
    receiver: &'a Receiver<T>,
    then: Option<F>,
}

impl<T, F, R> Arm<R> for RecvArm<'_, T, F>
where
    F: FnOnce(Result<T, RecvError>) -> R,
{
    fn attempt(&mut self) -> Option<R> {
        let res = match self.receiver.try_recv() {
            Ok(msg) => Ok(msg),
            Err(TryRecvError::Closed) => Err(RecvError),
            Err(TryRecvError::Empty) => return None,
        };
        self.then.take().map(|then| then(res))
    }

    fn is_ready(&self) -> bool {
        self.receiver.chan().can_recv()
    }

    fn watch(&self, cx: &Context) {
        self.receiver.chan().watch_recv(cx)
    }

    fn unwatch(&self, cx: &Context) {
        self.receiver.chan().unwatch_recv(cx)
    }
}

/// Waits on a set of send and receive operations and completes exactly one of them.
///
/// Each operation is an arm carrying a closure that maps the outcome of the operation into a
/// common result type `R`. An operation on a closed channel counts as ready and completes with an
/// error. When several operations are ready at once, the one that completes is picked at random.
///
/// An operation on a zero-capacity channel completes only against a counterpart blocked in a
/// plain `send` or `recv` on the other side.
///
/// # Examples
///
/// ```
/// use std::thread;
/// use handoff::{bounded, Select};
///
/// let (s, r) = bounded(0);
/// let (quit_s, quit_r) = bounded::<()>(0);
///
/// thread::spawn(move || {
///     assert_eq!(r.recv(), Ok(1));
///     quit_s.send(()).unwrap();
/// });
///
/// let mut delivered = 0;
/// loop {
///     let done = Select::new()
///         .send(&s, 1, |res| res.is_err())
///         .recv(&quit_r, |_| true)
///         .wait();
///     if done {
///         break;
///     }
///     delivered += 1;
/// }
/// assert_eq!(delivered, 1);
/// ```
pub struct Select<'a, R> {
    arms: Vec<Box<dyn Arm<R> + 'a>>,
}

impl<'a, R> Select<'a, R> {
    /// Creates an empty select.
    pub fn new() -> Self {
        Select { arms: Vec::new() }
    }

    /// Adds an arm that sends `msg` through `sender`.
    ///
    /// If another arm completes first, `msg` is dropped.
    pub fn send<T, F>(mut self, sender: &'a Sender<T>, msg: T, then: F) -> Self
    where
        T: 'a,
        F: FnOnce(Result<(), SendError<T>>) -> R + 'a,
    {
        self.arms.push(Box::new(SendArm {
            sender,
            msg: Some(msg),
            then: Some(then),
        }));
        self
    }

    /// Adds an arm that receives a message from `receiver`.
    pub fn recv<T, F>(mut self, receiver: &'a Receiver<T>, then: F) -> Self
    where
        T: 'a,
        F: FnOnce(Result<T, RecvError>) -> R + 'a,
    {
        self.arms.push(Box::new(RecvArm {
            receiver,
            then: Some(then),
        }));
        self
    }

    /// Completes one operation if any is ready right now.
    pub fn try_wait(mut self) -> Result<R, TrySelectError> {
        self.attempt_all().ok_or(TrySelectError)
    }

    /// Blocks until one operation completes and returns its mapped result.
    ///
    /// # Panics
    ///
    /// Panics if no arms were added, since such a select could never complete.
    pub fn wait(self) -> R {
        assert!(!self.arms.is_empty(), "select has no operations");

        match self.run(None) {
            Some(res) => res,
            None => unreachable!("select without a deadline gave up"),
        }
    }

    /// Blocks until one operation completes or `timeout` elapses.
    pub fn wait_timeout(self, timeout: Duration) -> Result<R, SelectTimeoutError> {
        self.run(Some(Instant::now() + timeout))
            .ok_or(SelectTimeoutError)
    }

    /// Tries every arm once, starting from a random one.
    fn attempt_all(&mut self) -> Option<R> {
        let len = self.arms.len();
        if len == 0 {
            return None;
        }

        let start = rand::thread_rng().gen_range(0..len);
        (0..len)
            .map(|i| (start + i) % len)
            .find_map(|i| self.arms[i].attempt())
    }

    fn run(mut self, deadline: Option<Instant>) -> Option<R> {
        loop {
            if let Some(res) = self.attempt_all() {
                return Some(res);
            }

            if let Some(d) = deadline {
                if Instant::now() >= d {
                    return None;
                }
            }

            let arms = &self.arms;
            Context::with(|cx| {
                for arm in arms {
                    arm.watch(cx);
                }

                // Did an operation become ready while we were registering?
                if arms.iter().any(|arm| arm.is_ready()) {
                    let _ = cx.try_select(Selected::Aborted);
                }

                cx.wait_until(deadline);

                for arm in arms {
                    arm.unwatch(cx);
                }
            });
        }
    }
}

impl<R> Default for Select<'_, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for Select<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Select")
            .field("arms", &self.arms.len())
            .finish()
    }
}
