//! Producers that feed a channel from an iterator.
//!
//! A single generator, [`produce`], covers both ways of ending a stream: stop after a fixed
//! number of values and close the channel, or keep going until someone asks to stop.

use std::fmt;

use tracing::{debug, info};

use crate::channel::{Receiver, Sender};
use crate::select::Select;

/// The Fibonacci sequence: 0, 1, 1, 2, 3, 5, 8, ...
///
/// The iterator ends once the next term no longer fits in a `u64`.
///
/// # Examples
///
/// ```
/// use handoff::Fibonacci;
///
/// let terms: Vec<u64> = Fibonacci::new().take(10).collect();
/// assert_eq!(terms, [0, 1, 1, 2, 3, 5, 8, 13, 21, 34]);
/// ```
#[derive(Debug, Clone)]
pub struct Fibonacci {
    current: Option<u64>,
    next: Option<u64>,
}

impl Fibonacci {
    /// Starts the sequence at its first term, 0.
    pub fn new() -> Self {
        Fibonacci {
            current: Some(0),
            next: Some(1),
        }
    }
}

impl Default for Fibonacci {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for Fibonacci {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let current = self.current?;
        let following = self.next.and_then(|next| current.checked_add(next));
        self.current = self.next;
        self.next = following;
        Some(current)
    }
}

impl std::iter::FusedIterator for Fibonacci {}

/// When a producer stops.
pub enum Termination {
    /// Deliver this many values, then close the channel.
    After(usize),

    /// Keep delivering until a value arrives on, or the closure of, this channel.
    Signal(Receiver<()>),
}

impl fmt::Debug for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::After(n) => f.debug_tuple("After").field(n).finish(),
            Termination::Signal(_) => f.pad("Signal(..)"),
        }
    }
}

/// Why a producer returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The requested number of values was delivered.
    Completed,

    /// A cancellation signal was observed.
    Cancelled,

    /// Every receiver of the output channel went away.
    Disconnected,

    /// The source ran out of values.
    Exhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Completed => "completed",
            StopReason::Cancelled => "cancelled",
            StopReason::Disconnected => "disconnected",
            StopReason::Exhausted => "exhausted",
        };
        f.pad(s)
    }
}

/// Summary of a finished producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    /// Number of values a receiver accepted.
    pub produced: usize,

    /// Why the producer returned.
    pub reason: StopReason,
}

/// Outcome of one iteration of a cancellable producer.
enum Step {
    Sent,
    Disconnected,
    Cancelled,
}

/// Feeds `values` into `out` until `until` says to stop.
///
/// The output channel is closed when this function returns, whatever the reason, so a consumer
/// draining it never blocks forever.
///
/// With [`Termination::Signal`], every iteration waits on both channels at once: the value is
/// handed over if a receiver is ready, and the producer returns if the signal arrives first.
/// Cancellation takes effect at the next iteration boundary; a value already accepted by a
/// receiver stays delivered and the value on offer when the signal wins is dropped.
///
/// # Examples
///
/// ```
/// use std::thread;
/// use handoff::{bounded, produce, Fibonacci, StopReason, Termination};
///
/// let (s, r) = bounded(0);
/// let producer = thread::spawn(move || produce(Fibonacci::new(), s, Termination::After(5)));
///
/// let values: Vec<u64> = r.iter().collect();
/// assert_eq!(values, [0, 1, 1, 2, 3]);
/// assert_eq!(producer.join().unwrap().reason, StopReason::Completed);
/// ```
pub fn produce<I>(values: I, out: Sender<I::Item>, until: Termination) -> Report
where
    I: IntoIterator,
    I::Item: fmt::Debug,
{
    let report = match until {
        Termination::After(limit) => produce_bounded(values.into_iter(), &out, limit),
        Termination::Signal(quit) => produce_until_signal(values.into_iter(), &out, &quit),
    };

    out.close();
    debug!(produced = report.produced, reason = %report.reason, "producer finished");
    report
}

fn produce_bounded<I>(values: I, out: &Sender<I::Item>, limit: usize) -> Report
where
    I: Iterator,
    I::Item: fmt::Debug,
{
    let mut produced = 0;

    for value in values.take(limit) {
        debug!(?value, "sending");
        if out.send(value).is_err() {
            return Report {
                produced,
                reason: StopReason::Disconnected,
            };
        }
        produced += 1;
    }

    let reason = if produced == limit {
        StopReason::Completed
    } else {
        StopReason::Exhausted
    };
    Report { produced, reason }
}

fn produce_until_signal<I>(mut values: I, out: &Sender<I::Item>, quit: &Receiver<()>) -> Report
where
    I: Iterator,
    I::Item: fmt::Debug,
{
    let mut produced = 0;

    loop {
        let Some(value) = values.next() else {
            return Report {
                produced,
                reason: StopReason::Exhausted,
            };
        };
        debug!(?value, "offering");

        let step = Select::new()
            .send(out, value, |res| match res {
                Ok(()) => Step::Sent,
                Err(_) => Step::Disconnected,
            })
            .recv(quit, |_| Step::Cancelled)
            .wait();

        match step {
            Step::Sent => produced += 1,
            Step::Disconnected => {
                return Report {
                    produced,
                    reason: StopReason::Disconnected,
                }
            }
            Step::Cancelled => {
                info!(produced, "quit");
                return Report {
                    produced,
                    reason: StopReason::Cancelled,
                };
            }
        }
    }
}
