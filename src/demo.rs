//! The concurrency demonstrations.
//!
//! Each function runs one scenario to completion and returns what a reader would see printed.
//! Nothing here prints; [`crate::cli::run`] does that.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::channel::{bounded, unbounded, Sender};
use crate::convert::{ConvertError, DivideError};
use crate::err::{RecvError, SendError};
use crate::producer::{produce, Fibonacci, Report, Termination};

/// Failures a demonstration can run into.
#[derive(Debug, Error)]
pub enum DemoError {
    /// A value could not be handed over because the channel closed.
    #[error("failed to hand over {0}: channel closed")]
    Send(i64),

    /// A channel closed before delivering the expected value.
    #[error(transparent)]
    Recv(#[from] RecvError),

    /// Text could not be converted to a number.
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// A division had no numeric result.
    #[error(transparent)]
    Divide(#[from] DivideError),

    /// The square of the value does not fit in an `i64`.
    #[error("{0} squared overflows")]
    Overflow(i64),

    /// The shared map held an entry that is not `key -> 2 * key`.
    #[error("shared map maps {key} to {value}")]
    Inconsistent { key: u32, value: u64 },

    /// Results could not be written out.
    #[error("failed to write results: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SendError<i64>> for DemoError {
    fn from(err: SendError<i64>) -> Self {
        DemoError::Send(err.into_inner())
    }
}

/// Sleeps for `delay`, then emits `text` on `out`.
pub fn say(text: &str, delay: Duration, out: &Sender<String>) {
    thread::sleep(delay);
    debug!(text, "saying");
    if out.send(text.to_owned()).is_err() {
        warn!(text, "nobody is listening");
    }
}

/// Runs two delayed greeters side by side and returns their lines in arrival order.
///
/// One greeter runs on a spawned thread, the other on the caller's. Either line may come first.
pub fn greet_pair(delay: Duration) -> Vec<String> {
    let (tx, rx) = unbounded();

    thread::scope(|s| {
        s.spawn(|| say("world", delay, &tx));
        say("hello", delay, &tx);
    });
    drop(tx);

    rx.iter().collect()
}

/// Squares `n` and hands the result to whoever receives from `out`.
///
/// If the square overflows nothing is sent and `out` is dropped.
pub fn square(n: i64, out: Sender<i64>) {
    let Some(sq) = n.checked_mul(n) else {
        warn!(n, "square overflows");
        return;
    };
    if out.send(sq).is_err() {
        warn!(n, "square was not collected");
    }
}

/// Computes `n * n` on another thread and receives it over a rendezvous channel.
///
/// The computing thread cannot finish its send until this thread is there to receive.
pub fn square_handoff(n: i64) -> Result<i64, DemoError> {
    let (tx, rx) = bounded(0);

    let sq = thread::scope(|s| {
        s.spawn(move || square(n, tx));
        rx.recv().map_err(|_| DemoError::Overflow(n))
    })?;

    info!(n, sq, "rendezvous handoff");
    Ok(sq)
}

/// Deposits `value` into a channel with a single slot and reads it back on the same thread.
pub fn buffered_handoff(value: i64) -> Result<i64, DemoError> {
    let (tx, rx) = bounded(1);

    // Does not block: the slot is empty.
    tx.send(value)?;
    let received = rx.recv()?;

    info!(value, received, "buffered handoff");
    Ok(received)
}

/// Checks that every entry of a shared map snapshot is `key -> 2 * key`.
///
/// Returns the number of entries.
pub fn check_map(snapshot: &HashMap<u32, u64>) -> Result<usize, DemoError> {
    match snapshot
        .iter()
        .find(|(&key, &value)| value != u64::from(key) * 2)
    {
        Some((&key, &value)) => Err(DemoError::Inconsistent { key, value }),
        None => Ok(snapshot.len()),
    }
}

/// Drains a producer that emits the first `count` Fibonacci numbers and then closes its channel.
pub fn bounded_fibonacci(count: usize) -> (Vec<u64>, Report) {
    let (tx, rx) = bounded(0);

    thread::scope(|s| {
        let producer = s.spawn(move || produce(Fibonacci::new(), tx, Termination::After(count)));
        let values: Vec<u64> = rx.iter().collect();

        let report = match producer.join() {
            Ok(report) => report,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        info!(produced = report.produced, reason = %report.reason, "bounded producer done");
        (values, report)
    })
}

/// What the cancellable Fibonacci demonstration observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancellation {
    /// Values the consumer took before cancelling.
    pub received: Vec<u64>,

    /// Values that still arrived after cancelling. Always zero for a correct producer.
    pub trailing: usize,

    /// What the producer reported.
    pub producer: Report,
}

/// Consumes `take` values from an endless Fibonacci producer, then cancels it.
///
/// The producer runs on the calling thread; the consumer runs on a spawned one.
pub fn cancellable_fibonacci(take: usize) -> Cancellation {
    let (tx, rx) = bounded(0);
    let (quit_tx, quit_rx) = bounded::<()>(0);

    thread::scope(|s| {
        let consumer = s.spawn(move || {
            let received: Vec<u64> = rx.iter().take(take).collect();
            if quit_tx.send(()).is_err() {
                warn!("producer stopped before it was cancelled");
            }
            // The producer closes its channel on the way out.
            let trailing = rx.iter().count();
            (received, trailing)
        });

        let producer = produce(Fibonacci::new(), tx, Termination::Signal(quit_rx));

        let (received, trailing) = match consumer.join() {
            Ok(observed) => observed,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        info!(received = received.len(), trailing, "cancellable producer done");

        Cancellation {
            received,
            trailing,
            producer,
        }
    })
}
