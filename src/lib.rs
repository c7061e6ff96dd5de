//! Multi-producer multi-consumer channels, a select over them, and producers built on top.
//!
//! Channels come in three flavors: [`bounded(0)`](bounded) is a rendezvous channel,
//! [`bounded(n)`](bounded) holds up to `n` messages, and [`unbounded`] grows as needed. A channel
//! is closed with [`Sender::close`] or when every sender or every receiver is dropped.
//!
//! [`Select`] waits on several send and receive operations at once, and [`produce`] feeds a
//! channel from an iterator until a count is reached or a cancellation signal arrives.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod channel;
mod counter;
mod err;
mod flavors;
mod notify;
mod select;
mod utils;

pub mod cli;
pub mod convert;
pub mod demo;
pub mod producer;
pub mod shared_map;

pub use channel::{bounded, unbounded};
pub use channel::{IntoIter, Iter, TryIter};
pub use channel::{Receiver, Sender};
pub use select::Select;

pub use err::{RecvError, RecvTimeoutError, TryRecvError};
pub use err::{SelectTimeoutError, TrySelectError};
pub use err::{SendError, SendTimeoutError, TrySendError};

pub use producer::{produce, Fibonacci, Report, StopReason, Termination};
