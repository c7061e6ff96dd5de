//! Command-line configuration and the driver that runs the demonstrations.
//!
//! Results go to the writer handed to [`run`], one value per line. Diagnostics go through
//! `tracing`.

use std::io::Write;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{info, info_span, warn};

use crate::convert::{divide, float_to_text, int_to_text, text_to_float, text_to_int};
use crate::demo::{self, DemoError};
use crate::producer::StopReason;
use crate::shared_map::{self, GuardedMap};

/// Keys used by the shared map demonstration are drawn from `0..MAP_KEY_SPACE`.
const MAP_KEY_SPACE: u32 = 100;

/// Which demonstration to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Demo {
    /// Two delayed greeters.
    Greet,
    /// Rendezvous and single-slot handoffs.
    Handoff,
    /// Bounded Fibonacci producer drained until closed.
    Fibonacci,
    /// Endless Fibonacci producer cancelled by the consumer.
    Cancel,
    /// Lock-guarded map under concurrent writers and readers.
    Map,
    /// Text and number conversions.
    Convert,
    /// Everything, in the order above.
    All,
}

impl Demo {
    fn includes(self, other: Demo) -> bool {
        self == Demo::All || self == other
    }
}

/// Channels, select and cancellable producers, demonstrated.
#[derive(Debug, Clone, Parser)]
#[command(name = "handoff", version, about)]
pub struct Config {
    /// Demonstration to run
    #[arg(long, value_enum, default_value_t = Demo::All)]
    pub only: Demo,

    /// Milliseconds each greeter sleeps before speaking
    #[arg(long, default_value_t = 100)]
    pub delay_ms: u64,

    /// Value squared and handed over a rendezvous channel
    #[arg(long, default_value_t = 4)]
    pub square: i64,

    /// Value passed through a single-slot channel
    #[arg(long, default_value_t = 10)]
    pub buffered: i64,

    /// How many Fibonacci numbers the bounded producer emits
    #[arg(long, default_value_t = 10)]
    pub fib_count: usize,

    /// How many values the consumer takes before cancelling the endless producer
    #[arg(long, default_value_t = 10)]
    pub take: usize,

    /// Writer/reader pairs launched against the shared map
    #[arg(long, default_value_t = 1000)]
    pub map_pairs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            only: Demo::All,
            delay_ms: 100,
            square: 4,
            buffered: 10,
            fib_count: 10,
            take: 10,
            map_pairs: 1000,
        }
    }
}

/// Runs the demonstrations selected by `config`, writing their results to `out`.
pub fn run<W: Write>(config: &Config, out: &mut W) -> Result<(), DemoError> {
    let only = config.only;

    if only.includes(Demo::Greet) {
        let _span = info_span!("greet").entered();
        for line in demo::greet_pair(Duration::from_millis(config.delay_ms)) {
            writeln!(out, "{line}")?;
        }
    }

    if only.includes(Demo::Handoff) {
        let _span = info_span!("handoff").entered();
        writeln!(out, "{}", demo::square_handoff(config.square)?)?;
        writeln!(out, "{}", demo::buffered_handoff(config.buffered)?)?;
    }

    if only.includes(Demo::Fibonacci) {
        let _span = info_span!("fibonacci").entered();
        let (values, _) = demo::bounded_fibonacci(config.fib_count);
        for value in values {
            writeln!(out, "{value}")?;
        }
    }

    if only.includes(Demo::Cancel) {
        let _span = info_span!("cancel").entered();
        let observed = demo::cancellable_fibonacci(config.take);
        for value in &observed.received {
            writeln!(out, "{value}")?;
        }
        if observed.producer.reason == StopReason::Cancelled {
            writeln!(out, "quit")?;
        }
        if observed.trailing > 0 {
            warn!(trailing = observed.trailing, "values arrived after cancellation");
        }
    }

    if only.includes(Demo::Map) {
        let _span = info_span!("map").entered();
        let map = GuardedMap::new();
        shared_map::hammer(&map, config.map_pairs, MAP_KEY_SPACE);
        let entries = demo::check_map(&map.snapshot())?;
        info!(entries, "shared map");
        writeln!(out, "Done")?;
    }

    if only.includes(Demo::Convert) {
        let _span = info_span!("convert").entered();
        convert(out)?;
    }

    Ok(())
}

/// Parse failures are reported inline and do not stop the run.
fn convert<W: Write>(out: &mut W) -> Result<(), DemoError> {
    let x: i64 = 32;
    let y = x as f64;
    writeln!(out, "{}", int_to_text(y as i64))?;

    let text = float_to_text(3.23455, 2);
    writeln!(out, "{text}")?;

    match text_to_float(&text) {
        Ok(y) => writeln!(out, "{y}")?,
        Err(err) => writeln!(out, "{err}")?,
    }

    match text_to_int("1234") {
        Ok(x) => writeln!(out, "{x}")?,
        Err(err) => writeln!(out, "{err}")?,
    }

    for (a, b) in [(10, 2), (10, 0)] {
        match divide(a, b) {
            Ok(q) => writeln!(out, "{q}")?,
            Err(err) => writeln!(out, "{err}")?,
        }
    }

    Ok(())
}
