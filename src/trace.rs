//! Trace output for the wheel internals.
//!
//! Compiled in only with the `tracing` cargo feature; every macro below is a
//! no-op otherwise, so the hot tick path carries no logging cost by default.

/// Install a tracing subscriber suitable for tests and demo programs.
///
/// Honors `RUST_LOG` when set, otherwise logs everything from this crate.
/// Without the `tracing` feature this is a no-op.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rotor=trace"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, info, trace, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! noop_trace {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "tracing"))]
macro_rules! noop_debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "tracing"))]
macro_rules! noop_info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "tracing"))]
macro_rules! noop_warn {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use noop_debug as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use noop_info as info;
#[cfg(not(feature = "tracing"))]
pub(crate) use noop_trace as trace;
#[cfg(not(feature = "tracing"))]
pub(crate) use noop_warn as warn;
