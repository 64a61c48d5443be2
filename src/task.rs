//! Task records: the caller-supplied unit of work and its fire-time view.

use std::fmt;
use std::time::Duration;

/// Identifier assigned to a task when the driver loop accepts it.
///
/// Ids start at 1 and are strictly increasing in insertion order; 0 is never
/// issued, so the full `u64` value space of issued ids is unambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TaskId {
    #[inline]
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Callback invoked at most once when a task expires.
///
/// Runs on a callback worker thread, never on the driver loop, so it may
/// block without delaying ticks or other scheduling requests. Cancelled
/// tasks never reach their callback.
pub type TimeoutCallback<T> = Box<dyn FnOnce(Expiry<T>) + Send + 'static>;

/// One schedulable unit of work: an opaque payload plus the callback to run
/// on expiry.
///
/// The payload type is a crate-level generic, so a wheel only ever carries
/// one payload type and the callback receives it back with full type safety.
pub struct Task<T> {
    payload: T,
    on_timeout: TimeoutCallback<T>,
}

impl<T> Task<T> {
    /// Creates a task from a payload and its timeout callback.
    pub fn new(payload: T, on_timeout: impl FnOnce(Expiry<T>) + Send + 'static) -> Self {
        Self {
            payload,
            on_timeout: Box::new(on_timeout),
        }
    }

    pub(crate) fn into_parts(self) -> (T, TimeoutCallback<T>) {
        (self.payload, self.on_timeout)
    }
}

impl<T: fmt::Debug> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// Fire-time view of an expired task, handed to its [`TimeoutCallback`].
///
/// `elapsed` is measured against a monotonic clock from the moment the task
/// was submitted; with the wheel's tick granularity it is at least the
/// requested delay whenever the delay is a multiple of the tick interval.
#[derive(Debug)]
pub struct Expiry<T> {
    delay: Duration,
    elapsed: Duration,
    payload: T,
}

impl<T> Expiry<T> {
    pub(crate) fn new(delay: Duration, elapsed: Duration, payload: T) -> Self {
        Self {
            delay,
            elapsed,
            payload,
        }
    }

    /// The delay the task was scheduled with.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wall-clock time between submission and firing.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Borrows the payload.
    #[must_use]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Consumes the view, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> T {
        self.payload
    }
}
