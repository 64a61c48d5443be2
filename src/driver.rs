//! Driver loop: the single writer over all wheel state.
//!
//! # Architecture
//!
//! [`TimerWheel::start`] spawns one driver thread plus a small pool of
//! callback workers:
//!
//! - **Driver thread**: owns the slot array and id index outright; a single
//!   `select!` loop serializes tick, insert, cancel and stop events, one per
//!   iteration. No lock guards any wheel state: correctness comes from the
//!   loop being the only actor that ever touches it.
//! - **Callback workers**: receive `(callback, expiry)` pairs over an
//!   unbounded channel and run them, so a slow or blocking callback cannot
//!   delay subsequent ticks or scheduling requests.
//!
//! Insert and cancel requests are rendezvous handoffs: the caller blocks
//! until the loop has taken the request off the channel, which bounds
//! pending work to what the loop can drain. The loop itself never blocks on
//! a caller; replies travel over per-request buffered channels.

mod commands;

use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select, tick, unbounded};
use minstant::Instant;

use crate::task::{Expiry, Task, TaskId, TimeoutCallback};
use crate::trace::{debug, info, trace, warn};
use crate::wheel::Wheel;

use commands::Command;

/// Number of threads running expired-task callbacks.
///
/// Callbacks may block, so they are decoupled from the driver loop; a small
/// fixed pool keeps thread count predictable under bursts of expiries.
const CALLBACK_WORKERS: usize = 4;

/// An expired task on its way to a callback worker.
type FireJob<T> = (TimeoutCallback<T>, Expiry<T>);

/// Errors returned by wheel construction and scheduling.
#[derive(Debug, thiserror::Error)]
pub enum WheelError {
    /// [`TimerWheel::new`] called with a zero interval or zero slot count.
    #[error("invalid configuration: interval and slot count must both be non-zero")]
    InvalidConfiguration,

    /// [`TimerWheel::add_task`] called with a zero delay.
    #[error("invalid delay: must be greater than zero")]
    InvalidDelay,

    /// [`TimerWheel::add_task`] called with a delay that does not exceed the
    /// tick interval. Such a task cannot fire before the wheel's own
    /// resolution; rejecting beats silently rounding up.
    #[error("delay {delay:?} must exceed the tick interval {interval:?}")]
    DelayTooShort {
        /// The rejected delay.
        delay: Duration,
        /// The wheel's tick interval.
        interval: Duration,
    },

    /// A scheduling request was issued while the driver loop is not running.
    #[error("wheel is not running")]
    NotRunning,
}

/// Lifecycle state of a [`TimerWheel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Running,
    Stopped,
}

/// A timing wheel: large numbers of one-shot delayed callbacks with O(1)
/// insert and cancel.
///
/// Delays map to a slot on a fixed ring plus a lap count, so the ring
/// represents delays far longer than one revolution without growing. A
/// dedicated driver thread advances the ring every `interval` and fires the
/// entries whose lap count has reached zero.
///
/// # Lifecycle
///
/// `Created → Running → Stopped`, driven by [`start`](Self::start) and
/// [`stop`](Self::stop). Both are idempotent: `start` only acts on a
/// freshly created wheel, `stop` on a running one; a stopped wheel is
/// terminal and cannot be restarted. Tasks still pending at stop are
/// abandoned: never fired, never reported.
///
/// Dropping the handle signals the driver loop to exit but does not wait
/// for threads; use [`stop`](Self::stop) for a graceful join.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use rotor::{Task, TimerWheel};
///
/// let (done_tx, done_rx) = std::sync::mpsc::channel();
///
/// let mut wheel = TimerWheel::new(Duration::from_millis(10), 64)?;
/// wheel.start();
///
/// wheel.add_task(
///     Duration::from_millis(50),
///     Task::new("ping", move |expiry| {
///         done_tx.send(*expiry.payload()).unwrap();
///     }),
/// )?;
///
/// let fired = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
/// assert_eq!(fired, "ping");
///
/// wheel.stop();
/// # Ok::<(), rotor::WheelError>(())
/// ```
pub struct TimerWheel<T> {
    interval: Duration,
    slot_count: usize,
    state: State,
    commands: Option<Sender<Command<T>>>,
    driver: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> TimerWheel<T> {
    /// Creates a wheel in the stopped state: no threads, no ticking.
    ///
    /// `interval` is the tick period (how often the pointer advances one
    /// slot); `slot_count` is the number of buckets on the ring. Both are
    /// fixed for the wheel's lifetime.
    ///
    /// # Errors
    ///
    /// [`WheelError::InvalidConfiguration`] if either parameter is zero.
    pub fn new(interval: Duration, slot_count: usize) -> Result<Self, WheelError> {
        if interval.is_zero() || slot_count == 0 {
            return Err(WheelError::InvalidConfiguration);
        }
        Ok(Self {
            interval,
            slot_count,
            state: State::Created,
            commands: None,
            driver: None,
            workers: Vec::new(),
        })
    }

    /// Starts the driver loop and callback workers.
    ///
    /// Acts only on a freshly created wheel; calling it again, or on a
    /// stopped wheel, is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if thread spawning fails.
    pub fn start(&mut self) {
        if self.state != State::Created {
            debug!(state = ?self.state, "start ignored");
            return;
        }

        info!(
            interval_us = self.interval.as_micros() as u64,
            slot_count = self.slot_count,
            "timer wheel starting"
        );

        // Rendezvous channel: callers block until the loop accepts.
        let (command_tx, command_rx) = bounded(0);
        let (job_tx, job_rx) = unbounded::<FireJob<T>>();

        for n in 0..CALLBACK_WORKERS {
            let jobs = job_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("rotor-worker-{n}"))
                .spawn(move || run_worker(jobs))
                .expect("failed to spawn callback worker");
            self.workers.push(handle);
        }

        let interval = self.interval;
        let slot_count = self.slot_count;
        let driver = thread::Builder::new()
            .name("rotor-driver".into())
            .spawn(move || run_loop(Wheel::new(interval, slot_count), command_rx, job_tx))
            .expect("failed to spawn driver thread");

        self.driver = Some(driver);
        self.commands = Some(command_tx);
        self.state = State::Running;
    }

    /// Stops the driver loop, releases the tick source and joins all
    /// threads. Pending tasks are abandoned silently.
    ///
    /// Idempotent and terminal: stopping a never-started or already-stopped
    /// wheel only marks it stopped.
    pub fn stop(&mut self) {
        match self.state {
            State::Created => self.state = State::Stopped,
            State::Running => {
                info!("timer wheel stopping");
                if let Some(commands) = self.commands.take() {
                    // Rendezvous: returns once the loop has taken the stop
                    // event. Err means the loop is already gone.
                    let _ = commands.send(Command::Stop);
                }
                if let Some(driver) = self.driver.take() {
                    let _ = driver.join();
                }
                // The loop dropped the job sender on exit; workers drain
                // whatever was already dispatched and finish.
                for worker in self.workers.drain(..) {
                    let _ = worker.join();
                }
                self.state = State::Stopped;
                info!("timer wheel stopped");
            }
            State::Stopped => {}
        }
    }

    /// Schedules `task` to fire once after `delay`.
    ///
    /// Blocks until the driver loop has stored the entry, then returns the
    /// id it assigned. Ids start at 1 and increase strictly in insertion
    /// order.
    ///
    /// # Errors
    ///
    /// - [`WheelError::InvalidDelay`] if `delay` is zero.
    /// - [`WheelError::DelayTooShort`] if `delay` does not exceed the tick
    ///   interval.
    /// - [`WheelError::NotRunning`] if the wheel has not been started or
    ///   was stopped.
    pub fn add_task(&self, delay: Duration, task: Task<T>) -> Result<TaskId, WheelError> {
        if delay.is_zero() {
            return Err(WheelError::InvalidDelay);
        }
        if delay <= self.interval {
            return Err(WheelError::DelayTooShort {
                delay,
                interval: self.interval,
            });
        }
        let commands = self.commands.as_ref().ok_or(WheelError::NotRunning)?;

        let (reply_tx, reply_rx) = bounded(1);
        commands
            .send(Command::Add {
                delay,
                task,
                enqueued_at: Instant::now(),
                reply: reply_tx,
            })
            .map_err(|_| WheelError::NotRunning)?;
        reply_rx.recv().map_err(|_| WheelError::NotRunning)
    }

    /// Cancels a pending task; its callback will never run.
    ///
    /// Silent no-op if `id` is unknown, already fired, already cancelled,
    /// or the wheel is not running; cancellation racing a concurrent fire
    /// is expected, not an error.
    pub fn remove_task(&self, id: TaskId) {
        if let Some(commands) = self.commands.as_ref() {
            let _ = commands.send(Command::Remove(id));
        }
    }

    /// Whether the task is still pending: scheduled, not yet fired, not
    /// cancelled. `false` on a wheel that is not running.
    #[must_use]
    pub fn has_task(&self, id: TaskId) -> bool {
        let Some(commands) = self.commands.as_ref() else {
            return false;
        };
        let (reply_tx, reply_rx) = bounded(1);
        if commands.send(Command::Query { id, reply: reply_tx }).is_err() {
            return false;
        }
        reply_rx.recv().unwrap_or(false)
    }

    /// The tick period this wheel was created with.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The number of slots this wheel was created with.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Whether the driver loop is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == State::Running
    }
}

impl<T> fmt::Debug for TimerWheel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerWheel")
            .field("interval", &self.interval)
            .field("slot_count", &self.slot_count)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// The driver loop body. Sole owner and mutator of the wheel store.
fn run_loop<T>(mut wheel: Wheel<T>, commands: Receiver<Command<T>>, jobs: Sender<FireJob<T>>) {
    let ticker = tick(wheel.interval());
    let mut next_id: u64 = 1;

    loop {
        select! {
            recv(ticker) -> _ => {
                let _fired = wheel.advance(|_id, callback, expiry| {
                    debug!(
                        id = %_id,
                        elapsed_us = expiry.elapsed().as_micros() as u64,
                        "task expired"
                    );
                    // Err only after teardown has dropped the workers.
                    let _ = jobs.send((callback, expiry));
                });
                trace!(fired = _fired, pending = wheel.pending(), "tick");
            }
            recv(commands) -> msg => {
                match msg {
                    Ok(Command::Add { delay, task, enqueued_at, reply }) => {
                        let id = TaskId::new(next_id);
                        next_id += 1;
                        wheel.insert(id, delay, enqueued_at, task);
                        debug!(
                            id = %id,
                            delay_us = delay.as_micros() as u64,
                            "task scheduled"
                        );
                        let _ = reply.send(id);
                    }
                    Ok(Command::Remove(id)) => {
                        let _removed = wheel.remove(id);
                        debug!(id = %id, removed = _removed, "task cancelled");
                    }
                    Ok(Command::Query { id, reply }) => {
                        let _ = reply.send(wheel.contains(id));
                    }
                    // A dropped handle shuts the loop down like an explicit stop.
                    Ok(Command::Stop) | Err(_) => break,
                }
            }
        }
    }

    let _pending = wheel.pending();
    info!(pending = _pending, "driver loop exiting");
    // Dropping the ticker here releases the tick source; dropping the job
    // sender lets the workers finish once their queue drains.
}

/// Callback worker body: runs expired-task callbacks to completion.
fn run_worker<T>(jobs: Receiver<FireJob<T>>) {
    while let Ok((callback, expiry)) = jobs.recv() {
        // A panicking callback must not take the worker down with it.
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(expiry)));
        if outcome.is_err() {
            warn!("timeout callback panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_interval() {
        let result = TimerWheel::<()>::new(Duration::ZERO, 16);
        assert!(matches!(result, Err(WheelError::InvalidConfiguration)));
    }

    #[test]
    fn rejects_zero_slot_count() {
        let result = TimerWheel::<()>::new(Duration::from_millis(100), 0);
        assert!(matches!(result, Err(WheelError::InvalidConfiguration)));
    }

    #[test]
    fn rejects_zero_delay() {
        let mut wheel = TimerWheel::new(Duration::from_millis(100), 16).unwrap();
        wheel.start();
        let result = wheel.add_task(Duration::ZERO, Task::new((), |_| {}));
        assert!(matches!(result, Err(WheelError::InvalidDelay)));
        wheel.stop();
    }

    #[test]
    fn rejects_delay_at_or_below_interval() {
        let interval = Duration::from_millis(100);
        let mut wheel = TimerWheel::new(interval, 16).unwrap();
        wheel.start();

        for delay in [Duration::from_millis(50), interval] {
            let result = wheel.add_task(delay, Task::new((), |_| {}));
            assert!(matches!(result, Err(WheelError::DelayTooShort { .. })));
        }
        // Just over the interval is schedulable.
        assert!(wheel.add_task(Duration::from_millis(101), Task::new((), |_| {})).is_ok());
        wheel.stop();
    }

    #[test]
    fn scheduling_requires_a_running_loop() {
        let wheel = TimerWheel::new(Duration::from_millis(100), 16).unwrap();
        let result = wheel.add_task(Duration::from_secs(1), Task::new((), |_| {}));
        assert!(matches!(result, Err(WheelError::NotRunning)));
        assert!(!wheel.has_task(TaskId::new(1)));
        // Removal is a silent no-op rather than an error.
        wheel.remove_task(TaskId::new(1));
    }

    #[test]
    fn start_is_idempotent_and_stop_is_terminal() {
        let mut wheel = TimerWheel::<()>::new(Duration::from_millis(10), 8).unwrap();
        assert!(!wheel.is_running());

        wheel.start();
        assert!(wheel.is_running());
        wheel.start();
        assert!(wheel.is_running());

        wheel.stop();
        assert!(!wheel.is_running());
        wheel.stop();

        // A stopped wheel cannot be restarted.
        wheel.start();
        assert!(!wheel.is_running());
        let result = wheel.add_task(Duration::from_secs(1), Task::new((), |_| {}));
        assert!(matches!(result, Err(WheelError::NotRunning)));
    }

    #[test]
    fn stop_before_start_is_terminal() {
        let mut wheel = TimerWheel::<()>::new(Duration::from_millis(10), 8).unwrap();
        wheel.stop();
        assert!(!wheel.is_running());
        wheel.start();
        assert!(!wheel.is_running());
    }

    #[test]
    fn error_messages_name_the_violation() {
        let err = TimerWheel::<()>::new(Duration::ZERO, 1).unwrap_err();
        assert!(err.to_string().contains("non-zero"));

        let err = WheelError::DelayTooShort {
            delay: Duration::from_millis(50),
            interval: Duration::from_millis(100),
        };
        assert!(err.to_string().contains("50ms"));
        assert!(err.to_string().contains("100ms"));
    }
}
