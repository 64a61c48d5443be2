//! Hierarchical-bucket timer: schedule many one-shot delayed callbacks with
//! O(1) insertion, O(1) cancellation and a cheap per-tick scan.
//!
//! A [`TimerWheel`] keeps pending tasks in a fixed ring of slots. A delay is
//! mapped to a slot offset plus a lap count, so delays far longer than one
//! revolution cost no extra space: an entry just sits out the laps while
//! the pointer passes it. Every `interval`, a dedicated driver thread scans
//! the slot under the pointer and fires entries whose lap count reached
//! zero; fired callbacks run on worker threads so they cannot stall ticking.
//!
//! All wheel state is owned by that one driver thread. Scheduling and
//! cancellation are synchronous channel handoffs into it, which keeps the
//! ring and its id index race-free without any locking.
//!
//! ```
//! use std::time::Duration;
//! use rotor::{Task, TimerWheel};
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//!
//! let mut wheel = TimerWheel::new(Duration::from_millis(10), 64)?;
//! wheel.start();
//!
//! let id = wheel.add_task(
//!     Duration::from_millis(40),
//!     Task::new(7u32, move |expiry| {
//!         tx.send(expiry.into_payload()).ok();
//!     }),
//! )?;
//! assert!(wheel.has_task(id));
//!
//! let payload = rx.recv_timeout(Duration::from_secs(5)).unwrap();
//! assert_eq!(payload, 7);
//! assert!(!wheel.has_task(id));
//!
//! wheel.stop();
//! # Ok::<(), rotor::WheelError>(())
//! ```

mod driver;
mod task;
mod trace;
mod wheel;

pub use driver::{TimerWheel, WheelError};
pub use task::{Expiry, Task, TaskId, TimeoutCallback};
pub use trace::init_tracing;
