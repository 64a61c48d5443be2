//! Request types serialized through the driver loop.
//!
//! Every mutation of wheel state travels as one of these, consumed one per
//! loop iteration. Replies go back over per-request channels so the loop
//! never blocks on a caller.

use std::time::Duration;

use crossbeam_channel::Sender;
use minstant::Instant;

use crate::task::{Task, TaskId};

/// A caller request accepted by the driver loop.
pub(crate) enum Command<T> {
    /// Insert a task. The loop assigns the id and returns it via `reply`.
    Add {
        /// Requested delay until firing; already validated by the caller.
        delay: Duration,
        /// The task to schedule.
        task: Task<T>,
        /// Submission timestamp, captured before the handoff so elapsed
        /// time includes any wait for the loop to accept the request.
        enqueued_at: Instant,
        /// Where the assigned id is sent once the entry is stored.
        reply: Sender<TaskId>,
    },

    /// Cancel a pending task. Unknown and already-fired ids are ignored.
    Remove(TaskId),

    /// Probe whether a task is still pending.
    Query {
        /// Id to look up.
        id: TaskId,
        /// Where the answer is sent.
        reply: Sender<bool>,
    },

    /// Exit the loop and release the tick source. Terminal.
    Stop,
}
