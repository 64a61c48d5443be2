//! Wheel store: fixed slot array, id index, placement math and expiry scan.
//!
//! A single fixed-size ring of buckets represents delays arbitrarily larger
//! than one revolution by carrying a lap count per entry: the number of full
//! trips the pointer must still make past the entry's slot before it fires.
//! The store is purely single-threaded; the driver loop is its only caller.

use std::collections::HashMap;
use std::time::Duration;

use minstant::Instant;

use crate::task::{Expiry, Task, TaskId, TimeoutCallback};

/// A pending task plus its scheduling metadata.
struct Entry<T> {
    id: TaskId,
    delay: Duration,
    laps_remaining: u64,
    enqueued_at: Instant,
    task: Task<T>,
}

/// The slot array and its id index.
///
/// Invariant: `index` maps an id to the slot its entry currently occupies,
/// for every pending entry and nothing else.
pub(crate) struct Wheel<T> {
    slots: Vec<Vec<Entry<T>>>,
    index: HashMap<TaskId, usize>,
    interval: Duration,
    current: usize,
}

impl<T> Wheel<T> {
    /// Creates an empty wheel. Parameters are validated by the public API
    /// before this is reached.
    pub(crate) fn new(interval: Duration, slot_count: usize) -> Self {
        debug_assert!(!interval.is_zero() && slot_count > 0);
        Self {
            slots: (0..slot_count).map(|_| Vec::new()).collect(),
            index: HashMap::new(),
            interval,
            current: 0,
        }
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of entries currently pending.
    pub(crate) fn pending(&self) -> usize {
        self.index.len()
    }

    /// Maps a delay to the slot it lands in and the laps it must survive.
    ///
    /// `ticks_ahead = delay / interval` (integer division); the slot is that
    /// many positions past the pointer, and every `slot_count` ticks of it
    /// beyond the first revolution become one lap.
    pub(crate) fn placement(&self, delay: Duration) -> (usize, u64) {
        let slot_count = self.slots.len() as u64;
        let ticks_ahead = (delay.as_nanos() / self.interval.as_nanos()) as u64;
        let slot = (self.current as u64 + ticks_ahead) % slot_count;
        (slot as usize, ticks_ahead / slot_count)
    }

    /// Places a task into its slot and records it in the index. O(1).
    pub(crate) fn insert(&mut self, id: TaskId, delay: Duration, enqueued_at: Instant, task: Task<T>) {
        let (slot, laps_remaining) = self.placement(delay);
        self.slots[slot].push(Entry {
            id,
            delay,
            laps_remaining,
            enqueued_at,
            task,
        });
        self.index.insert(id, slot);
    }

    /// Removes a pending task by id. Unknown, fired and already-removed ids
    /// are a no-op; returns whether an entry was removed.
    pub(crate) fn remove(&mut self, id: TaskId) -> bool {
        let Some(slot) = self.index.remove(&id) else {
            return false;
        };
        let entries = &mut self.slots[slot];
        // Bounded by how many tasks share this bucket, not by total count.
        match entries.iter().position(|entry| entry.id == id) {
            Some(at) => {
                entries.swap_remove(at);
                true
            }
            None => false,
        }
    }

    /// Whether a task is still pending.
    pub(crate) fn contains(&self, id: TaskId) -> bool {
        self.index.contains_key(&id)
    }

    /// Scans the slot under the pointer, then advances the pointer one slot.
    ///
    /// Entries with laps left are decremented in place; entries at lap zero
    /// are removed and handed to `on_fire` with their elapsed time measured.
    /// Returns the number of entries fired. Fire order within a slot is
    /// unspecified.
    pub(crate) fn advance(
        &mut self,
        mut on_fire: impl FnMut(TaskId, TimeoutCallback<T>, Expiry<T>),
    ) -> usize {
        let entries = &mut self.slots[self.current];
        let mut fired = 0;
        let mut at = 0;
        while at < entries.len() {
            if entries[at].laps_remaining > 0 {
                entries[at].laps_remaining -= 1;
                at += 1;
                continue;
            }
            let entry = entries.swap_remove(at);
            self.index.remove(&entry.id);
            let elapsed = entry.enqueued_at.elapsed();
            let (payload, callback) = entry.task.into_parts();
            on_fire(entry.id, callback, Expiry::new(entry.delay, elapsed, payload));
            fired += 1;
        }
        self.current = (self.current + 1) % self.slots.len();
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn wheel(interval_ms: u64, slot_count: usize) -> Wheel<u32> {
        Wheel::new(Duration::from_millis(interval_ms), slot_count)
    }

    fn noop_task(payload: u32) -> Task<u32> {
        Task::new(payload, |_| {})
    }

    #[test]
    fn placement_within_first_revolution() {
        let w = wheel(100, 300);
        // 5s at 100ms ticks: 50 ticks ahead, no laps.
        assert_eq!(w.placement(Duration::from_secs(5)), (50, 0));
    }

    #[test]
    fn placement_spanning_multiple_revolutions() {
        let w = wheel(100, 16);
        // 3.2s at 100ms ticks over 16 slots: 32 ticks, two full laps.
        assert_eq!(w.placement(Duration::from_millis(3200)), (0, 2));
        assert_eq!(w.placement(Duration::from_millis(1700)), (1, 1));
    }

    #[test]
    fn placement_is_relative_to_pointer() {
        let mut w = wheel(10, 8);
        for _ in 0..3 {
            w.advance(|_, _, _| {});
        }
        // 50ms at 10ms ticks: 5 ahead of pointer position 3.
        assert_eq!(w.placement(Duration::from_millis(50)), (0, 0));
    }

    #[test]
    fn insert_records_index_and_remove_clears_it() {
        let mut w = wheel(100, 16);
        let id = TaskId::new(1);
        w.insert(id, Duration::from_millis(300), Instant::now(), noop_task(9));
        assert!(w.contains(id));
        assert_eq!(w.pending(), 1);

        assert!(w.remove(id));
        assert!(!w.contains(id));
        assert_eq!(w.pending(), 0);
    }

    #[test]
    fn remove_is_idempotent_and_tolerates_unknown_ids() {
        let mut w = wheel(100, 16);
        let id = TaskId::new(1);
        w.insert(id, Duration::from_millis(300), Instant::now(), noop_task(9));

        assert!(w.remove(id));
        assert!(!w.remove(id));
        assert!(!w.remove(TaskId::new(777)));
    }

    #[test]
    fn entry_fires_only_at_lap_zero() {
        let mut w = wheel(100, 4);
        let id = TaskId::new(1);
        // 8 ticks ahead on a 4-slot wheel: slot 0, two laps to survive.
        w.insert(id, Duration::from_millis(800), Instant::now(), noop_task(1));

        let mut fired = Vec::new();
        // Two full revolutions visit the slot twice without firing.
        for _ in 0..8 {
            w.advance(|id, _, _| fired.push(id));
        }
        assert!(fired.is_empty());
        assert!(w.contains(id));

        // Third visit fires it.
        for _ in 0..4 {
            w.advance(|id, _, _| fired.push(id));
        }
        assert_eq!(fired, vec![id]);
        assert!(!w.contains(id));
    }

    #[test]
    fn fired_entry_reports_delay_and_payload() {
        let mut w = wheel(10, 8);
        let delay = Duration::from_millis(30);
        w.insert(TaskId::new(1), delay, Instant::now(), noop_task(42));

        let mut seen = None;
        for _ in 0..4 {
            w.advance(|_, _, expiry| seen = Some((expiry.delay(), *expiry.payload())));
        }
        assert_eq!(seen, Some((delay, 42)));
    }

    #[test]
    fn entries_sharing_a_slot_with_different_laps() {
        let mut w = wheel(10, 4);
        let near = TaskId::new(1);
        let far = TaskId::new(2);
        // Both land in slot 2; the far one must survive one extra lap.
        w.insert(near, Duration::from_millis(20), Instant::now(), noop_task(1));
        w.insert(far, Duration::from_millis(60), Instant::now(), noop_task(2));

        let mut fired = Vec::new();
        for _ in 0..4 {
            w.advance(|id, _, _| fired.push(id));
        }
        assert_eq!(fired, vec![near]);
        assert!(w.contains(far));

        for _ in 0..4 {
            w.advance(|id, _, _| fired.push(id));
        }
        assert_eq!(fired, vec![near, far]);
    }

    #[test]
    fn advance_wraps_the_pointer() {
        let mut w = wheel(10, 2);
        for _ in 0..2 {
            w.advance(|_, _, _| {});
        }
        // Pointer is back at 0 after one full revolution.
        assert_eq!(w.placement(Duration::from_millis(30)), (1, 1));
    }

    proptest! {
        #[test]
        fn placement_matches_the_contract(
            interval_ms in 1u64..1_000,
            slot_count in 1usize..512,
            delay_ms in 1u64..10_000_000,
            advances in 0usize..600,
        ) {
            let mut w: Wheel<u32> = Wheel::new(Duration::from_millis(interval_ms), slot_count);
            for _ in 0..advances {
                w.advance(|_, _, _| {});
            }

            let (slot, laps) = w.placement(Duration::from_millis(delay_ms));
            let ticks_ahead = delay_ms / interval_ms;
            let expected_slot =
                (advances as u64 % slot_count as u64 + ticks_ahead) % slot_count as u64;

            prop_assert!(slot < slot_count);
            prop_assert_eq!(slot as u64, expected_slot);
            prop_assert_eq!(laps, ticks_ahead / slot_count as u64);
        }
    }
}
