//! One-shot event scheduling at simulated-time delays.
//!
//! A requested simulated delay is converted to a wall-clock deadline using
//! the multiplier active at schedule time; the deadline is fixed from then
//! on. Events scheduled before a speed change keep their originally
//! intended wall-clock deadline. `tick()` fires every due event in
//! ascending deadline order with a stable insertion-order tie-break.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::clock::VirtualClock;
use crate::error::{Result, WarpsimError};

/// Callback invoked when an event fires. Errors are logged, never fatal.
pub type EventCallback = Box<dyn FnOnce() -> Result<()> + Send>;

/// Cancellation handle returned by `schedule_after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle(u64);

struct PendingEvent {
    id: u64,
    due: Instant,
    seq: u64,
    label: String,
    sim_delay_secs: f64,
    callback: EventCallback,
}

/// Heap wrapper ordering events by (due, seq); the heap holds `Reverse`
/// so the earliest deadline pops first.
struct OrderedEvent(PendingEvent);

impl PartialEq for OrderedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.0.due == other.0.due && self.0.seq == other.0.seq
    }
}

impl Eq for OrderedEvent {}

impl PartialOrd for OrderedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .due
            .cmp(&other.0.due)
            .then_with(|| self.0.seq.cmp(&other.0.seq))
    }
}

struct SchedulerState {
    heap: BinaryHeap<Reverse<OrderedEvent>>,
    cancelled: HashSet<u64>,
    next_id: u64,
    next_seq: u64,
}

/// Schedules callbacks at simulated-time delays and fires them from a
/// polling loop.
pub struct EventScheduler {
    clock: Arc<VirtualClock>,
    state: Mutex<SchedulerState>,
}

impl EventScheduler {
    /// Create a scheduler bound to the given clock.
    pub fn new(clock: Arc<VirtualClock>) -> Self {
        Self {
            clock,
            state: Mutex::new(SchedulerState {
                heap: BinaryHeap::new(),
                cancelled: HashSet::new(),
                next_id: 1,
                next_seq: 0,
            }),
        }
    }

    /// Schedule a callback to fire after `sim_delay_secs` of simulated time.
    ///
    /// The wall deadline is computed with the multiplier active right now;
    /// later speed changes do not move it.
    pub fn schedule_after(
        &self,
        sim_delay_secs: f64,
        label: &str,
        callback: EventCallback,
    ) -> Result<EventHandle> {
        if !sim_delay_secs.is_finite() || sim_delay_secs < 0.0 {
            return Err(WarpsimError::InvalidArgument(format!(
                "simulated delay must be non-negative, got {}",
                sim_delay_secs
            )));
        }

        let wall_delay = Duration::from_secs_f64(sim_delay_secs / self.clock.multiplier());
        let due = Instant::now() + wall_delay;

        let mut state = self.state.lock().expect("scheduler lock poisoned");
        let id = state.next_id;
        state.next_id += 1;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Reverse(OrderedEvent(PendingEvent {
            id,
            due,
            seq,
            label: label.to_string(),
            sim_delay_secs,
            callback,
        })));

        tracing::debug!(
            label = label,
            sim_delay_secs = sim_delay_secs,
            wall_delay_ms = wall_delay.as_millis() as u64,
            "event scheduled"
        );
        Ok(EventHandle(id))
    }

    /// Cancel a pending event. No-op if it already fired.
    pub fn cancel(&self, handle: EventHandle) {
        let mut state = self.state.lock().expect("scheduler lock poisoned");
        state.cancelled.insert(handle.0);
    }

    /// Number of events still pending (cancelled ones excluded).
    pub fn pending_count(&self) -> usize {
        let state = self.state.lock().expect("scheduler lock poisoned");
        state
            .heap
            .iter()
            .filter(|e| !state.cancelled.contains(&e.0.0.id))
            .count()
    }

    /// Fire every event whose deadline has passed, in deadline order.
    ///
    /// Callbacks run outside the internal lock so they may schedule
    /// further events. A callback error is logged and does not stop the
    /// loop. Returns the number of events fired.
    pub fn tick(&self) -> usize {
        let now = Instant::now();
        let mut due = Vec::new();

        {
            let mut state = self.state.lock().expect("scheduler lock poisoned");
            while let Some(Reverse(head)) = state.heap.peek() {
                if head.0.due > now {
                    break;
                }
                let Reverse(OrderedEvent(event)) = state.heap.pop().unwrap();
                if state.cancelled.remove(&event.id) {
                    continue;
                }
                due.push(event);
            }
        }

        let fired = due.len();
        for event in due {
            if let Err(e) = (event.callback)() {
                tracing::error!(
                    label = %event.label,
                    sim_delay_secs = event.sim_delay_secs,
                    error = %e,
                    "event callback failed"
                );
            }
        }
        fired
    }
}
