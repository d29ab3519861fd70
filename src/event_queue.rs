//! The `EventQueue` collaborator (§6, §10.3): the boundary between this
//! crate and the out-of-scope local discrete-event scheduler.
//!
//! Production callers supply their own implementation wired to code
//! generation (`trigger_for_port`) and the real event queue. The
//! [`RecordingQueue`] mock in this module lets the coordination core
//! (component G) and the bridge (component H) be unit-tested without one.

use std::time::Duration;

use crate::ids::{PortId, TriggerId};
use crate::time::Instant;

/// The scheduler-facing interface consumed by components G and H.
///
/// All methods are called with the shared coordinator mutex already held by
/// the caller (§5: "the mutex is never held across a socket read... it is
/// acquired only around state mutation and event scheduling").
pub trait EventQueue: Send + Sync {
    /// The scheduler's current logical time.
    fn current_logical_time(&self) -> Instant;

    /// The timestamp of the earliest not-yet-processed event on the local
    /// queue, or `None` if the queue is empty.
    fn event_queue_head_time(&self) -> Option<Instant>;

    /// Enqueue `payload` to run at `delay` from the current logical time,
    /// addressed to `trigger`. Ownership of `payload` transfers to the
    /// scheduler.
    fn schedule(&self, trigger: TriggerId, delay: Duration, payload: Vec<u8>);

    /// Resolve a network input port id (as carried on the wire) to the
    /// scheduler's internal trigger handle for that port.
    fn trigger_for_port(&self, port: PortId) -> TriggerId;
}

/// An in-memory [`EventQueue`] used by tests: records every `schedule` call
/// and lets a test drive `event_queue_head_time()` to simulate a local event
/// appearing on the queue while component G is blocked in `next_event_time`.
pub struct RecordingQueue {
    inner: parking_lot::Mutex<RecordingQueueState>,
}

struct RecordingQueueState {
    current_logical_time: Instant,
    head_time: Option<Instant>,
    scheduled: Vec<(TriggerId, Duration, Vec<u8>)>,
}

impl RecordingQueue {
    pub fn new(start: Instant) -> Self {
        RecordingQueue {
            inner: parking_lot::Mutex::new(RecordingQueueState {
                current_logical_time: start,
                head_time: None,
                scheduled: Vec::new(),
            }),
        }
    }

    /// Advance the mock's notion of "current logical time" (as the real
    /// scheduler would after processing an event).
    pub fn set_current_logical_time(&self, t: Instant) {
        self.inner.lock().current_logical_time = t;
    }

    /// Simulate a new local event appearing at `t` (scenario 5 in §8): sets
    /// the queue head time so the next `event_queue_head_time()` call
    /// observes it. Callers are responsible for also notifying the
    /// coordinator's condvar.
    pub fn push_local_event_at(&self, t: Instant) {
        self.inner.lock().head_time = Some(t);
    }

    pub fn clear_head(&self) {
        self.inner.lock().head_time = None;
    }

    pub fn scheduled_calls(&self) -> Vec<(TriggerId, Duration, Vec<u8>)> {
        self.inner.lock().scheduled.clone()
    }
}

impl EventQueue for RecordingQueue {
    fn current_logical_time(&self) -> Instant {
        self.inner.lock().current_logical_time
    }

    fn event_queue_head_time(&self) -> Option<Instant> {
        self.inner.lock().head_time
    }

    fn schedule(&self, trigger: TriggerId, delay: Duration, payload: Vec<u8>) {
        self.inner.lock().scheduled.push((trigger, delay, payload));
    }

    fn trigger_for_port(&self, port: PortId) -> TriggerId {
        TriggerId(port.value() as u64)
    }
}
