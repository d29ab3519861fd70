//! Component G: the time-advance coordinator.
//!
//! This is the heart of the specification. A single [`parking_lot::Mutex`]
//! guards [`TimeState`] and is shared with the "external scheduler" (in this
//! crate, anything calling through [`EventQueue`]); a single
//! [`parking_lot::Condvar`] (`event_q_changed`) is used for every wakeup —
//! TAG arrival, STOP, and local event-queue changes all broadcast the same
//! condvar, and waiters re-check their predicate on every wakeup (spurious
//! wakeups are expected and handled, per §4.G step 5 and §5).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::config::NeighborStructure;
use crate::error::FederateError;
use crate::event_queue::EventQueue;
use crate::ids::{FederateId, TriggerId};
use crate::links::RtiLink;
use crate::time::Instant;
use crate::wire::Tag;

/// §3 `TimeState`, minus the two read-only topology booleans which are kept
/// outside the mutex on the coordinator itself since they never change
/// after construction (I5 relies on this: checking them needs no lock).
struct TimeState {
    granted_tag: Instant,
    tag_pending: bool,
    stop_requested: bool,
    /// Set when the RTI connection is lost or sends an unrecoverable
    /// protocol violation (§7 item 5); wakes every waiter so they can
    /// observe it and unwind instead of blocking forever.
    rti_lost: bool,
}

/// Component G. Owns the shared mutex/condvar pair, the RTI link used to
/// send NET/LTC/STOP, and a handle to the external scheduler.
pub struct Coordinator<Q: EventQueue> {
    state: Mutex<TimeState>,
    event_q_changed: Condvar,
    event_queue: Arc<Q>,
    rti: Arc<RtiLink>,
    my_fed: FederateId,
    has_upstream: bool,
    has_downstream: bool,
}

impl<Q: EventQueue> Coordinator<Q> {
    pub fn new(
        my_fed: FederateId,
        neighbors: &NeighborStructure,
        event_queue: Arc<Q>,
        rti: Arc<RtiLink>,
    ) -> Self {
        Coordinator {
            state: Mutex::new(TimeState {
                granted_tag: Instant::NEVER,
                tag_pending: false,
                stop_requested: false,
                rti_lost: false,
            }),
            event_q_changed: Condvar::new(),
            event_queue,
            rti,
            my_fed,
            has_upstream: neighbors.has_upstream(),
            has_downstream: neighbors.has_downstream(),
        }
    }

    /// This federate's own id, used by [`crate::bridge::deliver`] to assert
    /// `dest_fed == my_fed` on inbound timed messages (§4.H, §7 item 2).
    pub fn my_fed(&self) -> FederateId {
        self.my_fed
    }

    pub fn has_upstream(&self) -> bool {
        self.has_upstream
    }

    pub fn has_downstream(&self) -> bool {
        self.has_downstream
    }

    pub fn granted_tag(&self) -> Instant {
        self.state.lock().granted_tag
    }

    pub fn is_stop_requested(&self) -> bool {
        self.state.lock().stop_requested
    }

    pub fn is_rti_lost(&self) -> bool {
        self.state.lock().rti_lost
    }

    /// §4.G's `next_event_time(t)`: returns the largest time `<= t` to which
    /// the caller may safely advance its logical clock.
    #[tracing::instrument(skip(self))]
    pub fn next_event_time(&self, t: Instant) -> Result<Instant, FederateError> {
        // I5: an isolated federate never blocks here, and does no I/O.
        if !self.has_downstream && !self.has_upstream {
            return Ok(t);
        }

        {
            let state = self.state.lock();
            if state.granted_tag >= t {
                return Ok(t);
            }
        }

        let mut body = Vec::with_capacity(8);
        crate::wire::put_i64(&mut body, t.as_nanos());
        self.rti.send(Tag::NextEventTime, &body)?;

        if !self.has_upstream {
            // Nothing upstream can constrain us from above; the NET was
            // informational only.
            return Ok(t);
        }

        let mut state = self.state.lock();
        state.tag_pending = true;
        tracing::debug!(?t, "sent NET, waiting for TAG or a preempting local event");

        loop {
            if let Some(head) = self.event_queue.event_queue_head_time() {
                if head < t {
                    tracing::debug!(?head, requested = ?t, "preempted by earlier local event");
                    return Ok(head);
                }
            }
            if !state.tag_pending || state.rti_lost || state.stop_requested {
                break;
            }
            self.event_q_changed.wait(&mut state);
        }

        // A TAG never grants more than was requested; if we woke up without
        // one (RTI lost / stop requested with no grant yet pending) the
        // caller's own time `t` is the only bound we can still offer.
        Ok(if state.tag_pending {
            t
        } else {
            state.granted_tag
        })
    }

    /// §4.G's `logical_time_complete(t)`: a no-op unless this federate has a
    /// downstream (P3).
    pub fn logical_time_complete(&self, t: Instant) -> Result<(), FederateError> {
        if !self.has_downstream {
            return Ok(());
        }
        let mut body = Vec::with_capacity(8);
        crate::wire::put_i64(&mut body, t.as_nanos());
        self.rti.send(Tag::LogicalTimeComplete, &body)
    }

    /// §4.G's `broadcast_stop()`.
    pub fn broadcast_stop(&self, current_logical_time: Instant) -> Result<(), FederateError> {
        let mut body = Vec::with_capacity(8);
        crate::wire::put_i64(&mut body, current_logical_time.as_nanos());
        self.rti.send(Tag::Stop, &body)
    }

    /// Inbound handler for `TIME_ADVANCE_GRANT` (§4.G `on_tag`). I1: ignores
    /// (with a warning) a tag that would move `granted_tag` backwards.
    pub fn on_tag(&self, tag: Instant) {
        let mut state = self.state.lock();
        if tag < state.granted_tag {
            tracing::warn!(?tag, previous = ?state.granted_tag, "received a TAG earlier than the previous grant; ignoring");
            return;
        }
        state.granted_tag = tag;
        state.tag_pending = false;
        tracing::debug!(?tag, "received TAG");
        self.event_q_changed.notify_all();
    }

    /// Inbound handler for `STOP` (§4.G `on_stop`). Per §9 open question 1,
    /// the stop time is accepted but not otherwise acted on here.
    pub fn on_stop(&self, _stop_time: Instant) {
        let mut state = self.state.lock();
        state.stop_requested = true;
        tracing::info!("STOP received from RTI");
        self.event_q_changed.notify_all();
    }

    /// Mark the RTI connection as lost (§7 item 5): wakes every waiter so a
    /// blocked `next_event_time` can observe `is_rti_lost()` and unwind
    /// instead of hanging forever.
    pub fn mark_rti_lost(&self) {
        let mut state = self.state.lock();
        state.rti_lost = true;
        tracing::error!("RTI connection lost; marking fatal");
        self.event_q_changed.notify_all();
    }

    /// Schedule a received payload under the shared mutex and wake any
    /// blocked `next_event_time` call (component H uses this; see
    /// [`crate::bridge`]).
    pub fn schedule_locked(&self, trigger: TriggerId, delay: Duration, payload: Vec<u8>) {
        let _state = self.state.lock();
        self.event_queue.schedule(trigger, delay, payload);
        self.event_q_changed.notify_all();
    }

    pub fn current_logical_time(&self) -> Instant {
        self.event_queue.current_logical_time()
    }

    /// Resolve a wire port id to the scheduler's trigger handle (used by
    /// [`crate::bridge`]).
    pub fn event_queue_trigger_for(&self, port: crate::ids::PortId) -> TriggerId {
        self.event_queue.trigger_for_port(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NeighborStructure;
    use crate::event_queue::RecordingQueue;
    use crate::ids::FederateId;
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn rti_pair() -> (Arc<RtiLink>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
        let (server_side, _) = listener.accept().unwrap();
        let client_side = client.join().unwrap();
        let (link, _reader) = RtiLink::split(server_side).unwrap();
        (Arc::new(link), client_side)
    }

    fn isolated_neighbors() -> NeighborStructure {
        NeighborStructure::default()
    }

    fn connected_neighbors() -> NeighborStructure {
        NeighborStructure {
            upstream: vec![FederateId::from(1)],
            downstream: vec![FederateId::from(2)],
            num_inbound_physical: 0,
            outbound_physical: vec![],
        }
    }

    #[test]
    fn p8_isolated_federate_returns_immediately() {
        let (rti, _client) = rti_pair();
        let eq = Arc::new(RecordingQueue::new(Instant::ZERO));
        let coord = Coordinator::new(FederateId::from(0), &isolated_neighbors(), eq, rti);
        // I5: no upstream, no downstream -> returns t with no I/O.
        assert_eq!(
            coord.next_event_time(Instant::from_nanos(5000)).unwrap(),
            Instant::from_nanos(5000)
        );
        assert!(!coord.is_stop_requested());
    }

    #[test]
    fn scenario4_net_tag_happy_path() {
        let (rti, mut client) = rti_pair();
        let eq = Arc::new(RecordingQueue::new(Instant::ZERO));
        let coord = Arc::new(Coordinator::new(FederateId::from(0), &connected_neighbors(), eq, rti));

        let coord2 = coord.clone();
        let handle = thread::spawn(move || coord2.next_event_time(Instant::from_nanos(5000)));

        // Read the NET the coordinator sent.
        use crate::socket::{read_exact, ReadOutcome};
        let tag = match read_exact(&mut client, 1).unwrap() {
            ReadOutcome::Bytes(b) => b[0],
            ReadOutcome::Eof => panic!("eof"),
        };
        assert_eq!(tag, Tag::NextEventTime.to_byte());
        let t = match read_exact(&mut client, 8).unwrap() {
            ReadOutcome::Bytes(b) => i64::from_le_bytes(b.try_into().unwrap()),
            ReadOutcome::Eof => panic!("eof"),
        };
        assert_eq!(t, 5000);

        // Give the waiting thread a moment to reach the condvar wait.
        thread::sleep(Duration::from_millis(20));
        coord.on_tag(Instant::from_nanos(5000));

        let result = handle.join().unwrap().unwrap();
        assert_eq!(result, Instant::from_nanos(5000));
    }

    #[test]
    fn scenario5_net_preempted_by_local_event() {
        let (rti, mut client) = rti_pair();
        let eq = Arc::new(RecordingQueue::new(Instant::ZERO));
        let coord = Arc::new(Coordinator::new(FederateId::from(0), &connected_neighbors(), eq.clone(), rti));

        let coord2 = coord.clone();
        let handle = thread::spawn(move || coord2.next_event_time(Instant::from_nanos(5000)));

        use crate::socket::{read_exact, ReadOutcome};
        let _tag = read_exact(&mut client, 1).unwrap();
        let _t = read_exact(&mut client, 8).unwrap();

        thread::sleep(Duration::from_millis(20));
        eq.push_local_event_at(Instant::from_nanos(3000));
        coord.schedule_locked(TriggerId(0), Duration::from_nanos(0), vec![]);

        let result = handle.join().unwrap().unwrap();
        assert_eq!(result, Instant::from_nanos(3000));
        // tag_pending remains true: no additional NET should be sent, and a
        // later TAG still resolves the original request.
        assert_eq!(coord.granted_tag(), Instant::NEVER);
        let _ = ReadOutcome::Eof; // silence unused-branch lint on some targets
    }

    #[test]
    fn p1_tag_monotone_ignores_regression() {
        let (rti, _client) = rti_pair();
        let eq = Arc::new(RecordingQueue::new(Instant::ZERO));
        let coord = Coordinator::new(FederateId::from(0), &connected_neighbors(), eq, rti);
        coord.on_tag(Instant::from_nanos(5000));
        coord.on_tag(Instant::from_nanos(1000));
        assert_eq!(coord.granted_tag(), Instant::from_nanos(5000));
    }
}
