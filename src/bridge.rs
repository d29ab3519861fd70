//! Component H: the inbound message bridge between a wire-level
//! `TIMED_MESSAGE`/`P2P_TIMED_MESSAGE` and the local event queue.
//!
//! This is the only place outside [`crate::time_advance`] that touches the
//! coordinator's shared state, and it does so exclusively through
//! [`crate::time_advance::Coordinator::schedule_locked`] so that scheduling
//! an inbound event and waking a blocked `next_event_time` happen under the
//! same lock acquisition (§4.H, §5).

use crate::error::FederateError;
use crate::event_queue::EventQueue;
use crate::time_advance::Coordinator;
use crate::wire::TimedMessage;

/// Deliver a decoded timed message to the local scheduler.
///
/// Per §4.H: a message whose timestamp is at or behind the receiver's
/// current logical time ("tardy") is still scheduled — at zero delay — and
/// logged, rather than dropped. Determinism is the sender's and the RTI's
/// responsibility; this bridge never second-guesses a timestamp it is
/// handed.
///
/// Per §4.H/§6, `dest_fed` must equal this federate's own id; a mismatch
/// means the frame was misrouted and is a fatal protocol violation (§7
/// item 2), not something to silently schedule onto the wrong queue.
pub fn deliver<Q: EventQueue>(
    coordinator: &Coordinator<Q>,
    msg: TimedMessage,
) -> Result<(), FederateError> {
    let my_fed = coordinator.my_fed();
    if msg.header.dest_fed != my_fed {
        return Err(FederateError::protocol(
            "deliver",
            format!(
                "received a timed message addressed to fed {}, but this federate is {my_fed}",
                msg.header.dest_fed
            ),
        ));
    }

    let now = coordinator.current_logical_time();
    let delay = msg.header.timestamp.delay_since(now);

    if msg.header.timestamp <= now {
        tracing::warn!(
            timestamp = %msg.header.timestamp,
            current = %now,
            port = %msg.header.port_id,
            "tardy message: scheduling at zero delay"
        );
    }

    let trigger = coordinator.event_queue_trigger_for(msg.header.port_id);
    coordinator.schedule_locked(trigger, delay, msg.payload);
    Ok(())
}
