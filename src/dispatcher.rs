//! Component F: the two inbound dispatcher loops.
//!
//! Each federate runs exactly one RTI dispatcher thread (reading
//! `TIMESTAMP` / `TIMED_MESSAGE` / `TIME_ADVANCE_GRANT` / `STOP` off the RTI
//! socket) and one dispatcher thread per P2P peer (reading
//! `P2P_TIMED_MESSAGE`). Both loops share the same shape: read a tag byte,
//! read the fixed body for that tag, dispatch, repeat; a clean EOF from a
//! peer socket ends that peer's loop quietly, but a clean EOF or any
//! [`FederateError`] from the RTI socket is fatal (§7 item 5).

use std::net::TcpStream;
use std::sync::Arc;

use crate::bridge;
use crate::error::{log_federate_error, FederateError};
use crate::event_queue::EventQueue;
use crate::ids::FederateId;
use crate::links::PeerLinks;
use crate::socket::{read_exact, read_tag_byte, ReadOutcome};
use crate::time::Instant;
use crate::time_advance::Coordinator;
use crate::wire::{Tag, TimedMessageHeader, TIMED_MESSAGE_HEADER_LEN};

/// Run the RTI dispatcher loop until the connection ends or a fatal error
/// occurs. Intended to run on its own dedicated thread (§4.F, §5: the
/// coordinator mutex is never held across a socket read).
pub fn run_rti_dispatcher<Q: EventQueue>(
    my_fed: FederateId,
    mut sock: TcpStream,
    coordinator: Arc<Coordinator<Q>>,
) {
    loop {
        match read_one_rti_message(&mut sock, &coordinator) {
            Ok(true) => continue,
            Ok(false) => {
                tracing::info!(my_fed = %my_fed, "RTI connection closed");
                coordinator.mark_rti_lost();
                return;
            }
            Err(err) => {
                log_federate_error(my_fed, None, &err);
                coordinator.mark_rti_lost();
                return;
            }
        }
    }
}

/// Read and dispatch a single message from the RTI. Returns `Ok(false)` on a
/// clean EOF (treated as fatal by the caller), `Ok(true)` after a normal
/// dispatch.
fn read_one_rti_message<Q: EventQueue>(
    sock: &mut TcpStream,
    coordinator: &Coordinator<Q>,
) -> Result<bool, FederateError> {
    let tag_byte = match read_tag_byte(sock)? {
        ReadOutcome::Eof => return Ok(false),
        ReadOutcome::Bytes(b) => b[0],
    };
    let tag = Tag::from_byte(tag_byte)
        .ok_or_else(|| FederateError::protocol("rti dispatcher", format!("unknown tag {tag_byte}")))?;

    match tag {
        Tag::TimeAdvanceGrant => {
            let body = expect_bytes(read_exact(sock, 8)?)?;
            let t = Instant::from_nanos(i64::from_le_bytes(body.try_into().unwrap()));
            coordinator.on_tag(t);
        }
        Tag::Stop => {
            let body = expect_bytes(read_exact(sock, 8)?)?;
            let t = Instant::from_nanos(i64::from_le_bytes(body.try_into().unwrap()));
            coordinator.on_stop(t);
        }
        Tag::TimedMessage => {
            let header_bytes = expect_bytes(read_exact(sock, TIMED_MESSAGE_HEADER_LEN)?)?;
            let mut header_slice = &header_bytes[..];
            let header = TimedMessageHeader::decode(&mut header_slice)?;
            let payload = expect_bytes(read_exact(sock, header.length as usize)?)?;
            bridge::deliver(coordinator, crate::wire::TimedMessage { header, payload })?;
        }
        Tag::Timestamp => {
            let body = expect_bytes(read_exact(sock, 8)?)?;
            let t = Instant::from_nanos(i64::from_le_bytes(body.try_into().unwrap()));
            tracing::info!(start_time = %t, "received coordinated start time");
        }
        other => {
            return Err(FederateError::protocol(
                "rti dispatcher",
                format!("unexpected tag on RTI socket: {other:?}"),
            ))
        }
    }
    Ok(true)
}

fn expect_bytes(outcome: ReadOutcome) -> Result<Vec<u8>, FederateError> {
    match outcome {
        ReadOutcome::Bytes(b) => Ok(b),
        ReadOutcome::Eof => Err(FederateError::protocol(
            "dispatcher",
            "connection closed mid-frame",
        )),
    }
}

/// Run a single peer's dispatcher loop until that peer's socket closes.
/// Unlike the RTI loop, a clean EOF here just ends this one peer's thread
/// and clears its inbound slot (§4.F, §3).
pub fn run_peer_dispatcher<Q: EventQueue>(
    my_fed: FederateId,
    peer_fed: FederateId,
    mut sock: TcpStream,
    coordinator: Arc<Coordinator<Q>>,
    peer_links: Arc<PeerLinks>,
) {
    loop {
        let tag_byte = match read_tag_byte(&mut sock) {
            Ok(ReadOutcome::Eof) => {
                tracing::info!(my_fed = %my_fed, peer = %peer_fed, "peer connection closed");
                break;
            }
            Ok(ReadOutcome::Bytes(b)) => b[0],
            Err(err) => {
                log_federate_error(my_fed, Some(peer_fed), &err);
                break;
            }
        };

        let result = (|| -> Result<(), FederateError> {
            let tag = Tag::from_byte(tag_byte).ok_or_else(|| {
                FederateError::protocol("peer dispatcher", format!("unknown tag {tag_byte}"))
            })?;
            if tag != Tag::P2pTimedMessage {
                return Err(FederateError::protocol(
                    "peer dispatcher",
                    format!("unexpected tag on peer socket: {tag:?}"),
                ));
            }
            let header_bytes = expect_bytes(read_exact(&mut sock, TIMED_MESSAGE_HEADER_LEN)?)?;
            let mut header_slice = &header_bytes[..];
            let header = TimedMessageHeader::decode(&mut header_slice)?;
            let payload = expect_bytes(read_exact(&mut sock, header.length as usize)?)?;
            bridge::deliver(&coordinator, crate::wire::TimedMessage { header, payload })?;
            Ok(())
        })();

        if let Err(err) = result {
            log_federate_error(my_fed, Some(peer_fed), &err);
            break;
        }
    }

    peer_links.clear_inbound(peer_fed);
}
