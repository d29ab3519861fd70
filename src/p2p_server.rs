//! Component D: the P2P listening socket.
//!
//! Binds a TCP listener by scanning a port range (mirroring §4.C, per
//! §4.D), advertises the bound port to the RTI with `ADDRESS_AD`, then
//! accepts inbound peer connections and runs the `P2P_SENDING_FED_ID`
//! handshake on each (§4.D). A successfully handshaken peer connection is
//! split and its read half handed off to a fresh dispatcher thread
//! (component F); the write half is registered in [`PeerLinks`] under the
//! connecting peer's id.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use crate::config::RuntimeConstants;
use crate::dispatcher;
use crate::error::{log_federate_error, FederateError};
use crate::event_queue::EventQueue;
use crate::ids::FederateId;
use crate::links::{PeerLink, PeerLinks};
use crate::socket::{read_exact, read_tag_byte, write_message, ReadOutcome};
use crate::time_advance::Coordinator;
use crate::wire::{FedIdFrame, Tag};

/// The ports to try binding: a single fixed port if `p2p_port != 0`,
/// otherwise `starting_port ..= starting_port + port_range_limit`, the same
/// range `rti_connect::candidate_ports` scans (§4.D: "port selection
/// mirrors §4.C").
fn candidate_ports(p2p_port: u16, constants: &RuntimeConstants) -> Vec<u16> {
    if p2p_port != 0 {
        vec![p2p_port]
    } else {
        (0..=constants.port_range_limit)
            .map(|offset| constants.starting_port.wrapping_add(offset))
            .collect()
    }
}

/// Bind a listening port — scanning `p2p_port .. p2p_port +
/// port_range_limit` unless `p2p_port` was user-specified, mirroring
/// §4.C's RTI connect scan per §4.D — and advertise it to the RTI with
/// `ADDRESS_AD`.
///
/// Returns the bound listener (to be driven by [`accept_loop`]) and the
/// port that was advertised.
pub fn bind_and_advertise(
    my_fed: FederateId,
    rti: &crate::links::RtiLink,
    p2p_port: u16,
    constants: &RuntimeConstants,
) -> Result<(TcpListener, u16), FederateError> {
    let ports = candidate_ports(p2p_port, constants);
    let mut last_err = None;

    for &port in &ports {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)) {
            Ok(listener) => {
                let bound_port = listener.local_addr()?.port();
                let mut body = Vec::with_capacity(2);
                crate::wire::put_u16(&mut body, bound_port);
                rti.send(Tag::AddressAd, &body)?;
                tracing::info!(my_fed = %my_fed, port = bound_port, "advertised P2P listening port to RTI");
                return Ok((listener, bound_port));
            }
            Err(err) if err.kind() == ErrorKind::AddrInUse => {
                tracing::debug!(my_fed = %my_fed, port, "P2P port candidate in use, trying next");
                last_err = Some(err);
                continue;
            }
            Err(err) => return Err(FederateError::Io(err)),
        }
    }

    Err(FederateError::Io(last_err.unwrap_or_else(|| {
        std::io::Error::new(ErrorKind::AddrInUse, "no P2P port in range was available")
    })))
}

/// Run the accept loop: for each inbound connection, perform the
/// `P2P_SENDING_FED_ID` handshake and, on success, spawn a dispatcher
/// thread for it. Exits once `num_inbound_physical` peers have been
/// accepted, joining every per-peer dispatcher thread it spawned before
/// returning (§4.D).
pub fn accept_loop<Q: EventQueue + 'static>(
    my_fed: FederateId,
    federation_id: String,
    listener: TcpListener,
    num_inbound_physical: usize,
    peer_links: Arc<PeerLinks>,
    coordinator: Arc<Coordinator<Q>>,
) {
    let mut children = Vec::with_capacity(num_inbound_physical);
    let mut accepted = 0;

    for incoming in listener.incoming() {
        if accepted >= num_inbound_physical {
            break;
        }

        let mut stream = match incoming {
            Ok(s) => s,
            Err(err) => {
                tracing::error!(my_fed = %my_fed, %err, "P2P accept failed");
                continue;
            }
        };

        match handshake_inbound(&mut stream, &federation_id) {
            Ok(peer_fed) => {
                tracing::info!(my_fed = %my_fed, peer = %peer_fed, "accepted P2P connection");
                let (link, reader) = match PeerLink::split(stream) {
                    Ok(pair) => pair,
                    Err(err) => {
                        log_federate_error(my_fed, Some(peer_fed), &err);
                        continue;
                    }
                };
                peer_links.set_inbound(peer_fed, Arc::new(link));
                accepted += 1;

                let peer_links = peer_links.clone();
                let coordinator = coordinator.clone();
                children.push(thread::spawn(move || {
                    dispatcher::run_peer_dispatcher(my_fed, peer_fed, reader, coordinator, peer_links);
                }));
            }
            Err(err) => {
                log_federate_error(my_fed, None, &err);
            }
        }
    }

    for child in children {
        let _ = child.join();
    }
}

fn handshake_inbound(stream: &mut TcpStream, federation_id: &str) -> Result<FederateId, FederateError> {
    let tag_byte = match read_tag_byte(stream)? {
        ReadOutcome::Eof => return Err(FederateError::HangUp),
        ReadOutcome::Bytes(b) => b[0],
    };
    if Tag::from_byte(tag_byte) != Some(Tag::P2pSendingFedId) {
        let _ = write_message(
            stream,
            Tag::Reject,
            &crate::wire::encode_reject(crate::error::RejectReason::WrongServer),
        );
        return Err(FederateError::protocol(
            "p2p server",
            format!("expected P2P_SENDING_FED_ID, got tag {tag_byte}"),
        ));
    }

    let len_bytes = match read_exact(stream, 2)? {
        ReadOutcome::Bytes(b) => b,
        ReadOutcome::Eof => return Err(FederateError::HangUp),
    };
    let fed_id_value = u16::from_le_bytes([len_bytes[0], len_bytes[1]]);
    let fid_len = match read_exact(stream, 1)? {
        ReadOutcome::Bytes(b) => b[0] as usize,
        ReadOutcome::Eof => return Err(FederateError::HangUp),
    };
    let fid_bytes = match read_exact(stream, fid_len)? {
        ReadOutcome::Bytes(b) => b,
        ReadOutcome::Eof => return Err(FederateError::HangUp),
    };

    let frame = FedIdFrame {
        fed_id: FederateId::from(fed_id_value),
        federation_id: fid_bytes,
    };

    if frame.federation_id != federation_id.as_bytes() {
        tracing::warn!(peer = %frame.fed_id, "P2P peer presented a mismatched federation id");
        let _ = write_message(
            stream,
            Tag::Reject,
            &crate::wire::encode_reject(crate::error::RejectReason::FederationIdDoesNotMatch),
        );
        return Err(FederateError::Rejected(
            crate::error::RejectReason::FederationIdDoesNotMatch,
        ));
    }

    write_message(stream, Tag::Ack, &[])?;
    Ok(frame.fed_id)
}
