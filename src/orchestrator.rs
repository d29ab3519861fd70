//! Component I: startup and shutdown orchestration.
//!
//! `FederateRuntime` owns every long-lived collaborator — the RTI link, the
//! P2P link table, the coordinator — and sequences the bring-up lifecycle
//! from §3: construct identity, connect to the RTI, open the P2P listener,
//! dial configured outbound peers, exchange `TIMESTAMP` and align on a
//! start time, then hand off to the RTI dispatcher thread for the run
//! itself.

use std::net::TcpStream;
use std::sync::Arc;
use std::thread;

use crate::config::FederateConfig;
use crate::dispatcher;
use crate::error::FederateError;
use crate::event_queue::EventQueue;
use crate::links::{PeerLinks, RtiLink};
use crate::p2p_client;
use crate::p2p_server;
use crate::rti_connect;
use crate::socket::{read_exact, read_tag_byte, ReadOutcome};
use crate::time::Instant;
use crate::time_advance::Coordinator;
use crate::wire::Tag;

/// The fully wired-up runtime for one federate. Built by
/// [`FederateRuntime::start`], which runs the entire bring-up sequence
/// synchronously and returns only once the federate has joined the
/// federation, aligned its clock with the other federates, and started the
/// RTI dispatcher thread.
pub struct FederateRuntime<Q: EventQueue> {
    pub config: FederateConfig,
    pub coordinator: Arc<Coordinator<Q>>,
    pub peer_links: Arc<PeerLinks>,
    pub start_time: Instant,
}

impl<Q: EventQueue + 'static> FederateRuntime<Q> {
    /// Run the full startup sequence (§3 steps 1-7, §4.I) and return a
    /// runtime ready for the simulation loop.
    #[tracing::instrument(skip(config, event_queue), fields(fed_id = %config.fed_id))]
    pub fn start(config: FederateConfig, event_queue: Arc<Q>) -> Result<Self, FederateError> {
        let my_fed = config.fed_id;

        // Step 2: connect to the RTI.
        let (rti_link, mut rti_read_half) = rti_connect::connect_to_rti(&config)?;
        let rti_link = Arc::new(rti_link);
        tracing::info!(my_fed = %my_fed, "joined federation");

        let coordinator = Arc::new(Coordinator::new(
            my_fed,
            &config.neighbors,
            event_queue,
            rti_link.clone(),
        ));
        let peer_links = Arc::new(PeerLinks::new());

        // Step 3-4: advertise the P2P port and spawn the accept loop, but
        // only if this federate actually expects inbound P2P peers (§4.D:
        // "Called only if num_inbound_physical > 0").
        let num_inbound_physical = config.neighbors.num_inbound_physical;
        if num_inbound_physical > 0 {
            let (listener, _port) = p2p_server::bind_and_advertise(
                my_fed,
                &rti_link,
                config.p2p_port,
                &config.constants,
            )?;
            let federation_id = config.federation_id.clone();
            let peer_links = peer_links.clone();
            let coordinator = coordinator.clone();
            thread::Builder::new()
                .name(format!("p2p-accept-{my_fed}"))
                .spawn(move || {
                    p2p_server::accept_loop(
                        my_fed,
                        federation_id,
                        listener,
                        num_inbound_physical,
                        peer_links,
                        coordinator,
                    )
                })
                .expect("failed to spawn P2P accept loop");
        }

        // Step 5: dial configured outbound peers, resolving each address via
        // the RTI socket's read half before the dispatcher thread claims it.
        // Per §4.E step 2 / §7 item 4 / §9 open question 3, a peer this
        // federate cannot reach is a *soft* failure: log it and proceed
        // without that outbound link rather than aborting startup.
        for &peer in &config.neighbors.outbound_physical {
            let addr = match p2p_client::resolve_peer_address(
                &rti_link,
                &mut rti_read_half,
                peer,
                &config.constants,
            ) {
                Ok(addr) => addr,
                Err(err) => {
                    crate::error::log_federate_error(my_fed, Some(peer), &err);
                    continue;
                }
            };
            let (link, reader) = match p2p_client::connect_to_peer(&config, peer, addr) {
                Ok(pair) => pair,
                Err(err) => {
                    crate::error::log_federate_error(my_fed, Some(peer), &err);
                    continue;
                }
            };
            peer_links.set_outbound(peer, Arc::new(link));

            let peer_links = peer_links.clone();
            let coordinator = coordinator.clone();
            thread::Builder::new()
                .name(format!("peer-dispatch-{my_fed}-{peer}"))
                .spawn(move || dispatcher::run_peer_dispatcher(my_fed, peer, reader, coordinator, peer_links))
                .expect("failed to spawn peer dispatcher thread");
        }

        // Step 6: TIMESTAMP exchange and start-time alignment.
        let start_time = exchange_start_time(&rti_link, &mut rti_read_half)?;

        // Step 7: spawn the RTI dispatcher thread, handing it the read half
        // used for the direct reads above.
        {
            let coordinator = coordinator.clone();
            thread::Builder::new()
                .name(format!("rti-dispatch-{my_fed}"))
                .spawn(move || dispatcher::run_rti_dispatcher(my_fed, rti_read_half, coordinator))
                .expect("failed to spawn RTI dispatcher thread");
        }

        // Step 8: align physical clocks, unless running in fast-forward mode.
        if !config.fast_forward {
            wait_until(start_time);
        }

        Ok(FederateRuntime {
            config,
            coordinator,
            peer_links,
            start_time,
        })
    }

    /// §3 step 10: request a federation-wide stop and wait for this
    /// federate's own logical time to catch up to it. Callers still need to
    /// drain their local event queue down to `stop_time` themselves; this
    /// only handles the RTI side of the handshake.
    pub fn request_stop(&self) -> Result<(), FederateError> {
        self.coordinator
            .broadcast_stop(self.coordinator.current_logical_time())
    }
}

/// §4.I's `synchronize_with_other_federates`: send `TIMESTAMP |
/// start_physical`, read the RTI's `TIMESTAMP | start_time` reply.
fn exchange_start_time(rti: &RtiLink, rti_read_half: &mut TcpStream) -> Result<Instant, FederateError> {
    let start_physical = Instant::now_physical();
    let mut body = Vec::with_capacity(8);
    crate::wire::put_i64(&mut body, start_physical.as_nanos());
    rti.send(Tag::Timestamp, &body)?;

    let tag_byte = match read_tag_byte(rti_read_half)? {
        ReadOutcome::Eof => return Err(FederateError::HangUp),
        ReadOutcome::Bytes(b) => b[0],
    };
    if Tag::from_byte(tag_byte) != Some(Tag::Timestamp) {
        return Err(FederateError::protocol(
            "synchronize_with_other_federates",
            format!("expected TIMESTAMP reply, got tag {tag_byte}"),
        ));
    }
    let body = match read_exact(rti_read_half, 8)? {
        ReadOutcome::Bytes(b) => b,
        ReadOutcome::Eof => return Err(FederateError::HangUp),
    };
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&body);
    let start_time = Instant::from_nanos(i64::from_le_bytes(arr));
    tracing::info!(%start_time, "negotiated federation start time");
    Ok(start_time)
}

/// Block the calling thread until the platform clock reaches `t`, sleeping
/// in short increments (so a future shutdown signal could be layered on top
/// without this loop needing to change).
fn wait_until(t: Instant) {
    loop {
        let now = Instant::now_physical();
        if now >= t {
            return;
        }
        let remaining_ns = t.signed_duration_since(now).max(0) as u64;
        let step = std::time::Duration::from_nanos(remaining_ns).min(std::time::Duration::from_millis(50));
        thread::sleep(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConstants;
    use crate::error::RejectReason;
    use crate::ids::FederateId;
    use crate::socket::write_message as wire_write_message;
    use crate::wire::encode_reject;
    use std::net::{Ipv4Addr, TcpListener};

    #[test]
    fn scenario3_start_time_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let _tag = read_tag_byte(&mut sock).unwrap();
            let _body = read_exact(&mut sock, 8).unwrap();
            wire_write_message(&mut sock, Tag::Timestamp, &{
                let mut b = Vec::new();
                crate::wire::put_i64(&mut b, 2_000_000_000);
                b
            })
            .unwrap();
        });

        let client = TcpStream::connect(addr).unwrap();
        let (rti_link, mut reader) = RtiLink::split(client).unwrap();
        let start_time = exchange_start_time(&rti_link, &mut reader).unwrap();
        assert_eq!(start_time, Instant::from_nanos(2_000_000_000));
        server.join().unwrap();
    }

    #[test]
    fn scenario2_rejected_federation_id_surfaces_as_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let port = addr.port();

        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let _tag = read_tag_byte(&mut sock).unwrap();
            let _fed = read_exact(&mut sock, 2).unwrap();
            let fid_len = match read_exact(&mut sock, 1).unwrap() {
                ReadOutcome::Bytes(b) => b[0] as usize,
                ReadOutcome::Eof => panic!("eof"),
            };
            let _fid = read_exact(&mut sock, fid_len).unwrap();
            wire_write_message(
                &mut sock,
                Tag::Reject,
                &encode_reject(RejectReason::FederationIdDoesNotMatch),
            )
            .unwrap();
        });

        let config = FederateConfig::new(FederateId::from(0), "fed-x", Ipv4Addr::LOCALHOST)
            .with_rti_port(port)
            .with_constants(RuntimeConstants {
                connect_num_retries: 1,
                ..RuntimeConstants::for_tests()
            });
        let result = rti_connect::connect_to_rti(&config);
        assert!(result.is_err());
        server.join().unwrap();
    }
}
