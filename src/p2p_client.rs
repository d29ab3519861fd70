//! Component E: dialing a peer's P2P listening socket.
//!
//! §4.E: ask the RTI where a peer federate is listening (`ADDRESS_QUERY`),
//! retrying at `address_query_retry_interval` while the reply's port is
//! `-1` ("not yet advertised"), then dial that address and perform the
//! `P2P_SENDING_FED_ID` handshake. The resulting [`PeerLink`] is registered
//! as this federate's outbound connection to `peer_fed`.

use std::net::{Ipv4Addr, SocketAddr, TcpStream};

use crate::config::{FederateConfig, RuntimeConstants};
use crate::error::FederateError;
use crate::ids::FederateId;
use crate::links::{PeerLink, RtiLink};
use crate::socket::{read_exact, read_tag_byte, write_message, ReadOutcome};
use crate::wire::{encode_address_query, AddressReply, FedIdFrame, Tag, ADDRESS_REPLY_LEN};

/// Resolve `peer_fed`'s P2P address by repeatedly asking the RTI, per
/// §4.E step 1. Blocks (sleeping `address_query_retry_interval` between
/// attempts) until the RTI reports a real port.
pub fn resolve_peer_address(
    rti: &RtiLink,
    rti_sock_for_reply: &mut TcpStream,
    peer_fed: FederateId,
    constants: &RuntimeConstants,
) -> Result<SocketAddr, FederateError> {
    for attempt in 0..constants.connect_num_retries {
        rti.send(Tag::AddressQuery, &encode_address_query(peer_fed))?;

        let body = match read_exact(rti_sock_for_reply, ADDRESS_REPLY_LEN)? {
            ReadOutcome::Bytes(b) => b,
            ReadOutcome::Eof => return Err(FederateError::HangUp),
        };
        let reply = AddressReply::decode(&body)?;

        if reply.port < 0 {
            tracing::debug!(peer = %peer_fed, attempt, "peer has not advertised its P2P port yet, retrying");
            std::thread::sleep(constants.address_query_retry_interval);
            continue;
        }

        let ip = Ipv4Addr::from(reply.ipv4.to_be_bytes());
        return Ok(SocketAddr::new(std::net::IpAddr::V4(ip), reply.port as u16));
    }
    Err(FederateError::Timeout {
        attempts: constants.connect_num_retries,
    })
}

/// Dial `addr` and perform the `P2P_SENDING_FED_ID` handshake as the
/// connecting side (§4.E step 2).
pub fn connect_to_peer(
    config: &FederateConfig,
    peer_fed: FederateId,
    addr: SocketAddr,
) -> Result<(PeerLink, TcpStream), FederateError> {
    for attempt in 0..config.constants.connect_num_retries {
        match try_connect_once(config, addr) {
            Ok(pair) => return Ok(pair),
            Err(err) if err.severity() == crate::error::Severity::Transient => {
                tracing::debug!(peer = %peer_fed, attempt, %err, "P2P connect attempt failed, retrying");
                std::thread::sleep(config.constants.connect_retry_interval);
            }
            Err(err) => return Err(err),
        }
    }
    Err(FederateError::Timeout {
        attempts: config.constants.connect_num_retries,
    })
}

fn try_connect_once(
    config: &FederateConfig,
    addr: SocketAddr,
) -> Result<(PeerLink, TcpStream), FederateError> {
    let mut stream = TcpStream::connect(addr)?;

    let frame = FedIdFrame {
        fed_id: config.fed_id,
        federation_id: config.federation_id.as_bytes().to_vec(),
    };
    write_message(&mut stream, Tag::P2pSendingFedId, &frame.encode()?)?;

    let tag_byte = match read_tag_byte(&mut stream)? {
        ReadOutcome::Eof => return Err(FederateError::HangUp),
        ReadOutcome::Bytes(b) => b[0],
    };
    match Tag::from_byte(tag_byte) {
        Some(Tag::Ack) => Ok(PeerLink::split(stream)?),
        Some(Tag::Reject) => {
            let body = match read_exact(&mut stream, 1)? {
                ReadOutcome::Bytes(b) => b,
                ReadOutcome::Eof => return Err(FederateError::HangUp),
            };
            Err(FederateError::Rejected(crate::wire::decode_reject(&body)?))
        }
        _ => Err(FederateError::protocol(
            "p2p client",
            format!("unexpected reply tag {tag_byte} to P2P_SENDING_FED_ID"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn connect_to_peer_completes_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let _tag = read_tag_byte(&mut sock).unwrap();
            let len = match read_exact(&mut sock, 2).unwrap() {
                ReadOutcome::Bytes(b) => b,
                ReadOutcome::Eof => panic!("eof"),
            };
            let _fed = u16::from_le_bytes([len[0], len[1]]);
            let fid_len = match read_exact(&mut sock, 1).unwrap() {
                ReadOutcome::Bytes(b) => b[0] as usize,
                ReadOutcome::Eof => panic!("eof"),
            };
            let _fid = read_exact(&mut sock, fid_len).unwrap();
            write_message(&mut sock, Tag::Ack, &[]).unwrap();
        });

        let config = FederateConfig::new(FederateId::from(1), "fed-x", Ipv4Addr::LOCALHOST)
            .with_constants(RuntimeConstants::for_tests());
        let result = connect_to_peer(&config, FederateId::from(2), addr);
        assert!(result.is_ok());
        server.join().unwrap();
    }

    #[test]
    fn resolve_peer_address_retries_until_advertised() {
        let listener2 = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr2 = listener2.local_addr().unwrap();
        let rti_server = thread::spawn(move || {
            let (mut sock, _) = listener2.accept().unwrap();
            // First reply: not yet advertised.
            let _tag = read_tag_byte(&mut sock).unwrap();
            let _body = read_exact(&mut sock, 2).unwrap();
            let not_ready = AddressReply { port: -1, ipv4: 0 };
            crate::socket::write_all(&mut sock, &not_ready.encode()).unwrap();
            // Second reply: advertised on port 4242, 127.0.0.1.
            let _tag = read_tag_byte(&mut sock).unwrap();
            let _body = read_exact(&mut sock, 2).unwrap();
            let ready = AddressReply {
                port: 4242,
                ipv4: u32::from_be_bytes([127, 0, 0, 1]),
            };
            crate::socket::write_all(&mut sock, &ready.encode()).unwrap();
            sock
        });

        let client_sock = TcpStream::connect(addr2).unwrap();
        let (rti_link, mut reply_reader) = RtiLink::split(client_sock).unwrap();

        let constants = RuntimeConstants::for_tests();
        let resolved =
            resolve_peer_address(&rti_link, &mut reply_reader, FederateId::from(2), &constants)
                .unwrap();
        assert_eq!(resolved.port(), 4242);

        rti_server.join().unwrap();
    }
}
