//! A minimal in-process RTI, used by this crate's own tests and by the
//! `rti_stub` demo binary. It implements just enough of the RTI side of
//! the protocol (§6) for a federation of test federates to bootstrap,
//! exchange a start time, and receive TAGs in response to NETs — it does
//! not implement the RTI's full tag-advance algorithm across many
//! federates, only a single-federate pass-through sufficient to exercise
//! this crate's own federate-side logic end to end.

use std::collections::HashMap;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::error::FederateError;
use crate::ids::FederateId;
use crate::socket::{read_exact, read_tag_byte, write_message, ReadOutcome};
use crate::time::Instant;
use crate::wire::{AddressReply, FedIdFrame, Tag, ADDRESS_REPLY_LEN};

/// Configuration for [`run_stub_rti`]: how many federates to admit and what
/// federation id to require.
#[derive(Debug, Clone)]
pub struct StubConfig {
    pub federation_id: String,
    pub number_of_federates: usize,
    pub start_time: Instant,
}

/// The advertised P2P address for one federate, as reported via
/// `ADDRESS_AD`. Used to answer `ADDRESS_QUERY` from other federates.
#[derive(Debug, Clone, Copy, Default)]
struct AdvertisedAddress {
    port: Option<u16>,
}

/// Bind a listener and run the stub RTI until `number_of_federates`
/// federates have connected, completed the handshake, and exchanged a
/// start time. Each federate connection is then serviced on its own
/// thread, answering `ADDRESS_QUERY`/`NEXT_EVENT_TIME` until the socket
/// closes.
pub fn run_stub_rti(listener: TcpListener, config: StubConfig) -> Result<(), FederateError> {
    let addresses: Arc<Mutex<HashMap<FederateId, AdvertisedAddress>>> =
        Arc::new(Mutex::new(HashMap::new()));
    let mut handles = Vec::new();

    for _ in 0..config.number_of_federates {
        let (mut sock, _) = listener.accept()?;
        let fed_id = handshake(&mut sock, &config.federation_id)?;
        tracing::info!(%fed_id, "stub RTI accepted federate");

        let addresses = addresses.clone();
        let start_time = config.start_time;
        handles.push(thread::spawn(move || {
            if let Err(err) = serve_federate(sock, fed_id, start_time, addresses) {
                tracing::warn!(%fed_id, %err, "stub RTI federate connection ended with an error");
            }
        }));
    }

    for handle in handles {
        let _ = handle.join();
    }
    Ok(())
}

fn handshake(sock: &mut TcpStream, federation_id: &str) -> Result<FederateId, FederateError> {
    let tag_byte = match read_tag_byte(sock)? {
        ReadOutcome::Eof => return Err(FederateError::HangUp),
        ReadOutcome::Bytes(b) => b[0],
    };
    if Tag::from_byte(tag_byte) != Some(Tag::FedId) {
        return Err(FederateError::protocol(
            "stub rti",
            format!("expected FED_ID, got tag {tag_byte}"),
        ));
    }
    let len = match read_exact(sock, 2)? {
        ReadOutcome::Bytes(b) => b,
        ReadOutcome::Eof => return Err(FederateError::HangUp),
    };
    let fed_id_value = u16::from_le_bytes([len[0], len[1]]);
    let fid_len = match read_exact(sock, 1)? {
        ReadOutcome::Bytes(b) => b[0] as usize,
        ReadOutcome::Eof => return Err(FederateError::HangUp),
    };
    let fid_bytes = match read_exact(sock, fid_len)? {
        ReadOutcome::Bytes(b) => b,
        ReadOutcome::Eof => return Err(FederateError::HangUp),
    };

    let frame = FedIdFrame {
        fed_id: FederateId::from(fed_id_value),
        federation_id: fid_bytes,
    };
    if frame.federation_id != federation_id.as_bytes() {
        write_message(
            sock,
            Tag::Reject,
            &crate::wire::encode_reject(crate::error::RejectReason::FederationIdDoesNotMatch),
        )?;
        return Err(FederateError::Rejected(
            crate::error::RejectReason::FederationIdDoesNotMatch,
        ));
    }

    write_message(sock, Tag::Ack, &[])?;
    Ok(frame.fed_id)
}

/// Service one federate connection after the handshake: answer
/// `ADDRESS_AD`/`ADDRESS_QUERY`, the `TIMESTAMP` exchange, and grant every
/// `NEXT_EVENT_TIME` immediately at the requested time (a trivial but
/// protocol-correct tag-advance policy for a federation with no other
/// active federates to wait on).
fn serve_federate(
    mut sock: TcpStream,
    fed_id: FederateId,
    start_time: Instant,
    addresses: Arc<Mutex<HashMap<FederateId, AdvertisedAddress>>>,
) -> Result<(), FederateError> {
    loop {
        let tag_byte = match read_tag_byte(&mut sock)? {
            ReadOutcome::Eof => return Ok(()),
            ReadOutcome::Bytes(b) => b[0],
        };
        let tag = Tag::from_byte(tag_byte).ok_or_else(|| {
            FederateError::protocol("stub rti", format!("unknown tag {tag_byte}"))
        })?;

        match tag {
            Tag::AddressAd => {
                let body = match read_exact(&mut sock, 2)? {
                    ReadOutcome::Bytes(b) => b,
                    ReadOutcome::Eof => return Err(FederateError::HangUp),
                };
                let port = u16::from_le_bytes([body[0], body[1]]);
                addresses
                    .lock()
                    .unwrap()
                    .insert(fed_id, AdvertisedAddress { port: Some(port) });
            }
            Tag::AddressQuery => {
                let body = match read_exact(&mut sock, 2)? {
                    ReadOutcome::Bytes(b) => b,
                    ReadOutcome::Eof => return Err(FederateError::HangUp),
                };
                let target = FederateId::from(u16::from_le_bytes([body[0], body[1]]));
                let reply = match addresses.lock().unwrap().get(&target).copied() {
                    Some(AdvertisedAddress { port: Some(port) }) => AddressReply {
                        port: port as i32,
                        ipv4: u32::from_be_bytes([127, 0, 0, 1]),
                    },
                    _ => AddressReply { port: -1, ipv4: 0 },
                };
                let encoded = reply.encode();
                debug_assert_eq!(encoded.len(), ADDRESS_REPLY_LEN);
                crate::socket::write_all(&mut sock, &encoded)?;
            }
            Tag::Timestamp => {
                let _body = read_exact(&mut sock, 8)?;
                let mut reply = Vec::with_capacity(8);
                crate::wire::put_i64(&mut reply, start_time.as_nanos());
                write_message(&mut sock, Tag::Timestamp, &reply)?;
            }
            Tag::NextEventTime => {
                let body = match read_exact(&mut sock, 8)? {
                    ReadOutcome::Bytes(b) => b,
                    ReadOutcome::Eof => return Err(FederateError::HangUp),
                };
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&body);
                let requested = i64::from_le_bytes(arr);
                let mut reply = Vec::with_capacity(8);
                crate::wire::put_i64(&mut reply, requested);
                write_message(&mut sock, Tag::TimeAdvanceGrant, &reply)?;
            }
            Tag::LogicalTimeComplete | Tag::Stop => {
                let _body = read_exact(&mut sock, 8)?;
            }
            other => {
                tracing::warn!(%fed_id, ?other, "stub RTI received an unhandled tag");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FederateConfig;
    use crate::ids::FederateId;
    use std::net::Ipv4Addr;

    #[test]
    fn scenario1_federate_bootstraps_against_stub_rti() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let port = addr.port();

        let rti_config = StubConfig {
            federation_id: "fed-x".to_string(),
            number_of_federates: 1,
            start_time: Instant::from_nanos(2_000_000_000),
        };
        let rti_handle = thread::spawn(move || run_stub_rti(listener, rti_config));

        let config = FederateConfig::new(FederateId::from(0), "fed-x", Ipv4Addr::LOCALHOST)
            .with_rti_port(port)
            .with_constants(crate::config::RuntimeConstants::for_tests());
        let (rti_link, _reader) = crate::rti_connect::connect_to_rti(&config).unwrap();
        drop(rti_link);

        rti_handle.join().unwrap().unwrap();
    }
}
