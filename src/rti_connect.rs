//! Component C: connect to the RTI.
//!
//! §4.C's bootstrap sequence: scan `starting_port .. starting_port +
//! port_range_limit` for a TCP listener that accepts our `FED_ID` frame,
//! retrying the whole scan up to `connect_num_retries` times with
//! `connect_retry_interval` between attempts. A `REJECT` whose reason is
//! "wrong endpoint" (federation id mismatch, or a server that isn't an RTI)
//! just means try the next port; anything else is fatal.

use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

use crate::config::{FederateConfig, RuntimeConstants};
use crate::error::FederateError;
use crate::links::RtiLink;
use crate::socket::{read_exact, read_tag_byte, write_message, ReadOutcome};
use crate::wire::{decode_reject, FedIdFrame, Tag};

/// Connect to the RTI and complete the `FED_ID`/`ACK` handshake (§4.C).
///
/// Returns the split [`RtiLink`] plus its read half, ready to be handed to
/// the RTI dispatcher thread (component F).
#[tracing::instrument(skip(config))]
pub fn connect_to_rti(config: &FederateConfig) -> Result<(RtiLink, TcpStream), FederateError> {
    let ports = candidate_ports(config.rti_port, &config.constants);

    for attempt in 0..config.constants.connect_num_retries {
        for &port in &ports {
            match try_one_port(config, port) {
                Ok(pair) => return Ok(pair),
                Err(err) if err.severity() == crate::error::Severity::Transient => {
                    tracing::debug!(port, attempt, %err, "RTI port candidate rejected, trying next");
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        tracing::warn!(
            attempt,
            retries_left = config.constants.connect_num_retries - attempt - 1,
            "no RTI found on any candidate port, retrying"
        );
        std::thread::sleep(config.constants.connect_retry_interval);
    }

    Err(FederateError::Timeout {
        attempts: config.constants.connect_num_retries,
    })
}

/// The ports to probe: a single fixed port if `rti_port != 0` (§4.C step
/// 1), otherwise `starting_port ..= starting_port + port_range_limit`
/// (§4.C step 1, P6: `PORT_RANGE_LIMIT+1` candidate ports per sweep).
fn candidate_ports(rti_port: u16, constants: &RuntimeConstants) -> Vec<u16> {
    if rti_port != 0 {
        vec![rti_port]
    } else {
        (0..=constants.port_range_limit)
            .map(|offset| constants.starting_port.wrapping_add(offset))
            .collect()
    }
}

fn try_one_port(config: &FederateConfig, port: u16) -> Result<(RtiLink, TcpStream), FederateError> {
    let addr = SocketAddr::new(std::net::IpAddr::V4(config.rti_host), port);
    let mut stream = TcpStream::connect_timeout(&addr, Duration::from_secs(1))?;

    let frame = FedIdFrame {
        fed_id: config.fed_id,
        federation_id: config.federation_id.as_bytes().to_vec(),
    };
    write_message(&mut stream, Tag::FedId, &frame.encode()?)?;

    let tag_byte = match read_tag_byte(&mut stream)? {
        ReadOutcome::Eof => return Err(FederateError::HangUp),
        ReadOutcome::Bytes(b) => b[0],
    };

    match Tag::from_byte(tag_byte) {
        Some(Tag::Ack) => {
            tracing::info!(port, "RTI accepted federation id");
            Ok(RtiLink::split(stream)?)
        }
        Some(Tag::Reject) => {
            let body = match read_exact(&mut stream, 1)? {
                ReadOutcome::Bytes(b) => b,
                ReadOutcome::Eof => return Err(FederateError::HangUp),
            };
            let reason = decode_reject(&body)?;
            Err(FederateError::Rejected(reason))
        }
        _ => Err(FederateError::protocol(
            "rti connect",
            format!("unexpected reply tag {tag_byte} to FED_ID"),
        )),
    }
}

/// Loopback convenience used by the demo binary and tests: a fixed single
/// port, no scanning, no retries.
pub fn connect_to_rti_fixed(
    fed_id: crate::ids::FederateId,
    federation_id: &str,
    host: Ipv4Addr,
    port: u16,
) -> Result<(RtiLink, TcpStream), FederateError> {
    let config = FederateConfig::new(fed_id, federation_id, host)
        .with_rti_port(port)
        .with_constants(RuntimeConstants::for_tests());
    connect_to_rti(&config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::FederateId;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn scenario1_bootstrap_ok() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let port = addr.port();

        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let _tag = read_tag_byte(&mut sock).unwrap();
            let len_byte = match read_exact(&mut sock, 2).unwrap() {
                ReadOutcome::Bytes(b) => b,
                ReadOutcome::Eof => panic!("eof"),
            };
            let _fed_id = u16::from_le_bytes([len_byte[0], len_byte[1]]);
            let fid_len = match read_exact(&mut sock, 1).unwrap() {
                ReadOutcome::Bytes(b) => b[0] as usize,
                ReadOutcome::Eof => panic!("eof"),
            };
            let _fid = read_exact(&mut sock, fid_len).unwrap();
            write_message(&mut sock, Tag::Ack, &[]).unwrap();
        });

        let result = connect_to_rti_fixed(FederateId::from(0), "fed-x", Ipv4Addr::LOCALHOST, port);
        assert!(result.is_ok());
        server.join().unwrap();
    }

    #[test]
    fn scenario2_wrong_federation_id_is_transient_and_retries_exhaust() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let port = addr.port();

        let server = thread::spawn(move || {
            for _ in 0..4 {
                if let Ok((mut sock, _)) = listener.accept() {
                    let _ = read_tag_byte(&mut sock);
                    let _ = read_exact(&mut sock, 2);
                    if let Ok(ReadOutcome::Bytes(b)) = read_exact(&mut sock, 1) {
                        let _ = read_exact(&mut sock, b[0] as usize);
                    }
                    let _ = write_message(
                        &mut sock,
                        Tag::Reject,
                        &crate::wire::encode_reject(crate::error::RejectReason::FederationIdDoesNotMatch),
                    );
                }
            }
        });

        let config = FederateConfig::new(FederateId::from(0), "fed-x", Ipv4Addr::LOCALHOST)
            .with_rti_port(port)
            .with_constants(RuntimeConstants::for_tests());
        let result = connect_to_rti(&config);
        assert!(matches!(result, Err(FederateError::Timeout { .. })));
        server.join().unwrap();
    }
}
