//! Component A: fixed-width little-endian wire codec.
//!
//! Every message on the wire is a single tag byte (see [`Tag`]) optionally
//! followed by a fixed-format frame. All multi-byte primitives are
//! little-endian regardless of host endianness — callers must go through
//! `read_*`/`write_*` here rather than transmuting host integers directly,
//! exactly per §4.A and §9's endianness note. Decode functions are total:
//! malformed input is reported as [`FederateError::Protocol`], never a panic.

use crate::error::{FederateError, RejectReason};
use crate::ids::{FederateId, PortId};
use crate::time::Instant;

/// One-byte message tags, per §6. Concrete values only need to be stable
/// across the federates and RTI built from this crate; they are not meant
/// to match any other implementation's byte assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    FedId = 1,
    Ack = 2,
    Reject = 3,
    AddressAd = 4,
    AddressQuery = 5,
    Timestamp = 6,
    TimedMessage = 7,
    NextEventTime = 8,
    LogicalTimeComplete = 9,
    TimeAdvanceGrant = 10,
    Stop = 11,
    P2pSendingFedId = 12,
    P2pTimedMessage = 13,
}

impl Tag {
    pub fn from_byte(b: u8) -> Option<Tag> {
        Some(match b {
            1 => Tag::FedId,
            2 => Tag::Ack,
            3 => Tag::Reject,
            4 => Tag::AddressAd,
            5 => Tag::AddressQuery,
            6 => Tag::Timestamp,
            7 => Tag::TimedMessage,
            8 => Tag::NextEventTime,
            9 => Tag::LogicalTimeComplete,
            10 => Tag::TimeAdvanceGrant,
            11 => Tag::Stop,
            12 => Tag::P2pSendingFedId,
            13 => Tag::P2pTimedMessage,
            _ => return None,
        })
    }

    pub const fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Maximum length of a `federation_id`, per §4.A (`fid_len` is a `u8`).
pub const MAX_FEDERATION_ID_LEN: usize = 255;

// ---- primitive encode/decode -----------------------------------------

pub fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn put_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn take<'a>(buf: &mut &'a [u8], n: usize, what: &'static str) -> Result<&'a [u8], FederateError> {
    if buf.len() < n {
        return Err(FederateError::protocol(
            what,
            format!("expected {n} bytes, got {}", buf.len()),
        ));
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

pub fn get_u16(buf: &mut &[u8]) -> Result<u16, FederateError> {
    let b = take(buf, 2, "u16")?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

pub fn get_u32(buf: &mut &[u8]) -> Result<u32, FederateError> {
    let b = take(buf, 4, "u32")?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub fn get_i32(buf: &mut &[u8]) -> Result<i32, FederateError> {
    let b = take(buf, 4, "i32")?;
    Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub fn get_i64(buf: &mut &[u8]) -> Result<i64, FederateError> {
    let b = take(buf, 8, "i64")?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(b);
    Ok(i64::from_le_bytes(arr))
}

// ---- frame bodies -------------------------------------------------------

/// Body of a `FED_ID` / `P2P_SENDING_FED_ID` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FedIdFrame {
    pub fed_id: FederateId,
    pub federation_id: Vec<u8>,
}

impl FedIdFrame {
    pub fn encode(&self) -> Result<Vec<u8>, FederateError> {
        if self.federation_id.len() > MAX_FEDERATION_ID_LEN {
            return Err(FederateError::protocol(
                "FED_ID",
                format!(
                    "federation id of {} bytes exceeds {MAX_FEDERATION_ID_LEN}",
                    self.federation_id.len()
                ),
            ));
        }
        let mut buf = Vec::with_capacity(3 + self.federation_id.len());
        put_u16(&mut buf, self.fed_id.value());
        buf.push(self.federation_id.len() as u8);
        buf.extend_from_slice(&self.federation_id);
        Ok(buf)
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, FederateError> {
        let fed_id = FederateId::from(get_u16(&mut buf)?);
        let fid_len = *take(&mut buf, 1, "FED_ID.fid_len")?.first().unwrap() as usize;
        let federation_id = take(&mut buf, fid_len, "FED_ID.federation_id")?.to_vec();
        Ok(FedIdFrame {
            fed_id,
            federation_id,
        })
    }
}

/// Header of a `TIMED_MESSAGE` / `P2P_TIMED_MESSAGE` frame, i.e. everything
/// but the payload bytes. Exactly 16 bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedMessageHeader {
    pub port_id: PortId,
    pub dest_fed: FederateId,
    pub length: u32,
    pub timestamp: Instant,
}

pub const TIMED_MESSAGE_HEADER_LEN: usize = 16;

impl TimedMessageHeader {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        put_u16(buf, self.port_id.value());
        put_u16(buf, self.dest_fed.value());
        put_u32(buf, self.length);
        put_i64(buf, self.timestamp.as_nanos());
    }

    pub fn decode(buf: &mut &[u8]) -> Result<Self, FederateError> {
        let port_id = PortId::from(get_u16(buf)?);
        let dest_fed = FederateId::from(get_u16(buf)?);
        let length = get_u32(buf)?;
        let timestamp = Instant::from_nanos(get_i64(buf)?);
        Ok(TimedMessageHeader {
            port_id,
            dest_fed,
            length,
            timestamp,
        })
    }
}

/// A decoded timed message: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedMessage {
    pub header: TimedMessageHeader,
    pub payload: Vec<u8>,
}

impl TimedMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(TIMED_MESSAGE_HEADER_LEN + self.payload.len());
        self.header.encode(&mut buf);
        buf.extend_from_slice(&self.payload);
        buf
    }
}

/// Encode a `REJECT` frame body (the single cause byte).
pub fn encode_reject(reason: RejectReason) -> Vec<u8> {
    vec![reason.to_wire()]
}

pub fn decode_reject(buf: &[u8]) -> Result<RejectReason, FederateError> {
    let mut buf = buf;
    let b = take(&mut buf, 1, "REJECT.cause")?[0];
    Ok(RejectReason::from_wire(b))
}

/// Encode an `ADDRESS_QUERY` frame body (the target federate id).
pub fn encode_address_query(target: FederateId) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2);
    put_u16(&mut buf, target.value());
    buf
}

pub fn decode_address_query(buf: &[u8]) -> Result<FederateId, FederateError> {
    let mut buf = buf;
    Ok(FederateId::from(get_u16(&mut buf)?))
}

/// The raw, tag-less reply to `ADDRESS_QUERY`: `port:i32 | ipv4:u32`. This
/// asymmetry (no leading tag byte) is preserved from the specification's
/// §6/§9 interop note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressReply {
    /// `-1` means "not yet advertised, retry".
    pub port: i32,
    pub ipv4: u32,
}

pub const ADDRESS_REPLY_LEN: usize = 8;

impl AddressReply {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ADDRESS_REPLY_LEN);
        put_i32(&mut buf, self.port);
        put_u32(&mut buf, self.ipv4);
        buf
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, FederateError> {
        let port = get_i32(&mut buf)?;
        let ipv4 = get_u32(&mut buf)?;
        Ok(AddressReply { port, ipv4 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p4_u16_roundtrip() {
        for v in [0u16, 1, 0x1234, u16::MAX] {
            let mut buf = Vec::new();
            put_u16(&mut buf, v);
            let mut slice = &buf[..];
            assert_eq!(get_u16(&mut slice).unwrap(), v);
            assert!(slice.is_empty());
        }
    }

    #[test]
    fn p4_u32_roundtrip() {
        for v in [0u32, 1, 0xdead_beef, u32::MAX] {
            let mut buf = Vec::new();
            put_u32(&mut buf, v);
            let mut slice = &buf[..];
            assert_eq!(get_u32(&mut slice).unwrap(), v);
        }
    }

    #[test]
    fn p4_i64_roundtrip() {
        for v in [0i64, -1, i64::MIN, i64::MAX, 123_456_789] {
            let mut buf = Vec::new();
            put_i64(&mut buf, v);
            let mut slice = &buf[..];
            assert_eq!(get_i64(&mut slice).unwrap(), v);
        }
    }

    #[test]
    fn wire_bytes_are_little_endian_on_this_host() {
        // Regardless of host endianness, 0x0102 must be encoded as [02, 01].
        let mut buf = Vec::new();
        put_u16(&mut buf, 0x0102);
        assert_eq!(buf, vec![0x02, 0x01]);
    }

    #[test]
    fn p5_timed_message_roundtrip() {
        let msg = TimedMessage {
            header: TimedMessageHeader {
                port_id: PortId::from(7),
                dest_fed: FederateId::from(3),
                length: 4,
                timestamp: Instant::from_nanos(123_456),
            },
            payload: b"DATA".to_vec(),
        };
        let encoded = msg.encode();
        let mut slice = &encoded[..];
        let header = TimedMessageHeader::decode(&mut slice).unwrap();
        let payload = slice[..header.length as usize].to_vec();
        assert_eq!(header, msg.header);
        assert_eq!(payload, msg.payload);
    }

    #[test]
    fn fed_id_frame_roundtrip() {
        let frame = FedIdFrame {
            fed_id: FederateId::from(3),
            federation_id: b"x".to_vec(),
        };
        let encoded = frame.encode().unwrap();
        assert_eq!(encoded, vec![0x03, 0x00, 0x01, b'x']);
        assert_eq!(FedIdFrame::decode(&encoded).unwrap(), frame);
    }

    #[test]
    fn fed_id_frame_rejects_oversized_federation_id() {
        let frame = FedIdFrame {
            fed_id: FederateId::from(0),
            federation_id: vec![0u8; MAX_FEDERATION_ID_LEN + 1],
        };
        assert!(frame.encode().is_err());
    }

    #[test]
    fn short_buffer_is_protocol_error_not_panic() {
        let mut slice: &[u8] = &[0x01];
        assert!(get_u16(&mut slice).is_err());
    }

    #[test]
    fn address_reply_roundtrip() {
        let reply = AddressReply {
            port: -1,
            ipv4: 0x7f00_0001,
        };
        let encoded = reply.encode();
        assert_eq!(encoded.len(), ADDRESS_REPLY_LEN);
        assert_eq!(AddressReply::decode(&encoded).unwrap(), reply);
    }
}
