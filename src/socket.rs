//! Component B: bounded socket I/O with fatal/retryable/EOF classification.
//!
//! Short reads and writes are looped internally; callers never see a partial
//! result. There are no read/write timeouts at this layer (§4.B) — every
//! socket handled by this crate has a thread dedicated to reading it, so a
//! blocking read only ever blocks that one thread.

use std::io::{Read, Write};
use std::net::TcpStream;

use crate::error::FederateError;

/// The outcome of a framed read: either the expected number of bytes, a
/// clean end-of-stream observed before any bytes were read, or a fatal I/O
/// error. See §4.B and §7 item 4/5: callers decide whether `Eof` is normal
/// teardown (a peer socket) or fatal (the RTI socket).
pub enum ReadOutcome {
    Bytes(Vec<u8>),
    Eof,
}

/// Read exactly `n` bytes from `sock`, looping over short reads.
///
/// Returns [`ReadOutcome::Eof`] only if the stream was already at
/// end-of-file before any byte of this call was read; an EOF in the middle
/// of a frame is a [`FederateError::Protocol`] (a malformed/truncated
/// frame), not a clean teardown.
pub fn read_exact(sock: &mut TcpStream, n: usize) -> Result<ReadOutcome, FederateError> {
    let mut buf = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        match sock.read(&mut buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(ReadOutcome::Eof);
                }
                return Err(FederateError::protocol(
                    "read_exact",
                    format!("connection closed after {filled} of {n} bytes"),
                ));
            }
            Ok(k) => filled += k,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(FederateError::Io(err)),
        }
    }
    Ok(ReadOutcome::Bytes(buf))
}

/// Read a single tag byte. Distinguished from [`read_exact`] because it is
/// the read that dispatcher loops (component F) use to detect a clean EOF
/// between messages.
pub fn read_tag_byte(sock: &mut TcpStream) -> Result<ReadOutcome, FederateError> {
    read_exact(sock, 1)
}

/// Write the full contents of `bytes` to `sock`, looping over short writes.
pub fn write_all(sock: &mut TcpStream, bytes: &[u8]) -> Result<(), FederateError> {
    let mut written = 0;
    while written < bytes.len() {
        match sock.write(&bytes[written..]) {
            Ok(0) => {
                return Err(FederateError::protocol(
                    "write_all",
                    "write returned 0 bytes written",
                ))
            }
            Ok(k) => written += k,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(FederateError::Io(err)),
        }
    }
    Ok(())
}

/// Write a tag byte followed by a frame body in one call, so callers never
/// interleave a partial tag+frame with another writer on the same socket
/// (I3: exactly one outbound write at a time per socket, enforced here at
/// the call-site granularity plus the coordinator's mutex for the RTI
/// socket).
pub fn write_message(
    sock: &mut TcpStream,
    tag: crate::wire::Tag,
    body: &[u8],
) -> Result<(), FederateError> {
    let mut framed = Vec::with_capacity(1 + body.len());
    framed.push(tag.to_byte());
    framed.extend_from_slice(body);
    write_all(sock, &framed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn read_exact_loops_over_short_writes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let writer = thread::spawn(move || {
            let mut client = TcpStream::connect(addr).unwrap();
            // Write one byte at a time to force read_exact to loop.
            for b in [1u8, 2, 3, 4] {
                client.write_all(&[b]).unwrap();
                thread::yield_now();
            }
        });

        let (mut server, _) = listener.accept().unwrap();
        match read_exact(&mut server, 4).unwrap() {
            ReadOutcome::Bytes(bytes) => assert_eq!(bytes, vec![1, 2, 3, 4]),
            ReadOutcome::Eof => panic!("unexpected EOF"),
        }
        writer.join().unwrap();
    }

    #[test]
    fn read_exact_reports_clean_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let writer = thread::spawn(move || {
            let _client = TcpStream::connect(addr).unwrap();
            // Drop immediately without writing anything.
        });

        let (mut server, _) = listener.accept().unwrap();
        writer.join().unwrap();
        match read_exact(&mut server, 4).unwrap() {
            ReadOutcome::Eof => {}
            ReadOutcome::Bytes(_) => panic!("expected EOF"),
        }
    }

    #[test]
    fn truncated_frame_is_protocol_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let writer = thread::spawn(move || {
            let mut client = TcpStream::connect(addr).unwrap();
            client.write_all(&[1, 2]).unwrap();
            // Shut down the write half so the server sees a mid-frame EOF.
            client.shutdown(std::net::Shutdown::Write).unwrap();
            thread::sleep(std::time::Duration::from_millis(50));
        });

        let (mut server, _) = listener.accept().unwrap();
        let result = read_exact(&mut server, 4);
        assert!(result.is_err());
        writer.join().unwrap();
    }
}
