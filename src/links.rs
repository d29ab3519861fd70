//! §3 data model: `RtiLink` and `PeerLinks`, the socket ownership types.
//!
//! Each link wraps its write half in its own mutex so that outbound writes
//! are serialized per socket (I3) without forcing every writer through the
//! coordinator's global mutex. The read half is handed to a dedicated
//! dispatcher thread (component F) as a separate, unsynchronized clone —
//! exactly one thread ever reads a given socket.

use std::collections::HashMap;
use std::net::TcpStream;

use parking_lot::Mutex;

use crate::error::FederateError;
use crate::ids::FederateId;
use crate::socket;
use crate::wire::Tag;

/// Exclusive owner of the one TCP connection to the RTI (§3).
pub struct RtiLink {
    writer: Mutex<TcpStream>,
}

impl RtiLink {
    /// Split a freshly-handshaken RTI connection into the `RtiLink` (for
    /// senders) and an independent read-half clone (for the dispatcher
    /// thread, component F).
    pub fn split(stream: TcpStream) -> Result<(RtiLink, TcpStream), FederateError> {
        let reader = stream.try_clone()?;
        Ok((
            RtiLink {
                writer: Mutex::new(stream),
            },
            reader,
        ))
    }

    /// Send a tagged message to the RTI. Blocks if another thread is
    /// currently writing to this socket (I3).
    pub fn send(&self, tag: Tag, body: &[u8]) -> Result<(), FederateError> {
        let mut sock = self.writer.lock();
        socket::write_message(&mut sock, tag, body)
    }
}

/// A single P2P connection to a peer federate, in whichever direction it was
/// established.
pub struct PeerLink {
    writer: Mutex<TcpStream>,
}

impl PeerLink {
    pub fn split(stream: TcpStream) -> Result<(PeerLink, TcpStream), FederateError> {
        let reader = stream.try_clone()?;
        Ok((
            PeerLink {
                writer: Mutex::new(stream),
            },
            reader,
        ))
    }

    pub fn send(&self, tag: Tag, body: &[u8]) -> Result<(), FederateError> {
        let mut sock = self.writer.lock();
        socket::write_message(&mut sock, tag, body)
    }
}

/// The two fed-id-keyed socket maps from §3: `inbound` (peers that dialed
/// us) and `outbound` (peers we dialed). Every slot starts absent; entries
/// are never replaced once present, only removed (`inbound`, on EOF) or
/// left in place until process exit (`outbound`).
#[derive(Default)]
pub struct PeerLinks {
    inbound: Mutex<HashMap<FederateId, std::sync::Arc<PeerLink>>>,
    outbound: Mutex<HashMap<FederateId, std::sync::Arc<PeerLink>>>,
}

impl PeerLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_inbound(&self, fed: FederateId, link: std::sync::Arc<PeerLink>) {
        self.inbound.lock().insert(fed, link);
    }

    /// Clear an inbound slot on EOF/error (§3, §4.F).
    pub fn clear_inbound(&self, fed: FederateId) {
        self.inbound.lock().remove(&fed);
    }

    pub fn inbound(&self, fed: FederateId) -> Option<std::sync::Arc<PeerLink>> {
        self.inbound.lock().get(&fed).cloned()
    }

    pub fn set_outbound(&self, fed: FederateId, link: std::sync::Arc<PeerLink>) {
        self.outbound.lock().insert(fed, link);
    }

    pub fn outbound(&self, fed: FederateId) -> Option<std::sync::Arc<PeerLink>> {
        self.outbound.lock().get(&fed).cloned()
    }
}
