//! The error taxonomy described in §7 of the specification: every fallible
//! public function in this crate returns `Result<_, FederateError>`.

use crate::ids::FederateId;

/// Cause codes sent in a `REJECT` frame (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The federation id sent in `FED_ID`/`P2P_SENDING_FED_ID` did not match.
    FederationIdDoesNotMatch,
    /// The peer answered as though it were a different kind of server
    /// (e.g. a federate connected to the RTI's P2P-only listener, or vice
    /// versa). Also used when a federate should retry against a different
    /// port during the bootstrap port scan.
    WrongServer,
    /// The federate id was outside `0..NUMBER_OF_FEDERATES`.
    FederateIdOutOfRange,
    /// The federate id had already been claimed by another connection.
    FederateIdInUse,
    /// Any other cause byte not recognized by this implementation.
    Other(u8),
}

impl RejectReason {
    pub(crate) fn to_wire(self) -> u8 {
        match self {
            RejectReason::FederationIdDoesNotMatch => 1,
            RejectReason::WrongServer => 2,
            RejectReason::FederateIdOutOfRange => 3,
            RejectReason::FederateIdInUse => 4,
            RejectReason::Other(b) => b,
        }
    }

    pub(crate) fn from_wire(b: u8) -> Self {
        match b {
            1 => RejectReason::FederationIdDoesNotMatch,
            2 => RejectReason::WrongServer,
            3 => RejectReason::FederateIdOutOfRange,
            4 => RejectReason::FederateIdInUse,
            other => RejectReason::Other(other),
        }
    }

    /// Whether this cause should be treated as "wrong endpoint, try the next
    /// port in the scan" (§4.C step 4, §7 item 3) rather than fatal.
    pub fn is_wrong_endpoint(self) -> bool {
        matches!(
            self,
            RejectReason::FederationIdDoesNotMatch | RejectReason::WrongServer
        )
    }
}

/// How a [`FederateError`] should be handled by a caller that is retrying a
/// bounded operation (the RTI connector's port scan, the P2P client's
/// connect-and-handshake loop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Worth retrying, subject to the caller's retry budget.
    Transient,
    /// Not worth retrying; the caller should give up (and, for the RTI
    /// socket specifically, the whole federate should abort per §7 item 5).
    Fatal,
}

/// The unified error type for this crate.
#[derive(Debug, thiserror::Error)]
pub enum FederateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol violation ({context}): {detail}")]
    Protocol {
        context: &'static str,
        detail: String,
    },

    #[error("rejected: {0:?}")]
    Rejected(RejectReason),

    #[error("retry budget exhausted after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("peer hung up before completing the handshake")]
    HangUp,
}

impl FederateError {
    /// Build a [`FederateError::Protocol`] error tagged with the call site's
    /// context, e.g. `"FED_ID handshake"`.
    pub fn protocol(context: &'static str, detail: impl Into<String>) -> Self {
        FederateError::Protocol {
            context,
            detail: detail.into(),
        }
    }

    /// Classify this error for the purposes of a bounded retry loop.
    pub fn severity(&self) -> Severity {
        match self {
            FederateError::Io(err) => match err.kind() {
                std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::WouldBlock
                | std::io::ErrorKind::Interrupted
                | std::io::ErrorKind::AddrNotAvailable => Severity::Transient,
                _ => Severity::Fatal,
            },
            FederateError::Rejected(reason) if reason.is_wrong_endpoint() => Severity::Transient,
            FederateError::Rejected(_) => Severity::Fatal,
            FederateError::Timeout { .. } => Severity::Fatal,
            FederateError::HangUp => Severity::Fatal,
            FederateError::Protocol { .. } => Severity::Fatal,
        }
    }
}

/// Attach the originating federate (and, where known, the remote peer) to a
/// tracing event for a [`FederateError`], per §7's "all user-visible error
/// reports must include `my_fed_id` and the peer id where applicable".
pub(crate) fn log_federate_error(
    my_fed: FederateId,
    peer: Option<FederateId>,
    err: &FederateError,
) {
    match peer {
        Some(peer) => {
            tracing::warn!(my_fed = %my_fed, peer = %peer, error = %err, "federate error");
        }
        None => {
            tracing::warn!(my_fed = %my_fed, error = %err, "federate error");
        }
    }
}
