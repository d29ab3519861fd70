//! Component K (§10.2): the configuration surface. Follows the teacher's
//! plain-struct-plus-builder-setter style (`Config::new(..).with_x(..)`)
//! rather than a derive-heavy external configuration crate — there is
//! nothing here that benefits from file/env layering, just a handful of
//! federation-wide constants and per-federate identity.

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::ids::FederateId;

/// The wire/retry constants named in §6. Defaults match the specification's
/// suggested values for a Lingua-Franca-style federation; tests override
/// `connect_retry_interval`/`address_query_retry_interval` to keep retry
/// loops fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConstants {
    pub starting_port: u16,
    pub port_range_limit: u16,
    pub connect_num_retries: u32,
    pub connect_retry_interval: Duration,
    pub address_query_retry_interval: Duration,
    pub buffer_size: usize,
}

impl Default for RuntimeConstants {
    fn default() -> Self {
        RuntimeConstants {
            starting_port: 15045,
            port_range_limit: 1024,
            connect_num_retries: 500,
            connect_retry_interval: Duration::from_secs(2),
            address_query_retry_interval: Duration::from_nanos(250_000_000),
            buffer_size: 8192,
        }
    }
}

impl RuntimeConstants {
    /// Constants tuned for fast local tests: small retry budgets and
    /// near-zero sleeps, so a test exercising the retry paths in §4.C/§4.E
    /// does not take real wall-clock minutes to run.
    pub fn for_tests() -> Self {
        RuntimeConstants {
            starting_port: 0,
            port_range_limit: 8,
            connect_num_retries: 4,
            connect_retry_interval: Duration::from_millis(5),
            address_query_retry_interval: Duration::from_millis(1),
            buffer_size: 4096,
        }
    }

    pub fn with_starting_port(mut self, port: u16) -> Self {
        self.starting_port = port;
        self
    }

    pub fn with_port_range_limit(mut self, limit: u16) -> Self {
        self.port_range_limit = limit;
        self
    }
}

/// The upstream/downstream/physical topology of a single federate, as known
/// to it at construction time (derived, in a full system, from code
/// generation reading the federation's connection graph — out of scope here
/// per §1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighborStructure {
    /// Federates with a time-coordinated connection feeding into this one.
    pub upstream: Vec<FederateId>,
    /// Federates with a time-coordinated connection fed by this one.
    pub downstream: Vec<FederateId>,
    /// Number of inbound P2P (physical) links this federate should accept.
    pub num_inbound_physical: usize,
    /// Peers this federate should dial P2P (physical) links to.
    pub outbound_physical: Vec<FederateId>,
}

impl NeighborStructure {
    pub fn has_upstream(&self) -> bool {
        !self.upstream.is_empty()
    }

    pub fn has_downstream(&self) -> bool {
        !self.downstream.is_empty()
    }
}

/// Per-federate identity and addressing configuration (component K).
#[derive(Debug, Clone)]
pub struct FederateConfig {
    pub fed_id: FederateId,
    pub federation_id: String,
    pub rti_host: Ipv4Addr,
    /// `0` means "unspecified, scan the port range" (§4.C step 1).
    pub rti_port: u16,
    /// The P2P listening port to bind (component D). `0` means
    /// "unspecified, scan the port range", mirroring `rti_port` and §4.C
    /// per §4.D ("port selection mirrors §4.C").
    pub p2p_port: u16,
    pub neighbors: NeighborStructure,
    /// Run in fast (non-real-time) mode: skip `wait_until(start_time)` in
    /// the orchestrator (§4.I step 5).
    pub fast_forward: bool,
    pub constants: RuntimeConstants,
}

impl FederateConfig {
    pub fn new(fed_id: FederateId, federation_id: impl Into<String>, rti_host: Ipv4Addr) -> Self {
        FederateConfig {
            fed_id,
            federation_id: federation_id.into(),
            rti_host,
            rti_port: 0,
            p2p_port: 0,
            neighbors: NeighborStructure::default(),
            fast_forward: false,
            constants: RuntimeConstants::default(),
        }
    }

    pub fn with_rti_port(mut self, port: u16) -> Self {
        self.rti_port = port;
        self
    }

    pub fn with_p2p_port(mut self, port: u16) -> Self {
        self.p2p_port = port;
        self
    }

    pub fn with_neighbors(mut self, neighbors: NeighborStructure) -> Self {
        self.neighbors = neighbors;
        self
    }

    pub fn with_fast_forward(mut self, fast_forward: bool) -> Self {
        self.fast_forward = fast_forward;
        self
    }

    pub fn with_constants(mut self, constants: RuntimeConstants) -> Self {
        self.constants = constants;
        self
    }
}
