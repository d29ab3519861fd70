//! Federate-side runtime core for a distributed deterministic-simulation
//! federation.
//!
//! This crate implements the federate half of a Lingua-Franca-style
//! federated execution protocol: the handshake with a Runtime
//! Infrastructure (RTI) process, peer-to-peer socket setup, and the
//! time-advance coordination protocol (`NEXT_EVENT_TIME` /
//! `TIME_ADVANCE_GRANT` / `LOGICAL_TIME_COMPLETE` / `STOP`) that keeps a
//! federation of independently-scheduled federates logically consistent.
//! It does not implement a local discrete-event scheduler, code
//! generation, or the RTI itself — those are out of scope (see
//! [`event_queue::EventQueue`] for the scheduler boundary and
//! [`rti_stub`] for a minimal reference RTI used by this crate's own
//! tests).

#![doc = document_features::document_features!()]

pub mod bridge;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event_queue;
pub mod ids;
pub mod links;
pub mod orchestrator;
pub mod p2p_client;
pub mod p2p_server;
pub mod rti_connect;
pub mod socket;
pub mod time;
pub mod time_advance;
pub mod wire;

#[cfg(any(test, feature = "runner"))]
pub mod rti_stub;

pub use config::{FederateConfig, NeighborStructure, RuntimeConstants};
pub use error::{FederateError, RejectReason, Severity};
pub use event_queue::EventQueue;
pub use ids::{FederateId, PortId, TriggerId};
pub use orchestrator::FederateRuntime;
pub use time::Instant;
