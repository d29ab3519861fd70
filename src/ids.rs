//! Lightweight identifiers exchanged with the RTI and peers.
//!
//! These mirror the `u16` wire widths from the specification directly rather
//! than going through a slotmap-style key allocator: a federation's federate
//! and port counts are small and assigned out of band (by the federation's
//! configuration), so a thin `u16` newtype is all the indexing the protocol
//! needs. [`FederateId`] doubles as the key type for the socket maps in
//! [`crate::links::PeerLinks`].

use std::fmt;

macro_rules! u16_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(pub u16);

        impl $name {
            /// The raw wire value of this identifier.
            pub const fn value(self) -> u16 {
                self.0
            }
        }

        impl From<u16> for $name {
            fn from(v: u16) -> Self {
                $name(v)
            }
        }

        impl From<$name> for u16 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

u16_id!(
    /// The identity of a federate within a federation, assigned out of band.
    FederateId
);

u16_id!(
    /// A network input port identifier, unique within the receiving federate.
    PortId
);

/// Opaque handle returned by `trigger_for_port`/`schedule`; the scheduler
/// that implements [`crate::event_queue::EventQueue`] defines what this
/// actually refers to. The coordination core never inspects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerId(pub u64);
