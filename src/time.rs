//! Logical and physical time types used throughout the coordination protocol.
//!
//! The wire format represents both in the same way: nanoseconds since an
//! agreed-upon origin, encoded as a signed 64-bit little-endian integer
//! (see [`crate::wire`]).

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A single instant in logical (or physical) time, measured in nanoseconds
/// since the federation's origin.
///
/// `Instant` intentionally has no notion of superdense time/microsteps: the
/// protocol this crate implements only ever compares and transmits plain
/// nanosecond instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Instant(i64);

impl Instant {
    /// The origin of logical time, `t = 0`.
    pub const ZERO: Instant = Instant(0);

    /// Sentinel strictly less than every valid logical time. Used as the
    /// initial value of `granted_tag` before any TAG has been received.
    pub const NEVER: Instant = Instant(i64::MIN);

    /// Sentinel strictly greater than every valid logical time.
    pub const FOREVER: Instant = Instant(i64::MAX);

    /// Construct an `Instant` from a raw nanosecond count.
    pub const fn from_nanos(nanos: i64) -> Self {
        Instant(nanos)
    }

    /// The raw nanosecond count, as transmitted on the wire.
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Read the platform clock as an `Instant` relative to the UNIX epoch.
    ///
    /// This is the crate's implementation of the `now_physical()` collaborator
    /// named in the specification; callers that need a different physical
    /// clock source should construct `Instant` values directly instead.
    pub fn now_physical() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the UNIX epoch");
        Instant(since_epoch.as_nanos() as i64)
    }

    /// Offset this instant by `delay`, saturating rather than overflowing.
    pub fn saturating_add(self, delay: Duration) -> Self {
        match self.0.checked_add(delay.as_nanos() as i64) {
            Some(n) => Instant(n),
            None => Instant::FOREVER,
        }
    }

    /// The (possibly negative) signed duration from `earlier` to `self`.
    ///
    /// A negative result means `self` is earlier than `earlier`; this is
    /// exactly the "tardy message" case described in [`crate::bridge`].
    pub fn signed_duration_since(self, earlier: Instant) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// `self - earlier` clamped to zero, i.e. the delay to schedule an event
    /// at `self` relative to a current time of `earlier`.
    pub fn delay_since(self, earlier: Instant) -> Duration {
        let nanos = self.signed_duration_since(earlier);
        Duration::from_nanos(nanos.max(0) as u64)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instant::NEVER => write!(f, "NEVER"),
            Instant::FOREVER => write!(f, "FOREVER"),
            Instant(n) => write!(f, "{n}ns"),
        }
    }
}

impl std::ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}
