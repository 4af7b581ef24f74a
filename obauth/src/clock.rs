//! Time sources used for token expiry calculations
//!
//! Token lifetimes are tracked in whole seconds since the Unix epoch using the
//! types from [`aliri_clock`]. [`ManualClock`] allows a token cache to be driven
//! from the outside in tests rather than by the system clock.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

pub use aliri_clock::{Clock, DurationSecs, System, UnixTime};

/// A manually driven clock
///
/// Clones share the same underlying time, so a test can hand one clone to a
/// token cache and advance time from the outside.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime(self.0.load(Ordering::Acquire))
    }
}

impl ManualClock {
    /// Creates a new clock stopped at the specified time
    pub fn new(time: UnixTime) -> Self {
        Self(Arc::new(AtomicU64::new(time.0)))
    }

    /// Updates the clock's current time to `val`
    pub fn set(&self, val: UnixTime) {
        self.0.store(val.0, Ordering::Release);
    }

    /// Advances the clock by `inc`
    pub fn advance(&self, inc: DurationSecs) {
        self.0.fetch_add(inc.0, Ordering::AcqRel);
    }
}
