//! Time source used by the refresher to decide when to swap credentials.
//!
//! Every timing decision goes through [`Clock`] so tests can freeze `now`, observe the delays
//! the refresher asks for, and fire them by hand.

// self
use crate::_prelude::*;

/// Single-fire delay returned by [`Clock::after`].
pub type ClockFuture = Pin<Box<dyn Future<Output = ()> + 'static + Send>>;

/// Wall-clock abstraction consumed by the cache.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Current instant.
	fn now(&self) -> OffsetDateTime;

	/// Resolves no earlier than `duration` from now; non-positive durations resolve immediately.
	fn after(&self, duration: Duration) -> ClockFuture;

	/// Time until `future`, minus the safety `window`.
	///
	/// Returns zero once `now >= future`. The result is negative when the window is larger than
	/// the time left.
	fn remaining(&self, future: OffsetDateTime, window: Duration) -> Duration {
		let now = self.now();

		if now >= future {
			return Duration::ZERO;
		}

		future - now - window
	}
}

/// [`Clock`] backed by the system UTC clock and tokio timers.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}

	fn after(&self, duration: Duration) -> ClockFuture {
		let delay = std::time::Duration::try_from(duration).unwrap_or(std::time::Duration::ZERO);

		Box::pin(tokio::time::sleep(delay))
	}
}
