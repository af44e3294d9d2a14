// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for cache reads and refresher activity.
#[derive(Debug, Default)]
pub struct CacheMetrics {
	hits: AtomicU64,
	misses: AtomicU64,
	fetch_failures: AtomicU64,
	swaps: AtomicU64,
	swap_failures: AtomicU64,
	refresh_errors: AtomicU64,
}
impl CacheMetrics {
	/// Returns the number of reads served from the slot.
	pub fn hits(&self) -> u64 {
		self.hits.load(Ordering::Relaxed)
	}

	/// Returns the number of reads that had to fetch from upstream.
	pub fn misses(&self) -> u64 {
		self.misses.load(Ordering::Relaxed)
	}

	/// Returns the number of failed fetches on a miss.
	pub fn fetch_failures(&self) -> u64 {
		self.fetch_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of successful swaps.
	pub fn swaps(&self) -> u64 {
		self.swaps.load(Ordering::Relaxed)
	}

	/// Returns the number of failed swaps.
	pub fn swap_failures(&self) -> u64 {
		self.swap_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of errors handed to the refresh error handler.
	pub fn refresh_errors(&self) -> u64 {
		self.refresh_errors.load(Ordering::Relaxed)
	}

	pub(crate) fn record_hit(&self) {
		self.hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_miss(&self) {
		self.misses.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_fetch_failure(&self) {
		self.fetch_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_swap(&self) {
		self.swaps.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_swap_failure(&self) {
		self.swap_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_error(&self) {
		self.refresh_errors.fetch_add(1, Ordering::Relaxed);
	}
}
