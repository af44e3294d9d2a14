//! Optional observability helpers for the cache and its refresher.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (on by default) to emit spans named `auto_refresh_credentials.refresh` with a
//!   `stage` field, plus `debug`/`warn` events when the refresher stops or fails.
//! - Enable `metrics` to increment the `auto_refresh_credentials_refresh_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Call sites observed by the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshStage {
	/// Foreground (or refresher-primed) read through the slot.
	Retrieve,
	/// Forced invalidate-then-fetch.
	Swap,
	/// One pass of the background refresher.
	Iteration,
}
impl RefreshStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshStage::Retrieve => "retrieve",
			RefreshStage::Swap => "swap",
			RefreshStage::Iteration => "iteration",
		}
	}
}
impl Display for RefreshStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
	/// Entry to a stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated to the caller or the error handler.
	Failure,
}
impl RefreshOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshOutcome::Attempt => "attempt",
			RefreshOutcome::Success => "success",
			RefreshOutcome::Failure => "failure",
		}
	}
}
impl Display for RefreshOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
