// self
use crate::{_prelude::*, cache::StopReason, obs::RefreshStage};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRefresh<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRefresh<F> = F;

/// A span builder used by the cache and its refresher.
#[derive(Clone, Debug)]
pub struct RefreshSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl RefreshSpan {
	/// Creates a new span tagged with the provided stage.
	pub fn new(stage: RefreshStage) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::debug_span!("auto_refresh_credentials.refresh", stage = stage.as_str());

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRefresh<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a background refresh failure at `warn`.
pub fn log_refresh_error(err: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(error = %err, "failed to refresh credentials");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = err;
	}
}

/// Logs the terminal state reached by the refresher at `debug`.
pub fn log_refresher_stopped(reason: StopReason) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(reason = reason.as_str(), "credential refresher stopped");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = reason;
	}
}
