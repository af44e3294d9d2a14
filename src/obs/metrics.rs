// self
use crate::obs::{RefreshOutcome, RefreshStage};

/// Records a stage outcome via the global metrics recorder (when enabled).
pub fn record_refresh_outcome(stage: RefreshStage, outcome: RefreshOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"auto_refresh_credentials_refresh_total",
			"stage" => stage.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (stage, outcome);
	}
}
