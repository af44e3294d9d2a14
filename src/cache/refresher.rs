//! Background task keeping the cache slot fresh.

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	cache::{Inner, StopReason},
	credential::Expiry,
	obs::{self, RefreshOutcome, RefreshSpan, RefreshStage},
};

enum Iteration {
	Refreshed,
	Failed(Error),
	Stopped(StopReason),
}

/// Runs until `cancel` fires or the cached credential turns out to never expire.
pub(super) async fn run(inner: Arc<Inner>, cancel: CancellationToken) {
	let _stopped = inner.stopped.clone().drop_guard();
	let reason = loop {
		match iterate(&inner, &cancel).await {
			Iteration::Refreshed => {},
			Iteration::Failed(err) =>
				if report(&inner, &cancel, err).await || back_off(&inner, &cancel).await {
					break StopReason::Cancelled;
				},
			Iteration::Stopped(reason) => break reason,
		}
	};

	inner.mark_stopped(reason);
}

async fn iterate(inner: &Inner, cancel: &CancellationToken) -> Iteration {
	const STAGE: RefreshStage = RefreshStage::Iteration;

	if cancel.is_cancelled() {
		return Iteration::Stopped(StopReason::Cancelled);
	}

	obs::record_refresh_outcome(STAGE, RefreshOutcome::Attempt);

	let iteration = RefreshSpan::new(STAGE)
		.instrument(async {
			let credential = match inner.retrieve().await {
				Ok(credential) => credential,
				Err(err) => return Iteration::Failed(err),
			};
			let Expiry::At(expires_at) = credential.expiry else {
				return Iteration::Stopped(StopReason::NonExpiring);
			};
			let window = inner.options.expiry_window;
			let remaining = inner.options.clock.remaining(expires_at, window);

			if remaining.is_negative() {
				return Iteration::Failed(Error::WindowExceedsLifetime { remaining, window });
			}

			tokio::select! {
				biased;
				() = cancel.cancelled() => Iteration::Stopped(StopReason::Cancelled),
				() = inner.options.clock.after(remaining) => match inner.swap().await {
					Ok(_) => Iteration::Refreshed,
					Err(err) => Iteration::Failed(err),
				},
			}
		})
		.await;

	match &iteration {
		Iteration::Failed(_) => obs::record_refresh_outcome(STAGE, RefreshOutcome::Failure),
		Iteration::Refreshed | Iteration::Stopped(_) =>
			obs::record_refresh_outcome(STAGE, RefreshOutcome::Success),
	}

	iteration
}

/// Hands `err` to the configured handler; returns `true` if cancelled meanwhile.
async fn report(inner: &Inner, cancel: &CancellationToken, err: Error) -> bool {
	inner.metrics.record_refresh_error();

	tokio::select! {
		biased;
		() = cancel.cancelled() => true,
		() = (inner.options.on_refresh_error)(err) => false,
	}
}

/// Waits the retry backoff; returns `true` if cancelled meanwhile.
async fn back_off(inner: &Inner, cancel: &CancellationToken) -> bool {
	let backoff = inner.options.retry_backoff;

	if backoff.is_zero() {
		// Zero backoff still yields so a tight error loop cannot starve the runtime.
		tokio::task::yield_now().await;

		return cancel.is_cancelled();
	}

	tokio::select! {
		biased;
		() = cancel.cancelled() => true,
		() = inner.options.clock.after(backoff) => false,
	}
}
