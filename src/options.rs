//! Cache configuration assembled from option-applying functions.
//!
//! Defaults are applied first ([`SystemClock`], a one minute expiry window, and an error handler
//! that logs and then sleeps for a minute), then every caller-supplied [`CacheOption`] in order.
//! The first failing option aborts construction before the refresher is spawned.

// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	error::ConfigError,
	obs,
};

/// Future returned by a [`RefreshErrorHandler`]; the refresher awaits it before retrying.
pub type RefreshErrorFuture = Pin<Box<dyn Future<Output = ()> + 'static + Send>>;

/// Callback observing every error the background refresher encounters.
pub type RefreshErrorHandler = Arc<dyn Fn(Error) -> RefreshErrorFuture + Send + Sync>;

type ApplyFn = Box<dyn FnOnce(&mut CacheOptions) -> Result<(), ConfigError> + Send>;

/// Resolved, immutable configuration of an [`AutoRefreshCache`](crate::cache::AutoRefreshCache).
#[derive(Clone)]
pub struct CacheOptions {
	/// Time source driving refresh deadlines and validity checks.
	pub clock: Arc<dyn Clock>,
	/// Duration subtracted from the time left before a credential is swapped.
	pub expiry_window: Duration,
	/// Observer for background refresh failures.
	pub on_refresh_error: RefreshErrorHandler,
	/// Delay after a reported error before the refresher iterates again.
	pub retry_backoff: Duration,
}
impl CacheOptions {
	/// Default expiry window.
	pub const DEFAULT_EXPIRY_WINDOW: Duration = Duration::minutes(1);
	/// Delay applied by the default error handler after logging.
	pub const DEFAULT_ERROR_SLEEP: Duration = Duration::minutes(1);
	/// Default retry backoff.
	pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::seconds(1);

	/// Applies `options` on top of the defaults.
	pub fn resolve<I>(options: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = CacheOption>,
	{
		let mut resolved = Self::default();

		for option in options {
			option.apply(&mut resolved)?;
		}

		Ok(resolved)
	}
}
impl Default for CacheOptions {
	fn default() -> Self {
		Self {
			clock: Arc::new(SystemClock),
			expiry_window: Self::DEFAULT_EXPIRY_WINDOW,
			on_refresh_error: default_refresh_error_handler(),
			retry_backoff: Self::DEFAULT_RETRY_BACKOFF,
		}
	}
}
impl Debug for CacheOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CacheOptions")
			.field("expiry_window", &self.expiry_window)
			.field("retry_backoff", &self.retry_backoff)
			.finish_non_exhaustive()
	}
}

/// A single named override applied by [`CacheOptions::resolve`].
pub struct CacheOption(ApplyFn);
impl CacheOption {
	/// Wraps an arbitrary fallible override.
	pub fn new<F>(apply: F) -> Self
	where
		F: 'static + Send + FnOnce(&mut CacheOptions) -> Result<(), ConfigError>,
	{
		Self(Box::new(apply))
	}

	fn apply(self, options: &mut CacheOptions) -> Result<(), ConfigError> {
		(self.0)(options)
	}
}
impl Debug for CacheOption {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CacheOption(..)")
	}
}

/// Replaces the time source.
pub fn with_clock(clock: impl 'static + Clock) -> CacheOption {
	let clock: Arc<dyn Clock> = Arc::new(clock);

	CacheOption::new(move |options| {
		options.clock = clock;

		Ok(())
	})
}

/// Refreshes credentials `window` ahead of their expiry; negative windows are rejected.
pub fn with_expiry_window(window: Duration) -> CacheOption {
	CacheOption::new(move |options| {
		if window.is_negative() {
			return Err(ConfigError::NegativeExpiryWindow { window });
		}

		options.expiry_window = window;

		Ok(())
	})
}

/// Observes background refresh failures.
///
/// The refresher awaits the returned future before it backs off and tries again, so a handler
/// can apply its own delay.
pub fn with_on_refresh_error<F, Fut>(handler: F) -> CacheOption
where
	F: 'static + Send + Sync + Fn(Error) -> Fut,
	Fut: 'static + Send + Future<Output = ()>,
{
	let handler: RefreshErrorHandler =
		Arc::new(move |err| -> RefreshErrorFuture { Box::pin(handler(err)) });

	CacheOption::new(move |options| {
		options.on_refresh_error = handler;

		Ok(())
	})
}

/// Waits `backoff` after every reported error; zero only yields to the scheduler.
pub fn with_retry_backoff(backoff: Duration) -> CacheOption {
	CacheOption::new(move |options| {
		if backoff.is_negative() {
			return Err(ConfigError::NegativeRetryBackoff { backoff });
		}

		options.retry_backoff = backoff;

		Ok(())
	})
}

fn default_refresh_error_handler() -> RefreshErrorHandler {
	Arc::new(|err| -> RefreshErrorFuture {
		Box::pin(async move {
			obs::log_refresh_error(&err);

			let pause = std::time::Duration::try_from(CacheOptions::DEFAULT_ERROR_SLEEP)
				.unwrap_or(std::time::Duration::ZERO);

			tokio::time::sleep(pause).await;
		})
	})
}
