// std
use std::iter::IntoIterator;
// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	cache::AutoRefreshCache,
	clock::Clock,
	options::{self, CacheOption},
	provider::CredentialProvider,
};

/// Builder for [`AutoRefreshCache`] values.
pub struct AutoRefreshCacheBuilder {
	provider: Arc<dyn CredentialProvider>,
	options: Vec<CacheOption>,
}
impl AutoRefreshCacheBuilder {
	/// Creates a builder around the upstream source.
	pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
		Self { provider, options: Vec::new() }
	}

	/// Overrides the time source.
	pub fn clock(self, clock: impl 'static + Clock) -> Self {
		self.option(options::with_clock(clock))
	}

	/// Overrides the expiry window.
	pub fn expiry_window(self, window: Duration) -> Self {
		self.option(options::with_expiry_window(window))
	}

	/// Overrides the refresh error handler.
	pub fn on_refresh_error<F, Fut>(self, handler: F) -> Self
	where
		F: 'static + Send + Sync + Fn(Error) -> Fut,
		Fut: 'static + Send + Future<Output = ()>,
	{
		self.option(options::with_on_refresh_error(handler))
	}

	/// Overrides the retry backoff.
	pub fn retry_backoff(self, backoff: Duration) -> Self {
		self.option(options::with_retry_backoff(backoff))
	}

	/// Appends an arbitrary option.
	pub fn option(mut self, option: CacheOption) -> Self {
		self.options.push(option);

		self
	}

	/// Appends multiple options.
	pub fn options<I>(mut self, options: I) -> Self
	where
		I: IntoIterator<Item = CacheOption>,
	{
		self.options.extend(options);

		self
	}

	/// Resolves the collected options and spawns the refresher.
	pub fn spawn(self, cancel: CancellationToken) -> Result<AutoRefreshCache> {
		AutoRefreshCache::new(cancel, self.provider, self.options)
	}
}
impl Debug for AutoRefreshCacheBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AutoRefreshCacheBuilder").field("options", &self.options.len()).finish()
	}
}
