//! Self-refreshing credential cache.
//!
//! [`AutoRefreshCache::new`] resolves options, then spawns one refresher task on the current tokio
//! runtime. Each refresher pass primes the slot through [`AutoRefreshCache::retrieve`], waits until
//! `expiry - expiry_window`, and swaps in a credential minted after invalidating the upstream
//! source. Foreground callers read the slot without locking and only reach the upstream source
//! when the slot is empty or expired. Swaps are serialized by a single async mutex.
//!
//! Cancelling the [`CancellationToken`] passed at construction is the only way to stop the
//! refresher; dropping every [`AutoRefreshCache`] handle does not.

mod builder;
mod metrics;
mod refresher;

pub use builder::AutoRefreshCacheBuilder;
pub use metrics::CacheMetrics;

// crates.io
use arc_swap::ArcSwapOption;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	credential::Credential,
	error::ConfigError,
	obs::{self, RefreshOutcome, RefreshSpan, RefreshStage},
	options::{CacheOption, CacheOptions},
	provider::CredentialProvider,
};

/// Why the refresher stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StopReason {
	/// The construction token was cancelled.
	Cancelled,
	/// The cached credential never expires, so there is nothing left to refresh.
	NonExpiring,
}
impl StopReason {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StopReason::Cancelled => "cancelled",
			StopReason::NonExpiring => "non_expiring",
		}
	}
}

/// Lifecycle of the background refresher; it never restarts once stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshState {
	/// The refresher task is alive.
	Running,
	/// The refresher task exited.
	Stopped(StopReason),
}

/// Cloneable handle to a credential slot kept fresh by a background task.
#[derive(Clone)]
pub struct AutoRefreshCache {
	inner: Arc<Inner>,
}
impl AutoRefreshCache {
	/// Resolves `options` over the defaults and spawns the refresher on the current runtime.
	///
	/// Fails without spawning anything when an option is invalid or no tokio runtime is
	/// available.
	pub fn new<P, I>(cancel: CancellationToken, provider: P, options: I) -> Result<Self>
	where
		P: 'static + CredentialProvider,
		I: IntoIterator<Item = CacheOption>,
	{
		let options = CacheOptions::resolve(options)?;
		let runtime = tokio::runtime::Handle::try_current()
			.map_err(|source| ConfigError::MissingRuntime { source })?;
		let inner = Arc::new(Inner {
			provider: Arc::new(provider),
			options,
			slot: ArcSwapOption::empty(),
			swap_guard: AsyncMutex::new(()),
			metrics: CacheMetrics::default(),
			state: Mutex::new(RefreshState::Running),
			stopped: CancellationToken::new(),
		});

		runtime.spawn(refresher::run(inner.clone(), cancel));

		Ok(Self { inner })
	}

	/// Returns a builder collecting options fluently.
	pub fn builder(provider: impl 'static + CredentialProvider) -> AutoRefreshCacheBuilder {
		AutoRefreshCacheBuilder::new(Arc::new(provider))
	}

	/// Returns a valid credential, fetching from upstream only on a cache miss.
	///
	/// Fetch errors are returned as-is and leave the slot untouched.
	pub async fn retrieve(&self) -> Result<Arc<Credential>> {
		self.inner.retrieve().await
	}

	/// Invalidates the upstream source and stores a freshly fetched credential.
	///
	/// Concurrent calls (including the refresher's own swaps) run one at a time.
	pub async fn force_refresh(&self) -> Result<Arc<Credential>> {
		self.inner.swap().await
	}

	/// Current lifecycle of the refresher.
	pub fn state(&self) -> RefreshState {
		*self.inner.state.lock()
	}

	/// Resolves once the refresher has exited.
	pub async fn stopped(&self) {
		self.inner.stopped.cancelled().await
	}

	/// Counters describing cache and refresher activity.
	pub fn metrics(&self) -> &CacheMetrics {
		&self.inner.metrics
	}

	/// Resolved configuration.
	pub fn options(&self) -> &CacheOptions {
		&self.inner.options
	}
}
impl Debug for AutoRefreshCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AutoRefreshCache")
			.field("options", &self.inner.options)
			.field("state", &self.state())
			.field("cached", &self.inner.slot.load().is_some())
			.finish()
	}
}

pub(crate) struct Inner {
	provider: Arc<dyn CredentialProvider>,
	options: CacheOptions,
	slot: ArcSwapOption<Credential>,
	// Held across invalidate + fetch + store only.
	swap_guard: AsyncMutex<()>,
	metrics: CacheMetrics,
	state: Mutex<RefreshState>,
	stopped: CancellationToken,
}
impl Inner {
	fn cached(&self) -> Option<Arc<Credential>> {
		let current = self.slot.load_full()?;

		current.is_valid_at(self.options.clock.now()).then_some(current)
	}

	async fn retrieve(&self) -> Result<Arc<Credential>> {
		const STAGE: RefreshStage = RefreshStage::Retrieve;

		if let Some(credential) = self.cached() {
			self.metrics.record_hit();

			return Ok(credential);
		}

		self.metrics.record_miss();
		obs::record_refresh_outcome(STAGE, RefreshOutcome::Attempt);

		let result: Result<Arc<Credential>> = RefreshSpan::new(STAGE)
			.instrument(async {
				let fetched = Arc::new(self.provider.fetch().await?);

				self.slot.store(Some(fetched.clone()));

				Ok::<_, Error>(fetched)
			})
			.await;

		match &result {
			Ok(_) => obs::record_refresh_outcome(STAGE, RefreshOutcome::Success),
			Err(_) => {
				self.metrics.record_fetch_failure();
				obs::record_refresh_outcome(STAGE, RefreshOutcome::Failure);
			},
		}

		result
	}

	async fn swap(&self) -> Result<Arc<Credential>> {
		const STAGE: RefreshStage = RefreshStage::Swap;

		obs::record_refresh_outcome(STAGE, RefreshOutcome::Attempt);

		let result: Result<Arc<Credential>> = RefreshSpan::new(STAGE)
			.instrument(async {
				let _guard = self.swap_guard.lock().await;

				self.provider.invalidate();

				let fetched = Arc::new(self.provider.fetch().await?);

				self.slot.store(Some(fetched.clone()));

				Ok::<_, Error>(fetched)
			})
			.await;

		match &result {
			Ok(_) => {
				self.metrics.record_swap();
				obs::record_refresh_outcome(STAGE, RefreshOutcome::Success);
			},
			Err(_) => {
				self.metrics.record_swap_failure();
				obs::record_refresh_outcome(STAGE, RefreshOutcome::Failure);
			},
		}

		result
	}

	fn mark_stopped(&self, reason: StopReason) {
		*self.state.lock() = RefreshState::Stopped(reason);

		obs::log_refresher_stopped(reason);
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	use tokio::sync::mpsc;
	// self
	use super::*;
	use crate::{
		_preludet::{MockClock, ProviderEvent, StubProvider, test_credential},
		options::{with_clock, with_expiry_window, with_on_refresh_error, with_retry_backoff},
		provider::ProviderError,
	};

	const NOW: OffsetDateTime = macros::datetime!(2025-01-01 00:00 UTC);

	fn expiring_in(access_key_id: &str, lifetime: Duration) -> Credential {
		test_credential(access_key_id, Some(NOW + lifetime))
	}

	async fn within<F>(fut: F) -> F::Output
	where
		F: Future,
	{
		tokio::time::timeout(std::time::Duration::from_secs(5), fut)
			.await
			.expect("Cache test step should finish within five seconds.")
	}

	struct Harness {
		cache: AutoRefreshCache,
		clock: MockClock,
		provider: StubProvider,
		cancel: CancellationToken,
		errors: mpsc::UnboundedReceiver<Error>,
	}
	impl Harness {
		fn spawn(provider: StubProvider, extra: Vec<CacheOption>) -> Self {
			let clock = MockClock::new(NOW);
			let cancel = CancellationToken::new();
			let (tx, errors) = mpsc::unbounded_channel();
			let mut options = vec![
				with_clock(clock.clone()),
				with_retry_backoff(Duration::ZERO),
				with_on_refresh_error(move |err| {
					let tx = tx.clone();

					async move {
						let _ = tx.send(err);
					}
				}),
			];

			options.extend(extra);

			let cache = AutoRefreshCache::new(cancel.clone(), provider.clone(), options)
				.expect("Cache should build inside a tokio runtime.");

			Self { cache, clock, provider, cancel, errors }
		}
	}

	#[tokio::test]
	async fn retrieve_serves_cached_credential_without_fetching() {
		let provider = StubProvider::new(expiring_in("AKID-1", Duration::minutes(10)));
		let harness = Harness::spawn(provider, Vec::new());

		within(harness.clock.wait_for_requests(1)).await;

		for _ in 0..2 {
			let credential =
				harness.cache.retrieve().await.expect("Cached retrieve should succeed.");

			assert_eq!(credential.access_key_id, "AKID-1");
		}

		assert_eq!(harness.provider.fetch_count(), 1);
		assert_eq!(harness.cache.metrics().hits(), 2);
		assert_eq!(harness.cache.metrics().misses(), 1);
		assert_eq!(harness.clock.requests(), vec![Duration::minutes(9)]);

		harness.cancel.cancel();
	}

	#[tokio::test]
	async fn expired_credential_is_refetched_once_per_miss() {
		let provider = StubProvider::new(expiring_in("fresh", Duration::minutes(10)));

		provider.push_ok(test_credential("expired", Some(NOW)));

		let harness = Harness::spawn(provider, Vec::new());
		let first = harness.cache.retrieve().await.expect("First retrieve should fetch.");

		assert_eq!(first.access_key_id, "expired");

		let second = harness.cache.retrieve().await.expect("Second retrieve should refetch.");

		assert_eq!(second.access_key_id, "fresh");
		assert_eq!(harness.provider.fetch_count(), 2);

		within(harness.clock.wait_for_requests(1)).await;

		assert_eq!(harness.provider.fetch_count(), 2);
		assert_eq!(harness.provider.invalidate_count(), 0);

		harness.cancel.cancel();
	}

	#[tokio::test]
	async fn retrieve_refetches_once_clock_passes_expiry() {
		let provider = StubProvider::new(expiring_in("first", Duration::minutes(10)));
		let harness = Harness::spawn(provider, Vec::new());

		within(harness.clock.wait_for_requests(1)).await;

		harness.provider.set_fallback(expiring_in("second", Duration::minutes(20)));
		harness.clock.set_now(NOW + Duration::minutes(10));

		let refetched = harness.cache.retrieve().await.expect("Expired slot should refetch.");

		assert_eq!(refetched.access_key_id, "second");
		assert_eq!(harness.provider.fetch_count(), 2);
		assert_eq!(harness.provider.invalidate_count(), 0);

		harness.cancel.cancel();
	}

	#[tokio::test]
	async fn refresher_waits_for_clock_remaining() {
		let provider = StubProvider::new(expiring_in("AKID", Duration::hours(1)));
		let clock = MockClock::new(NOW);

		clock.set_remaining(Duration::seconds(42));

		let cancel = CancellationToken::new();
		let cache = AutoRefreshCache::new(cancel.clone(), provider, [with_clock(clock.clone())])
			.expect("Cache should build inside a tokio runtime.");

		within(clock.wait_for_requests(1)).await;

		assert_eq!(clock.requests(), vec![Duration::seconds(42)]);

		cancel.cancel();
		within(cache.stopped()).await;

		assert_eq!(cache.state(), RefreshState::Stopped(StopReason::Cancelled));
	}

	#[tokio::test]
	async fn non_expiring_credential_stops_refresher() {
		let provider = StubProvider::new(test_credential("static", None));
		let harness = Harness::spawn(provider, Vec::new());

		within(harness.cache.stopped()).await;

		assert_eq!(harness.cache.state(), RefreshState::Stopped(StopReason::NonExpiring));

		harness.cache.retrieve().await.expect("Cached retrieve should succeed.");
		harness.cache.retrieve().await.expect("Cached retrieve should succeed.");

		assert_eq!(harness.provider.fetch_count(), 1);
		assert_eq!(harness.provider.invalidate_count(), 0);
		assert!(harness.clock.requests().is_empty());
	}

	#[tokio::test]
	async fn refresher_swaps_when_delay_fires() {
		let provider = StubProvider::new(expiring_in("initial", Duration::minutes(1)));
		let harness = Harness::spawn(provider, vec![with_expiry_window(Duration::minutes(1))]);

		within(harness.clock.wait_for_requests(1)).await;

		assert_eq!(harness.clock.requests(), vec![Duration::ZERO]);

		for round in 1..=3 {
			harness
				.provider
				.set_fallback(expiring_in(&format!("rotated-{round}"), Duration::minutes(1)));
			harness.clock.tick();

			within(harness.clock.wait_for_requests(round + 1)).await;

			let current =
				harness.cache.retrieve().await.expect("Swapped credential should be cached.");

			assert_eq!(current.access_key_id, format!("rotated-{round}"));
		}

		assert_eq!(harness.provider.fetch_count(), 4);
		assert_eq!(harness.provider.invalidate_count(), 3);
		assert_eq!(harness.cache.metrics().swaps(), 3);
		assert_eq!(
			harness.provider.events()[..5],
			[
				ProviderEvent::FetchStarted,
				ProviderEvent::FetchFinished,
				ProviderEvent::Invalidate,
				ProviderEvent::FetchStarted,
				ProviderEvent::FetchFinished,
			]
		);

		harness.cancel.cancel();
	}

	#[tokio::test]
	async fn swap_errors_are_reported_and_do_not_stop_refresher() {
		let provider = StubProvider::new(expiring_in("initial", Duration::minutes(1)));
		let mut harness = Harness::spawn(provider, Vec::new());

		within(harness.clock.wait_for_requests(1)).await;

		harness.provider.push_err("throttled");
		harness.clock.tick();

		let err = within(harness.errors.recv()).await.expect("Swap failure should be reported.");

		assert!(matches!(err, Error::Fetch(ProviderError::Unavailable { .. })));

		within(harness.clock.wait_for_requests(2)).await;

		let kept = harness.cache.retrieve().await.expect("Stale but valid value should be served.");

		assert_eq!(kept.access_key_id, "initial");
		assert_eq!(harness.provider.fetch_count(), 2);
		assert_eq!(harness.cache.state(), RefreshState::Running);

		harness.provider.set_fallback(expiring_in("rotated", Duration::minutes(1)));
		harness.clock.tick();

		within(harness.clock.wait_for_requests(3)).await;

		let rotated = harness.cache.retrieve().await.expect("Later swap should update the cache.");

		assert_eq!(rotated.access_key_id, "rotated");
		assert!(harness.errors.try_recv().is_err());
		assert_eq!(harness.cache.metrics().swap_failures(), 1);
		assert_eq!(harness.cache.metrics().refresh_errors(), 1);

		harness.cancel.cancel();
	}

	#[tokio::test]
	async fn refresher_retries_failed_priming_fetch() {
		let provider = StubProvider::new(expiring_in("AKID", Duration::minutes(10)));

		provider.push_err("cold start");

		let mut harness = Harness::spawn(provider, Vec::new());
		let err = within(harness.errors.recv()).await.expect("Priming failure should be reported.");

		assert!(matches!(err, Error::Fetch(_)));

		within(harness.clock.wait_for_requests(1)).await;

		assert_eq!(harness.provider.fetch_count(), 2);
		assert_eq!(harness.cache.state(), RefreshState::Running);

		harness.cancel.cancel();
	}

	#[tokio::test]
	async fn foreground_fetch_errors_propagate_to_caller() {
		let provider = StubProvider::new(expiring_in("AKID", Duration::minutes(10)));

		provider.push_err("outage");

		let mut harness = Harness::spawn(provider, Vec::new());
		let err = harness.cache.retrieve().await.expect_err("Upstream failure should propagate.");

		assert!(matches!(err, Error::Fetch(ProviderError::Unavailable { .. })));
		assert_eq!(harness.cache.metrics().fetch_failures(), 1);

		within(harness.clock.wait_for_requests(1)).await;

		assert!(harness.errors.try_recv().is_err());

		harness.cancel.cancel();
	}

	#[tokio::test]
	async fn window_exceeding_lifetime_is_reported_and_backs_off() {
		let provider = StubProvider::new(expiring_in("short", Duration::seconds(30)));
		let mut harness = Harness::spawn(
			provider,
			vec![
				with_expiry_window(Duration::minutes(1)),
				with_retry_backoff(Duration::seconds(5)),
			],
		);

		for round in 1..=2 {
			let err =
				within(harness.errors.recv()).await.expect("Window error should be reported.");

			assert!(matches!(
				err,
				Error::WindowExceedsLifetime { remaining, window }
					if remaining == Duration::seconds(-30) && window == Duration::minutes(1)
			));

			within(harness.clock.wait_for_requests(round)).await;
			harness.clock.tick();
		}

		assert_eq!(harness.clock.requests()[..2], [Duration::seconds(5), Duration::seconds(5)]);
		assert_eq!(harness.provider.fetch_count(), 1);
		assert_eq!(harness.provider.invalidate_count(), 0);

		harness.cancel.cancel();
		within(harness.cache.stopped()).await;
	}

	#[tokio::test]
	async fn cancellation_while_waiting_stops_quietly() {
		let provider = StubProvider::new(expiring_in("AKID", Duration::minutes(10)));
		let mut harness = Harness::spawn(provider, Vec::new());

		within(harness.clock.wait_for_requests(1)).await;

		harness.cancel.cancel();

		within(harness.cache.stopped()).await;

		assert_eq!(harness.cache.state(), RefreshState::Stopped(StopReason::Cancelled));

		harness.clock.tick();
		tokio::task::yield_now().await;

		assert_eq!(harness.provider.fetch_count(), 1);
		assert_eq!(harness.provider.invalidate_count(), 0);
		assert_eq!(harness.clock.requests().len(), 1);
		assert!(harness.errors.try_recv().is_err());

		let credential =
			harness.cache.retrieve().await.expect("Foreground reads outlive the refresher.");

		assert_eq!(credential.access_key_id, "AKID");
	}

	#[tokio::test]
	async fn concurrent_swaps_never_interleave() {
		const SWAPS: usize = 4;

		let provider = StubProvider::yielding(expiring_in("AKID", Duration::minutes(10)));
		let harness = Harness::spawn(provider, Vec::new());

		within(harness.clock.wait_for_requests(1)).await;

		let handles = (0..SWAPS)
			.map(|_| {
				let cache = harness.cache.clone();

				tokio::spawn(async move { cache.force_refresh().await })
			})
			.collect::<Vec<_>>();

		for handle in handles {
			within(handle)
				.await
				.expect("Swap task should not panic.")
				.expect("Swap should succeed.");
		}

		let events = harness.provider.events();

		assert_eq!(events.len(), 2 + SWAPS * 3);

		for pair in events[2..].chunks(3) {
			assert_eq!(
				pair,
				[
					ProviderEvent::Invalidate,
					ProviderEvent::FetchStarted,
					ProviderEvent::FetchFinished,
				]
			);
		}

		assert_eq!(harness.cache.metrics().swaps(), SWAPS as u64);

		harness.cancel.cancel();
	}

	#[tokio::test]
	async fn invalid_option_aborts_before_refresher_starts() {
		let provider = StubProvider::new(test_credential("AKID", None));
		let err = AutoRefreshCache::new(
			CancellationToken::new(),
			provider.clone(),
			[with_expiry_window(Duration::seconds(-1))],
		)
		.expect_err("Negative windows should abort construction.");

		assert!(matches!(err, Error::Config(ConfigError::NegativeExpiryWindow { .. })));

		tokio::task::yield_now().await;

		assert_eq!(provider.fetch_count(), 0);
	}

	#[test]
	fn construction_requires_runtime() {
		let provider = StubProvider::new(test_credential("AKID", None));
		let err =
			AutoRefreshCache::new(CancellationToken::new(), provider, Vec::<CacheOption>::new())
				.expect_err("Construction outside a runtime should fail.");

		assert!(matches!(err, Error::Config(ConfigError::MissingRuntime { .. })));
	}
}
