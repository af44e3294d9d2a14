//! Self-refreshing cache for short-lived credentials: one background task keeps a single slot
//! fresh ahead of expiry while any number of callers read it without blocking.
//!
//! Build an [`AutoRefreshCache`](cache::AutoRefreshCache) once, hand clones of it to every
//! consumer, and cancel the [`CancellationToken`](tokio_util::sync::CancellationToken) it was
//! constructed with to stop the background refresher.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod clock;
pub mod credential;
pub mod error;
pub mod obs;
pub mod options;
pub mod provider;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and test doubles for unit and integration tests; enabled via
	//! `cfg(test)` or the `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// crates.io
	use tokio::sync::{mpsc, watch};
	// self
	use crate::{
		clock::{Clock, ClockFuture},
		credential::Credential,
		provider::{CredentialProvider, ProviderError, ProviderFuture},
	};

	/// Builds a credential with fixed test keys and the provided expiry.
	pub fn test_credential(access_key_id: &str, expires_at: Option<OffsetDateTime>) -> Credential {
		let builder = Credential::builder()
			.access_key_id(access_key_id)
			.secret_access_key("test-secret")
			.source("StubProvider");
		let builder = match expires_at {
			Some(instant) => builder.expires_at(instant),
			None => builder,
		};

		builder.build().expect("Test credential fixture should build.")
	}

	/// Virtual clock whose delays only fire when a test calls [`MockClock::tick`].
	#[derive(Clone)]
	pub struct MockClock(Arc<MockClockInner>);
	struct MockClockInner {
		now: Mutex<OffsetDateTime>,
		remaining: Mutex<Option<Duration>>,
		requests: Mutex<Vec<Duration>>,
		requested: watch::Sender<usize>,
		tick_tx: mpsc::UnboundedSender<()>,
		tick_rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<()>>>,
	}
	impl MockClock {
		/// Creates a clock frozen at the provided instant.
		pub fn new(now: OffsetDateTime) -> Self {
			let (tick_tx, tick_rx) = mpsc::unbounded_channel();
			let (requested, _) = watch::channel(0);

			Self(Arc::new(MockClockInner {
				now: Mutex::new(now),
				remaining: Mutex::new(None),
				requests: Mutex::new(Vec::new()),
				requested,
				tick_tx,
				tick_rx: Arc::new(AsyncMutex::new(tick_rx)),
			}))
		}

		/// Moves the frozen instant.
		pub fn set_now(&self, now: OffsetDateTime) {
			*self.0.now.lock() = now;
		}

		/// Forces [`Clock::remaining`] to return a fixed duration.
		pub fn set_remaining(&self, remaining: Duration) {
			*self.0.remaining.lock() = Some(remaining);
		}

		/// Fires one pending (or the next) delay.
		pub fn tick(&self) {
			let _ = self.0.tick_tx.send(());
		}

		/// Durations passed to [`Clock::after`] so far, in call order.
		pub fn requests(&self) -> Vec<Duration> {
			self.0.requests.lock().clone()
		}

		/// Waits until [`Clock::after`] has been called at least `count` times.
		pub async fn wait_for_requests(&self, count: usize) {
			let mut rx = self.0.requested.subscribe();

			rx.wait_for(|seen| *seen >= count)
				.await
				.expect("Mock clock sender lives as long as the clock.");
		}
	}
	impl Clock for MockClock {
		fn now(&self) -> OffsetDateTime {
			*self.0.now.lock()
		}

		fn after(&self, duration: Duration) -> ClockFuture {
			self.0.requests.lock().push(duration);
			self.0.requested.send_modify(|seen| *seen += 1);

			let tick_rx = self.0.tick_rx.clone();

			Box::pin(async move {
				if tick_rx.lock().await.recv().await.is_none() {
					std::future::pending::<()>().await;
				}
			})
		}

		fn remaining(&self, future: OffsetDateTime, window: Duration) -> Duration {
			match *self.0.remaining.lock() {
				Some(fixed) => fixed,
				None => {
					let now = self.now();

					if now >= future { Duration::ZERO } else { future - now - window }
				},
			}
		}
	}
	impl Debug for MockClock {
		fn fmt(&self, f: &mut Formatter) -> FmtResult {
			f.debug_struct("MockClock").field("now", &self.now()).finish()
		}
	}

	/// Upstream interaction observed by [`StubProvider`].
	#[derive(Clone, Copy, Debug, PartialEq, Eq)]
	pub enum ProviderEvent {
		/// `invalidate` was called.
		Invalidate,
		/// `fetch` started.
		FetchStarted,
		/// `fetch` returned.
		FetchFinished,
	}

	type Scripted = Result<Credential, String>;

	/// Scripted upstream source recording every call it receives.
	#[derive(Clone)]
	pub struct StubProvider(Arc<StubProviderInner>);
	struct StubProviderInner {
		script: Mutex<VecDeque<Scripted>>,
		fallback: Mutex<Scripted>,
		events: Mutex<Vec<ProviderEvent>>,
		fetches: watch::Sender<usize>,
		yield_in_fetch: bool,
	}
	impl StubProvider {
		/// Creates a provider that always answers with the provided credential.
		pub fn new(credential: Credential) -> Self {
			Self::build(Ok(credential), false)
		}

		/// Like [`StubProvider::new`] but yields to the scheduler in the middle of each fetch.
		pub fn yielding(credential: Credential) -> Self {
			Self::build(Ok(credential), true)
		}

		fn build(fallback: Scripted, yield_in_fetch: bool) -> Self {
			let (fetches, _) = watch::channel(0);

			Self(Arc::new(StubProviderInner {
				script: Mutex::new(VecDeque::new()),
				fallback: Mutex::new(fallback),
				events: Mutex::new(Vec::new()),
				fetches,
				yield_in_fetch,
			}))
		}

		/// Queues a one-shot successful response.
		pub fn push_ok(&self, credential: Credential) {
			self.0.script.lock().push_back(Ok(credential));
		}

		/// Queues a one-shot failure.
		pub fn push_err(&self, message: &str) {
			self.0.script.lock().push_back(Err(message.to_owned()));
		}

		/// Replaces the response used once the script is drained.
		pub fn set_fallback(&self, credential: Credential) {
			*self.0.fallback.lock() = Ok(credential);
		}

		/// Every recorded event, in order.
		pub fn events(&self) -> Vec<ProviderEvent> {
			self.0.events.lock().clone()
		}

		/// Number of completed fetches.
		pub fn fetch_count(&self) -> usize {
			*self.0.fetches.borrow()
		}

		/// Number of invalidations.
		pub fn invalidate_count(&self) -> usize {
			self.0.events.lock().iter().filter(|event| **event == ProviderEvent::Invalidate).count()
		}

		/// Waits until at least `count` fetches have completed.
		pub async fn wait_for_fetches(&self, count: usize) {
			let mut rx = self.0.fetches.subscribe();

			rx.wait_for(|seen| *seen >= count)
				.await
				.expect("Stub provider sender lives as long as the provider.");
		}
	}
	impl CredentialProvider for StubProvider {
		fn fetch(&self) -> ProviderFuture<'_, Credential> {
			Box::pin(async move {
				self.0.events.lock().push(ProviderEvent::FetchStarted);

				if self.0.yield_in_fetch {
					tokio::task::yield_now().await;
				}

				let next = self.0.script.lock().pop_front();
				let response = next.unwrap_or_else(|| self.0.fallback.lock().clone());

				self.0.events.lock().push(ProviderEvent::FetchFinished);
				self.0.fetches.send_modify(|seen| *seen += 1);

				response.map_err(|message| ProviderError::Unavailable { message })
			})
		}

		fn invalidate(&self) {
			self.0.events.lock().push(ProviderEvent::Invalidate);
		}
	}
	impl Debug for StubProvider {
		fn fmt(&self, f: &mut Formatter) -> FmtResult {
			f.debug_struct("StubProvider").field("fetches", &self.fetch_count()).finish()
		}
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result};
}

pub use tokio_util;
#[cfg(test)] use color_eyre as _;
