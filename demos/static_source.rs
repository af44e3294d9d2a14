//! Demonstrates sharing one self-refreshing cache across tasks with a short-lived upstream source.

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use color_eyre::Result;
use time::{Duration, OffsetDateTime};
use tokio_util::sync::CancellationToken;
// self
use auto_refresh_credentials::{
	cache::AutoRefreshCache,
	credential::Credential,
	provider::{CredentialProvider, ProviderFuture},
};

/// Mints a fresh key pair every time it is invalidated.
#[derive(Default)]
struct RotatingSource {
	serial: AtomicUsize,
}
impl CredentialProvider for RotatingSource {
	fn fetch(&self) -> ProviderFuture<'_, Credential> {
		Box::pin(async move {
			let serial = self.serial.load(Ordering::SeqCst);
			let credential = Credential::builder()
				.access_key_id(format!("AKIDDEMO{serial:04}"))
				.secret_access_key("demo-secret")
				.session_token("demo-session")
				.source("RotatingSource")
				.expires_in(OffsetDateTime::now_utc(), Duration::seconds(3))
				.build()
				.map_err(auto_refresh_credentials::provider::ProviderError::other)?;

			Ok(credential)
		})
	}

	fn invalidate(&self) {
		self.serial.fetch_add(1, Ordering::SeqCst);
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let cancel = CancellationToken::new();
	let cache = AutoRefreshCache::builder(Arc::new(RotatingSource::default()))
		.expiry_window(Duration::seconds(2))
		.retry_backoff(Duration::milliseconds(250))
		.on_refresh_error(|err| async move { eprintln!("background refresh failed: {err}") })
		.spawn(cancel.clone())?;
	let readers = (0..3)
		.map(|reader| {
			let cache = cache.clone();

			tokio::spawn(async move {
				for _ in 0..4 {
					let credential = cache.retrieve().await?;

					println!(
						"reader {reader} sees {} (source {:?}, expires {:?})",
						credential.access_key_id,
						credential.source,
						credential.expires_at()
					);

					tokio::time::sleep(std::time::Duration::from_millis(900)).await;
				}

				Ok::<_, auto_refresh_credentials::error::Error>(())
			})
		})
		.collect::<Vec<_>>();

	for reader in readers {
		reader.await??;
	}

	let metrics = cache.metrics();

	println!("swaps: {}, hits: {}, misses: {}", metrics.swaps(), metrics.hits(), metrics.misses());

	cancel.cancel();
	cache.stopped().await;

	println!("refresher state: {:?}", cache.state());

	Ok(())
}
