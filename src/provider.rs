//! Upstream credential source contract consumed by the cache.

// self
use crate::{_prelude::*, credential::Credential};

type BoxError = Box<dyn StdError + Send + Sync>;

/// Boxed future returned by [`CredentialProvider::fetch`].
pub type ProviderFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, ProviderError>> + 'a + Send>>;

/// Upstream source that mints credentials and memoizes them internally.
pub trait CredentialProvider
where
	Self: Send + Sync,
{
	/// Produces a credential, possibly from the source's own cache.
	fn fetch(&self) -> ProviderFuture<'_, Credential>;

	/// Drops whatever the source memoized so the next [`fetch`](Self::fetch) mints a new value.
	///
	/// Best-effort and safe to call repeatedly.
	fn invalidate(&self);
}
impl<P> CredentialProvider for Arc<P>
where
	P: ?Sized + CredentialProvider,
{
	fn fetch(&self) -> ProviderFuture<'_, Credential> {
		(**self).fetch()
	}

	fn invalidate(&self) {
		(**self).invalidate()
	}
}

/// Error type produced by [`CredentialProvider`] implementations.
#[derive(Debug, ThisError)]
pub enum ProviderError {
	/// Source is temporarily unreachable; the refresher retries on its own.
	#[error("Credential source is unavailable: {message}.")]
	Unavailable {
		/// Human-readable error payload.
		message: String,
	},
	/// Source refused to issue a credential.
	#[error("Credential source rejected the request: {message}.")]
	Rejected {
		/// Human-readable error payload.
		message: String,
	},
	/// Any other source-specific failure.
	#[error("Credential source failed.")]
	Other {
		/// Source-specific failure.
		#[source]
		source: BoxError,
	},
}
impl ProviderError {
	/// Wraps a source-specific error.
	pub fn other(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Other { source: Box::new(src) }
	}
}
