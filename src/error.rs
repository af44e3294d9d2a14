//! Crate-level error types shared by the cache, its options, and credential sources.

// self
use crate::{_prelude::*, credential::CredentialBuilderError, provider::ProviderError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs and passed to refresh error handlers.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Upstream source failed to produce a credential.
	#[error(transparent)]
	Fetch(#[from] ProviderError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The expiry window is larger than the time left on the cached credential.
	#[error("Expiry window of {window} exceeds the credential lifetime ({remaining} remaining).")]
	WindowExceedsLifetime {
		/// Negative duration computed by the clock.
		remaining: Duration,
		/// Configured expiry window.
		window: Duration,
	},
}

/// Configuration and validation failures raised before the refresher starts.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Expiry window must not be negative.
	#[error("Expiry window must not be negative, got {window}.")]
	NegativeExpiryWindow {
		/// Rejected window.
		window: Duration,
	},
	/// Retry backoff must not be negative.
	#[error("Retry backoff must not be negative, got {backoff}.")]
	NegativeRetryBackoff {
		/// Rejected backoff.
		backoff: Duration,
	},
	/// The cache was constructed outside a tokio runtime.
	#[error("A tokio runtime is required to spawn the refresher.")]
	MissingRuntime {
		/// Underlying runtime lookup failure.
		#[source]
		source: tokio::runtime::TryCurrentError,
	},
	/// Credential builder validation failed.
	#[error("Unable to build credential.")]
	CredentialBuild(#[from] CredentialBuilderError),
}
