//! Credential values held by the cache, their expiry, and a validating builder.

pub mod secret;

pub use secret::*;

// self
use crate::_prelude::*;

/// When (if ever) a credential stops being usable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expiry {
	/// The credential never expires and is never proactively refreshed.
	Never,
	/// The credential stops being valid at this instant.
	At(#[serde(with = "time::serde::rfc3339")] OffsetDateTime),
}

/// Errors produced by [`CredentialBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialBuilderError {
	/// Issued when no access key id was provided.
	#[error("Access key id is required.")]
	MissingAccessKeyId,
	/// Issued when no secret access key was provided.
	#[error("Secret access key is required.")]
	MissingSecretAccessKey,
}

/// Short-lived credential produced by an upstream source.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Public key identifier.
	pub access_key_id: String,
	/// Secret key; callers must avoid logging it.
	pub secret_access_key: CredentialSecret,
	/// Optional session token issued alongside temporary keys.
	pub session_token: Option<CredentialSecret>,
	/// Free-form label naming the source that minted the credential.
	pub source: Option<String>,
	/// Expiry of the credential.
	pub expiry: Expiry,
}
impl Credential {
	/// Returns a builder for assembling credentials.
	pub fn builder() -> CredentialBuilder {
		CredentialBuilder::default()
	}

	/// Returns `true` if the credential carries an expiry instant.
	pub fn can_expire(&self) -> bool {
		matches!(self.expiry, Expiry::At(_))
	}

	/// Expiry instant, when the credential can expire.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		match self.expiry {
			Expiry::Never => None,
			Expiry::At(instant) => Some(instant),
		}
	}

	/// Returns `true` if both the key id and secret are non-empty.
	pub fn has_keys(&self) -> bool {
		!self.access_key_id.is_empty() && !self.secret_access_key.expose().is_empty()
	}

	/// Returns `true` if the credential has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		match self.expiry {
			Expiry::Never => false,
			Expiry::At(expires_at) => expires_at <= instant,
		}
	}

	/// Returns `true` if the credential may be served at the provided instant.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		self.has_keys() && !self.is_expired_at(instant)
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_key_id", &self.access_key_id)
			.field("secret_access_key", &"<redacted>")
			.field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
			.field("source", &self.source)
			.field("expiry", &self.expiry)
			.finish()
	}
}

/// Builder for [`Credential`].
#[derive(Clone, Debug, Default)]
pub struct CredentialBuilder {
	access_key_id: Option<String>,
	secret_access_key: Option<CredentialSecret>,
	session_token: Option<CredentialSecret>,
	source: Option<String>,
	expires_at: Option<OffsetDateTime>,
}
impl CredentialBuilder {
	/// Sets the access key id.
	pub fn access_key_id(mut self, id: impl Into<String>) -> Self {
		self.access_key_id = Some(id.into());

		self
	}

	/// Sets the secret access key.
	pub fn secret_access_key(mut self, secret: impl Into<String>) -> Self {
		self.secret_access_key = Some(CredentialSecret::new(secret));

		self
	}

	/// Sets the session token.
	pub fn session_token(mut self, token: impl Into<String>) -> Self {
		self.session_token = Some(CredentialSecret::new(token));

		self
	}

	/// Labels the source that minted the credential.
	pub fn source(mut self, source: impl Into<String>) -> Self {
		self.source = Some(source.into());

		self
	}

	/// Sets an absolute expiry instant; omit it for a non-expiring credential.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets the expiry relative to the provided instant.
	pub fn expires_in(self, from: OffsetDateTime, lifetime: Duration) -> Self {
		self.expires_at(from + lifetime)
	}

	/// Consumes the builder and produces a [`Credential`].
	pub fn build(self) -> Result<Credential, CredentialBuilderError> {
		let access_key_id = self.access_key_id.ok_or(CredentialBuilderError::MissingAccessKeyId)?;
		let secret_access_key =
			self.secret_access_key.ok_or(CredentialBuilderError::MissingSecretAccessKey)?;
		let expiry = self.expires_at.map_or(Expiry::Never, Expiry::At);

		Ok(Credential {
			access_key_id,
			secret_access_key,
			session_token: self.session_token,
			source: self.source,
			expiry,
		})
	}
}
