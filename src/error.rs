//! Crate-level error types shared across credential resolution, token exchange, and dispatch.

// std
use std::path::PathBuf;
// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Every variant is cheap to clone so the outcome of one single-flight token fetch can be
/// handed to every caller that waited on it.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Credential input could not be resolved into an identity.
	#[error(transparent)]
	Credential(#[from] CredentialError),
	/// Assertion signing failed.
	#[error(transparent)]
	Signing(#[from] SigningError),
	/// Token acquisition or bearer usage failed.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Returns `true` when repeating the same call may succeed without caller changes.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Auth(AuthError::TransportFailure { .. }))
	}
}

/// Failures raised while validating and loading credential sources.
#[derive(Clone, Debug, ThisError)]
pub enum CredentialError {
	/// More than one credential source was populated.
	#[error("Exactly one credential source is allowed, found: {}.", .found.join(", "))]
	MultipleSources {
		/// Labels of the populated sources.
		found: Vec<&'static str>,
	},
	/// No credential source was populated.
	#[error("No credential source was provided.")]
	MissingSource,
	/// Credential document is missing a field or carries an unusable value.
	#[error("Credential field `{field}` is malformed: {reason}.")]
	MalformedCredentialFile {
		/// Offending field name (`$` for the document itself).
		field: String,
		/// Human-readable reason.
		reason: String,
	},
	/// Credential file could not be read.
	#[error("Credential file {} could not be read.", .path.display())]
	Unreadable {
		/// Path handed to the credential reader.
		path: PathBuf,
		/// Underlying I/O failure.
		#[source]
		source: Arc<std::io::Error>,
	},
}
impl CredentialError {
	pub(crate) fn malformed(field: impl Into<String>, reason: impl Display) -> Self {
		Self::MalformedCredentialFile { field: field.into(), reason: reason.to_string() }
	}
}

/// Failures raised while building signed assertions.
#[derive(Clone, Debug, ThisError)]
pub enum SigningError {
	/// Private key could not be parsed or the signature operation failed.
	#[error("Private key material could not be used for signing.")]
	InvalidKeyMaterial {
		/// Underlying JWT failure.
		#[source]
		source: Arc<jsonwebtoken::errors::Error>,
	},
	/// The credential has no private key to sign with.
	#[error("A {kind} credential carries no key material to sign with.")]
	NoKeyMaterial {
		/// Credential kind label.
		kind: &'static str,
	},
}
impl From<jsonwebtoken::errors::Error> for SigningError {
	fn from(e: jsonwebtoken::errors::Error) -> Self {
		Self::InvalidKeyMaterial { source: Arc::new(e) }
	}
}

/// Token acquisition and bearer usage failures.
#[derive(Clone, Debug, ThisError)]
pub enum AuthError {
	/// Token endpoint answered with a non-success status.
	#[error("Token endpoint rejected the assertion with status {status}: {message}.")]
	TokenExchangeRejected {
		/// HTTP status code.
		status: u16,
		/// Server-supplied message or body preview.
		message: String,
	},
	/// Network, timeout, or I/O failure while calling the token endpoint.
	#[error("Transport failure while calling the token endpoint: {message}.")]
	TransportFailure {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when one was observed.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
		/// Transport-specific cause.
		#[source]
		source: Option<SharedError>,
	},
	/// The vault rejected a bearer token that the cache considered valid.
	#[error("Vault rejected the bearer token.")]
	InvalidBearerToken,
	/// A token that cannot be refreshed has expired.
	#[error("Bearer token expired at {expired_at}.")]
	ExpiredToken {
		/// Expiry instant carried by the token.
		expired_at: OffsetDateTime,
	},
	/// Token endpoint answered with a success status but an unusable body.
	#[error("Token endpoint returned an unusable response: {reason}.")]
	InvalidTokenResponse {
		/// Human-readable reason.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Structured JSON failure, when parsing failed.
		#[source]
		source: Option<Arc<serde_path_to_error::Error<serde_json::Error>>>,
	},
}
impl AuthError {
	/// Wraps a transport-specific error as a [`AuthError::TransportFailure`].
	pub fn transport(
		message: impl Into<String>,
		src: impl 'static + Send + Sync + StdError,
	) -> Self {
		Self::TransportFailure {
			message: message.into(),
			status: None,
			retry_after: None,
			source: Some(Arc::new(src)),
		}
	}
}

/// Configuration and validation failures.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// Batch size was zero or negative.
	#[error("Batch size must be at least 1, got {value}.")]
	InvalidBatchSize {
		/// Rejected value.
		value: i64,
	},
	/// Concurrency limit was zero or negative.
	#[error("Concurrency limit must be at least 1, got {value}.")]
	InvalidConcurrencyLimit {
		/// Rejected value.
		value: i64,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// Token request could not be assembled.
	#[error("Token request could not be built.")]
	HttpRequest {
		/// Underlying request builder failure.
		#[source]
		source: Arc<oauth2::http::Error>,
	},
	/// The runtime backing the blocking facade could not be started.
	#[error("Blocking runtime could not be started.")]
	Runtime {
		/// Underlying I/O failure.
		#[source]
		source: Arc<std::io::Error>,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
impl From<oauth2::http::Error> for ConfigError {
	fn from(e: oauth2::http::Error) -> Self {
		Self::HttpRequest { source: Arc::new(e) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failure of one batch or one record within a bulk call.
///
/// Never returned on its own: bulk calls report these inside
/// [`AggregateStatus::PartialSuccess`](crate::batch::AggregateStatus::PartialSuccess).
#[derive(Clone, Debug, ThisError)]
pub enum BatchError {
	/// Vault rejected the whole batch.
	#[error("Vault rejected the batch with status {status}: {message}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Server-supplied message.
		message: String,
	},
	/// Vault rejected a single record.
	#[error("Vault rejected the record: {message}.")]
	Record {
		/// Server-supplied message.
		message: String,
	},
	/// Vault rejected the bearer token presented with the batch.
	#[error("Vault rejected the bearer token.")]
	InvalidBearerToken,
	/// Network failure while submitting the batch.
	#[error("Transport failure while dispatching the batch: {message}.")]
	Transport {
		/// Summary of the failure.
		message: String,
	},
	/// The dispatch did not complete within the configured timeout.
	#[error("Batch dispatch timed out after {after}.")]
	Timeout {
		/// Configured timeout.
		after: Duration,
	},
	/// The dispatcher returned a different number of outcomes than records submitted.
	#[error("Dispatcher returned {actual} outcomes for a batch of {expected} records.")]
	LengthMismatch {
		/// Records in the batch.
		expected: usize,
		/// Outcomes returned.
		actual: usize,
	},
	/// The batch was never dispatched because the call was cancelled.
	#[error("Batch was not dispatched before cancellation.")]
	Cancelled,
	/// A replacement bearer token could not be obtained after the vault rejected the first one.
	#[error("Bearer token could not be refreshed.")]
	Auth {
		/// Token acquisition failure.
		#[source]
		source: Error,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn multiple_sources_lists_every_label() {
		let err = CredentialError::MultipleSources { found: vec!["filePath", "apiKey"] };

		assert_eq!(
			err.to_string(),
			"Exactly one credential source is allowed, found: filePath, apiKey."
		);
	}

	#[test]
	fn cloned_errors_keep_their_source() {
		let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
		let err = Error::from(CredentialError::Unreadable {
			path: PathBuf::from("/tmp/creds.json"),
			source: Arc::new(io),
		});
		let cloned = err.clone();
		let source = StdError::source(&cloned).expect("Cloned error should still expose the I/O cause.");

		assert_eq!(source.to_string(), "gone");
		assert!(!cloned.is_transient());
	}

	#[test]
	fn transport_failures_are_transient() {
		let err: Error = AuthError::TransportFailure {
			message: "connection reset".into(),
			status: None,
			retry_after: None,
			source: None,
		}
		.into();

		assert!(err.is_transient());
	}
}
