//! Validated per-call batching options.

// std
use std::num::NonZeroUsize;
// self
use crate::{_prelude::*, error::ConfigError};

/// Validated per-call settings for bulk operations.
///
/// Deserializing goes through [`RequestOptions::new`], so out-of-range values are rejected the
/// same way whether they come from code or configuration files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawRequestOptions")]
pub struct RequestOptions {
	batch_size: NonZeroUsize,
	concurrency_limit: NonZeroUsize,
	dispatch_timeout: Option<Duration>,
}
impl RequestOptions {
	/// Default number of records per batch.
	pub const DEFAULT_BATCH_SIZE: usize = 100;
	/// Default number of batches in flight.
	pub const DEFAULT_CONCURRENCY_LIMIT: usize = 1;

	/// Validates both limits; values below 1 are rejected.
	pub fn new(batch_size: i64, concurrency_limit: i64) -> Result<Self, ConfigError> {
		let batch_size =
			positive(batch_size).ok_or(ConfigError::InvalidBatchSize { value: batch_size })?;
		let concurrency_limit = positive(concurrency_limit)
			.ok_or(ConfigError::InvalidConcurrencyLimit { value: concurrency_limit })?;

		Ok(Self { batch_size, concurrency_limit, dispatch_timeout: None })
	}

	/// Bounds each dispatch call; non-positive durations disable the bound.
	pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
		self.dispatch_timeout = timeout.is_positive().then_some(timeout);

		self
	}

	/// Records per batch.
	pub fn batch_size(&self) -> usize {
		self.batch_size.get()
	}

	/// Maximum batches in flight.
	pub fn concurrency_limit(&self) -> usize {
		self.concurrency_limit.get()
	}

	/// Per-dispatch timeout, if any.
	pub fn dispatch_timeout(&self) -> Option<Duration> {
		self.dispatch_timeout
	}
}
impl Default for RequestOptions {
	fn default() -> Self {
		Self {
			batch_size: NonZeroUsize::new(Self::DEFAULT_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN),
			concurrency_limit: NonZeroUsize::MIN,
			dispatch_timeout: None,
		}
	}
}
impl TryFrom<RawRequestOptions> for RequestOptions {
	type Error = ConfigError;

	fn try_from(raw: RawRequestOptions) -> Result<Self, Self::Error> {
		let options = Self::new(raw.batch_size, raw.concurrency_limit)?;

		Ok(match raw.dispatch_timeout_ms {
			Some(ms) => options
				.with_dispatch_timeout(Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))),
			None => options,
		})
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRequestOptions {
	#[serde(default = "default_batch_size")]
	batch_size: i64,
	#[serde(default = "default_concurrency_limit")]
	concurrency_limit: i64,
	#[serde(default)]
	dispatch_timeout_ms: Option<u64>,
}

fn default_batch_size() -> i64 {
	RequestOptions::DEFAULT_BATCH_SIZE as i64
}

fn default_concurrency_limit() -> i64 {
	RequestOptions::DEFAULT_CONCURRENCY_LIMIT as i64
}

fn positive(value: i64) -> Option<NonZeroUsize> {
	usize::try_from(value).ok().and_then(NonZeroUsize::new)
}
