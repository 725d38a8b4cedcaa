// crates.io
use rand::Rng;
// self
use crate::_prelude::*;

/// Tuning knobs for [`TokenCache`](crate::cache::TokenCache).
///
/// Every `with_*` method clamps out-of-range input instead of failing, so a config value is
/// always usable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
	skew_buffer: Duration,
	assertion_ttl: Duration,
	retry_backoff: Duration,
	exchange_timeout: Duration,
	max_retry_after: Duration,
}
impl CacheConfig {
	/// Default margin kept between hand-off and expiry.
	pub const DEFAULT_SKEW_BUFFER: Duration = Duration::seconds(5);
	/// Default base delay before the single transport retry.
	pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::milliseconds(250);
	/// Default bound on one token-endpoint call.
	pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::seconds(30);
	/// Default ceiling applied to upstream `Retry-After` hints.
	pub const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::seconds(5);

	const MIN_ASSERTION_TTL: Duration = Duration::seconds(1);
	const MAX_ASSERTION_TTL: Duration = Duration::hours(1);
	const MIN_EXCHANGE_TIMEOUT: Duration = Duration::milliseconds(10);

	/// Sets the skew buffer; negative values clamp to zero.
	pub fn with_skew_buffer(mut self, skew: Duration) -> Self {
		self.skew_buffer = skew.max(Duration::ZERO);

		self
	}

	/// Sets the assertion lifetime; clamped to between one second and one hour.
	pub fn with_assertion_ttl(mut self, ttl: Duration) -> Self {
		self.assertion_ttl = ttl.clamp(Self::MIN_ASSERTION_TTL, Self::MAX_ASSERTION_TTL);

		self
	}

	/// Sets the base retry backoff; negative values clamp to zero.
	pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
		self.retry_backoff = backoff.max(Duration::ZERO);

		self
	}

	/// Sets the per-exchange timeout; values below 10ms clamp up.
	pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
		self.exchange_timeout = timeout.max(Self::MIN_EXCHANGE_TIMEOUT);

		self
	}

	/// Sets the ceiling for `Retry-After` hints; negative values clamp to zero.
	pub fn with_max_retry_after(mut self, ceiling: Duration) -> Self {
		self.max_retry_after = ceiling.max(Duration::ZERO);

		self
	}

	/// Margin kept between hand-off and expiry.
	pub fn skew_buffer(&self) -> Duration {
		self.skew_buffer
	}

	/// Lifetime of each signed assertion.
	pub fn assertion_ttl(&self) -> Duration {
		self.assertion_ttl
	}

	/// Base delay before the single transport retry.
	pub fn retry_backoff(&self) -> Duration {
		self.retry_backoff
	}

	/// Bound on one token-endpoint call.
	pub fn exchange_timeout(&self) -> Duration {
		self.exchange_timeout
	}

	/// Ceiling applied to upstream `Retry-After` hints.
	pub fn max_retry_after(&self) -> Duration {
		self.max_retry_after
	}

	/// Delay before retrying: the clamped upstream hint, or the base backoff plus up to 50% jitter.
	pub(crate) fn retry_delay(&self, hint: Option<Duration>) -> std::time::Duration {
		if let Some(hint) = hint {
			return hint.clamp(Duration::ZERO, self.max_retry_after).unsigned_abs();
		}

		let base = self.retry_backoff.unsigned_abs();
		let jitter_cap = u64::try_from(base.as_millis() / 2).unwrap_or(u64::MAX);
		let jitter = if jitter_cap == 0 { 0 } else { rand::rng().random_range(0..=jitter_cap) };

		base + std::time::Duration::from_millis(jitter)
	}
}
impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			skew_buffer: Self::DEFAULT_SKEW_BUFFER,
			assertion_ttl: crate::auth::DEFAULT_ASSERTION_TTL,
			retry_backoff: Self::DEFAULT_RETRY_BACKOFF,
			exchange_timeout: Self::DEFAULT_EXCHANGE_TIMEOUT,
			max_retry_after: Self::DEFAULT_MAX_RETRY_AFTER,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn builders_clamp_out_of_range_values() {
		let config = CacheConfig::default()
			.with_skew_buffer(Duration::seconds(-3))
			.with_assertion_ttl(Duration::days(2))
			.with_exchange_timeout(Duration::ZERO)
			.with_max_retry_after(Duration::seconds(-1));

		assert_eq!(config.skew_buffer(), Duration::ZERO);
		assert_eq!(config.assertion_ttl(), Duration::hours(1));
		assert_eq!(config.exchange_timeout(), Duration::milliseconds(10));
		assert_eq!(config.max_retry_after(), Duration::ZERO);
	}

	#[test]
	fn retry_delay_prefers_clamped_hint() {
		let config = CacheConfig::default();

		assert_eq!(
			config.retry_delay(Some(Duration::seconds(60))),
			std::time::Duration::from_secs(5)
		);
		assert_eq!(config.retry_delay(Some(Duration::seconds(-2))), std::time::Duration::ZERO);

		let delay = config.retry_delay(None);

		assert!(delay >= std::time::Duration::from_millis(250));
		assert!(delay <= std::time::Duration::from_millis(375));
	}
}
