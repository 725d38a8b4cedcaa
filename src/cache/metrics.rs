// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of [`ExchangeMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
	/// Fetch cycles started, one per single-flight leader.
	pub attempts: u64,
	/// Fetch cycles that produced a token.
	pub successes: u64,
	/// Fetch cycles that failed.
	pub failures: u64,
	/// Extra exchange requests issued after a transient failure.
	pub retries: u64,
	/// Calls answered from the cache, including single-flight waiters.
	pub cache_hits: u64,
}

/// Thread-safe counters for token acquisition.
#[derive(Debug, Default)]
pub struct ExchangeMetrics {
	attempts: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
	retries: AtomicU64,
	cache_hits: AtomicU64,
}
impl ExchangeMetrics {
	/// Fetch cycles started.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Fetch cycles that produced a token.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Fetch cycles that failed.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Exchange retries issued inside fetch cycles.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Calls served without starting a fetch.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Copies every counter at once. Individual loads are relaxed, so a snapshot taken during a
	/// fetch may be mid-update.
	pub fn snapshot(&self) -> MetricsSnapshot {
		MetricsSnapshot {
			attempts: self.attempts(),
			successes: self.successes(),
			failures: self.failures(),
			retries: self.retries(),
			cache_hits: self.cache_hits(),
		}
	}

	pub(crate) fn record_attempt(&self) {
		bump(&self.attempts);
	}

	pub(crate) fn record_success(&self) {
		bump(&self.successes);
	}

	pub(crate) fn record_failure(&self) {
		bump(&self.failures);
	}

	pub(crate) fn record_retry(&self) {
		bump(&self.retries);
	}

	pub(crate) fn record_cache_hit(&self) {
		bump(&self.cache_hits);
	}
}

fn bump(counter: &AtomicU64) {
	counter.fetch_add(1, Ordering::Relaxed);
}
