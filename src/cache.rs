//! Per-identity token cache with single-flight refresh.
//!
//! Every [`Identity`] maps to one cache entry holding an async guard and a small state cell.
//! Callers first check the state cell for a usable token. On a miss they queue on the guard; the
//! first one through resolves, signs, and exchanges while the rest wait. When a waiter gets the
//! guard it compares the entry generation with the one it saw before queueing: a changed
//! generation means a fetch completed in the meantime, so the waiter returns that fetch's token
//! or error instead of starting another exchange.

mod config;
mod metrics;

pub use config::CacheConfig;
pub use metrics::{ExchangeMetrics, MetricsSnapshot};

// self
use crate::{
	_prelude::*,
	auth::{
		BEARER, CachedToken, CredentialMaterial, CredentialResolver, Identity, IdentityKey,
		ResolvedCredential, SignedAssertion, TokenSecret, TokenSigner,
	},
	error::AuthError,
	exchange::TokenExchange,
	obs::{OpKind, OpOutcome, OpSpan},
};

/// Lifecycle state of one identity's cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenState {
	/// No usable token is cached.
	Empty,
	/// A fetch is in flight.
	Fetching,
	/// A token outside the skew buffer is cached.
	Valid,
}

/// Token cache owned by a client instance.
///
/// Independent identities never contend: each has its own guard, and the map lock is only held
/// long enough to look up or insert an entry. Entries without a token are dropped once their last
/// caller leaves (after a failed fetch or an invalidation); entries holding a token stay until
/// invalidated, so the map grows with the number of distinct identities that fetched successfully.
pub struct TokenCache {
	resolver: CredentialResolver,
	signer: TokenSigner,
	exchanger: Arc<dyn TokenExchange>,
	config: CacheConfig,
	metrics: Arc<ExchangeMetrics>,
	entries: Mutex<HashMap<IdentityKey, Arc<CacheEntry>>>,
}
impl TokenCache {
	/// Creates a cache that exchanges assertions through `exchanger`.
	pub fn new(exchanger: Arc<dyn TokenExchange>) -> Self {
		Self {
			resolver: CredentialResolver::default(),
			signer: TokenSigner,
			exchanger,
			config: CacheConfig::default(),
			metrics: Default::default(),
			entries: Default::default(),
		}
	}

	/// Replaces the credential resolver.
	pub fn with_resolver(mut self, resolver: CredentialResolver) -> Self {
		self.resolver = resolver;

		self
	}

	/// Replaces the cache configuration.
	pub fn with_config(mut self, config: CacheConfig) -> Self {
		self.config = config;

		self
	}

	/// Active configuration.
	pub fn config(&self) -> &CacheConfig {
		&self.config
	}

	/// Shared acquisition counters.
	pub fn metrics(&self) -> Arc<ExchangeMetrics> {
		self.metrics.clone()
	}

	/// Returns a token with more than the skew buffer left, fetching one if needed.
	///
	/// The exchange and its retry run on tokio timers, so this must be polled inside a tokio
	/// runtime with the time driver enabled.
	pub async fn get_valid_token(&self, identity: &Identity) -> Result<CachedToken> {
		let span = OpSpan::start(OpKind::TokenFetch, "get_valid_token");
		let key = identity.key();
		let result = span.instrument(self.acquire(identity, key.clone())).await;

		if result.is_err() {
			self.prune(&key);
		}

		span.finish(if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure });

		result
	}

	/// Drops the cached token for `identity`; the next caller starts a new fetch.
	pub fn invalidate(&self, identity: &Identity) {
		let key = identity.key();

		if let Some(entry) = self.existing(&key) {
			entry.state.lock().reset();

			drop(entry);
			self.prune(&key);

			#[cfg(feature = "tracing")]
			tracing::debug!("cached token invalidated");
		}
	}

	/// Drops the cached token only if it still holds `value`.
	///
	/// Returns `true` when the entry was cleared. A concurrent refresh that already replaced the
	/// rejected token is left alone.
	pub fn invalidate_token(&self, identity: &Identity, value: &TokenSecret) -> bool {
		let key = identity.key();
		let Some(entry) = self.existing(&key) else {
			return false;
		};
		let cleared = {
			let mut state = entry.state.lock();
			let matches = state.token.as_ref().is_some_and(|token| &token.value == value);

			if matches {
				state.reset();
			}

			matches
		};

		if cleared {
			drop(entry);
			self.prune(&key);

			#[cfg(feature = "tracing")]
			tracing::debug!("rejected bearer token invalidated");
		}

		cleared
	}

	/// Reports the entry state for `identity`.
	pub fn state(&self, identity: &Identity) -> TokenState {
		let Some(entry) = self.existing(&identity.key()) else {
			return TokenState::Empty;
		};

		if entry.guard.try_lock().is_none() {
			return TokenState::Fetching;
		}

		if entry.state.lock().usable(OffsetDateTime::now_utc(), self.config.skew_buffer()).is_some()
		{
			TokenState::Valid
		} else {
			TokenState::Empty
		}
	}

	async fn acquire(&self, identity: &Identity, key: IdentityKey) -> Result<CachedToken> {
		let entry = self.entry(key);
		let skew = self.config.skew_buffer();
		let observed = {
			let state = entry.state.lock();

			if let Some(token) = state.usable(OffsetDateTime::now_utc(), skew) {
				self.metrics.record_cache_hit();

				return Ok(token);
			}

			state.generation
		};
		let _singleflight = entry.guard.lock().await;

		{
			let state = entry.state.lock();

			if state.generation != observed {
				if let Some(token) = state.usable(OffsetDateTime::now_utc(), skew) {
					self.metrics.record_cache_hit();

					return Ok(token);
				}
				if let Some(err) = &state.failure {
					return Err(err.clone());
				}
			}
		}

		self.metrics.record_attempt();

		let result = self.fetch(identity).await;
		let mut state = entry.state.lock();

		state.generation = state.generation.wrapping_add(1);

		match &result {
			Ok(token) => {
				self.metrics.record_success();

				state.token = Some(token.clone());
				state.failure = None;
			},
			Err(err) => {
				self.metrics.record_failure();

				state.token = None;
				state.failure = Some(err.clone());
			},
		}

		result
	}

	async fn fetch(&self, identity: &Identity) -> Result<CachedToken> {
		let credential = self.resolver.resolve(identity)?;
		let (token, exchanged) = match &credential.material {
			CredentialMaterial::ServiceAccount(_) =>
				(self.exchange_with_retry(&credential).await?, true),
			CredentialMaterial::StaticToken(value) => (CachedToken::from_static_bearer(value), false),
			CredentialMaterial::ApiKey(key) =>
				(CachedToken::non_expiring(key.expose(), BEARER), false),
		};
		let skew = self.config.skew_buffer();

		// Every token handed out must outlive the skew buffer.
		match token.expires_at {
			Some(expires_at) if !token.is_usable_at(OffsetDateTime::now_utc(), skew) =>
				Err(if exchanged {
					AuthError::InvalidTokenResponse {
						reason: format!(
							"token expiring at {expires_at} does not outlive the {skew} skew buffer"
						),
						status: None,
						source: None,
					}
				} else {
					AuthError::ExpiredToken { expired_at: expires_at }
				}
				.into()),
			_ => Ok(token),
		}
	}

	async fn exchange_with_retry(&self, credential: &ResolvedCredential) -> Result<CachedToken> {
		let mut retried = false;

		loop {
			let assertion = self.signer.sign(credential, self.config.assertion_ttl())?;

			match self.exchange_once(assertion).await {
				Ok(token) => return Ok(token),
				Err(Error::Auth(AuthError::TransportFailure { retry_after, .. })) if !retried => {
					let delay = self.config.retry_delay(retry_after);

					#[cfg(feature = "tracing")]
					tracing::warn!(
						delay_ms = delay.as_millis() as u64,
						"token exchange failed in transport; retrying once"
					);

					retried = true;

					self.metrics.record_retry();
					tokio::time::sleep(delay).await;
				},
				Err(err) => return Err(err),
			}
		}
	}

	async fn exchange_once(&self, assertion: SignedAssertion) -> Result<CachedToken> {
		let timeout = self.config.exchange_timeout();

		tokio::time::timeout(timeout.unsigned_abs(), self.exchanger.exchange(assertion))
			.await
			.unwrap_or_else(|_| {
				Err(AuthError::TransportFailure {
					message: format!("token exchange timed out after {timeout}"),
					status: None,
					retry_after: None,
					source: None,
				}
				.into())
			})
	}

	fn entry(&self, key: IdentityKey) -> Arc<CacheEntry> {
		self.entries.lock().entry(key).or_default().clone()
	}

	fn existing(&self, key: &IdentityKey) -> Option<Arc<CacheEntry>> {
		self.entries.lock().get(key).cloned()
	}

	/// Removes the entry for `key` when it holds no token and nobody else references it.
	///
	/// Entry handles are only cloned under the map lock, so a strong count of one observed here
	/// means no caller is queued on the guard or about to be.
	fn prune(&self, key: &IdentityKey) {
		let mut entries = self.entries.lock();

		if entries
			.get(key)
			.is_some_and(|entry| Arc::strong_count(entry) == 1 && entry.state.lock().token.is_none())
		{
			entries.remove(key);
		}
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("config", &self.config)
			.field("entries", &self.entries.lock().len())
			.finish()
	}
}

#[derive(Default)]
struct CacheEntry {
	guard: AsyncMutex<()>,
	state: Mutex<EntryState>,
}

#[derive(Default)]
struct EntryState {
	token: Option<CachedToken>,
	generation: u64,
	failure: Option<Error>,
}
impl EntryState {
	fn usable(&self, now: OffsetDateTime, skew: Duration) -> Option<CachedToken> {
		self.token.as_ref().filter(|token| token.is_usable_at(now, skew)).cloned()
	}

	fn reset(&mut self) {
		self.token = None;
		self.failure = None;
		self.generation = self.generation.wrapping_add(1);
	}
}
