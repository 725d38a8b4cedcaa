//! Bulk-operation entry points tying the token cache to batched dispatch.

// self
use crate::{
	_prelude::*,
	auth::{CachedToken, Identity},
	batch::{
		self, AggregatedResult, Batch, BatchDispatcher, BatchResult, CancelSignal,
		ConcurrencyLimiter, RequestOptions,
	},
	cache::TokenCache,
	error::{BatchError, ConfigError},
	obs::{self, OpKind, OpOutcome, OpSpan},
};
#[cfg(feature = "reqwest")]
use crate::{
	exchange::{ReqwestTransportErrorMapper, TokenExchanger},
	http::ReqwestHttpClient,
};

/// Vault client owning a shared [`TokenCache`].
///
/// Cloning is cheap; clones share the cache, so tokens fetched through one clone are reused by
/// all of them.
#[derive(Clone, Debug)]
pub struct VaultClient {
	cache: Arc<TokenCache>,
}
impl VaultClient {
	/// Creates a client around an existing cache.
	pub fn new(cache: Arc<TokenCache>) -> Self {
		Self { cache }
	}

	/// Creates a client whose cache exchanges assertions over the provided reqwest client.
	#[cfg(feature = "reqwest")]
	pub fn with_reqwest(http_client: ReqwestHttpClient) -> Self {
		let exchanger =
			TokenExchanger::with_http_client(http_client, ReqwestTransportErrorMapper);

		Self::new(Arc::new(TokenCache::new(Arc::new(exchanger))))
	}

	/// Shared token cache.
	pub fn cache(&self) -> &Arc<TokenCache> {
		&self.cache
	}

	/// Submits `records` in batches and aggregates the per-record outcomes.
	///
	/// Token acquisition failures abort the call before any batch is dispatched. Batch failures
	/// never abort siblings; they are reported inside
	/// [`AggregateStatus::PartialSuccess`](crate::batch::AggregateStatus::PartialSuccess).
	pub async fn bulk<T, D>(
		&self,
		identity: &Identity,
		records: &[T],
		options: &RequestOptions,
		dispatcher: &D,
	) -> Result<AggregatedResult<D::Output>>
	where
		T: Sync,
		D: BatchDispatcher<T>,
	{
		self.bulk_with_cancel(identity, records, options, dispatcher, &CancelSignal::default())
			.await
	}

	/// Same as [`VaultClient::bulk`], stopping early once `cancel` fires.
	///
	/// Batches already in flight when cancellation is requested finish and are included; the
	/// rest are reported as [`BatchError::Cancelled`] and the result is marked `cancelled`.
	pub async fn bulk_with_cancel<T, D>(
		&self,
		identity: &Identity,
		records: &[T],
		options: &RequestOptions,
		dispatcher: &D,
		cancel: &CancelSignal,
	) -> Result<AggregatedResult<D::Output>>
	where
		T: Sync,
		D: BatchDispatcher<T>,
	{
		let span = OpSpan::start(OpKind::BulkDispatch, "bulk");
		let result = span
			.instrument(async {
				if records.is_empty() {
					return Ok(AggregatedResult::empty());
				}

				self.cache.get_valid_token(identity).await?;

				let batches = batch::plan(records, options.batch_size());
				let outcomes = ConcurrencyLimiter::new(options.concurrency_limit())
					.run(&batches, cancel, |batch| {
						self.dispatch_batch(identity, batch, options.dispatch_timeout(), dispatcher)
					})
					.await;

				Ok(batch::aggregate(outcomes, records.len()))
			})
			.await;

		let outcome = match &result {
			Ok(aggregated) => {
				let failed = aggregated.failed_indices().len();

				obs::record_bulk_records(records.len() - failed, failed);

				if failed == 0 { OpOutcome::Success } else { OpOutcome::Failure }
			},
			Err(_) => OpOutcome::Failure,
		};

		span.finish(outcome);

		result
	}

	/// Blocking form of [`VaultClient::bulk`] for synchronous callers.
	///
	/// Drives the call on a dedicated current-thread runtime. Must not be called from inside an
	/// async runtime.
	pub fn bulk_blocking<T, D>(
		&self,
		identity: &Identity,
		records: &[T],
		options: &RequestOptions,
		dispatcher: &D,
	) -> Result<AggregatedResult<D::Output>>
	where
		T: Sync,
		D: BatchDispatcher<T>,
	{
		let runtime = tokio::runtime::Builder::new_current_thread()
			.enable_all()
			.build()
			.map_err(|e| ConfigError::Runtime { source: Arc::new(e) })?;

		runtime.block_on(self.bulk(identity, records, options, dispatcher))
	}

	async fn dispatch_batch<'a, T, D>(
		&'a self,
		identity: &'a Identity,
		batch: &'a Batch<'a, T>,
		timeout: Option<Duration>,
		dispatcher: &'a D,
	) -> BatchResult<D::Output>
	where
		D: BatchDispatcher<T>,
	{
		let token = self.token_for_batch(identity).await?;

		match dispatch_once(dispatcher, batch, &token, timeout).await {
			Err(BatchError::InvalidBearerToken) => (),
			other => return other,
		}

		#[cfg(feature = "tracing")]
		tracing::warn!(start_index = batch.start_index, "bearer token rejected; refreshing once");

		self.cache.invalidate_token(identity, &token.value);

		let fresh = self.token_for_batch(identity).await?;

		dispatch_once(dispatcher, batch, &fresh, timeout).await
	}

	async fn token_for_batch(&self, identity: &Identity) -> Result<CachedToken, BatchError> {
		self.cache.get_valid_token(identity).await.map_err(|source| BatchError::Auth { source })
	}
}

async fn dispatch_once<'a, T, D>(
	dispatcher: &'a D,
	batch: &'a Batch<'a, T>,
	token: &'a CachedToken,
	timeout: Option<Duration>,
) -> BatchResult<D::Output>
where
	D: BatchDispatcher<T>,
{
	let dispatch = dispatcher.dispatch(batch, token);

	match timeout {
		Some(after) => tokio::time::timeout(after.unsigned_abs(), dispatch)
			.await
			.unwrap_or_else(|_| Err(BatchError::Timeout { after })),
		None => dispatch.await,
	}
}
