//! Caller-supplied transport that submits one batch to the vault.

// self
use crate::{_prelude::*, auth::CachedToken, batch::Batch, error::BatchError};

/// Per-record result produced by a dispatcher.
pub type RecordOutcome<O> = std::result::Result<O, BatchError>;

/// Result of submitting one batch: one outcome per record, or a batch-wide failure.
pub type BatchResult<O> = std::result::Result<Vec<RecordOutcome<O>>, BatchError>;

/// Boxed future returned by [`BatchDispatcher::dispatch`].
pub type DispatchFuture<'a, O> = Pin<Box<dyn Future<Output = BatchResult<O>> + 'a + Send>>;

/// Transport boundary that submits one batch to the vault.
///
/// The returned vector must line up with `batch.records`; a length mismatch turns every record
/// of that batch into [`BatchError::LengthMismatch`]. Returning
/// [`BatchError::InvalidBearerToken`] makes the client refresh the token and submit the batch
/// once more.
pub trait BatchDispatcher<T>
where
	Self: Send + Sync,
{
	/// Per-record success payload.
	type Output: Send;

	/// Submits `batch`, presenting `token` as the bearer.
	fn dispatch<'a>(
		&'a self,
		batch: &'a Batch<'a, T>,
		token: &'a CachedToken,
	) -> DispatchFuture<'a, Self::Output>;
}
impl<T, D> BatchDispatcher<T> for Arc<D>
where
	D: ?Sized + BatchDispatcher<T>,
{
	type Output = D::Output;

	fn dispatch<'a>(
		&'a self,
		batch: &'a Batch<'a, T>,
		token: &'a CachedToken,
	) -> DispatchFuture<'a, Self::Output> {
		(**self).dispatch(batch, token)
	}
}
