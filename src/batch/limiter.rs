//! Bounded worker pool that drives batches through a dispatcher.
//!
//! Workers share a queue of `(position, batch)` pairs and write each outcome into the slot at that
//! position, so output order never depends on completion order. All workers run as futures
//! inside the caller's task; nothing is spawned.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use futures::future;
// self
use crate::{
	_prelude::*,
	batch::{Batch, BatchResult},
	error::BatchError,
};

/// Cooperative cancellation flag shared between a bulk call and its caller.
///
/// Cancelling stops workers from taking new batches. Batches already in flight run to completion.
#[derive(Clone, Debug, Default)]
pub struct CancelSignal(Arc<AtomicBool>);
impl CancelSignal {
	/// Requests cancellation.
	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	/// Returns `true` once [`CancelSignal::cancel`] has been called.
	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

/// Outcome of one batch, tagged with the input range it covers.
#[derive(Clone, Debug)]
pub struct BatchOutcome<O> {
	/// Index of the batch's first record within the original input.
	pub start_index: usize,
	/// Records in the batch.
	pub len: usize,
	/// Dispatcher result.
	pub result: BatchResult<O>,
}
impl<O> BatchOutcome<O> {
	fn cancelled<T>(batch: &Batch<'_, T>) -> Self {
		Self {
			start_index: batch.start_index,
			len: batch.len(),
			result: Err(BatchError::Cancelled),
		}
	}
}

/// Caps the number of batches in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConcurrencyLimiter {
	limit: usize,
}
impl ConcurrencyLimiter {
	/// Creates a limiter; a limit of zero is treated as one.
	pub fn new(limit: usize) -> Self {
		Self { limit: limit.max(1) }
	}

	/// Maximum batches in flight.
	pub fn limit(&self) -> usize {
		self.limit
	}

	/// Dispatches every batch with at most [`limit`](Self::limit) in flight.
	///
	/// Returns one outcome per batch in input order. A failing batch never stops its siblings.
	/// Batches not started before `cancel` fires are reported as [`BatchError::Cancelled`].
	pub async fn run<'b, T, O, F, Fut>(
		&self,
		batches: &'b [Batch<'b, T>],
		cancel: &CancelSignal,
		dispatch: F,
	) -> Vec<BatchOutcome<O>>
	where
		F: Fn(&'b Batch<'b, T>) -> Fut,
		Fut: Future<Output = BatchResult<O>>,
	{
		let queue = Mutex::new(batches.iter().enumerate());
		let slots = Mutex::new((0..batches.len()).map(|_| None).collect::<Vec<Option<_>>>());
		let workers = self.limit.min(batches.len());
		let (queue, slots_ref, dispatch) = (&queue, &slots, &dispatch);

		future::join_all((0..workers).map(move |_| async move {
			loop {
				if cancel.is_cancelled() {
					break;
				}

				let next = queue.lock().next();
				let Some((position, batch)) = next else {
					break;
				};
				let result = dispatch(batch).await;

				#[cfg(feature = "tracing")]
				{
					if let Err(err) = &result {
						tracing::warn!(start_index = batch.start_index, error = %err, "batch failed");
					}
				}

				slots_ref.lock()[position] =
					Some(BatchOutcome { start_index: batch.start_index, len: batch.len(), result });
			}
		}))
		.await;

		slots
			.into_inner()
			.into_iter()
			.zip(batches)
			.map(|(slot, batch)| slot.unwrap_or_else(|| BatchOutcome::cancelled(batch)))
			.collect()
	}
}
