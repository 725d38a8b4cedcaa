//! Splits a record set into fixed-size, index-tagged batches.

/// Ordered slice of the caller's records plus its position in the full set.
#[derive(Debug, PartialEq, Eq)]
pub struct Batch<'a, T> {
	/// Index of the first record within the original input.
	pub start_index: usize,
	/// Records in this batch, in input order.
	pub records: &'a [T],
}
impl<T> Batch<'_, T> {
	/// Number of records in the batch.
	pub fn len(&self) -> usize {
		self.records.len()
	}

	/// Returns `true` for a batch without records; [`plan`] never produces one.
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// Input indices covered by this batch.
	pub fn indices(&self) -> std::ops::Range<usize> {
		self.start_index..self.start_index + self.records.len()
	}
}
impl<T> Clone for Batch<'_, T> {
	fn clone(&self) -> Self {
		*self
	}
}
impl<T> Copy for Batch<'_, T> {}

/// Splits `records` into `ceil(n / batch_size)` batches, all full except possibly the last.
///
/// A `batch_size` of zero is treated as one.
pub fn plan<T>(records: &[T], batch_size: usize) -> Vec<Batch<'_, T>> {
	let size = batch_size.max(1);

	records
		.chunks(size)
		.enumerate()
		.map(|(position, records)| Batch { start_index: position * size, records })
		.collect()
}
