//! Re-expands batch outcomes into one ordered, per-record result.

// self
use crate::{
	batch::{BatchOutcome, RecordOutcome},
	error::BatchError,
};

/// Overall classification of a bulk call.
#[derive(Clone, Debug)]
pub enum AggregateStatus {
	/// Every record succeeded.
	Success,
	/// At least one record failed; failures are listed by input index, ascending.
	PartialSuccess {
		/// Failed input indices with their errors.
		failures: Vec<(usize, BatchError)>,
	},
}

/// Ordered per-record results of a bulk call.
#[derive(Clone, Debug)]
pub struct AggregatedResult<O> {
	/// One outcome per input record, in input order.
	pub results: Vec<RecordOutcome<O>>,
	/// Overall classification.
	pub status: AggregateStatus,
	/// `true` when cancellation left at least one batch undispatched.
	pub cancelled: bool,
}
impl<O> AggregatedResult<O> {
	/// Result of a call with no records.
	pub fn empty() -> Self {
		Self { results: Vec::new(), status: AggregateStatus::Success, cancelled: false }
	}

	/// Returns `true` when every record succeeded.
	pub fn is_success(&self) -> bool {
		matches!(self.status, AggregateStatus::Success)
	}

	/// Failed input indices, ascending.
	pub fn failed_indices(&self) -> Vec<usize> {
		match &self.status {
			AggregateStatus::Success => Vec::new(),
			AggregateStatus::PartialSuccess { failures } =>
				failures.iter().map(|(index, _)| *index).collect(),
		}
	}

	/// Successful outcomes paired with their input index.
	pub fn successes(&self) -> impl Iterator<Item = (usize, &O)> {
		self.results
			.iter()
			.enumerate()
			.filter_map(|(index, outcome)| outcome.as_ref().ok().map(|value| (index, value)))
	}
}

/// Re-expands batch outcomes to per-record positions.
///
/// Positions no outcome covers are reported as [`BatchError::Cancelled`]. A batch whose payload
/// length differs from its record count fails every record with [`BatchError::LengthMismatch`].
pub fn aggregate<O>(outcomes: Vec<BatchOutcome<O>>, total: usize) -> AggregatedResult<O> {
	let mut slots = (0..total).map(|_| None).collect::<Vec<Option<RecordOutcome<O>>>>();
	let mut cancelled = false;

	for BatchOutcome { start_index, len, result } in outcomes {
		let end = start_index.saturating_add(len).min(total);
		let range = start_index.min(end)..end;

		match result {
			Ok(records) if records.len() == len =>
				for (slot, record) in slots[range].iter_mut().zip(records) {
					*slot = Some(record);
				},
			Ok(records) => {
				let err = BatchError::LengthMismatch { expected: len, actual: records.len() };

				fill(&mut slots[range], &err);
			},
			Err(err) => {
				cancelled |= matches!(err, BatchError::Cancelled);

				fill(&mut slots[range], &err);
			},
		}
	}

	let results = slots
		.into_iter()
		.map(|slot| {
			slot.unwrap_or_else(|| {
				cancelled = true;

				Err(BatchError::Cancelled)
			})
		})
		.collect::<Vec<_>>();
	let failures = results
		.iter()
		.enumerate()
		.filter_map(|(index, outcome)| outcome.as_ref().err().map(|err| (index, err.clone())))
		.collect::<Vec<_>>();
	let status = if failures.is_empty() {
		AggregateStatus::Success
	} else {
		AggregateStatus::PartialSuccess { failures }
	};

	AggregatedResult { results, status, cancelled }
}

fn fill<O>(slots: &mut [Option<RecordOutcome<O>>], err: &BatchError) {
	for slot in slots {
		*slot = Some(Err(err.clone()));
	}
}
