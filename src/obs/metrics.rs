// self
use crate::obs::{OpKind, OpOutcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!("vault_broker_op_total", "op" => kind.as_str(), "outcome" => outcome.as_str())
		.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Adds per-record tallies from one aggregated bulk call.
///
/// Emits `vault_broker_records_total` twice, labeled `outcome="success"` and
/// `outcome="failure"`. Cancelled records count as failures.
pub fn record_bulk_records(succeeded: usize, failed: usize) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("vault_broker_records_total", "outcome" => OpOutcome::Success.as_str())
			.increment(succeeded as u64);
		metrics::counter!("vault_broker_records_total", "outcome" => OpOutcome::Failure.as_str())
			.increment(failed as u64);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (succeeded, failed);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_without_a_recorder_is_a_no_op() {
		record_op_outcome(OpKind::BulkDispatch, OpOutcome::Failure);
		record_bulk_records(3, 1);
	}
}
