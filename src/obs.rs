//! Optional observability helpers for token fetches and bulk dispatch.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `vault_broker.op` with the `op` (operation)
//!   and `stage` (call site) fields. Each span closes with a debug event carrying `elapsed_ms`; retries,
//!   invalidations, and batch failures log at debug/warn.
//! - Enable `metrics` to increment `vault_broker_op_total` (labeled `op` and `outcome`) for each
//!   operation, and `vault_broker_records_total` (labeled `outcome`) with per-record tallies from
//!   every bulk call.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Cache lookup that may resolve, sign, and exchange.
	TokenFetch,
	/// Planned, concurrency-bounded submission of a record set.
	BulkDispatch,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::TokenFetch => "token_fetch",
			OpKind::BulkDispatch => "bulk_dispatch",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Completion with at least one failure.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
