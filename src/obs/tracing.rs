// std
use std::time::Instant;
// self
use crate::{
	_prelude::*,
	obs::{self, OpKind, OpOutcome},
};

/// Resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// Observation scope for one broker operation.
///
/// [`OpSpan::start`] records the attempt; [`OpSpan::finish`] records the outcome together with the
/// elapsed wall time. Dropping a span without finishing it records nothing further.
#[derive(Debug)]
pub struct OpSpan {
	kind: OpKind,
	stage: &'static str,
	started: Instant,
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Opens a span for `kind` at `stage` and counts the attempt.
	pub fn start(kind: OpKind, stage: &'static str) -> Self {
		obs::record_op_outcome(kind, OpOutcome::Attempt);

		Self {
			kind,
			stage,
			started: Instant::now(),
			#[cfg(feature = "tracing")]
			span: tracing::info_span!("vault_broker.op", op = kind.as_str(), stage),
		}
	}

	/// Operation kind this span observes.
	pub fn kind(&self) -> OpKind {
		self.kind
	}

	/// Instruments a future without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}

	/// Closes the span, recording `outcome` and returning the elapsed time.
	pub fn finish(self, outcome: OpOutcome) -> std::time::Duration {
		let elapsed = self.started.elapsed();

		obs::record_op_outcome(self.kind, outcome);

		#[cfg(feature = "tracing")]
		tracing::debug!(
			parent: &self.span,
			stage = self.stage,
			outcome = outcome.as_str(),
			elapsed_ms = elapsed.as_millis() as u64,
			"operation finished"
		);
		#[cfg(not(feature = "tracing"))]
		let _ = self.stage;

		elapsed
	}
}
