// self
use crate::obs::{StageKind, StageOutcome};

/// Records a stage outcome via the global metrics recorder (when enabled).
pub fn record_stage_outcome(kind: StageKind, outcome: StageOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"bearer_relay_stage_total",
			"stage" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_stage_outcome_noop_without_metrics() {
		record_stage_outcome(StageKind::Termination, StageOutcome::Failure);
	}
}
