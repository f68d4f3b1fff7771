//! Observability helpers for pipeline stages.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `bearer_relay.stage` with the `stage` and
//!   `step` (call site) fields, and to route [`Diagnostics`] warnings through `tracing::warn!`.
//! - Enable `metrics` to increment the `bearer_relay_stage_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`.

mod diagnostics;
mod metrics;
mod tracing;

pub use diagnostics::*;
pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Pipeline stages observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
	/// Identity-provider refresh exchange.
	Refresh,
	/// Re-issue of a protected request with a refreshed token.
	Retry,
	/// Session termination side effects.
	Termination,
}
impl StageKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageKind::Refresh => "refresh",
			StageKind::Retry => "retry",
			StageKind::Termination => "termination",
		}
	}
}
impl Display for StageKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Entry to a stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Success => "success",
			StageOutcome::Failure => "failure",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
