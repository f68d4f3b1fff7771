//! One-shot session termination.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	obs::{self, StageKind, StageOutcome, StageSpan},
	pipeline::PipelineMetrics,
	store::SessionAccessor,
};

/// Application callbacks run once when a session is terminated.
///
/// Both methods default to no-ops so embedders only override what they need.
pub trait TerminationHooks
where
	Self: Send + Sync,
{
	/// Releases client-side identity-provider state. Runs after the store is cleared.
	fn release_session(&self) {}

	/// Sends the user to `route`, the unauthenticated entry point. Runs last.
	fn navigate(&self, route: &str) {
		let _ = route;
	}
}

/// Hooks that do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHooks;
impl TerminationHooks for NoopHooks {}

/// Guards the destructive logout side effects so they run at most once per armed lifetime.
pub struct TerminationLatch {
	fired: AtomicBool,
	session: SessionAccessor,
	hooks: Arc<dyn TerminationHooks>,
	route: String,
	metrics: Arc<PipelineMetrics>,
}
impl TerminationLatch {
	pub(crate) fn new(
		session: SessionAccessor,
		hooks: Arc<dyn TerminationHooks>,
		route: String,
		metrics: Arc<PipelineMetrics>,
	) -> Self {
		Self { fired: AtomicBool::new(false), session, hooks, route, metrics }
	}

	/// Fires the latch.
	///
	/// The first caller clears the session store, runs [`TerminationHooks::release_session`],
	/// then [`TerminationHooks::navigate`], and gets `true`. Every later caller gets `false`
	/// and touches nothing until the latch is [reset](Self::reset).
	pub fn terminate(&self) -> bool {
		const KIND: StageKind = StageKind::Termination;

		if self.fired.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
			return false;
		}

		let _span = StageSpan::new(KIND, "terminate").entered();

		obs::record_stage_outcome(KIND, StageOutcome::Attempt);

		self.session.clear();
		self.hooks.release_session();
		self.hooks.navigate(&self.route);
		self.metrics.record_termination();

		obs::record_stage_outcome(KIND, StageOutcome::Success);

		true
	}

	/// Returns true once the latch has fired and not been re-armed.
	pub fn is_fired(&self) -> bool {
		self.fired.load(Ordering::Acquire)
	}

	/// Re-arms the latch after a new login.
	pub fn reset(&self) {
		self.fired.store(false, Ordering::Release);
	}

	/// Route passed to [`TerminationHooks::navigate`].
	pub fn route(&self) -> &str {
		&self.route
	}
}
impl Debug for TerminationLatch {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TerminationLatch")
			.field("fired", &self.is_fired())
			.field("route", &self.route)
			.finish()
	}
}
