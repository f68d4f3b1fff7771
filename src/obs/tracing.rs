// self
use crate::{_prelude::*, obs::StageKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedStage<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedStage<F> = F;

/// A span builder used by pipeline stages.
#[derive(Clone, Debug)]
pub struct StageSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl StageSpan {
	/// Creates a new span tagged with the provided stage kind + step.
	pub fn new(kind: StageKind, step: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("bearer_relay.stage", stage = kind.as_str(), step);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, step);

			Self {}
		}
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> StageSpanGuard {
		#[cfg(feature = "tracing")]
		{
			StageSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			StageSpanGuard {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedStage<Fut>
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
}

/// RAII guard returned by [`StageSpan::entered`].
pub struct StageSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for StageSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("StageSpanGuard(..)")
	}
}
