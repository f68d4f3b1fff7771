// self
use crate::_prelude::*;

/// Best-effort side channel for degraded but non-fatal conditions (e.g. storage failures).
pub trait Diagnostics
where
	Self: Send + Sync,
{
	/// Reports a warning. Must not panic.
	fn warn(&self, message: &str);
}

/// Default sink that forwards warnings to `tracing` when the feature is enabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingDiagnostics;
impl Diagnostics for TracingDiagnostics {
	fn warn(&self, message: &str) {
		#[cfg(feature = "tracing")]
		{
			tracing::warn!(target: "bearer_relay", "{message}");
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = message;
		}
	}
}

/// Returns the default diagnostics sink.
pub fn default_diagnostics() -> Arc<dyn Diagnostics> {
	Arc::new(TracingDiagnostics)
}
