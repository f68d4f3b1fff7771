// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for refresh, retry, and termination activity.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
	refresh_attempts: AtomicU64,
	refresh_successes: AtomicU64,
	refresh_failures: AtomicU64,
	refresh_joins: AtomicU64,
	retries: AtomicU64,
	terminations: AtomicU64,
}
impl PipelineMetrics {
	/// Returns the number of identity-provider exchanges started.
	pub fn refresh_attempts(&self) -> u64 {
		self.refresh_attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of exchanges that produced a new access token.
	pub fn refresh_successes(&self) -> u64 {
		self.refresh_successes.load(Ordering::Relaxed)
	}

	/// Returns the number of exchanges that failed.
	pub fn refresh_failures(&self) -> u64 {
		self.refresh_failures.load(Ordering::Relaxed)
	}

	/// Returns how many callers awaited an exchange another caller had already started.
	pub fn refresh_joins(&self) -> u64 {
		self.refresh_joins.load(Ordering::Relaxed)
	}

	/// Returns the number of protected requests re-issued with a refreshed token.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns how many times the termination side effects actually ran.
	pub fn terminations(&self) -> u64 {
		self.terminations.load(Ordering::Relaxed)
	}

	pub(crate) fn record_refresh_attempt(&self) {
		self.refresh_attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_success(&self) {
		self.refresh_successes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_failure(&self) {
		self.refresh_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_join(&self) {
		self.refresh_joins.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_termination(&self) {
		self.terminations.fetch_add(1, Ordering::Relaxed);
	}
}
