//! Session storage contracts, the failure-tolerant accessor, and built-in backends.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{AuthSession, SessionKey},
	obs::{Diagnostics, default_diagnostics},
};

/// Key-value backend holding the session fields.
///
/// Backends may fail (quota, disabled storage, IO); the pipeline never calls them directly
/// and always goes through [`SessionAccessor`], which absorbs every [`StoreError`].
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Returns the raw value stored under `key`.
	fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Stores `value` under `key`, replacing any previous value.
	fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

	/// Removes `key` if present.
	fn remove(&self, key: &str) -> Result<(), StoreError>;

	/// Removes every entry.
	fn clear(&self) -> Result<(), StoreError>;
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Storage is disabled or unreachable.
	#[error("Storage is unavailable: {message}.")]
	Unavailable {
		/// Human-readable error payload.
		message: String,
	},
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Typed, total read/write wrapper over a [`SessionStore`].
///
/// Reads that fail are reported to the [`Diagnostics`] sink and treated as absent values;
/// failed writes are reported and dropped. Empty strings read back as absent.
#[derive(Clone)]
pub struct SessionAccessor {
	store: Arc<dyn SessionStore>,
	diagnostics: Arc<dyn Diagnostics>,
}
impl SessionAccessor {
	/// Wraps `store`, reporting failures through the default diagnostics sink.
	pub fn new(store: Arc<dyn SessionStore>) -> Self {
		Self { store, diagnostics: default_diagnostics() }
	}

	/// Replaces the diagnostics sink.
	pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
		self.diagnostics = diagnostics;

		self
	}

	/// Returns the value for `key`, or `None` when absent, empty, or unreadable.
	pub fn read(&self, key: SessionKey) -> Option<String> {
		match self.store.get(key.as_str()) {
			Ok(value) => value.filter(|v| !v.is_empty()),
			Err(e) => {
				self.diagnostics.warn(&format!("Failed to read `{key}` from session storage: {e}"));

				None
			},
		}
	}

	/// Writes `value` under `key`; failures are reported and ignored.
	pub fn write(&self, key: SessionKey, value: &str) {
		if let Err(e) = self.store.set(key.as_str(), value) {
			self.diagnostics.warn(&format!("Failed to write `{key}` to session storage: {e}"));
		}
	}

	/// Removes `key`; failures are reported and ignored.
	pub fn remove(&self, key: SessionKey) {
		if let Err(e) = self.store.remove(key.as_str()) {
			self.diagnostics.warn(&format!("Failed to remove `{key}` from session storage: {e}"));
		}
	}

	/// Clears the whole store; failures are reported and ignored.
	pub fn clear(&self) {
		if let Err(e) = self.store.clear() {
			self.diagnostics.warn(&format!("Failed to clear session storage: {e}"));
		}
	}

	/// Reads every session field into a snapshot.
	pub fn load(&self) -> AuthSession {
		let mut session = AuthSession::default();

		for key in SessionKey::ALL {
			if let Some(value) = self.read(key) {
				session.set(key, value);
			}
		}

		session
	}

	/// Writes every present field of `session`.
	pub fn save(&self, session: &AuthSession) {
		for key in SessionKey::ALL {
			if let Some(value) = session.get(key) {
				self.write(key, value);
			}
		}
	}
}
impl Debug for SessionAccessor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("SessionAccessor(..)")
	}
}
