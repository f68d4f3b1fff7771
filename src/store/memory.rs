//! Thread-safe in-memory [`SessionStore`] implementation, the default for a single process.

// self
use crate::{
	_prelude::*,
	store::{SessionStore, StoreError},
};

/// Thread-safe storage backend that keeps session fields in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<HashMap<String, String>>>);
impl MemoryStore {
	/// Returns the number of stored entries.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true when no entries are stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl SessionStore for MemoryStore {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.0.read().get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
		self.0.write().insert(key.to_owned(), value.to_owned());

		Ok(())
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		self.0.write().remove(key);

		Ok(())
	}

	fn clear(&self) -> Result<(), StoreError> {
		self.0.write().clear();

		Ok(())
	}
}
