//! Decides which outgoing requests target the protected backend.

// self
use crate::{_prelude::*, error::ConfigError};

/// String-prefix classifier over fully-qualified request URLs.
///
/// Only URLs starting with the configured base participate in credential attachment and
/// refresh/retry handling; everything else is plain pass-through traffic. An empty base
/// protects nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteClassifier {
	base: Option<String>,
}
impl RouteClassifier {
	/// Builds a classifier for `base`, validating that a non-empty base is an absolute URL.
	pub fn new(base: impl Into<String>) -> Result<Self, ConfigError> {
		let base = base.into();

		if base.is_empty() {
			return Ok(Self::default());
		}

		Url::parse(&base)
			.map_err(|source| ConfigError::InvalidBaseUrl { value: base.clone(), source })?;

		Ok(Self { base: Some(base) })
	}

	/// Returns the configured base URL, if any.
	pub fn base(&self) -> Option<&str> {
		self.base.as_deref()
	}

	/// Returns true iff `url` starts with the protected base URL.
	pub fn is_protected(&self, url: &str) -> bool {
		self.base.as_deref().is_some_and(|base| url.starts_with(base))
	}
}
