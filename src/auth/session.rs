//! Authenticated session fields and the storage keys they live under.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Storage key for one [`AuthSession`] field.
///
/// The string forms match the layout the rest of the application already writes at login,
/// so the pipeline and the UI can share one session store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKey {
	/// Bearer access token attached to protected requests.
	AccessToken,
	/// Identity token returned alongside the access token.
	IdToken,
	/// Refresh token exchanged for new access tokens.
	RefreshToken,
	/// Stable caller identity sent as a plain header.
	Subject,
	/// Username/email used to address the identity provider during refresh.
	IdentityHint,
}
impl SessionKey {
	/// Every key, in the order they are written.
	pub const ALL: [SessionKey; 5] =
		[Self::AccessToken, Self::IdToken, Self::RefreshToken, Self::Subject, Self::IdentityHint];

	/// Returns the raw key used in the session store.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AccessToken => "accessToken",
			Self::IdToken => "idToken",
			Self::RefreshToken => "refreshToken",
			Self::Subject => "sub",
			Self::IdentityHint => "email",
		}
	}
}
impl Display for SessionKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Snapshot of the credentials held in the session store.
///
/// Every field is optional. A session without a refresh token or identity hint cannot be
/// refreshed and goes straight to termination on the first authorization failure.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
	/// Bearer access token.
	pub access_token: Option<TokenSecret>,
	/// Identity token.
	pub id_token: Option<TokenSecret>,
	/// Refresh token.
	pub refresh_token: Option<TokenSecret>,
	/// Caller identity (`sub`).
	pub subject_id: Option<String>,
	/// Username/email for the identity provider.
	pub identity_hint: Option<String>,
}
impl AuthSession {
	/// Sets the access token.
	pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the identity token.
	pub fn with_id_token(mut self, token: impl Into<String>) -> Self {
		self.id_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the refresh token.
	pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the caller identity.
	pub fn with_subject_id(mut self, subject: impl Into<String>) -> Self {
		self.subject_id = Some(subject.into());

		self
	}

	/// Sets the identity hint.
	pub fn with_identity_hint(mut self, hint: impl Into<String>) -> Self {
		self.identity_hint = Some(hint.into());

		self
	}

	/// Returns true when both refresh prerequisites are present.
	pub fn is_refreshable(&self) -> bool {
		self.refresh_token.is_some() && self.identity_hint.is_some()
	}

	/// Returns the stored value for `key`, if any.
	pub fn get(&self, key: SessionKey) -> Option<&str> {
		match key {
			SessionKey::AccessToken => self.access_token.as_ref().map(TokenSecret::expose),
			SessionKey::IdToken => self.id_token.as_ref().map(TokenSecret::expose),
			SessionKey::RefreshToken => self.refresh_token.as_ref().map(TokenSecret::expose),
			SessionKey::Subject => self.subject_id.as_deref(),
			SessionKey::IdentityHint => self.identity_hint.as_deref(),
		}
	}

	/// Stores `value` under `key`.
	pub fn set(&mut self, key: SessionKey, value: String) {
		match key {
			SessionKey::AccessToken => self.access_token = Some(value.into()),
			SessionKey::IdToken => self.id_token = Some(value.into()),
			SessionKey::RefreshToken => self.refresh_token = Some(value.into()),
			SessionKey::Subject => self.subject_id = Some(value),
			SessionKey::IdentityHint => self.identity_hint = Some(value),
		}
	}
}
impl Debug for AuthSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthSession")
			.field("access_token_set", &self.access_token.is_some())
			.field("id_token_set", &self.id_token.is_some())
			.field("refresh_token_set", &self.refresh_token.is_some())
			.field("subject_id", &self.subject_id)
			.field("identity_hint", &self.identity_hint)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn session_keys_match_storage_layout() {
		let raw: Vec<_> = SessionKey::ALL.iter().map(|key| key.as_str()).collect();

		assert_eq!(raw, ["accessToken", "idToken", "refreshToken", "sub", "email"]);
	}

	#[test]
	fn refreshable_requires_token_and_hint() {
		let partial = AuthSession::default().with_refresh_token("r1");

		assert!(!partial.is_refreshable());
		assert!(partial.with_identity_hint("ana@example.com").is_refreshable());
	}

	#[test]
	fn get_and_set_cover_every_key() {
		let mut session = AuthSession::default();

		for key in SessionKey::ALL {
			session.set(key, format!("value-{key}"));
		}
		for key in SessionKey::ALL {
			assert_eq!(session.get(key), Some(format!("value-{key}").as_str()));
		}
	}

	#[test]
	fn debug_output_hides_tokens() {
		let session = AuthSession::default().with_access_token("A1").with_subject_id("user-1");
		let rendered = format!("{session:?}");

		assert!(!rendered.contains("A1"));
		assert!(rendered.contains("user-1"));
	}
}
