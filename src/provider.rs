//! Identity-provider contract used by the refresh coordinator, plus built-in clients.
//!
//! The coordinator only needs one operation from a provider: exchange a refresh token (and
//! the caller's identity hint) for fresh credentials. [`CognitoProvider`] speaks the
//! `InitiateAuth`/`REFRESH_TOKEN_AUTH` protocol; [`OAuth2Provider`] performs a standard
//! `grant_type=refresh_token` request against any OAuth 2.0 token endpoint.

pub mod cognito;
pub mod oauth;

pub use cognito::*;
pub use oauth::*;

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Boxed future returned by [`IdentityProvider::exchange_refresh_token`].
pub type ProviderFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RefreshedTokens, ProviderError>> + 'a + Send>>;

/// Identity-provider client capable of refreshing a session.
pub trait IdentityProvider
where
	Self: Send + Sync,
{
	/// Returns false when the client lacks the configuration needed to reach the provider.
	///
	/// The coordinator treats an unconfigured provider like a missing refresh token and never
	/// starts an exchange that is guaranteed to fail.
	fn is_configured(&self) -> bool {
		true
	}

	/// Exchanges `refresh_token` for fresh credentials on behalf of `identity_hint`.
	fn exchange_refresh_token<'a>(
		&'a self,
		refresh_token: &'a str,
		identity_hint: &'a str,
	) -> ProviderFuture<'a>;
}

/// Credentials returned by a successful refresh exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshedTokens {
	/// New access token.
	pub access_token: TokenSecret,
	/// New identity token, when the provider issues one.
	pub id_token: Option<TokenSecret>,
	/// Rotated refresh token; `None` when the provider keeps the old one valid.
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime reported by the provider.
	pub expires_in: Option<Duration>,
}
impl RefreshedTokens {
	/// Creates a result carrying only an access token.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			id_token: None,
			refresh_token: None,
			expires_in: None,
		}
	}

	/// Sets the identity token.
	pub fn with_id_token(mut self, token: impl Into<String>) -> Self {
		self.id_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the rotated refresh token.
	pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the reported lifetime.
	pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
		self.expires_in = Some(expires_in);

		self
	}
}

/// Failure of a refresh exchange.
///
/// The type is `Clone` because a single failed exchange is handed to every caller that
/// joined it.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ProviderError {
	/// The refresh token is expired, revoked, or otherwise rejected.
	#[error("Identity provider rejected the refresh token: {message}.")]
	Rejected {
		/// Provider error code, when available.
		code: Option<String>,
		/// Provider- or client-supplied message.
		message: String,
	},
	/// The provider is throttling refresh requests.
	#[error("Identity provider throttled the refresh exchange: {message}.")]
	Throttled {
		/// Provider- or client-supplied message.
		message: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// The provider answered with something the client could not use.
	#[error("Identity provider returned an unexpected response: {message}.")]
	Unexpected {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Provider- or client-supplied message.
		message: String,
	},
	/// The provider could not be reached.
	#[error("Network error while contacting the identity provider: {message}.")]
	Network {
		/// Transport failure rendered as text.
		message: String,
	},
}
impl ProviderError {
	/// Returns true when retrying later might succeed.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Throttled { .. } | Self::Network { .. })
	}
}
