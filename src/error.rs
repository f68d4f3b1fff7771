//! Pipeline-level error types shared across the refresh coordinator, providers, and transports.

// self
use crate::{_prelude::*, http::ApiResponse, provider::ProviderError};

/// Pipeline-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical pipeline error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) while talking to any backend.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The stored session lacks what a refresh needs.
	#[error("Session cannot be refreshed: {reason}.")]
	SessionUnrefreshable {
		/// Which prerequisite was missing.
		reason: UnrefreshableReason,
	},
	/// The identity provider rejected or could not process the refresh exchange.
	#[error("Identity provider refresh exchange failed.")]
	RefreshExchangeFailed(#[source] ProviderError),
	/// A protected request was rejected and the session has been terminated.
	#[error("Protected backend rejected the request with status {}.", .response.status.as_u16())]
	AuthorizationFailed {
		/// Response that carried the authorization failure.
		response: Box<ApiResponse>,
		/// Whether the request had already been retried with a refreshed token.
		retried: bool,
		/// Refresh failure that prevented the retry, if any.
		#[source]
		cause: Option<Box<Error>>,
	},
}
impl Error {
	/// Returns true when this error ended the session.
	pub fn is_session_expired(&self) -> bool {
		matches!(self, Self::AuthorizationFailed { .. })
	}
}
impl From<ProviderError> for Error {
	fn from(e: ProviderError) -> Self {
		Self::RefreshExchangeFailed(e)
	}
}

/// Missing prerequisite that makes a session unrefreshable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnrefreshableReason {
	/// No refresh token is stored.
	MissingRefreshToken,
	/// No identity hint (username/email) is stored.
	MissingIdentityHint,
	/// The identity provider client has no usable configuration.
	ProviderUnconfigured,
}
impl UnrefreshableReason {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::MissingRefreshToken => "refresh token is absent",
			Self::MissingIdentityHint => "identity hint is absent",
			Self::ProviderUnconfigured => "identity provider is not configured",
		}
	}
}
impl Display for UnrefreshableReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised by the pipeline.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Protected base URL is not an absolute URL.
	#[error("Protected base URL `{value}` is invalid.")]
	InvalidBaseUrl {
		/// Rejected value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Identity provider endpoint cannot be parsed.
	#[error("Identity provider endpoint is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Header name or value contains characters HTTP does not allow.
	#[error("Header `{name}` has an invalid name or value.")]
	InvalidHeader {
		/// Header name as supplied.
		name: String,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Body(#[from] serde_json::Error),
	/// Required environment variable is not set.
	#[error("Environment variable `{name}` is not set.")]
	MissingEnv {
		/// Variable name.
		name: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for ConfigError {
	fn from(e: reqwest::Error) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
