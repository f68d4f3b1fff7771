//! Pipeline configuration: the protected base URL plus the wire and navigation conventions
//! the surrounding application relies on.

// std
use std::env;
// self
use crate::{_prelude::*, error::ConfigError};

/// Configuration consumed by [`AuthPipeline`](crate::pipeline::AuthPipeline).
///
/// Only `protected_base_url` is required; the remaining fields default to the conventions
/// used by the protected gateway and the sign-in screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
	/// Base URL of the protected backend. Empty disables credential handling entirely.
	pub protected_base_url: String,
	/// Plain header carrying the caller identity next to the bearer token.
	#[serde(default = "PipelineConfig::default_subject_header")]
	pub subject_header: String,
	/// Unauthenticated entry point navigated to on termination.
	#[serde(default = "PipelineConfig::default_signin_route")]
	pub signin_route: String,
	/// HTTP statuses treated as authorization failures.
	#[serde(default = "PipelineConfig::default_authorization_failure_statuses")]
	pub authorization_failure_statuses: Vec<u16>,
	/// Hosted identity-provider logout page, used instead of `signin_route` when present.
	#[serde(default)]
	pub hosted_logout: Option<HostedLogout>,
}
impl PipelineConfig {
	/// Header the protected gateway reads the caller identity from.
	pub const DEFAULT_SUBJECT_HEADER: &'static str = "X-Usuario-Sub";
	/// Sign-in route of the single-page application.
	pub const DEFAULT_SIGNIN_ROUTE: &'static str = "/#/signin";
	/// Environment variable holding the protected base URL.
	pub const ENV_BASE_URL: &'static str = "BEARER_RELAY_BASE_URL";
	/// Environment variable overriding the subject header.
	pub const ENV_SUBJECT_HEADER: &'static str = "BEARER_RELAY_SUBJECT_HEADER";
	/// Environment variable overriding the sign-in route.
	pub const ENV_SIGNIN_ROUTE: &'static str = "BEARER_RELAY_SIGNIN_ROUTE";

	/// Creates a configuration protecting `protected_base_url` with default conventions.
	pub fn new(protected_base_url: impl Into<String>) -> Self {
		Self {
			protected_base_url: protected_base_url.into(),
			subject_header: Self::default_subject_header(),
			signin_route: Self::default_signin_route(),
			authorization_failure_statuses: Self::default_authorization_failure_statuses(),
			hosted_logout: None,
		}
	}

	/// Loads the configuration from `BEARER_RELAY_*` environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		let base = env::var(Self::ENV_BASE_URL)
			.map_err(|_| ConfigError::MissingEnv { name: Self::ENV_BASE_URL })?;
		let mut config = Self::new(base);

		if let Ok(header) = env::var(Self::ENV_SUBJECT_HEADER) {
			config.subject_header = header;
		}
		if let Ok(route) = env::var(Self::ENV_SIGNIN_ROUTE) {
			config.signin_route = route;
		}

		Ok(config)
	}

	/// Overrides the subject header name.
	pub fn with_subject_header(mut self, header: impl Into<String>) -> Self {
		self.subject_header = header.into();

		self
	}

	/// Overrides the sign-in route.
	pub fn with_signin_route(mut self, route: impl Into<String>) -> Self {
		self.signin_route = route.into();

		self
	}

	/// Overrides the statuses treated as authorization failures.
	pub fn with_authorization_failure_statuses(
		mut self,
		statuses: impl IntoIterator<Item = u16>,
	) -> Self {
		self.authorization_failure_statuses = statuses.into_iter().collect();

		self
	}

	/// Routes termination through a hosted logout page.
	pub fn with_hosted_logout(mut self, logout: HostedLogout) -> Self {
		self.hosted_logout = Some(logout);

		self
	}

	/// Resolves where termination should navigate.
	pub fn termination_route(&self) -> Result<String, ConfigError> {
		match &self.hosted_logout {
			Some(logout) => logout.url().map(String::from),
			None => Ok(self.signin_route.clone()),
		}
	}

	/// Returns true when `status` counts as an authorization failure.
	pub fn is_authorization_failure(&self, status: u16) -> bool {
		self.authorization_failure_statuses.contains(&status)
	}

	fn default_subject_header() -> String {
		Self::DEFAULT_SUBJECT_HEADER.into()
	}

	fn default_signin_route() -> String {
		Self::DEFAULT_SIGNIN_ROUTE.into()
	}

	fn default_authorization_failure_statuses() -> Vec<u16> {
		vec![401]
	}
}

/// Hosted identity-provider logout endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedLogout {
	/// Hosted UI domain, e.g. `https://myapp.auth.us-east-1.amazoncognito.com`.
	pub domain: Url,
	/// App client identifier.
	pub client_id: String,
	/// Where the hosted page sends the browser afterwards.
	pub logout_uri: String,
}
impl HostedLogout {
	/// Builds `{domain}/logout?client_id=..&logout_uri=..`.
	pub fn url(&self) -> Result<Url, ConfigError> {
		let mut url = Url::parse(&format!("{}/logout", self.domain.as_str().trim_end_matches('/')))
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;

		url.query_pairs_mut()
			.append_pair("client_id", &self.client_id)
			.append_pair("logout_uri", &self.logout_uri);

		Ok(url)
	}
}
