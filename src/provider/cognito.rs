//! Amazon Cognito user-pool client performing `REFRESH_TOKEN_AUTH`.

// std
use std::env;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	http::{ApiRequest, ApiResponse, HttpTransport, StatusCode},
	provider::{IdentityProvider, ProviderError, ProviderFuture, RefreshedTokens},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

type HmacSha256 = Hmac<Sha256>;

const TARGET_INITIATE_AUTH: &str = "AWSCognitoIdentityProviderService.InitiateAuth";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// User-pool coordinates needed to reach Cognito.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CognitoConfig {
	/// User pool identifier, e.g. `us-east-1_AbCdEf123`; the region is its prefix.
	pub user_pool_id: String,
	/// App client identifier.
	pub client_id: String,
	/// App client secret, when the client is confidential.
	#[serde(default)]
	pub client_secret: Option<String>,
	/// Endpoint override (tests, VPC endpoints).
	#[serde(default)]
	pub endpoint: Option<Url>,
}
impl CognitoConfig {
	/// Environment variable holding the user pool identifier.
	pub const ENV_USER_POOL_ID: &'static str = "COGNITO_USER_POOL_ID";
	/// Environment variable holding the app client identifier.
	pub const ENV_CLIENT_ID: &'static str = "COGNITO_CLIENT_ID";
	/// Environment variable holding the optional app client secret.
	pub const ENV_CLIENT_SECRET: &'static str = "COGNITO_CLIENT_SECRET";
	/// Environment variable holding the optional endpoint override.
	pub const ENV_ENDPOINT: &'static str = "COGNITO_ENDPOINT";

	/// Creates a configuration for a public app client.
	pub fn new(user_pool_id: impl Into<String>, client_id: impl Into<String>) -> Self {
		Self {
			user_pool_id: user_pool_id.into(),
			client_id: client_id.into(),
			client_secret: None,
			endpoint: None,
		}
	}

	/// Reads the configuration from `COGNITO_*` variables; `None` when pool or client is unset.
	pub fn from_env() -> Result<Option<Self>, ConfigError> {
		let (Ok(pool), Ok(client)) =
			(env::var(Self::ENV_USER_POOL_ID), env::var(Self::ENV_CLIENT_ID))
		else {
			return Ok(None);
		};
		let mut config = Self::new(pool, client);

		config.client_secret = env::var(Self::ENV_CLIENT_SECRET).ok();

		if let Ok(raw) = env::var(Self::ENV_ENDPOINT) {
			config.endpoint =
				Some(Url::parse(&raw).map_err(|source| ConfigError::InvalidEndpoint { source })?);
		}

		Ok(Some(config))
	}

	/// Sets the app client secret.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Overrides the service endpoint.
	pub fn with_endpoint(mut self, endpoint: Url) -> Self {
		self.endpoint = Some(endpoint);

		self
	}

	/// Returns the AWS region encoded in the user pool identifier.
	pub fn region(&self) -> Option<&str> {
		self.user_pool_id.split_once('_').map(|(region, _)| region).filter(|r| !r.is_empty())
	}

	/// Returns true when the pool and client identifiers are usable.
	pub fn is_complete(&self) -> bool {
		!self.client_id.is_empty() && (self.endpoint.is_some() || self.region().is_some())
	}

	/// Resolves the service endpoint.
	pub fn endpoint(&self) -> Result<Url, ConfigError> {
		if let Some(endpoint) = &self.endpoint {
			return Ok(endpoint.clone());
		}

		let region = self.region().unwrap_or_default();

		Url::parse(&format!("https://cognito-idp.{region}.amazonaws.com/"))
			.map_err(|source| ConfigError::InvalidEndpoint { source })
	}
}
impl Debug for CognitoConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CognitoConfig")
			.field("user_pool_id", &self.user_pool_id)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("endpoint", &self.endpoint)
			.finish()
	}
}

/// Cognito client that refreshes sessions through the crate's [`HttpTransport`].
///
/// Without a complete [`CognitoConfig`] the provider reports itself unconfigured and the
/// pipeline terminates sessions instead of attempting a refresh.
pub struct CognitoProvider<T: ?Sized + HttpTransport> {
	config: Option<CognitoConfig>,
	transport: Arc<T>,
}
impl<T> CognitoProvider<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a provider that reuses the caller-provided transport.
	pub fn with_transport(config: Option<CognitoConfig>, transport: impl Into<Arc<T>>) -> Self {
		Self { config, transport: transport.into() }
	}

	/// Returns the active configuration.
	pub fn config(&self) -> Option<&CognitoConfig> {
		self.config.as_ref()
	}

	async fn exchange(
		&self,
		refresh_token: &str,
		identity_hint: &str,
	) -> Result<RefreshedTokens, ProviderError> {
		let config = self.config.as_ref().filter(|c| c.is_complete()).ok_or_else(|| {
			ProviderError::Unexpected {
				status: None,
				message: "Cognito client configuration is incomplete".into(),
			}
		})?;
		let request = build_refresh_request(config, refresh_token, identity_hint)?;
		let response = self
			.transport
			.send(request)
			.await
			.map_err(|e| ProviderError::Network { message: e.to_string() })?;

		if response.status == StatusCode::OK {
			map_authentication_result(&response)
		} else {
			Err(map_error_response(&response))
		}
	}
}
#[cfg(feature = "reqwest")]
impl CognitoProvider<ReqwestTransport> {
	/// Creates a provider with its own reqwest-backed transport.
	pub fn new(config: Option<CognitoConfig>) -> Self {
		Self::with_transport(config, ReqwestTransport::default())
	}
}
impl<T> IdentityProvider for CognitoProvider<T>
where
	T: ?Sized + HttpTransport,
{
	fn is_configured(&self) -> bool {
		self.config.as_ref().is_some_and(CognitoConfig::is_complete)
	}

	fn exchange_refresh_token<'a>(
		&'a self,
		refresh_token: &'a str,
		identity_hint: &'a str,
	) -> ProviderFuture<'a> {
		Box::pin(self.exchange(refresh_token, identity_hint))
	}
}
impl<T> Debug for CognitoProvider<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CognitoProvider").field("config", &self.config).finish()
	}
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
	auth_flow: &'static str,
	client_id: &'a str,
	auth_parameters: BTreeMap<&'static str, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
	authentication_result: Option<AuthenticationResult>,
	challenge_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
	access_token: String,
	id_token: Option<String>,
	refresh_token: Option<String>,
	expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct ErrorBody {
	#[serde(rename = "__type")]
	kind: Option<String>,
	#[serde(alias = "Message")]
	message: Option<String>,
}

/// Computes `base64(HMAC-SHA256(client_secret, username + client_id))`.
pub fn secret_hash(
	username: &str,
	client_id: &str,
	client_secret: &str,
) -> Result<String, ProviderError> {
	let mut mac = <HmacSha256 as Mac>::new_from_slice(client_secret.as_bytes()).map_err(|e| {
		ProviderError::Unexpected { status: None, message: format!("Invalid client secret: {e}") }
	})?;

	mac.update(username.as_bytes());
	mac.update(client_id.as_bytes());

	Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn build_refresh_request(
	config: &CognitoConfig,
	refresh_token: &str,
	identity_hint: &str,
) -> Result<ApiRequest, ProviderError> {
	let invalid =
		|e: ConfigError| ProviderError::Unexpected { status: None, message: e.to_string() };
	let endpoint = config.endpoint().map_err(invalid)?;
	let mut auth_parameters = BTreeMap::new();

	auth_parameters.insert("REFRESH_TOKEN", refresh_token.to_owned());
	auth_parameters.insert("USERNAME", identity_hint.to_owned());

	if let Some(secret) = &config.client_secret {
		let hash = secret_hash(identity_hint, &config.client_id, secret)?;

		auth_parameters.insert("SECRET_HASH", hash);
	}

	let body = InitiateAuthRequest {
		auth_flow: "REFRESH_TOKEN_AUTH",
		client_id: &config.client_id,
		auth_parameters,
	};
	let body = serde_json::to_vec(&body).map_err(|e| invalid(e.into()))?;

	Ok(ApiRequest::post(endpoint.as_str())
		.with_header("X-Amz-Target", TARGET_INITIATE_AUTH)
		.and_then(|r| r.with_header("Content-Type", CONTENT_TYPE))
		.map_err(invalid)?
		.with_body(body))
}

fn map_authentication_result(response: &ApiResponse) -> Result<RefreshedTokens, ProviderError> {
	let parsed: InitiateAuthResponse = response.json().map_err(|e| ProviderError::Unexpected {
		status: Some(e.status),
		message: format!("Malformed InitiateAuth response at `{}`", e.source.path()),
	})?;
	let Some(result) = parsed.authentication_result else {
		let challenge = parsed.challenge_name.unwrap_or_else(|| "none".into());

		return Err(ProviderError::Unexpected {
			status: Some(response.status.as_u16()),
			message: format!("InitiateAuth returned no tokens (challenge: {challenge})"),
		});
	};
	let mut tokens = RefreshedTokens::new(result.access_token);

	tokens.id_token = result.id_token.map(Into::into);
	tokens.refresh_token = result.refresh_token.map(Into::into);
	tokens.expires_in = result.expires_in.filter(|secs| *secs > 0).map(Duration::seconds);

	Ok(tokens)
}

fn map_error_response(response: &ApiResponse) -> ProviderError {
	let status = response.status.as_u16();
	let body = response.json::<ErrorBody>().ok();
	let code = body
		.as_ref()
		.and_then(|b| b.kind.as_deref())
		.map(|kind| kind.rsplit('#').next().unwrap_or(kind).to_owned());
	let message = body
		.and_then(|b| b.message)
		.unwrap_or_else(|| format!("InitiateAuth failed with status {status}"));

	match code.as_deref() {
		Some("NotAuthorizedException" | "UserNotFoundException" | "UserNotConfirmedException") =>
			ProviderError::Rejected { code, message },
		Some("TooManyRequestsException" | "LimitExceededException") =>
			ProviderError::Throttled { message, retry_after: response.retry_after() },
		_ if status == 429 =>
			ProviderError::Throttled { message, retry_after: response.retry_after() },
		_ => ProviderError::Unexpected { status: Some(status), message },
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::http::HeaderValue;

	fn config() -> CognitoConfig {
		CognitoConfig::new("us-east-1_AbCdEf123", "client-1")
	}

	#[test]
	fn region_and_endpoint_derive_from_pool_id() {
		let config = config();

		assert_eq!(config.region(), Some("us-east-1"));
		assert_eq!(
			config.endpoint().expect("Derived endpoint should parse.").as_str(),
			"https://cognito-idp.us-east-1.amazonaws.com/"
		);
		assert!(config.is_complete());
		assert!(!CognitoConfig::new("nopool", "client-1").is_complete());
		assert!(!CognitoConfig::new("us-east-1_x", "").is_complete());
	}

	#[test]
	fn secret_hash_is_deterministic_base64() {
		let first = secret_hash("ana@example.com", "client-1", "s3cret")
			.expect("Secret hash should compute.");
		let second = secret_hash("ana@example.com", "client-1", "s3cret")
			.expect("Secret hash should compute.");
		let other = secret_hash("bob@example.com", "client-1", "s3cret")
			.expect("Secret hash should compute.");

		assert_eq!(first, second);
		assert_ne!(first, other);
		assert_eq!(first.len(), 44);
	}

	#[test]
	fn refresh_request_carries_auth_parameters() {
		let config = config().with_client_secret("s3cret");
		let request = build_refresh_request(&config, "R1", "ana@example.com")
			.expect("Refresh request should build.");

		assert_eq!(request.header("x-amz-target"), Some(TARGET_INITIATE_AUTH));
		assert_eq!(request.header("content-type"), Some(CONTENT_TYPE));

		let body: serde_json::Value =
			serde_json::from_slice(request.body.as_deref().expect("Request should carry a body."))
				.expect("Request body should be JSON.");

		assert_eq!(body["AuthFlow"], "REFRESH_TOKEN_AUTH");
		assert_eq!(body["ClientId"], "client-1");
		assert_eq!(body["AuthParameters"]["REFRESH_TOKEN"], "R1");
		assert_eq!(body["AuthParameters"]["USERNAME"], "ana@example.com");
		assert_eq!(
			body["AuthParameters"]["SECRET_HASH"],
			secret_hash("ana@example.com", "client-1", "s3cret")
				.expect("Secret hash should compute.")
		);
	}

	#[test]
	fn public_clients_omit_secret_hash() {
		let request = build_refresh_request(&config(), "R1", "ana@example.com")
			.expect("Refresh request should build.");
		let body: serde_json::Value =
			serde_json::from_slice(request.body.as_deref().expect("Request should carry a body."))
				.expect("Request body should be JSON.");

		assert!(body["AuthParameters"].get("SECRET_HASH").is_none());
	}

	#[test]
	fn error_bodies_are_classified() {
		let rejected = ApiResponse::new(StatusCode::BAD_REQUEST).with_body(
			br#"{"__type":"NotAuthorizedException","message":"Refresh Token has expired"}"#.to_vec(),
		);

		assert_eq!(
			map_error_response(&rejected),
			ProviderError::Rejected {
				code: Some("NotAuthorizedException".into()),
				message: "Refresh Token has expired".into(),
			}
		);

		let mut throttled = ApiResponse::new(StatusCode::BAD_REQUEST).with_body(
			br#"{"__type":"com.amazonaws.cognito#TooManyRequestsException","message":"Rate exceeded"}"#
				.to_vec(),
		);

		throttled.headers.insert("retry-after", HeaderValue::from_static("5"));

		assert_eq!(
			map_error_response(&throttled),
			ProviderError::Throttled {
				message: "Rate exceeded".into(),
				retry_after: Some(Duration::seconds(5)),
			}
		);

		let opaque = ApiResponse::new(StatusCode::BAD_GATEWAY).with_body(b"<html>".to_vec());

		assert!(matches!(
			map_error_response(&opaque),
			ProviderError::Unexpected { status: Some(502), .. }
		));
	}

	#[test]
	fn challenges_are_unexpected() {
		let response = ApiResponse::new(StatusCode::OK)
			.with_body(br#"{"ChallengeName":"NEW_PASSWORD_REQUIRED"}"#.to_vec());
		let err = map_authentication_result(&response)
			.expect_err("Challenges should not count as a refresh.");

		assert!(matches!(err, ProviderError::Unexpected { .. }));
		assert!(err.to_string().contains("NEW_PASSWORD_REQUIRED"));
	}

	#[test]
	fn debug_output_hides_secret() {
		let rendered = format!("{:?}", config().with_client_secret("s3cret"));

		assert!(!rendered.contains("s3cret"));
	}
}
