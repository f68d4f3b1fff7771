//! Generic OAuth 2.0 refresh-token client built on the `oauth2` crate.
//!
//! The `oauth2` request builders run over [`TransportHandle`], which adapts the crate's
//! [`HttpTransport`] to [`AsyncHttpClient`] and records the status + `Retry-After` of the
//! last response so failures can be classified after `oauth2` resolves.

// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	ExtraTokenFields, HttpClientError, HttpRequest, HttpResponse, RefreshToken, RequestTokenError,
	StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicErrorResponseType, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
	http::{ApiRequest, HttpTransport},
	provider::{IdentityProvider, ProviderError, ProviderFuture, RefreshedTokens},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

type RefreshTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;
type TokenClient = Client<
	BasicErrorResponse,
	RefreshTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type RefreshRequestError =
	RequestTokenError<HttpClientError<TransportError>, BasicErrorResponse>;

/// Client authentication mechanism for the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientAuthMethod {
	/// HTTP Basic authentication with client id + secret.
	#[default]
	ClientSecretBasic,
	/// Client id + secret sent in the form body.
	ClientSecretPost,
	/// Public client; only the client id is sent.
	None,
}

/// Token endpoint coordinates for [`OAuth2Provider`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Config {
	/// Token endpoint accepting `grant_type=refresh_token`.
	pub token_endpoint: Url,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Client secret for confidential clients.
	#[serde(default)]
	pub client_secret: Option<String>,
	/// How the client authenticates at the token endpoint.
	#[serde(default)]
	pub auth_method: ClientAuthMethod,
}
impl OAuth2Config {
	/// Creates a configuration for a public client.
	pub fn new(token_endpoint: Url, client_id: impl Into<String>) -> Self {
		Self {
			token_endpoint,
			client_id: client_id.into(),
			client_secret: None,
			auth_method: ClientAuthMethod::None,
		}
	}

	/// Sets the client secret and the authentication method that carries it.
	pub fn with_client_secret(
		mut self,
		secret: impl Into<String>,
		method: ClientAuthMethod,
	) -> Self {
		self.client_secret = Some(secret.into());
		self.auth_method = method;

		self
	}
}
impl Debug for OAuth2Config {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2Config")
			.field("token_endpoint", &self.token_endpoint)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("auth_method", &self.auth_method)
			.finish()
	}
}

/// Refreshes sessions against a standard OAuth 2.0 token endpoint.
///
/// The identity hint is not part of the refresh grant and is ignored.
pub struct OAuth2Provider<T: ?Sized + HttpTransport> {
	client: TokenClient,
	transport: Arc<T>,
}
impl<T> OAuth2Provider<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a provider that reuses the caller-provided transport.
	pub fn with_transport(
		config: &OAuth2Config,
		transport: impl Into<Arc<T>>,
	) -> Result<Self, ConfigError> {
		let token_url = TokenUrl::new(config.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let mut client: TokenClient =
			Client::new(ClientId::new(config.client_id.clone())).set_token_uri(token_url);

		if !matches!(config.auth_method, ClientAuthMethod::None)
			&& let Some(secret) = &config.client_secret
		{
			client = client.set_client_secret(ClientSecret::new(secret.clone()));
		}
		if matches!(config.auth_method, ClientAuthMethod::ClientSecretPost) {
			client = client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { client, transport: transport.into() })
	}

	async fn exchange(&self, refresh_token: &str) -> Result<RefreshedTokens, ProviderError> {
		let slot = ResponseMetadataSlot::default();
		let handle = TransportHandle { transport: self.transport.clone(), slot: slot.clone() };
		let secret = RefreshToken::new(refresh_token.to_owned());
		let response = self
			.client
			.exchange_refresh_token(&secret)
			.request_async(&handle)
			.await
			.map_err(|e| map_request_error(slot.take(), e))?;
		let mut tokens = RefreshedTokens::new(response.access_token().secret().to_owned());

		tokens.id_token = response.extra_fields().id_token.clone().map(Into::into);
		tokens.refresh_token = response.refresh_token().map(|t| t.secret().to_owned().into());
		tokens.expires_in = response
			.expires_in()
			.and_then(|d| i64::try_from(d.as_secs()).ok())
			.filter(|secs| *secs > 0)
			.map(Duration::seconds);

		Ok(tokens)
	}
}
#[cfg(feature = "reqwest")]
impl OAuth2Provider<ReqwestTransport> {
	/// Creates a provider with its own reqwest-backed transport.
	pub fn new(config: &OAuth2Config) -> Result<Self, ConfigError> {
		Self::with_transport(config, ReqwestTransport::default())
	}
}
impl<T> IdentityProvider for OAuth2Provider<T>
where
	T: ?Sized + HttpTransport,
{
	fn exchange_refresh_token<'a>(
		&'a self,
		refresh_token: &'a str,
		_identity_hint: &'a str,
	) -> ProviderFuture<'a> {
		Box::pin(self.exchange(refresh_token))
	}
}
impl<T> Debug for OAuth2Provider<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2Provider").field("token_url", self.client.token_uri()).finish()
	}
}

/// Extra token-response fields kept beyond the RFC 6749 set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// OpenID Connect identity token, when the endpoint issues one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

#[derive(Clone, Copy, Debug, Default)]
struct ResponseMetadata {
	status: Option<u16>,
	retry_after: Option<Duration>,
}

#[derive(Clone, Debug, Default)]
struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// [`AsyncHttpClient`] adapter over any [`HttpTransport`].
struct TransportHandle<T: ?Sized> {
	transport: Arc<T>,
	slot: ResponseMetadataSlot,
}
impl<'c, T> AsyncHttpClient<'c> for TransportHandle<T>
where
	T: ?Sized + HttpTransport,
{
	type Error = HttpClientError<TransportError>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let (parts, body) = request.into_parts();
			let request = ApiRequest {
				method: parts.method,
				url: parts.uri.to_string(),
				headers: parts.headers,
				body: Some(body),
			};
			let response = self.transport.send(request).await.map_err(Box::new)?;

			self.slot.store(ResponseMetadata {
				status: Some(response.status.as_u16()),
				retry_after: response.retry_after(),
			});

			let mut converted = HttpResponse::new(response.body);

			*converted.status_mut() = response.status;
			*converted.headers_mut() = response.headers;

			Ok(converted)
		})
	}
}

fn map_request_error(meta: Option<ResponseMetadata>, err: RefreshRequestError) -> ProviderError {
	let status = meta.and_then(|m| m.status);

	if status == Some(429) {
		return ProviderError::Throttled {
			message: "Token endpoint returned 429".into(),
			retry_after: meta.and_then(|m| m.retry_after),
		};
	}

	match err {
		RequestTokenError::ServerResponse(response) => {
			let code = response.error().as_ref().to_owned();
			let message = response.error_description().cloned().unwrap_or_else(|| code.clone());

			match response.error() {
				BasicErrorResponseType::InvalidGrant
				| BasicErrorResponseType::InvalidClient
				| BasicErrorResponseType::UnauthorizedClient =>
					ProviderError::Rejected { code: Some(code), message },
				_ => ProviderError::Unexpected { status, message: format!("{code}: {message}") },
			}
		},
		RequestTokenError::Request(HttpClientError::Reqwest(inner)) =>
			ProviderError::Network { message: inner.to_string() },
		RequestTokenError::Request(other) => ProviderError::Network { message: other.to_string() },
		RequestTokenError::Parse(error, _body) => ProviderError::Unexpected {
			status,
			message: format!("Malformed token response at `{}`", error.path()),
		},
		RequestTokenError::Other(message) => ProviderError::Unexpected { status, message },
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::http::{ApiResponse, HeaderValue, StatusCode, TransportFuture, header};

	#[derive(Default)]
	struct CannedTransport {
		seen: Mutex<Vec<ApiRequest>>,
		status: Option<u16>,
		body: &'static str,
	}
	impl HttpTransport for CannedTransport {
		fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
			self.seen.lock().push(request);

			let status = StatusCode::from_u16(self.status.unwrap_or(200))
				.expect("Canned status should be valid.");
			let mut response = ApiResponse::new(status).with_body(self.body.as_bytes().to_vec());

			response
				.headers
				.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

			Box::pin(async move { Ok(response) })
		}
	}

	fn config() -> OAuth2Config {
		OAuth2Config::new(
			Url::parse("https://idp.example.com/oauth2/token")
				.expect("Token endpoint fixture should parse."),
			"client-1",
		)
	}

	#[tokio::test]
	async fn refresh_grant_maps_rotated_tokens() {
		let transport = Arc::new(CannedTransport {
			body: r#"{"access_token":"A2","id_token":"I2","refresh_token":"R2","token_type":"bearer","expires_in":3600}"#,
			..Default::default()
		});
		let provider =
			<OAuth2Provider<CannedTransport>>::with_transport(&config(), transport.clone())
				.expect("Provider should build.");
		let tokens = provider
			.exchange_refresh_token("R1", "ignored")
			.await
			.expect("Refresh grant should succeed.");

		assert_eq!(tokens.access_token.expose(), "A2");
		assert_eq!(tokens.id_token.as_ref().map(|t| t.expose()), Some("I2"));
		assert_eq!(tokens.refresh_token.as_ref().map(|t| t.expose()), Some("R2"));
		assert_eq!(tokens.expires_in, Some(Duration::hours(1)));

		let seen = transport.seen.lock();
		let body = String::from_utf8(seen[0].body.clone().expect("Token request needs a body."))
			.expect("Form body should be UTF-8.");

		assert_eq!(seen[0].url, "https://idp.example.com/oauth2/token");
		assert!(body.contains("grant_type=refresh_token"));
		assert!(body.contains("refresh_token=R1"));
	}

	#[tokio::test]
	async fn invalid_grant_is_rejected() {
		let transport = Arc::new(CannedTransport {
			status: Some(400),
			body: r#"{"error":"invalid_grant","error_description":"Token revoked"}"#,
			..Default::default()
		});
		let provider = <OAuth2Provider<CannedTransport>>::with_transport(&config(), transport)
			.expect("Provider should build.");
		let err = provider
			.exchange_refresh_token("R1", "ignored")
			.await
			.expect_err("invalid_grant should fail the exchange.");

		assert_eq!(
			err,
			ProviderError::Rejected {
				code: Some("invalid_grant".into()),
				message: "Token revoked".into()
			}
		);
	}

	#[tokio::test]
	async fn too_many_requests_is_throttled() {
		let transport = Arc::new(CannedTransport {
			status: Some(429),
			body: r#"{"error":"slow_down"}"#,
			..Default::default()
		});
		let provider = <OAuth2Provider<CannedTransport>>::with_transport(&config(), transport)
			.expect("Provider should build.");
		let err = provider
			.exchange_refresh_token("R1", "ignored")
			.await
			.expect_err("429 should fail the exchange.");

		assert!(matches!(err, ProviderError::Throttled { .. }));
		assert!(err.is_transient());
	}
}
