//! Request/response values and the transport abstraction every backend call goes through.
//!
//! [`HttpTransport`] is the pipeline's only dependency on an HTTP stack. The pipeline, the
//! identity providers, and tests all speak [`ApiRequest`]/[`ApiResponse`], so a custom
//! client (or a scripted fake) can stand in for [`ReqwestTransport`] without touching the
//! refresh or retry logic.

// crates.io
pub use oauth2::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by the
/// pipeline and the identity provider behind `Arc`. Any HTTP status, including
/// authorization failures, is a successful send; only network/IO problems are errors.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves with whatever the server answered.
	fn send(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// Outgoing request descriptor: method, fully-qualified URL, headers, body.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Fully-qualified target URL.
	pub url: String,
	/// Request headers.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
}
impl ApiRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, url: impl Into<String>) -> Self {
		Self { method, url: url.into(), headers: HeaderMap::new(), body: None }
	}

	/// Shorthand for a `GET` request.
	pub fn get(url: impl Into<String>) -> Self {
		Self::new(Method::GET, url)
	}

	/// Shorthand for a `POST` request.
	pub fn post(url: impl Into<String>) -> Self {
		Self::new(Method::POST, url)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(url: impl Into<String>) -> Self {
		Self::new(Method::PUT, url)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(url: impl Into<String>) -> Self {
		Self::new(Method::DELETE, url)
	}

	/// Sets (replacing) a header.
	pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ConfigError> {
		self.set_header(name, value)?;

		Ok(self)
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `value` as the JSON body and sets `Content-Type`.
	pub fn with_json<T>(mut self, value: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(value)?);
		self.headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// Returns the header value as a string, if present and valid UTF-8.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	pub(crate) fn set_header(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
		let invalid = || ConfigError::InvalidHeader { name: name.to_owned() };
		let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
		let value = HeaderValue::from_str(value).map_err(|_| invalid())?;

		self.headers.insert(name, value);

		Ok(())
	}
}

/// Response received from a backend.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates an empty response with `status`.
	pub fn new(status: StatusCode) -> Self {
		Self { status, headers: HeaderMap::new(), body: Vec::new() }
	}

	/// Sets the raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Returns true for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns the body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Deserializes the JSON body, reporting the failing path on error.
	pub fn json<T>(&self) -> Result<T, BodyParseError>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| BodyParseError { status: self.status.as_u16(), source })
	}

	/// Parses a `Retry-After` header (delta seconds or RFC 2822 date).
	pub fn retry_after(&self) -> Option<Duration> {
		parse_retry_after(&self.headers)
	}
}

/// Response body did not match the expected JSON shape.
#[derive(Debug, ThisError)]
#[error("Response body with status {status} is not the expected JSON.")]
pub struct BodyParseError {
	/// HTTP status of the response.
	pub status: u16,
	/// Structured parsing failure.
	#[source]
	pub source: serde_path_to_error::Error<serde_json::Error>,
}

/// [`HttpTransport`] backed by a shared [`ReqwestClient`].
///
/// Redirects are followed according to the wrapped client's policy; identity-provider
/// endpoints answer directly, so the default client is adequate for both roles.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let ApiRequest { method, url, headers, body } = request;
			let mut builder = client.request(method, url).headers(headers);

			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(header::RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(i64::from(secs)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
