#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use bearer_relay::{
	provider::{CognitoConfig, CognitoProvider, IdentityProvider, ProviderError},
	url::Url,
};

const TARGET: &str = "AWSCognitoIdentityProviderService.InitiateAuth";

fn provider(server: &MockServer) -> CognitoProvider<bearer_relay::http::ReqwestTransport> {
	let endpoint = Url::parse(&server.url("/")).expect("Mock endpoint should parse.");

	CognitoProvider::new(Some(
		CognitoConfig::new("us-east-1_Pronostico", "client-1").with_endpoint(endpoint),
	))
}

#[tokio::test]
async fn refresh_token_auth_returns_new_tokens() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/")
				.header("x-amz-target", TARGET)
				.header("content-type", "application/x-amz-json-1.1");
			then.status(200).header("content-type", "application/x-amz-json-1.1").body(
				r#"{"AuthenticationResult":{"AccessToken":"A2","IdToken":"I2","ExpiresIn":3600,"TokenType":"Bearer"},"ChallengeParameters":{}}"#,
			);
		})
		.await;
	let provider = provider(&server);

	assert!(provider.is_configured());

	let tokens = provider
		.exchange_refresh_token("R1", "ana@example.com")
		.await
		.expect("InitiateAuth should succeed.");

	mock.assert_async().await;

	assert_eq!(tokens.access_token.expose(), "A2");
	assert_eq!(tokens.id_token.as_ref().map(|t| t.expose()), Some("I2"));
	assert_eq!(tokens.refresh_token, None);
}

#[tokio::test]
async fn expired_refresh_token_is_rejected() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/");
			then.status(400)
				.header("content-type", "application/x-amz-json-1.1")
				.body(r#"{"__type":"NotAuthorizedException","message":"Refresh Token has expired"}"#);
		})
		.await;
	let err = provider(&server)
		.exchange_refresh_token("R1", "ana@example.com")
		.await
		.expect_err("Expired refresh tokens should be rejected.");

	assert_eq!(
		err,
		ProviderError::Rejected {
			code: Some("NotAuthorizedException".into()),
			message: "Refresh Token has expired".into(),
		}
	);
}

#[tokio::test]
async fn throttling_carries_retry_after() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/");
			then.status(400)
				.header("content-type", "application/x-amz-json-1.1")
				.header("retry-after", "7")
				.body(r#"{"__type":"TooManyRequestsException","message":"Rate exceeded"}"#);
		})
		.await;
	let err = provider(&server)
		.exchange_refresh_token("R1", "ana@example.com")
		.await
		.expect_err("Throttled exchanges should fail.");

	match err {
		ProviderError::Throttled { retry_after, .. } =>
			assert_eq!(retry_after, Some(bearer_relay::time::Duration::seconds(7))),
		other => panic!("Unexpected provider error: {other:?}."),
	}
}

#[test]
fn missing_configuration_reports_unconfigured() {
	assert!(!CognitoProvider::new(None).is_configured());
	let regionless = CognitoConfig::new("no-region", "client-1");

	assert!(!CognitoProvider::new(Some(regionless)).is_configured());
}
