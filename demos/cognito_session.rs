//! Sends one request to a protected backend, refreshing through Cognito when needed.
//!
//! 1. Export `BEARER_RELAY_BASE_URL` and the `COGNITO_*` variables.
//! 2. Point `BEARER_RELAY_SESSION_FILE` at a JSON snapshot written by your login flow (defaults
//!    to `session.json`).
//! 3. Run `cargo run --example cognito_session -- <protected-url>`.

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::{Result, eyre::eyre};
// self
use bearer_relay::{
	config::PipelineConfig,
	http::ApiRequest,
	pipeline::{AuthPipeline, TerminationHooks},
	provider::{CognitoConfig, CognitoProvider},
	store::FileStore,
};

struct PrintHooks;
impl TerminationHooks for PrintHooks {
	fn navigate(&self, route: &str) {
		println!("session ended, continue at {route}");
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let url = env::args().nth(1).ok_or_else(|| eyre!("usage: cognito_session <protected-url>"))?;
	let session_file =
		env::var("BEARER_RELAY_SESSION_FILE").unwrap_or_else(|_| "session.json".into());
	let pipeline = AuthPipeline::builder(PipelineConfig::from_env()?)
		.store(Arc::new(FileStore::open(session_file)?))
		.provider(Arc::new(CognitoProvider::new(CognitoConfig::from_env()?)))
		.hooks(Arc::new(PrintHooks))
		.build()?;
	let response = pipeline.send(ApiRequest::get(url)).await?;

	println!("{} {}", response.status, response.text());
	println!(
		"refreshes: {}, retries: {}, terminations: {}",
		pipeline.metrics().refresh_attempts(),
		pipeline.metrics().retries(),
		pipeline.metrics().terminations()
	);

	Ok(())
}
