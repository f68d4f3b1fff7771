//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

// std
use std::{
	io,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use parking_lot::Mutex;
// self
use bearer_relay::{
	auth::AuthSession,
	config::PipelineConfig,
	error::TransportError,
	http::{ApiRequest, ApiResponse, HttpTransport, StatusCode, TransportFuture},
	obs::Diagnostics,
	pipeline::{AuthPipeline, TerminationHooks},
	provider::{IdentityProvider, ProviderError, ProviderFuture, RefreshedTokens},
	store::{MemoryStore, SessionStore, StoreError},
};

pub const BASE_URL: &str = "https://api.example.com/pronostico";
pub const PROTECTED_URL: &str = "https://api.example.com/pronostico/presupuestos";
pub const UNPROTECTED_URL: &str = "https://registro.example.com/movimientos";
pub const BACKEND_LATENCY: Duration = Duration::from_millis(10);
pub const PROVIDER_LATENCY: Duration = Duration::from_millis(100);

/// How [`ScriptedBackend`] answers.
#[derive(Clone, Debug)]
pub enum BackendMode {
	/// 200 for `Bearer {token}`, 401 otherwise.
	Accept(&'static str),
	/// 401 for every request.
	Reject,
	/// The given status for every request.
	Status(u16),
	/// Network failure for every request.
	Fail,
}

/// One request as the backend received it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Seen {
	pub url: String,
	pub authorization: Option<String>,
	pub subject: Option<String>,
}

pub struct ScriptedBackend {
	mode: Mutex<BackendMode>,
	seen: Mutex<Vec<Seen>>,
}
impl ScriptedBackend {
	pub fn new(mode: BackendMode) -> Arc<Self> {
		Arc::new(Self { mode: Mutex::new(mode), seen: Mutex::new(Vec::new()) })
	}

	pub fn set_mode(&self, mode: BackendMode) {
		*self.mode.lock() = mode;
	}

	pub fn seen(&self) -> Vec<Seen> {
		self.seen.lock().clone()
	}

	pub fn authorizations(&self) -> Vec<Option<String>> {
		self.seen.lock().iter().map(|s| s.authorization.clone()).collect()
	}
}
impl HttpTransport for ScriptedBackend {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		let authorization = request.header("authorization").map(str::to_owned);

		self.seen.lock().push(Seen {
			url: request.url.clone(),
			authorization: authorization.clone(),
			subject: request.header("x-usuario-sub").map(str::to_owned),
		});

		let mode = self.mode.lock().clone();

		Box::pin(async move {
			tokio::time::sleep(BACKEND_LATENCY).await;

			let status = match mode {
				BackendMode::Accept(token) =>
					if authorization.as_deref() == Some(format!("Bearer {token}").as_str()) {
						200
					} else {
						401
					},
				BackendMode::Reject => 401,
				BackendMode::Status(status) => status,
				BackendMode::Fail =>
					return Err(TransportError::Io(io::Error::new(
						io::ErrorKind::ConnectionReset,
						"connection reset by peer",
					))),
			};

			Ok(ApiResponse::new(StatusCode::from_u16(status).expect("Scripted status is valid.")))
		})
	}
}

pub struct ScriptedProvider {
	outcome: Mutex<Result<RefreshedTokens, ProviderError>>,
	calls: Mutex<Vec<(String, String)>>,
}
impl ScriptedProvider {
	pub fn succeeding(tokens: RefreshedTokens) -> Arc<Self> {
		Arc::new(Self { outcome: Mutex::new(Ok(tokens)), calls: Mutex::new(Vec::new()) })
	}

	pub fn failing(err: ProviderError) -> Arc<Self> {
		Arc::new(Self { outcome: Mutex::new(Err(err)), calls: Mutex::new(Vec::new()) })
	}

	pub fn calls(&self) -> Vec<(String, String)> {
		self.calls.lock().clone()
	}
}
impl IdentityProvider for ScriptedProvider {
	fn exchange_refresh_token<'a>(
		&'a self,
		refresh_token: &'a str,
		identity_hint: &'a str,
	) -> ProviderFuture<'a> {
		self.calls.lock().push((refresh_token.to_owned(), identity_hint.to_owned()));

		let outcome = self.outcome.lock().clone();

		Box::pin(async move {
			tokio::time::sleep(PROVIDER_LATENCY).await;

			outcome
		})
	}
}

#[derive(Default)]
pub struct RecordingHooks {
	releases: AtomicUsize,
	navigations: Mutex<Vec<String>>,
}
impl RecordingHooks {
	pub fn releases(&self) -> usize {
		self.releases.load(Ordering::SeqCst)
	}

	pub fn navigations(&self) -> Vec<String> {
		self.navigations.lock().clone()
	}
}
impl TerminationHooks for RecordingHooks {
	fn release_session(&self) {
		self.releases.fetch_add(1, Ordering::SeqCst);
	}

	fn navigate(&self, route: &str) {
		self.navigations.lock().push(route.to_owned());
	}
}

/// [`MemoryStore`] that counts `clear` calls.
#[derive(Default)]
pub struct CountingStore {
	inner: MemoryStore,
	clears: AtomicUsize,
}
impl CountingStore {
	pub fn clears(&self) -> usize {
		self.clears.load(Ordering::SeqCst)
	}

	pub fn value(&self, key: &str) -> Option<String> {
		self.inner.get(key).expect("Memory store reads never fail.")
	}
}
impl SessionStore for CountingStore {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		self.inner.get(key)
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
		self.inner.set(key, value)
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		self.inner.remove(key)
	}

	fn clear(&self) -> Result<(), StoreError> {
		self.clears.fetch_add(1, Ordering::SeqCst);

		self.inner.clear()
	}
}

/// Store that fails every operation.
pub struct FailingStore;
impl SessionStore for FailingStore {
	fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
		Err(StoreError::Unavailable { message: "storage disabled".into() })
	}

	fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
		Err(StoreError::Backend { message: "quota exceeded".into() })
	}

	fn remove(&self, _key: &str) -> Result<(), StoreError> {
		Err(StoreError::Unavailable { message: "storage disabled".into() })
	}

	fn clear(&self) -> Result<(), StoreError> {
		Err(StoreError::Unavailable { message: "storage disabled".into() })
	}
}

#[derive(Default)]
pub struct RecordingDiagnostics(Mutex<Vec<String>>);
impl RecordingDiagnostics {
	pub fn warnings(&self) -> Vec<String> {
		self.0.lock().clone()
	}
}
impl Diagnostics for RecordingDiagnostics {
	fn warn(&self, message: &str) {
		self.0.lock().push(message.to_owned());
	}
}

/// A fully wired pipeline plus handles to every scripted collaborator.
pub struct Harness {
	pub pipeline: AuthPipeline<ScriptedBackend>,
	pub backend: Arc<ScriptedBackend>,
	pub provider: Arc<ScriptedProvider>,
	pub store: Arc<CountingStore>,
	pub hooks: Arc<RecordingHooks>,
	pub diagnostics: Arc<RecordingDiagnostics>,
}
impl Harness {
	pub fn new(
		config: PipelineConfig,
		backend: Arc<ScriptedBackend>,
		provider: Arc<ScriptedProvider>,
	) -> Self {
		let store = Arc::new(CountingStore::default());
		let hooks = Arc::new(RecordingHooks::default());
		let diagnostics = Arc::new(RecordingDiagnostics::default());
		let pipeline = AuthPipeline::builder(config)
			.store(store.clone())
			.provider(provider.clone())
			.hooks(hooks.clone())
			.diagnostics(diagnostics.clone())
			.build_with_transport::<ScriptedBackend>(backend.clone())
			.expect("Harness pipeline should build.");

		Self { pipeline, backend, provider, store, hooks, diagnostics }
	}

	/// Harness with the default configuration and a logged-in session.
	pub fn logged_in(backend: Arc<ScriptedBackend>, provider: Arc<ScriptedProvider>) -> Self {
		let harness = Self::new(PipelineConfig::new(BASE_URL), backend, provider);

		harness.pipeline.start_session(&stale_session());

		harness
	}
}

/// Session whose access token `A1` the backend no longer accepts.
pub fn stale_session() -> AuthSession {
	AuthSession::default()
		.with_access_token("A1")
		.with_id_token("I1")
		.with_refresh_token("R1")
		.with_subject_id("sub-ana")
		.with_identity_hint("ana@example.com")
}
