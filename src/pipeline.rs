//! The authenticated request pipeline.
//!
//! [`AuthPipeline::send`] is the only entry point callers need. Requests outside the protected
//! base URL go straight to the transport. Protected requests get the stored bearer token and
//! subject header; an authorization failure triggers one shared refresh (see
//! [`RefreshCoordinator`]) and exactly one retry, and a failure that cannot be recovered fires
//! the [`TerminationLatch`] before the error is returned.

mod attempt;
mod metrics;
mod refresh;
mod termination;

pub use attempt::RequestAttempt;
pub use metrics::PipelineMetrics;
pub use refresh::RefreshCoordinator;
pub use termination::{NoopHooks, TerminationHooks, TerminationLatch};

// self
use crate::{
	_prelude::*,
	auth::{AuthSession, SessionKey, TokenSecret},
	config::PipelineConfig,
	error::ConfigError,
	http::{ApiRequest, ApiResponse, HttpTransport, header},
	obs::{self, Diagnostics, StageKind, StageOutcome, StageSpan, default_diagnostics},
	provider::{IdentityProvider, ProviderError, ProviderFuture},
	route::RouteClassifier,
	store::{MemoryStore, SessionAccessor, SessionStore},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Pipeline specialized for the crate's default reqwest transport.
pub type ReqwestPipeline = AuthPipeline<ReqwestTransport>;

/// HTTP client wrapper that authenticates requests to one protected backend.
///
/// Everything the pipeline shares between concurrent calls (the in-flight refresh and the
/// termination latch) lives inside this value, so one instance should serve the whole
/// application, usually behind an `Arc`.
pub struct AuthPipeline<T>
where
	T: ?Sized + HttpTransport,
{
	config: PipelineConfig,
	routes: RouteClassifier,
	transport: Arc<T>,
	session: SessionAccessor,
	coordinator: RefreshCoordinator,
	latch: TerminationLatch,
	metrics: Arc<PipelineMetrics>,
}
impl AuthPipeline<dyn HttpTransport> {
	/// Starts building a pipeline for `config`.
	pub fn builder(config: PipelineConfig) -> PipelineBuilder {
		PipelineBuilder::new(config)
	}
}
impl<T> AuthPipeline<T>
where
	T: ?Sized + HttpTransport,
{
	/// Sends `request`, attaching credentials and recovering from authorization failures
	/// when it targets the protected backend.
	///
	/// Transport failures are returned as [`Error::Transport`] unchanged and never terminate
	/// the session. A protected request that ends in termination returns
	/// [`Error::AuthorizationFailed`] carrying the rejected response.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		if !self.routes.is_protected(&request.url) {
			return Ok(self.transport.send(request).await?);
		}

		let generation = self.coordinator.generation();
		let mut attempt = RequestAttempt::first(request);
		let mut token = self.session.read(SessionKey::AccessToken).map(TokenSecret::from);

		loop {
			let outgoing = self.authorize(attempt.request(), token.as_ref())?;
			let retried = attempt.already_retried();
			let span = retried.then(|| StageSpan::new(StageKind::Retry, "send"));
			let sending = self.transport.send(outgoing);
			let response = match &span {
				Some(span) => span.instrument(sending).await?,
				None => sending.await?,
			};
			let rejected = self.config.is_authorization_failure(response.status.as_u16());

			match (retried, rejected) {
				(false, false) => return Ok(response),
				(true, false) => {
					obs::record_stage_outcome(StageKind::Retry, StageOutcome::Success);

					return Ok(response);
				},
				(true, true) => {
					obs::record_stage_outcome(StageKind::Retry, StageOutcome::Failure);
					self.terminate_generation(generation);

					return Err(Error::AuthorizationFailed {
						response: Box::new(response),
						retried: true,
						cause: None,
					});
				},
				(false, true) => match self.coordinator.refresh().await {
					Ok(fresh) => {
						token = Some(fresh);
						attempt = attempt.into_retry();

						self.metrics.record_retry();
						obs::record_stage_outcome(StageKind::Retry, StageOutcome::Attempt);
					},
					Err(e) => {
						self.terminate_generation(generation);

						return Err(Error::AuthorizationFailed {
							response: Box::new(response),
							retried: false,
							cause: Some(Box::new(e)),
						});
					},
				},
			}
		}
	}

	/// Refreshes the access token through the shared coordinator.
	pub async fn refresh(&self) -> Result<TokenSecret> {
		self.coordinator.refresh().await
	}

	/// Fires the termination latch. Returns true when this call ran the side effects.
	pub fn terminate(&self) -> bool {
		self.latch.terminate()
	}

	/// User-initiated logout; same side effects and latch as [`AuthPipeline::terminate`].
	pub fn logout(&self) -> bool {
		#[cfg(feature = "tracing")]
		tracing::info!(target: "bearer_relay", "Logout requested.");

		self.latch.terminate()
	}

	/// Replaces the stored session after a login and re-arms the termination latch.
	///
	/// Any refresh still in flight belongs to the previous session; it is forgotten and its
	/// tokens are never written over the new ones.
	pub fn start_session(&self, session: &AuthSession) {
		self.coordinator.reset();
		self.session.clear();
		self.session.save(session);
		self.latch.reset();
	}

	/// Returns a snapshot of the stored session.
	pub fn session(&self) -> AuthSession {
		self.session.load()
	}

	/// Returns true when an access token is stored.
	pub fn is_authenticated(&self) -> bool {
		self.session.read(SessionKey::AccessToken).is_some()
	}

	/// Returns true while a refresh exchange is in flight.
	pub fn refresh_in_flight(&self) -> bool {
		self.coordinator.is_refreshing()
	}

	/// Returns the configuration the pipeline was built with.
	pub fn config(&self) -> &PipelineConfig {
		&self.config
	}

	/// Returns the route classifier.
	pub fn routes(&self) -> &RouteClassifier {
		&self.routes
	}

	/// Returns the termination latch.
	pub fn latch(&self) -> &TerminationLatch {
		&self.latch
	}

	/// Returns the shared refresh/retry/termination counters.
	pub fn metrics(&self) -> &PipelineMetrics {
		&self.metrics
	}

	// Requests that started under an earlier session must not end the current one.
	fn terminate_generation(&self, generation: u64) {
		if self.coordinator.generation() == generation {
			self.latch.terminate();
		}
	}

	fn authorize(
		&self,
		request: &ApiRequest,
		token: Option<&TokenSecret>,
	) -> Result<ApiRequest, ConfigError> {
		let mut outgoing = request.clone();

		if let Some(token) = token {
			outgoing.set_header(header::AUTHORIZATION.as_str(), &token.bearer())?;
		}
		if let Some(subject) = self.session.read(SessionKey::Subject) {
			outgoing.set_header(&self.config.subject_header, &subject)?;
		}

		Ok(outgoing)
	}
}
impl<T> Debug for AuthPipeline<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthPipeline")
			.field("routes", &self.routes)
			.field("coordinator", &self.coordinator)
			.field("latch", &self.latch)
			.finish()
	}
}

/// Assembles an [`AuthPipeline`] from its collaborators.
///
/// Unset collaborators default to an in-memory store, no identity provider (every refresh is
/// unrefreshable), no-op termination hooks, and
/// [`TracingDiagnostics`](crate::obs::TracingDiagnostics).
pub struct PipelineBuilder {
	config: PipelineConfig,
	store: Option<Arc<dyn SessionStore>>,
	provider: Option<Arc<dyn IdentityProvider>>,
	hooks: Arc<dyn TerminationHooks>,
	diagnostics: Arc<dyn Diagnostics>,
}
impl PipelineBuilder {
	/// Creates a builder for `config`.
	pub fn new(config: PipelineConfig) -> Self {
		Self {
			config,
			store: None,
			provider: None,
			hooks: Arc::new(NoopHooks),
			diagnostics: default_diagnostics(),
		}
	}

	/// Sets the session store backend.
	pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Sets the identity provider used for refresh exchanges.
	pub fn provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
		self.provider = Some(provider);

		self
	}

	/// Sets the termination hooks.
	pub fn hooks(mut self, hooks: Arc<dyn TerminationHooks>) -> Self {
		self.hooks = hooks;

		self
	}

	/// Sets the diagnostics sink for storage failures.
	pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
		self.diagnostics = diagnostics;

		self
	}

	/// Builds the pipeline on top of `transport`.
	pub fn build_with_transport<T>(
		self,
		transport: impl Into<Arc<T>>,
	) -> Result<AuthPipeline<T>, ConfigError>
	where
		T: ?Sized + HttpTransport,
	{
		let Self { config, store, provider, hooks, diagnostics } = self;
		let routes = RouteClassifier::new(config.protected_base_url.clone())?;
		let route = config.termination_route()?;
		let store = store.unwrap_or_else(|| Arc::new(MemoryStore::default()));
		let provider = provider.unwrap_or_else(|| Arc::new(UnconfiguredProvider));
		let session = SessionAccessor::new(store).with_diagnostics(diagnostics);
		let metrics = Arc::new(PipelineMetrics::default());
		let coordinator = RefreshCoordinator::new(session.clone(), provider, metrics.clone());
		let latch = TerminationLatch::new(session.clone(), hooks, route, metrics.clone());

		Ok(AuthPipeline {
			config,
			routes,
			transport: transport.into(),
			session,
			coordinator,
			latch,
			metrics,
		})
	}

	/// Builds the pipeline with its own reqwest-backed transport.
	#[cfg(feature = "reqwest")]
	pub fn build(self) -> Result<ReqwestPipeline, ConfigError> {
		self.build_with_transport(ReqwestTransport::default())
	}
}
impl Debug for PipelineBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PipelineBuilder")
			.field("config", &self.config)
			.field("store_set", &self.store.is_some())
			.field("provider_set", &self.provider.is_some())
			.finish()
	}
}

struct UnconfiguredProvider;
impl IdentityProvider for UnconfiguredProvider {
	fn is_configured(&self) -> bool {
		false
	}

	fn exchange_refresh_token<'a>(
		&'a self,
		_refresh_token: &'a str,
		_identity_hint: &'a str,
	) -> ProviderFuture<'a> {
		Box::pin(async {
			Err(ProviderError::Unexpected {
				status: None,
				message: "No identity provider is configured".into(),
			})
		})
	}
}
