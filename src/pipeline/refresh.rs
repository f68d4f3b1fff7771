//! Single-flight refresh of the session's access token.
//!
//! At most one exchange with the identity provider is in flight at a time. Callers that arrive
//! while it runs join it and receive the same token or the same [`ProviderError`]. The exchange
//! is an owned future shared by every caller: whichever caller is polling drives it, and a
//! caller that goes away hands it to the next one without restarting the provider call.
//!
//! The flight is removed from the coordinator before its outcome is published, so a caller that
//! arrives after settlement starts a new exchange instead of joining a finished one.
//! [`RefreshCoordinator::reset`] starts a new generation; flights from an older generation never
//! write to the session.

// std
use std::sync::Weak;
// crates.io
use futures_util::future::{BoxFuture, FutureExt, Shared};
// self
use crate::{
	_prelude::*,
	auth::{SessionKey, TokenSecret},
	error::UnrefreshableReason,
	obs::{self, StageKind, StageOutcome, StageSpan},
	pipeline::PipelineMetrics,
	provider::{IdentityProvider, ProviderError, RefreshedTokens},
	store::SessionAccessor,
};

type FlightOutcome = std::result::Result<TokenSecret, ProviderError>;
type SharedExchange = Shared<BoxFuture<'static, FlightOutcome>>;

/// Owns the in-flight refresh exchange.
pub struct RefreshCoordinator {
	session: SessionAccessor,
	provider: Arc<dyn IdentityProvider>,
	metrics: Arc<PipelineMetrics>,
	state: Arc<Mutex<FlightState>>,
}
impl RefreshCoordinator {
	pub(crate) fn new(
		session: SessionAccessor,
		provider: Arc<dyn IdentityProvider>,
		metrics: Arc<PipelineMetrics>,
	) -> Self {
		Self { session, provider, metrics, state: Default::default() }
	}

	/// Returns a fresh access token, joining the exchange already in flight if there is one.
	///
	/// Fails with [`Error::SessionUnrefreshable`] without contacting the provider when the
	/// store lacks a refresh token or identity hint, or the provider is unconfigured.
	pub async fn refresh(&self) -> Result<TokenSecret> {
		let exchange = self.join_or_start()?;

		exchange.await.map_err(Error::from)
	}

	/// Returns true while an exchange is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.state.lock().current.is_some()
	}

	/// Forgets the exchange in flight and starts a new generation.
	///
	/// Callers already waiting on the old exchange still receive its outcome, but it is not
	/// written to the session and later callers start from the stored credentials.
	pub fn reset(&self) {
		let abandoned = {
			let mut state = self.state.lock();

			state.generation += 1;

			state.current.take()
		};

		drop(abandoned);
	}

	/// Session generation, bumped by every [`reset`](Self::reset).
	pub fn generation(&self) -> u64 {
		self.state.lock().generation
	}

	fn join_or_start(&self) -> Result<SharedExchange> {
		let mut state = self.state.lock();

		if let Some(flight) = state.current.as_ref() {
			self.metrics.record_refresh_join();

			return Ok(flight.exchange.clone());
		}

		let unrefreshable = |reason| Error::SessionUnrefreshable { reason };
		let refresh_token = self
			.session
			.read(SessionKey::RefreshToken)
			.ok_or_else(|| unrefreshable(UnrefreshableReason::MissingRefreshToken))?;
		let identity_hint = self
			.session
			.read(SessionKey::IdentityHint)
			.ok_or_else(|| unrefreshable(UnrefreshableReason::MissingIdentityHint))?;

		if !self.provider.is_configured() {
			return Err(unrefreshable(UnrefreshableReason::ProviderUnconfigured));
		}

		let id = state.next_id;

		state.next_id += 1;

		let exchange = FlightTask {
			id,
			generation: state.generation,
			refresh_token,
			identity_hint,
			session: self.session.clone(),
			provider: self.provider.clone(),
			metrics: self.metrics.clone(),
			state: Arc::downgrade(&self.state),
		}
		.run()
		.boxed()
		.shared();

		state.current = Some(RefreshFlight { id, exchange: exchange.clone() });

		Ok(exchange)
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("refreshing", &state.current.is_some())
			.field("generation", &state.generation)
			.finish()
	}
}

#[derive(Default)]
struct FlightState {
	generation: u64,
	next_id: u64,
	current: Option<RefreshFlight>,
}

struct RefreshFlight {
	id: u64,
	exchange: SharedExchange,
}

// Everything one exchange needs, owned so the shared future outlives any single caller.
struct FlightTask {
	id: u64,
	generation: u64,
	refresh_token: String,
	identity_hint: String,
	session: SessionAccessor,
	provider: Arc<dyn IdentityProvider>,
	metrics: Arc<PipelineMetrics>,
	state: Weak<Mutex<FlightState>>,
}
impl FlightTask {
	async fn run(self) -> FlightOutcome {
		const KIND: StageKind = StageKind::Refresh;

		let span = StageSpan::new(KIND, "exchange_refresh_token");

		obs::record_stage_outcome(KIND, StageOutcome::Attempt);
		self.metrics.record_refresh_attempt();

		let exchanged = span
			.instrument(
				self.provider.exchange_refresh_token(&self.refresh_token, &self.identity_hint),
			)
			.await;
		let result = self.settle(exchanged);

		match &result {
			Ok(_) => {
				self.metrics.record_refresh_success();
				obs::record_stage_outcome(KIND, StageOutcome::Success);
			},
			Err(_) => {
				self.metrics.record_refresh_failure();
				obs::record_stage_outcome(KIND, StageOutcome::Failure);
			},
		}

		result
	}

	// Clears the slot and persists under one lock so a concurrent reset either sees the flight
	// or sees its tokens already written.
	fn settle(
		&self,
		exchanged: std::result::Result<RefreshedTokens, ProviderError>,
	) -> FlightOutcome {
		let Some(shared) = self.state.upgrade() else {
			return exchanged.map(|tokens| tokens.access_token);
		};
		let mut state = shared.lock();
		let finished = match state.current.as_ref() {
			Some(current) if current.id == self.id => state.current.take(),
			_ => None,
		};
		let outcome = match exchanged {
			Ok(tokens) if state.generation == self.generation => Ok(self.persist(tokens)),
			Ok(tokens) => Ok(tokens.access_token),
			Err(e) => Err(e),
		};

		drop(state);
		drop(finished);

		outcome
	}

	fn persist(&self, tokens: RefreshedTokens) -> TokenSecret {
		let RefreshedTokens { access_token, id_token, refresh_token, .. } = tokens;

		self.session.write(SessionKey::AccessToken, access_token.expose());

		if let Some(id_token) = id_token {
			self.session.write(SessionKey::IdToken, id_token.expose());
		}
		if let Some(refresh_token) = refresh_token {
			self.session.write(SessionKey::RefreshToken, refresh_token.expose());
		}

		access_token
	}
}
