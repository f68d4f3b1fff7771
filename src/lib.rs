//! Authenticated request pipeline for a protected backend: bearer credentials on the way out,
//! single-flight token refresh and one retry on authorization failure, and an idempotent
//! session termination latch when recovery is impossible.
//!
//! The entry point is [`pipeline::AuthPipeline`]. It behaves like an ordinary HTTP client for
//! every request; only requests whose URL starts with the configured protected base URL
//! receive credentials and participate in refresh/retry handling.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod pipeline;
pub mod provider;
pub mod route;
pub mod store;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use time;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tokio as _};
