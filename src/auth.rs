//! Session model: stored credentials, their storage keys, and the redacting secret wrapper.

pub mod secret;
pub mod session;

pub use secret::*;
pub use session::*;
