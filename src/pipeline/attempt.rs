// self
use crate::http::ApiRequest;

/// One send of a logical request, carrying whether it is already the retry.
///
/// Attempts are values: [`RequestAttempt::into_retry`] builds the second attempt instead of
/// flipping a flag on a shared request, so the flag can only go from `false` to `true` once.
#[derive(Clone, Debug)]
pub struct RequestAttempt {
	request: ApiRequest,
	already_retried: bool,
}
impl RequestAttempt {
	/// Creates the first attempt for `request`.
	pub fn first(request: ApiRequest) -> Self {
		Self { request, already_retried: false }
	}

	/// Consumes the first attempt and returns the retry for the same request.
	pub fn into_retry(self) -> Self {
		Self { request: self.request, already_retried: true }
	}

	/// Returns true when this attempt is the retry.
	pub fn already_retried(&self) -> bool {
		self.already_retried
	}

	/// Borrows the request as the caller issued it, without credentials.
	pub fn request(&self) -> &ApiRequest {
		&self.request
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn retry_keeps_the_request_and_sets_the_flag() {
		let first = RequestAttempt::first(ApiRequest::get("https://api.example.com/a"));

		assert!(!first.already_retried());

		let retry = first.clone().into_retry();

		assert!(retry.already_retried());
		assert!(!first.already_retried());
		assert_eq!(retry.request().url, "https://api.example.com/a");
	}
}
