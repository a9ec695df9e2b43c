//! Bearer token model used by [`BearerCredentials`](crate::auth::BearerCredentials).

pub mod secret;

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Access token plus the instant after which it must no longer be sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
	/// Access token secret; callers must avoid logging it.
	pub secret: TokenSecret,
	/// Expiry instant, `None` when the issuer did not report one.
	pub expires_at: Option<Instant>,
}
impl Token {
	/// Wraps a token that never expires on its own.
	pub fn new(secret: impl Into<TokenSecret>) -> Self {
		Self { secret: secret.into(), expires_at: None }
	}

	/// Sets the expiry relative to now, as reported by an `expires_in` field.
	///
	/// Lifetimes too large to represent leave the token without an expiry.
	pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
		self.expires_at = Instant::now().checked_add(expires_in);

		self
	}

	/// Returns `true` when the token is still valid `leeway` past `now`.
	pub fn is_usable_at(&self, now: Instant, leeway: Duration) -> bool {
		match (self.expires_at, now.checked_add(leeway)) {
			(Some(expires_at), Some(horizon)) => horizon < expires_at,
			// A horizon past the clock's range cannot be compared; keep the token.
			(Some(_), None) | (None, _) => true,
		}
	}

	/// Renders the `authorization` header value, flagged as sensitive.
	pub fn header_value(&self) -> Result<HeaderValue> {
		let mut value = HeaderValue::from_str(&format!("Bearer {}", self.secret.expose()))
			.map_err(crate::error::ConfigError::from)?;

		value.set_sensitive(true);

		Ok(value)
	}
}
