//! Declarative refresh policy for [`AuthorizedSession`](crate::session::AuthorizedSession).

// self
use crate::{_prelude::*, error::ConfigError};

/// Refresh policy that can be loaded from configuration files.
///
/// `refresh_timeout` is expressed in (fractional) seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
	/// Status codes that trigger a refresh-and-retry cycle.
	pub refresh_status_codes: Vec<u16>,
	/// Upper bound on refreshes for one logical call.
	pub max_refresh_attempts: u32,
	/// Overall deadline applied when a request carries no `max_allowed_time`.
	#[serde(with = "seconds")]
	pub refresh_timeout: Option<Duration>,
}
impl SessionConfig {
	/// Status codes used when none are configured: `401 Unauthorized`.
	pub const DEFAULT_REFRESH_STATUS_CODES: [u16; 1] = [401];
	/// Refresh attempts used when none are configured.
	pub const DEFAULT_MAX_REFRESH_ATTEMPTS: u32 = 2;

	/// Validates and converts the configured status codes.
	pub fn status_codes(&self) -> Result<BTreeSet<StatusCode>, ConfigError> {
		self.refresh_status_codes
			.iter()
			.map(|&code| {
				StatusCode::from_u16(code).map_err(|_| ConfigError::InvalidStatusCode { code })
			})
			.collect()
	}
}
impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			refresh_status_codes: Self::DEFAULT_REFRESH_STATUS_CODES.to_vec(),
			max_refresh_attempts: Self::DEFAULT_MAX_REFRESH_ATTEMPTS,
			refresh_timeout: None,
		}
	}
}

mod seconds {
	// crates.io
	use serde::{Deserializer, Serializer, de::Error as _};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.map(|duration| duration.as_secs_f64()).serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
	where
		D: Deserializer<'de>,
	{
		<Option<f64>>::deserialize(deserializer)?
			.map(|secs| Duration::try_from_secs_f64(secs).map_err(D::Error::custom))
			.transpose()
	}
}
