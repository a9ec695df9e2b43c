//! Session-level error types shared across transports, credentials, and time guards.

// self
use crate::_prelude::*;

/// Session-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Only HTTP responses whose status is configured as refreshable are retried by the session;
/// every variant here terminates the logical call that produced it.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, per-attempt timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The overall time budget of a logical call ran out.
	#[error(transparent)]
	Timeout(#[from] TimeoutError),
	/// Credentials could not authorize the request or refresh themselves.
	#[error(transparent)]
	Credentials(#[from] CredentialsError),
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Credentials produced a header value that cannot be sent.
	#[error("Credentials produced an invalid header value.")]
	InvalidHeader(#[from] ::http::header::InvalidHeaderValue),
	/// A configured refresh status code is outside the valid HTTP range.
	#[error("Refresh status code {code} is not a valid HTTP status.")]
	InvalidStatusCode {
		/// Offending value.
		code: u16,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, per-attempt timeout).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// A single attempt exceeded its transport timeout.
	#[error("Request timed out before the transport produced a response.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::timeout(e) } else { Self::network(e) }
	}
}

/// Raised by a time guard once a scoped operation overran the remaining budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
#[error("Operation exceeded its time budget of {budget:?} after {elapsed:?}.")]
pub struct TimeoutError {
	/// Budget that was available when the guarded operation started.
	pub budget: Duration,
	/// Time the guarded operation actually took (or had taken when it was aborted).
	pub elapsed: Duration,
}

/// Authorization failures reported by [`Credentials`](crate::auth::Credentials).
#[derive(Debug, ThisError)]
pub enum CredentialsError {
	/// The authorization service rejected the credentials.
	#[error("Credentials were rejected: {reason}.")]
	Rejected {
		/// Service- or credential-supplied reason string.
		reason: String,
	},
	/// Refreshing the credentials failed.
	#[error("Credential refresh failed.")]
	Refresh {
		/// Credential-specific refresh failure.
		#[source]
		source: BoxError,
	},
	/// The refresh task stopped before it could finish (e.g. runtime shutdown).
	#[error("Credential refresh was aborted before completion.")]
	RefreshAborted,
}
impl CredentialsError {
	/// Wraps a credential-specific refresh failure.
	pub fn refresh(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Refresh { source: Box::new(src) }
	}
}
