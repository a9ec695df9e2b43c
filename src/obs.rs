//! Optional observability helpers for authorized sessions.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to wrap every logical call in an `authorized_session.request` span (with
//!   `method` + `url` fields), log each transport attempt at debug level, and log refreshes and
//!   budget overruns.
//! - Enable `metrics` to increment the `authorized_session_refresh_total` counter for every
//!   refresh attempt/success/failure, labeled by `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Sub-operations of a logical call that run under their own time guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestStage {
	/// Credentials decorating the outbound headers.
	Authorize,
	/// Data-plane send.
	Send,
	/// Lock acquisition plus credential refresh.
	Refresh,
}
impl RequestStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestStage::Authorize => "authorize",
			RequestStage::Send => "send",
			RequestStage::Refresh => "refresh",
		}
	}
}
impl Display for RequestStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
	/// A refresh started (the session-wide lock is held).
	Attempt,
	/// The credentials refreshed successfully.
	Success,
	/// The credentials failed to refresh.
	Failure,
}
impl RefreshOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshOutcome::Attempt => "attempt",
			RefreshOutcome::Success => "success",
			RefreshOutcome::Failure => "failure",
		}
	}
}
impl Display for RefreshOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
