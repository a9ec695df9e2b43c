// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::obs::RefreshOutcome;

/// Point-in-time copy of a session's [`RefreshMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshSnapshot {
	/// Refreshes that started.
	pub attempts: u64,
	/// Refreshes that completed successfully.
	pub successes: u64,
	/// Refreshes that returned an error.
	pub failures: u64,
	/// Refreshes that had to queue behind another caller's refresh.
	pub contended: u64,
}

/// Lock-free refresh counters shared by every logical call on one session.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
	contended: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the number of refreshes that started.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes that completed successfully.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes that failed.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Returns how often a caller found the refresh lock already held.
	pub fn contended(&self) -> u64 {
		self.contended.load(Ordering::Relaxed)
	}

	/// Copies every counter at once.
	pub fn snapshot(&self) -> RefreshSnapshot {
		RefreshSnapshot {
			attempts: self.attempts(),
			successes: self.successes(),
			failures: self.failures(),
			contended: self.contended(),
		}
	}

	pub(crate) fn record(&self, outcome: RefreshOutcome) {
		let counter = match outcome {
			RefreshOutcome::Attempt => &self.attempts,
			RefreshOutcome::Success => &self.successes,
			RefreshOutcome::Failure => &self.failures,
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_contended(&self) {
		self.contended.fetch_add(1, Ordering::Relaxed);
	}
}
