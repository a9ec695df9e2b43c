//! Cumulative deadline enforcement across the sequential stages of one logical call.

// self
use crate::{
	_prelude::*,
	error::TimeoutError,
	obs::{self, RequestStage},
};

/// Scoped timer that enforces the remaining budget of a logical call on one stage.
///
/// An unlimited (`None`) budget disables every check and keeps propagating `None`, so a call
/// without a deadline never times out no matter how many stages or retries it runs through.
#[derive(Clone, Copy, Debug)]
pub struct TimeGuard {
	stage: RequestStage,
	budget: Option<Duration>,
}
impl TimeGuard {
	/// Creates a guard for `stage` with the budget left over from previous stages.
	pub fn new(stage: RequestStage, budget: Option<Duration>) -> Self {
		Self { stage, budget }
	}

	/// Returns the budget this guard enforces.
	pub fn budget(&self) -> Option<Duration> {
		self.budget
	}

	/// Runs `fut` under the budget and returns its output together with the remaining budget.
	///
	/// The future is dropped as soon as the budget runs out. An overrun is reported as a
	/// [`TimeoutError`] even when the future itself failed.
	pub async fn run<F, T>(self, fut: F) -> Result<(T, Option<Duration>)>
	where
		F: Future<Output = Result<T>>,
	{
		let Some(budget) = self.budget else {
			return fut.await.map(|value| (value, None));
		};
		let started = Instant::now();

		match tokio::time::timeout(budget, fut).await {
			Ok(result) => {
				let elapsed = started.elapsed();

				if elapsed > budget {
					return Err(self.exceeded(budget, elapsed));
				}

				result.map(|value| (value, Some(budget - elapsed)))
			},
			Err(_) => Err(self.exceeded(budget, started.elapsed())),
		}
	}

	fn exceeded(&self, budget: Duration, elapsed: Duration) -> Error {
		let err = TimeoutError { budget, elapsed };

		obs::log_budget_exceeded(self.stage, &err);

		err.into()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::TransportError;

	#[tokio::test(start_paused = true)]
	async fn unlimited_budget_never_times_out() {
		let guard = TimeGuard::new(RequestStage::Refresh, None);
		let (value, remaining) = guard
			.run(async {
				tokio::time::sleep(Duration::from_secs(3_600)).await;

				Ok(7)
			})
			.await
			.expect("Unlimited guards must not time out.");

		assert_eq!(value, 7);
		assert_eq!(remaining, None);
	}

	#[tokio::test(start_paused = true)]
	async fn remaining_budget_shrinks_by_elapsed_time() {
		let guard = TimeGuard::new(RequestStage::Send, Some(Duration::from_secs(10)));
		let ((), remaining) = guard
			.run(async {
				tokio::time::sleep(Duration::from_secs(4)).await;

				Ok(())
			})
			.await
			.expect("Guarded future should finish within budget.");

		assert_eq!(remaining, Some(Duration::from_secs(6)));
	}

	#[tokio::test(start_paused = true)]
	async fn overrun_aborts_and_supersedes_inner_error() {
		let guard = TimeGuard::new(RequestStage::Authorize, Some(Duration::from_secs(1)));
		let err = guard
			.run(async {
				tokio::time::sleep(Duration::from_secs(5)).await;

				Err::<(), _>(TransportError::Io(std::io::Error::other("late failure")).into())
			})
			.await
			.expect_err("Overrunning guards must fail.");

		match err {
			Error::Timeout(TimeoutError { budget, elapsed }) => {
				assert_eq!(budget, Duration::from_secs(1));
				assert!(elapsed >= budget);
			},
			other => panic!("Expected a timeout error, got {other:?}."),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn inner_error_passes_through_within_budget() {
		let guard = TimeGuard::new(RequestStage::Send, Some(Duration::from_secs(1)));
		let err = guard
			.run(async { Err::<(), _>(TransportError::Io(std::io::Error::other("refused")).into()) })
			.await
			.expect_err("Inner errors must propagate.");

		assert!(matches!(err, Error::Transport(TransportError::Io(_))));
	}
}
