// self
use crate::{_prelude::*, error::TimeoutError, obs::RequestStage};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRequest<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRequest<F> = F;

/// Span wrapping one logical call on a session.
#[derive(Clone, Debug)]
pub struct RequestSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl RequestSpan {
	/// Creates a new span tagged with the request method + URL.
	pub fn new(method: &Method, url: &Url) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("authorized_session.request", method = %method, url = %url);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (method, url);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRequest<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug record for a single transport attempt.
pub fn trace_attempt(method: &Method, url: &Url) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(%method, %url, "Making request.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (method, url);
	}
}

/// Logs that a refreshable status triggered refresh `attempt` out of `max`.
pub fn log_refresh(status: StatusCode, attempt: u32, max: u32) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(
			status = status.as_u16(),
			attempt,
			max,
			"Refreshing credentials due to a {status} response. Attempt {attempt}/{max}."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (status, attempt, max);
	}
}

/// Logs a time-guard overrun for the given stage.
pub fn log_budget_exceeded(stage: RequestStage, err: &TimeoutError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			stage = stage.as_str(),
			budget = ?err.budget,
			elapsed = ?err.elapsed,
			"Time budget exceeded."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (stage, err);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_wraps_future() {
		let url = Url::parse("https://api.example.com/").expect("Fixture URL must parse.");
		let span = RequestSpan::new(&Method::GET, &url);
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}

	#[test]
	fn log_helpers_noop_without_subscriber() {
		let url = Url::parse("https://api.example.com/").expect("Fixture URL must parse.");

		trace_attempt(&Method::POST, &url);
		log_refresh(StatusCode::UNAUTHORIZED, 1, 2);
		log_budget_exceeded(
			RequestStage::Send,
			&TimeoutError { budget: Duration::from_millis(1), elapsed: Duration::from_millis(2) },
		);
	}
}
