//! Bearer-aware HTTP sessions that attach credentials to every request, refresh them one caller
//! at a time, and retry unauthorized calls inside a single end-to-end time budget.

#![deny(clippy::all, missing_docs)]
#![cfg_attr(not(test), deny(unused_crate_dependencies))]

pub mod auth;
pub mod error;
pub mod http;
pub mod obs;
pub mod session;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and test doubles for unit and integration tests; enabled via
	//! `cfg(test)` or the `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// self
	use crate::{
		auth::{AuthRequest, Credentials, CredentialsFuture},
		error::CredentialsError,
		http::{AuthTransport, DataTransport, HttpRequest, HttpResponse, TransportFuture},
		session::AuthorizedSession,
	};

	/// Resolves `path` against a fixed fixture origin.
	pub fn url(path: &str) -> Url {
		Url::parse("https://api.example.com")
			.and_then(|base| base.join(path))
			.expect("Fixture URL must parse.")
	}

	/// Builds a bodiless response with the provided status code.
	pub fn response(status: u16) -> HttpResponse {
		HttpResponse::new(
			StatusCode::from_u16(status).expect("Test status codes must be valid."),
			HeaderMap::new(),
			Bytes::new(),
		)
	}

	/// Extracts the status of a successful call.
	pub fn result_status(result: &Result<HttpResponse>) -> Option<StatusCode> {
		result.as_ref().ok().map(|response| response.status)
	}

	/// Builds a session over a [`ScriptedTransport`] answering `statuses`, with a caller-supplied
	/// scripted auth transport, and returns handles to inspect both doubles.
	pub fn scripted_session(
		statuses: impl IntoIterator<Item = u16>,
		credentials: CountingCredentials,
	) -> (AuthorizedSession<ScriptedTransport>, Arc<ScriptedTransport>, Arc<CountingCredentials>)
	{
		let transport = Arc::new(ScriptedTransport::new(statuses));
		let credentials = Arc::new(credentials);
		let session = AuthorizedSession::with_transport(
			credentials.clone(),
			transport.clone(),
			Arc::new(ScriptedTransport::default()),
		);

		(session, transport, credentials)
	}

	/// Data transport that replays scripted status codes and records every request it sees.
	///
	/// Once the script runs dry the last status is repeated; an empty script answers `200`.
	#[derive(Debug, Default)]
	pub struct ScriptedTransport {
		statuses: Mutex<VecDeque<u16>>,
		last: Mutex<Option<u16>>,
		delay: Option<Duration>,
		requests: Mutex<Vec<HttpRequest>>,
	}
	impl ScriptedTransport {
		/// Creates a transport that answers with `statuses` in order.
		pub fn new(statuses: impl IntoIterator<Item = u16>) -> Self {
			Self { statuses: Mutex::new(statuses.into_iter().collect()), ..Default::default() }
		}

		/// Sleeps for `delay` before answering each request.
		pub fn with_delay(mut self, delay: Duration) -> Self {
			self.delay = Some(delay);

			self
		}

		/// Returns every request sent so far.
		pub fn requests(&self) -> Vec<HttpRequest> {
			self.requests.lock().clone()
		}

		/// Returns the number of sends observed so far.
		pub fn sends(&self) -> usize {
			self.requests.lock().len()
		}

		/// Returns the `authorization` values of every request, one list per send.
		pub fn authorizations(&self) -> Vec<Vec<String>> {
			self.requests
				.lock()
				.iter()
				.map(|request| {
					request
						.headers
						.get_all(AUTHORIZATION)
						.iter()
						.map(|value| value.to_str().unwrap_or_default().to_owned())
						.collect()
				})
				.collect()
		}

		fn next_status(&self) -> u16 {
			let next = self.statuses.lock().pop_front();
			let mut last = self.last.lock();

			if next.is_some() {
				*last = next;
			}

			last.unwrap_or(200)
		}
	}
	impl DataTransport for ScriptedTransport {
		fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
			Box::pin(async move {
				self.requests.lock().push(request);

				if let Some(delay) = self.delay {
					tokio::time::sleep(delay).await;
				}

				Ok(response(self.next_status()))
			})
		}
	}
	impl AuthTransport for ScriptedTransport {
		fn call(&self, request: HttpRequest) -> TransportFuture<'_> {
			self.send(request)
		}
	}

	/// Credentials double whose token is `token-<generation>`; every successful refresh bumps
	/// the generation.
	///
	/// Records refresh concurrency and the timeout bound into every [`AuthRequest`].
	#[derive(Debug, Default)]
	pub struct CountingCredentials {
		generation: AtomicUsize,
		refreshes: AtomicUsize,
		completed: AtomicUsize,
		in_flight: AtomicUsize,
		overlapped: AtomicUsize,
		authorize_delay: Option<Duration>,
		refresh_delay: Option<Duration>,
		fail_refresh: bool,
		auth_timeouts: Mutex<Vec<Option<Duration>>>,
	}
	impl CountingCredentials {
		/// Sleeps for `delay` inside every authorization.
		pub fn with_authorize_delay(mut self, delay: Duration) -> Self {
			self.authorize_delay = Some(delay);

			self
		}

		/// Sleeps for `delay` inside every refresh.
		pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
			self.refresh_delay = Some(delay);

			self
		}

		/// Makes every refresh fail with `invalid_grant`.
		pub fn failing_refresh(mut self) -> Self {
			self.fail_refresh = true;

			self
		}

		/// Number of started refresh calls.
		pub fn refreshes(&self) -> usize {
			self.refreshes.load(Ordering::SeqCst)
		}

		/// Number of refresh calls that ran to a successful end.
		pub fn completed(&self) -> usize {
			self.completed.load(Ordering::SeqCst)
		}

		/// Number of refresh calls that started while another one was still running.
		pub fn overlapped(&self) -> usize {
			self.overlapped.load(Ordering::SeqCst)
		}

		/// Timeouts bound into every [`AuthRequest`] handed to the credentials.
		pub fn auth_timeouts(&self) -> Vec<Option<Duration>> {
			self.auth_timeouts.lock().clone()
		}
	}
	impl Credentials for CountingCredentials {
		fn before_request<'a>(
			&'a self,
			auth: &'a AuthRequest,
			_method: &'a Method,
			_url: &'a Url,
			headers: &'a mut HeaderMap,
		) -> CredentialsFuture<'a> {
			Box::pin(async move {
				self.auth_timeouts.lock().push(auth.timeout());

				if let Some(delay) = self.authorize_delay {
					tokio::time::sleep(delay).await;
				}

				let generation = self.generation.load(Ordering::SeqCst);
				let value = HeaderValue::from_str(&format!("Bearer token-{generation}"))
					.expect("Generated header values must be valid.");

				headers.append(AUTHORIZATION, value);

				Ok(())
			})
		}

		fn refresh<'a>(&'a self, auth: &'a AuthRequest) -> CredentialsFuture<'a> {
			Box::pin(async move {
				self.auth_timeouts.lock().push(auth.timeout());

				if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
					self.overlapped.fetch_add(1, Ordering::SeqCst);
				}

				self.refreshes.fetch_add(1, Ordering::SeqCst);

				if let Some(delay) = self.refresh_delay {
					tokio::time::sleep(delay).await;
				}

				self.in_flight.fetch_sub(1, Ordering::SeqCst);

				if self.fail_refresh {
					let reason = "invalid_grant".into();

					return Err(CredentialsError::Rejected { reason }.into());
				}

				self.generation.fetch_add(1, Ordering::SeqCst);
				self.completed.fetch_add(1, Ordering::SeqCst);

				Ok(())
			})
		}
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeSet,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use bytes::Bytes;
	pub use ::http::{HeaderMap, HeaderValue, Method, StatusCode, header::AUTHORIZATION};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use tokio::time::Instant;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
