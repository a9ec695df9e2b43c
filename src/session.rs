//! Authorization-aware request orchestration.
//!
//! [`AuthorizedSession::request`] asks the credentials to decorate a copy of the caller's
//! headers, sends the request through the data transport, and inspects the status. A status in
//! the session's refresh set triggers a credential refresh (serialized through a session-wide
//! lock) followed by a retry built from the caller's original headers, up to
//! `max_refresh_attempts` times. Every stage runs under a [`TimeGuard`] that draws from one
//! shared `max_allowed_time` budget. Once attempts are exhausted the last response is returned
//! as-is; callers inspect its status themselves.

mod auth_transport;
mod config;
mod metrics;
mod time_guard;

pub use auth_transport::AuthTransportFactory;
pub use config::SessionConfig;
pub use metrics::{RefreshMetrics, RefreshSnapshot};
pub use time_guard::TimeGuard;

// self
use crate::{
	_prelude::*,
	auth::{AuthRequest, Credentials},
	error::CredentialsError,
	http::{
		AuthTransport, DEFAULT_TIMEOUT, DataTransport, HttpRequest, HttpResponse, TransportFuture,
	},
	obs::{self, RefreshOutcome, RequestSpan, RequestStage},
	session::auth_transport::AuthTransportSlot,
};
#[cfg(feature = "reqwest")] use crate::http::RequestInvoker;

#[cfg(feature = "reqwest")]
/// Session specialized for the crate's default reqwest transport.
pub type ReqwestSession = AuthorizedSession<RequestInvoker>;

/// HTTP session that keeps a set of credentials attached to every request.
///
/// One session is meant to be built per identity (user, service account, ...) and shared by
/// every request made on its behalf. Sends from concurrent calls run in parallel; only refreshes
/// are serialized.
pub struct AuthorizedSession<T>
where
	T: ?Sized + DataTransport,
{
	transport: Arc<T>,
	credentials: Arc<dyn Credentials>,
	refresh_status_codes: BTreeSet<StatusCode>,
	max_refresh_attempts: u32,
	refresh_timeout: Option<Duration>,
	auth_transport: AuthTransportSlot,
	refresh_lock: Arc<AsyncMutex<()>>,
	refresh_metrics: Arc<RefreshMetrics>,
}
impl<T> AuthorizedSession<T>
where
	T: ?Sized + DataTransport,
{
	/// Creates a session that hands `auth_transport` to the credentials.
	///
	/// The auth transport stays owned by the caller and is never released by the session.
	pub fn with_transport(
		credentials: Arc<dyn Credentials>,
		transport: Arc<T>,
		auth_transport: Arc<dyn AuthTransport>,
	) -> Self {
		Self::from_slot(credentials, transport, AuthTransportSlot::Supplied(auth_transport))
	}

	/// Creates a session that builds its own auth transport with `factory` on demand.
	///
	/// The transport is released as soon as no logical call is using it.
	pub fn with_auth_factory(
		credentials: Arc<dyn Credentials>,
		transport: Arc<T>,
		factory: AuthTransportFactory,
	) -> Self {
		Self::from_slot(credentials, transport, AuthTransportSlot::lazy(factory))
	}

	fn from_slot(
		credentials: Arc<dyn Credentials>,
		transport: Arc<T>,
		auth_transport: AuthTransportSlot,
	) -> Self {
		Self {
			transport,
			credentials,
			refresh_status_codes: BTreeSet::from([StatusCode::UNAUTHORIZED]),
			max_refresh_attempts: SessionConfig::DEFAULT_MAX_REFRESH_ATTEMPTS,
			refresh_timeout: None,
			auth_transport,
			refresh_lock: Default::default(),
			refresh_metrics: Default::default(),
		}
	}

	/// Replaces the status codes that trigger a refresh (defaults to `401`).
	pub fn with_refresh_status_codes(
		mut self,
		codes: impl IntoIterator<Item = StatusCode>,
	) -> Self {
		self.refresh_status_codes = codes.into_iter().collect();

		self
	}

	/// Caps refreshes per logical call (defaults to 2).
	pub fn with_max_refresh_attempts(mut self, attempts: u32) -> Self {
		self.max_refresh_attempts = attempts;

		self
	}

	/// Sets the overall deadline used by requests that carry no `max_allowed_time`.
	pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
		self.refresh_timeout = Some(timeout);

		self
	}

	/// Applies a [`SessionConfig`], replacing the whole refresh policy.
	pub fn with_config(mut self, config: &SessionConfig) -> Result<Self> {
		self.refresh_status_codes = config.status_codes()?;
		self.max_refresh_attempts = config.max_refresh_attempts;
		self.refresh_timeout = config.refresh_timeout;

		Ok(self)
	}

	/// Returns the shared credentials handle.
	pub fn credentials(&self) -> &Arc<dyn Credentials> {
		&self.credentials
	}

	/// Returns the data transport.
	pub fn transport(&self) -> &Arc<T> {
		&self.transport
	}

	/// Returns the refresh counters for this session.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.refresh_metrics
	}

	/// Returns `true` while the session's auth transport is alive.
	///
	/// Always `true` for caller-supplied transports; session-built ones only live while a
	/// logical call is in flight.
	pub fn auth_transport_active(&self) -> bool {
		self.auth_transport.is_active()
	}

	/// Performs one logical call: authorize, send, and refresh-and-retry when needed.
	pub async fn request(&self, request: SessionRequest) -> Result<HttpResponse> {
		let span = RequestSpan::new(&request.method, &request.url);

		span.instrument(self.run(request)).await
	}

	/// Issues a `GET` request.
	pub async fn get(&self, url: Url) -> Result<HttpResponse> {
		self.request(SessionRequest::new(Method::GET, url)).await
	}

	/// Issues a `HEAD` request.
	pub async fn head(&self, url: Url) -> Result<HttpResponse> {
		self.request(SessionRequest::new(Method::HEAD, url)).await
	}

	/// Issues a `DELETE` request.
	pub async fn delete(&self, url: Url) -> Result<HttpResponse> {
		self.request(SessionRequest::new(Method::DELETE, url)).await
	}

	/// Issues a `POST` request carrying `data`.
	pub async fn post(&self, url: Url, data: impl Into<Bytes>) -> Result<HttpResponse> {
		self.request(SessionRequest::new(Method::POST, url).with_data(data)).await
	}

	/// Issues a `PUT` request carrying `data`.
	pub async fn put(&self, url: Url, data: impl Into<Bytes>) -> Result<HttpResponse> {
		self.request(SessionRequest::new(Method::PUT, url).with_data(data)).await
	}

	/// Issues a `PATCH` request carrying `data`.
	pub async fn patch(&self, url: Url, data: impl Into<Bytes>) -> Result<HttpResponse> {
		self.request(SessionRequest::new(Method::PATCH, url).with_data(data)).await
	}

	async fn run(&self, request: SessionRequest) -> Result<HttpResponse> {
		let lease = self.auth_transport.lease()?;
		let mut remaining = request.max_allowed_time.or(self.refresh_timeout);
		let mut attempt = 0;

		loop {
			// Every attempt starts from the caller's headers, never from a previous decoration.
			let mut headers = request.headers.clone();
			let auth = lease.auth_request(request.timeout);
			let ((), left) = TimeGuard::new(RequestStage::Authorize, remaining)
				.run(self.credentials.before_request(
					&auth,
					&request.method,
					&request.url,
					&mut headers,
				))
				.await?;

			remaining = left;

			let (response, left) = TimeGuard::new(RequestStage::Send, remaining)
				.run(self.transport.send(request.to_http_request(headers)))
				.await?;

			remaining = left;

			if !self.refresh_status_codes.contains(&response.status)
				|| attempt >= self.max_refresh_attempts
			{
				return Ok(response);
			}

			attempt += 1;

			obs::log_refresh(response.status, attempt, self.max_refresh_attempts);

			let auth = lease.auth_request(request.timeout);
			let ((), left) = TimeGuard::new(RequestStage::Refresh, remaining)
				.run(self.refresh_credentials(auth))
				.await?;

			remaining = left;
		}
	}

	/// Refreshes the credentials under the session-wide lock.
	///
	/// The refresh runs on its own task which owns the lock guard, so a caller whose budget runs
	/// out while waiting stops waiting without cancelling a refresh other callers depend on.
	async fn refresh_credentials(&self, auth: AuthRequest) -> Result<()> {
		let guard = match self.refresh_lock.try_lock_arc() {
			Some(guard) => guard,
			None => {
				self.refresh_metrics.record_contended();

				self.refresh_lock.lock_arc().await
			},
		};
		let credentials = Arc::clone(&self.credentials);
		let metrics = Arc::clone(&self.refresh_metrics);
		let task = tokio::spawn(async move {
			let _guard = guard;
			let record = |outcome| {
				metrics.record(outcome);
				obs::record_refresh_outcome(outcome);
			};

			record(RefreshOutcome::Attempt);

			let result = credentials.refresh(&auth).await;

			record(if result.is_ok() { RefreshOutcome::Success } else { RefreshOutcome::Failure });

			result
		});

		match task.await {
			Ok(result) => result,
			Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
			Err(_) => Err(CredentialsError::RefreshAborted.into()),
		}
	}
}
#[cfg(feature = "reqwest")]
impl AuthorizedSession<RequestInvoker> {
	/// Creates a reqwest-backed session.
	///
	/// Credential traffic goes through a separate reqwest client that the session builds lazily
	/// and drops once no call needs it.
	pub fn new(credentials: Arc<dyn Credentials>) -> Result<Self> {
		Ok(Self::with_auth_factory(
			credentials,
			Arc::new(RequestInvoker::build()?),
			Arc::new(|| -> Result<Arc<dyn AuthTransport>> { Ok(Arc::new(RequestInvoker::build()?)) }),
		))
	}
}
impl<T> DataTransport for AuthorizedSession<T>
where
	T: ?Sized + DataTransport,
{
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(self.request(request.into()))
	}
}
impl<T> Debug for AuthorizedSession<T>
where
	T: ?Sized + DataTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizedSession")
			.field("refresh_status_codes", &self.refresh_status_codes)
			.field("max_refresh_attempts", &self.max_refresh_attempts)
			.field("refresh_timeout", &self.refresh_timeout)
			.field("auth_transport", &self.auth_transport)
			.finish()
	}
}

/// One logical call issued through [`AuthorizedSession::request`].
#[derive(Clone, Debug)]
pub struct SessionRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute request URL.
	pub url: Url,
	/// Caller headers; the session decorates a copy per attempt.
	pub headers: HeaderMap,
	/// Optional payload, resent unchanged on retries.
	pub data: Option<Bytes>,
	/// Budget for the whole call, including authorization, sends, and refreshes.
	pub max_allowed_time: Option<Duration>,
	/// Per-attempt transport timeout, also bound into credential refresh calls.
	pub timeout: Option<Duration>,
	/// Transport-specific options forwarded with every send.
	pub extensions: ::http::Extensions,
}
impl SessionRequest {
	/// Creates a request with the default transport timeout and no overall budget.
	pub fn new(method: Method, url: Url) -> Self {
		Self {
			method,
			url,
			headers: HeaderMap::new(),
			data: None,
			max_allowed_time: None,
			timeout: Some(DEFAULT_TIMEOUT),
			extensions: Default::default(),
		}
	}

	/// Replaces the caller headers.
	pub fn with_headers(mut self, headers: HeaderMap) -> Self {
		self.headers = headers;

		self
	}

	/// Attaches a payload.
	pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
		self.data = Some(data.into());

		self
	}

	/// Bounds the whole logical call.
	pub fn with_max_allowed_time(mut self, max_allowed_time: Duration) -> Self {
		self.max_allowed_time = Some(max_allowed_time);

		self
	}

	/// Overrides the per-attempt timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Leaves per-attempt timeouts to the transports' own defaults.
	pub fn without_timeout(mut self) -> Self {
		self.timeout = None;

		self
	}

	/// Stores a transport-specific option.
	pub fn with_extension<V>(mut self, value: V) -> Self
	where
		V: 'static + Clone + Send + Sync,
	{
		self.extensions.insert(value);

		self
	}

	fn to_http_request(&self, headers: HeaderMap) -> HttpRequest {
		HttpRequest {
			method: self.method.clone(),
			url: self.url.clone(),
			headers,
			body: self.data.clone(),
			timeout: self.timeout,
			extensions: self.extensions.clone(),
		}
	}
}
impl From<HttpRequest> for SessionRequest {
	fn from(request: HttpRequest) -> Self {
		Self {
			method: request.method,
			url: request.url,
			headers: request.headers,
			data: request.body,
			max_allowed_time: None,
			timeout: request.timeout,
			extensions: request.extensions,
		}
	}
}
