//! The credentials capability consumed by [`AuthorizedSession`](crate::session::AuthorizedSession)
//! and the [`AuthRequest`] handed to it.

// self
use crate::{
	_prelude::*,
	http::{AuthTransport, HttpRequest, HttpResponse},
};

/// Boxed future returned by [`Credentials`] operations.
pub type CredentialsFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a + Send>>;

/// Opaque token holder that can decorate requests and refresh itself.
///
/// The session never inspects token state; it only decides *when* these hooks run. Both hooks
/// receive an [`AuthRequest`] to reach the authorization service through the session's auth
/// transport. Implementations doing blocking work should move it onto
/// `tokio::task::spawn_blocking` so other callers on the same runtime keep making progress.
pub trait Credentials
where
	Self: 'static + Send + Sync,
{
	/// Adds authorization material (typically an `authorization` header) to `headers`.
	fn before_request<'a>(
		&'a self,
		auth: &'a AuthRequest,
		method: &'a Method,
		url: &'a Url,
		headers: &'a mut HeaderMap,
	) -> CredentialsFuture<'a>;

	/// Obtains new token material from the authorization service.
	///
	/// The session serializes calls to this method, so implementations may treat it as the only
	/// writer of their token state.
	fn refresh<'a>(&'a self, auth: &'a AuthRequest) -> CredentialsFuture<'a>;
}

/// Request invoker dedicated to credential traffic.
///
/// Wraps the session's [`AuthTransport`] and optionally carries the caller's timeout so refresh
/// calls honour the same deadline as the request that triggered them. A timeout set explicitly
/// on an [`HttpRequest`] still takes precedence.
#[derive(Clone)]
pub struct AuthRequest {
	transport: Arc<dyn AuthTransport>,
	timeout: Option<Duration>,
}
impl AuthRequest {
	/// Wraps `transport` without binding a timeout.
	pub fn new(transport: Arc<dyn AuthTransport>) -> Self {
		Self { transport, timeout: None }
	}

	/// Binds `timeout` as the default for every call made through this invoker.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Returns the bound timeout, if any.
	pub fn timeout(&self) -> Option<Duration> {
		self.timeout
	}

	/// Sends `request` through the auth transport.
	pub async fn invoke(&self, mut request: HttpRequest) -> Result<HttpResponse> {
		if request.timeout.is_none() {
			request.timeout = self.timeout;
		}

		self.transport.call(request).await
	}
}
impl Debug for AuthRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthRequest").field("timeout", &self.timeout).finish()
	}
}
