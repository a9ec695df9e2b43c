//! Transport primitives: single-attempt request/response types and the collaborator traits the
//! session sends through.
//!
//! The session talks to two transports. [`DataTransport`] carries the caller's requests, while
//! [`AuthTransport`] carries whatever calls the credentials need to refresh themselves. Both
//! fulfil the same "send one HTTP request" contract; keeping them apart lets the session bind
//! refresh-specific timeouts without touching the data plane. [`RequestInvoker`] implements both
//! on top of reqwest.

// self
use crate::_prelude::*;
#[cfg(feature = "reqwest")] use crate::{error::TransportError, obs};

/// Transport timeout applied when neither the caller nor the session supplies one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Boxed future returned by [`DataTransport::send`] and [`AuthTransport::call`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse>> + 'a + Send>>;

/// Sends caller (data-plane) requests.
///
/// Implementations perform exactly one attempt per call. Retry policy belongs to the session.
pub trait DataTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves once the full response body has been read.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Sends the requests credentials issue while authorizing or refreshing themselves.
pub trait AuthTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves once the full response body has been read.
	fn call(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Outbound request handed to a transport.
#[derive(Clone, Debug)]
pub struct HttpRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute request URL.
	pub url: Url,
	/// Request headers.
	pub headers: HeaderMap,
	/// Optional payload.
	pub body: Option<Bytes>,
	/// Per-attempt transport timeout; transports fall back to [`DEFAULT_TIMEOUT`] when unset.
	pub timeout: Option<Duration>,
	/// Transport-specific options (e.g. an [`http::Version`](::http::Version) for reqwest).
	pub extensions: ::http::Extensions,
}
impl HttpRequest {
	/// Creates a bodiless request without headers or timeout.
	pub fn new(method: Method, url: Url) -> Self {
		Self {
			method,
			url,
			headers: HeaderMap::new(),
			body: None,
			timeout: None,
			extensions: Default::default(),
		}
	}

	/// Convenience constructor for `GET` requests.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Replaces the request headers.
	pub fn with_headers(mut self, headers: HeaderMap) -> Self {
		self.headers = headers;

		self
	}

	/// Attaches a payload.
	pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Overrides the per-attempt timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Stores a transport-specific option.
	pub fn with_extension<T>(mut self, value: T) -> Self
	where
		T: 'static + Clone + Send + Sync,
	{
		self.extensions.insert(value);

		self
	}
}

/// Fully buffered response returned by a transport.
#[derive(Clone, Debug)]
pub struct HttpResponse {
	/// Response status.
	pub status: StatusCode,
	/// Response headers in the order the server sent them.
	pub headers: HeaderMap,
	/// Raw response payload.
	pub data: Bytes,
}
impl HttpResponse {
	/// Assembles a response from its parts.
	pub fn new(status: StatusCode, headers: HeaderMap, data: Bytes) -> Self {
		Self { status, headers, data }
	}
}

/// Single-attempt reqwest invoker shared by the data plane and by credential refreshes.
///
/// Every connection, protocol, or timeout failure is normalized into
/// [`TransportError`](crate::error::TransportError); nothing is retried here.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct RequestInvoker(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl RequestInvoker {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds an invoker around a freshly constructed client.
	pub fn build() -> Result<Self> {
		let client = ReqwestClient::builder()
			.build()
			.map_err(crate::error::ConfigError::from)?;

		Ok(Self(client))
	}

	/// Issues `request` once.
	pub async fn invoke(&self, request: HttpRequest) -> Result<HttpResponse> {
		obs::trace_attempt(&request.method, &request.url);

		let HttpRequest { method, url, headers, body, timeout, extensions } = request;
		let mut builder =
			self.0.request(method, url).headers(headers).timeout(timeout.unwrap_or(DEFAULT_TIMEOUT));

		if let Some(version) = extensions.get::<::http::Version>() {
			builder = builder.version(*version);
		}
		if let Some(body) = body {
			builder = builder.body(body);
		}

		let response = builder.send().await.map_err(TransportError::from)?;
		let status = response.status();
		let headers = response.headers().to_owned();
		let data = response.bytes().await.map_err(TransportError::from)?;

		Ok(HttpResponse::new(status, headers, data))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for RequestInvoker {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl DataTransport for RequestInvoker {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(self.invoke(request))
	}
}
#[cfg(feature = "reqwest")]
impl AuthTransport for RequestInvoker {
	fn call(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(self.invoke(request))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn request_builder_keeps_extensions_and_timeout() {
		let url = Url::parse("https://api.example.com/v1/items").expect("Fixture URL must parse.");
		let request = HttpRequest::get(url)
			.with_timeout(Duration::from_secs(5))
			.with_body("payload")
			.with_extension(::http::Version::HTTP_11);

		assert_eq!(request.method, Method::GET);
		assert_eq!(request.timeout, Some(Duration::from_secs(5)));
		assert_eq!(request.body.as_deref(), Some(&b"payload"[..]));
		assert_eq!(request.extensions.get::<::http::Version>(), Some(&::http::Version::HTTP_11));
	}
}
