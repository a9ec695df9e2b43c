//! Bearer-token [`Credentials`] backed by a pluggable [`TokenSource`].
//!
//! [`BearerCredentials`] keeps the most recent [`Token`] in memory, fetches one lazily on the
//! first request, refreshes proactively once the token is within its leeway of expiring, and
//! stamps `authorization: Bearer <token>` onto every outbound request. How a token is obtained
//! (client credentials, metadata servers, service-account assertions, ...) stays behind the
//! [`TokenSource`].

// self
use crate::{
	_prelude::*,
	auth::{AuthRequest, Credentials, CredentialsFuture, Token},
};

/// Boxed future returned by [`TokenSource::fetch`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<Token>> + 'a + Send>>;

/// Produces fresh tokens, typically by calling an authorization endpoint through `auth`.
pub trait TokenSource
where
	Self: 'static + Send + Sync,
{
	/// Fetches a new token.
	fn fetch<'a>(&'a self, auth: &'a AuthRequest) -> TokenFuture<'a>;
}

/// In-memory bearer credentials.
///
/// Fetches are singleflight: concurrent callers that find no usable token wait for one fetch and
/// reuse its result, and no fetch can overwrite a token stored by a later one.
pub struct BearerCredentials<S>
where
	S: TokenSource,
{
	source: S,
	token: RwLock<Option<Token>>,
	fetch_lock: AsyncMutex<()>,
	leeway: Duration,
}
impl<S> BearerCredentials<S>
where
	S: TokenSource,
{
	const DEFAULT_LEEWAY: Duration = Duration::from_secs(60);

	/// Creates credentials that fetch their first token lazily.
	pub fn new(source: S) -> Self {
		Self {
			source,
			token: RwLock::new(None),
			fetch_lock: AsyncMutex::new(()),
			leeway: Self::DEFAULT_LEEWAY,
		}
	}

	/// Seeds the credentials with an already issued token.
	pub fn with_token(self, token: Token) -> Self {
		*self.token.write() = Some(token);

		self
	}

	/// Overrides how long before expiry a token stops being sent (defaults to 60 seconds).
	pub fn with_leeway(mut self, leeway: Duration) -> Self {
		self.leeway = leeway;

		self
	}

	/// Returns a copy of the current token, if one has been fetched.
	pub fn token(&self) -> Option<Token> {
		self.token.read().clone()
	}

	/// Returns the token source.
	pub fn source(&self) -> &S {
		&self.source
	}

	fn usable_token(&self) -> Option<Token> {
		let now = Instant::now();

		self.token.read().as_ref().filter(|token| token.is_usable_at(now, self.leeway)).cloned()
	}

	/// Returns the cached token when usable, otherwise fetches one under the fetch lock.
	async fn usable_or_fetch(&self, auth: &AuthRequest) -> Result<Token> {
		if let Some(token) = self.usable_token() {
			return Ok(token);
		}

		let _singleflight = self.fetch_lock.lock().await;

		// Another caller may have stored a token while this one waited.
		if let Some(token) = self.usable_token() {
			return Ok(token);
		}

		self.store_fetched(auth).await
	}

	/// Must be called with `fetch_lock` held.
	async fn store_fetched(&self, auth: &AuthRequest) -> Result<Token> {
		let token = self.source.fetch(auth).await?;

		*self.token.write() = Some(token.clone());

		Ok(token)
	}
}
impl<S> Credentials for BearerCredentials<S>
where
	S: TokenSource,
{
	fn before_request<'a>(
		&'a self,
		auth: &'a AuthRequest,
		_method: &'a Method,
		_url: &'a Url,
		headers: &'a mut HeaderMap,
	) -> CredentialsFuture<'a> {
		Box::pin(async move {
			let token = self.usable_or_fetch(auth).await?;

			headers.insert(AUTHORIZATION, token.header_value()?);

			Ok(())
		})
	}

	fn refresh<'a>(&'a self, auth: &'a AuthRequest) -> CredentialsFuture<'a> {
		Box::pin(async move {
			let _singleflight = self.fetch_lock.lock().await;

			self.store_fetched(auth).await?;

			Ok(())
		})
	}
}
impl<S> Debug for BearerCredentials<S>
where
	S: TokenSource,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BearerCredentials")
			.field("token", &self.token.read().as_ref())
			.field("leeway", &self.leeway)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::_preludet::ScriptedTransport;

	#[derive(Default)]
	struct SequenceSource {
		calls: AtomicUsize,
		expires_in: Option<Duration>,
		latency: Option<Duration>,
	}
	impl TokenSource for SequenceSource {
		fn fetch<'a>(&'a self, _auth: &'a AuthRequest) -> TokenFuture<'a> {
			Box::pin(async move {
				let call = self.calls.fetch_add(1, Ordering::SeqCst);

				if let Some(latency) = self.latency {
					tokio::time::sleep(latency).await;
				}
				let token = Token::new(format!("token-{call}"));

				Ok(match self.expires_in {
					Some(expires_in) => token.with_expires_in(expires_in),
					None => token,
				})
			})
		}
	}

	fn auth() -> AuthRequest {
		AuthRequest::new(Arc::new(ScriptedTransport::default()))
	}

	fn url() -> Url {
		Url::parse("https://api.example.com/items").expect("Fixture URL must parse.")
	}

	async fn authorize(credentials: &BearerCredentials<SequenceSource>) -> HeaderMap {
		let mut headers = HeaderMap::new();

		credentials
			.before_request(&auth(), &Method::GET, &url(), &mut headers)
			.await
			.expect("Authorization should succeed.");

		headers
	}

	#[tokio::test]
	async fn first_request_fetches_lazily_and_reuses_token() {
		let credentials = BearerCredentials::new(SequenceSource::default());

		assert!(credentials.token().is_none());
		assert_eq!(authorize(&credentials).await[AUTHORIZATION], "Bearer token-0");
		assert_eq!(authorize(&credentials).await[AUTHORIZATION], "Bearer token-0");
		assert_eq!(credentials.source().calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn expiring_token_is_replaced_before_use() {
		let source =
			SequenceSource { expires_in: Some(Duration::from_secs(30)), ..Default::default() };
		let credentials = BearerCredentials::new(source).with_leeway(Duration::from_secs(60));

		assert_eq!(authorize(&credentials).await[AUTHORIZATION], "Bearer token-0");
		assert_eq!(authorize(&credentials).await[AUTHORIZATION], "Bearer token-1");
	}

	#[tokio::test]
	async fn refresh_always_fetches_and_header_is_replaced() {
		let credentials =
			BearerCredentials::new(SequenceSource::default()).with_token(Token::new("seeded"));
		let mut headers = HeaderMap::new();

		headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));
		credentials
			.before_request(&auth(), &Method::GET, &url(), &mut headers)
			.await
			.expect("Authorization should succeed.");

		assert_eq!(headers.get_all(AUTHORIZATION).iter().count(), 1);
		assert_eq!(headers[AUTHORIZATION], "Bearer seeded");

		credentials.refresh(&auth()).await.expect("Refresh should succeed.");

		assert_eq!(authorize(&credentials).await[AUTHORIZATION], "Bearer token-0");
		assert!(!format!("{credentials:?}").contains("token-0"));
	}

	#[tokio::test(start_paused = true)]
	async fn concurrent_first_requests_share_one_fetch() {
		let source =
			SequenceSource { latency: Some(Duration::from_millis(50)), ..Default::default() };
		let credentials = BearerCredentials::new(source);
		let (first, second, third) =
			tokio::join!(authorize(&credentials), authorize(&credentials), authorize(&credentials));

		assert_eq!(credentials.source().calls.load(Ordering::SeqCst), 1);

		for headers in [first, second, third] {
			assert_eq!(headers[AUTHORIZATION], "Bearer token-0");
		}
	}

	#[tokio::test(start_paused = true)]
	async fn slow_lazy_fetch_cannot_overwrite_a_later_refresh() {
		let source =
			SequenceSource { latency: Some(Duration::from_millis(50)), ..Default::default() };
		let credentials = BearerCredentials::new(source);
		let auth = auth();
		let (headers, refreshed) = tokio::join!(authorize(&credentials), async {
			tokio::time::sleep(Duration::from_millis(10)).await;

			credentials.refresh(&auth).await
		});

		refreshed.expect("Refresh should succeed.");

		assert_eq!(headers[AUTHORIZATION], "Bearer token-0");
		assert_eq!(
			credentials.token().map(|token| token.secret.expose().to_owned()).as_deref(),
			Some("token-1"),
			"The refresh queued behind the lazy fetch must store last.",
		);
	}
}
