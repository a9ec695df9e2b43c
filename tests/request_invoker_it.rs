#![cfg(feature = "reqwest")]

// std
use std::{sync::Arc, time::Duration};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::Value;
// self
use authorized_session::{
	auth::{AuthRequest, BearerCredentials, Token, TokenFuture, TokenSource},
	error::{Error, TransportError},
	http::{HttpRequest, RequestInvoker},
	http_types::{HeaderMap, HeaderValue, Method, StatusCode},
	session::ReqwestSession,
	url::Url,
};

fn invoker() -> RequestInvoker {
	RequestInvoker::build().expect("Default reqwest client should build.")
}

fn mock_url(server: &MockServer, path: &str) -> Url {
	Url::parse(&server.url(path)).expect("Mock server URL should parse successfully.")
}

/// Posts a fixed form body to the mock `/token` endpoint and reads a JSON token back.
struct MockTokenEndpoint {
	url: Url,
}
impl TokenSource for MockTokenEndpoint {
	fn fetch<'a>(&'a self, auth: &'a AuthRequest) -> TokenFuture<'a> {
		Box::pin(async move {
			let response = auth
				.invoke(HttpRequest::new(Method::POST, self.url.clone()).with_body("grant=mock"))
				.await?;
			let body: Value = serde_json::from_slice(&response.data)
				.expect("Mock token endpoint should return JSON.");
			let access = body["access_token"].as_str().expect("Mock token should be a string.");
			let expires_in = body["expires_in"].as_u64().expect("Mock expiry should be numeric.");

			Ok(Token::new(access).with_expires_in(Duration::from_secs(expires_in)))
		})
	}
}

#[tokio::test]
async fn invoker_returns_status_headers_and_payload() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/echo").header("x-client", "invoker").body("ping");
			then.status(201).header("x-served-by", "mock").body("pong");
		})
		.await;
	let mut headers = HeaderMap::new();

	headers.insert("x-client", HeaderValue::from_static("invoker"));

	let request = HttpRequest::new(Method::POST, mock_url(&server, "/echo"))
		.with_body("ping")
		.with_headers(headers);
	let response = invoker().invoke(request).await.expect("Mock request should succeed.");

	mock.assert_async().await;

	assert_eq!(response.status, StatusCode::CREATED);
	assert_eq!(response.headers["x-served-by"], "mock");
	assert_eq!(&response.data[..], b"pong");
}

#[tokio::test]
async fn invoker_normalizes_connection_failures() {
	let url = Url::parse("http://127.0.0.1:1/unreachable").expect("Fixture URL should parse.");
	let err = invoker()
		.invoke(HttpRequest::get(url).with_timeout(Duration::from_secs(5)))
		.await
		.expect_err("Nothing listens on port 1.");

	assert!(matches!(err, Error::Transport(TransportError::Network { .. })));
}

#[tokio::test]
async fn invoker_normalizes_per_attempt_timeouts() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/slow");
			then.status(200).delay(Duration::from_secs(3));
		})
		.await;

	let err = invoker()
		.invoke(
			HttpRequest::get(mock_url(&server, "/slow")).with_timeout(Duration::from_millis(200)),
		)
		.await
		.expect_err("The transport timeout must fire first.");

	assert!(matches!(err, Error::Transport(TransportError::Timeout { .. })));
}

#[tokio::test]
async fn reqwest_session_refreshes_stale_bearer_and_retries() -> Result<()> {
	let server = MockServer::start_async().await;
	let stale = server
		.mock_async(|when, then| {
			when.method(GET).path("/data").header("authorization", "Bearer stale");
			then.status(401);
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path("/data").header("authorization", "Bearer fresh");
			then.status(200).body("ok");
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body("grant=mock");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"fresh\",\"expires_in\":3600}");
		})
		.await;
	let endpoint = MockTokenEndpoint { url: mock_url(&server, "/token") };
	let credentials = BearerCredentials::new(endpoint).with_token(Token::new("stale"));
	let session = ReqwestSession::new(Arc::new(credentials))?;
	let response = session.get(mock_url(&server, "/data")).await?;

	stale.assert_calls_async(1).await;
	token.assert_calls_async(1).await;
	fresh.assert_calls_async(1).await;

	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(&response.data[..], b"ok");
	assert_eq!(session.refresh_metrics().successes(), 1);
	assert!(!session.auth_transport_active(), "The session-built auth client must be released.");

	Ok(())
}

#[tokio::test]
async fn reqwest_session_returns_forbidden_without_refreshing() {
	let server = MockServer::start_async().await;
	let forbidden = server
		.mock_async(|when, then| {
			when.method(DELETE).path("/data");
			then.status(403);
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"first\",\"expires_in\":3600}");
		})
		.await;
	let endpoint = MockTokenEndpoint { url: mock_url(&server, "/token") };
	let credentials = BearerCredentials::new(endpoint);
	let session =
		ReqwestSession::new(Arc::new(credentials)).expect("Default reqwest client should build.");
	let response =
		session.delete(mock_url(&server, "/data")).await.expect("Session call should succeed.");

	forbidden.assert_async().await;
	token.assert_calls_async(1).await;

	assert_eq!(response.status, StatusCode::FORBIDDEN);
	assert_eq!(session.refresh_metrics().attempts(), 0);
}
