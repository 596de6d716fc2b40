//! The response decorator.
//!
//! A [`Response`] wraps the [`RawResponse`] produced by the transport together
//! with the request and handler that produced it and a handle on the client.
//! That is enough to inspect the exchange, decode the body (see the decoding
//! methods in this crate's `decode` module) and replay the exchange.

use crate::codec::{Codec, JsonCodec};
use crate::handler::{Body, Handler};
use crate::pending::{Deferred, PendingResponse};
use crate::request::Request;
use crate::transport::{RawResponse, SecureSession};
use crate::{Client, Result};
use http::{HeaderMap, StatusCode, Version};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A received response, decorated with decoding and replay capabilities.
///
/// Every accessor projects the underlying [`RawResponse`]; nothing is
/// recomputed or cached. The decorator is immutable and can be shared
/// across threads.
///
/// # Examples
///
/// ```no_run
/// use encore::{Client, Handler, Request};
///
/// # fn example() -> Result<(), encore::Error> {
/// let client = Client::new()?;
/// let response = client.send(Request::get("https://api.example.com/jobs/7")?, Handler::text())?;
///
/// response
///     .on_2xx(|| println!("job found"))
///     .on_ko(|| eprintln!("job lookup failed"))
///     .and_then(|| println!("done"));
///
/// if response.is_5xx() {
///     let again = response.retry()?;
///     println!("retried in {:?}", again.latency());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Response<C = JsonCodec> {
    raw: RawResponse,
    handler: Arc<Handler>,
    request: Arc<Request>,
    client: Client<C>,
    latency: Duration,
}

impl<C> Response<C> {
    pub(crate) fn new(
        raw: RawResponse,
        handler: Arc<Handler>,
        request: Arc<Request>,
        client: Client<C>,
        latency: Duration,
    ) -> Self {
        Self {
            raw,
            handler,
            request,
            client,
            latency,
        }
    }

    /// The status.
    pub fn status(&self) -> StatusCode {
        self.raw.status()
    }

    /// The numeric status code.
    pub fn status_code(&self) -> u16 {
        self.raw.status().as_u16()
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        self.raw.headers()
    }

    /// The first value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.raw.headers().get(name)?.to_str().ok()
    }

    /// The body, in the representation chosen by the handler.
    pub fn body(&self) -> &Body {
        self.raw.body()
    }

    /// The URI the response was received from.
    pub fn uri(&self) -> &Url {
        self.raw.uri()
    }

    /// The protocol version.
    pub fn version(&self) -> Version {
        self.raw.version()
    }

    /// TLS session details, if the exchange was secured.
    pub fn secure_session(&self) -> Option<&SecureSession> {
        self.raw.secure_session()
    }

    /// The response this one was redirected from, undecorated.
    pub fn previous_response(&self) -> Option<&RawResponse> {
        self.raw.previous()
    }

    /// The request that produced this response.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The handler the body was materialized with.
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// The client that performed the exchange.
    pub fn client(&self) -> &Client<C> {
        &self.client
    }

    /// Time between sending the request and receiving the response.
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// The undecorated response.
    pub fn raw(&self) -> &RawResponse {
        &self.raw
    }

    /// Consumes the decorator, returning the undecorated response.
    pub fn into_raw(self) -> RawResponse {
        self.raw
    }

    /// `true` for 100..=199.
    pub fn is_1xx(&self) -> bool {
        (100..200).contains(&self.status_code())
    }

    /// `true` for 200..=299.
    pub fn is_2xx(&self) -> bool {
        (200..300).contains(&self.status_code())
    }

    /// `true` for exactly 200.
    pub fn is_ok(&self) -> bool {
        self.status_code() == 200
    }

    /// `true` for 300..=399.
    pub fn is_3xx(&self) -> bool {
        (300..400).contains(&self.status_code())
    }

    /// `true` for 400..=499.
    pub fn is_4xx(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// `true` for 500..=599.
    pub fn is_5xx(&self) -> bool {
        (500..600).contains(&self.status_code())
    }

    /// Runs `action` if the status is exactly 200.
    pub fn on_ok(&self, action: impl FnOnce()) -> &Self {
        if self.is_ok() {
            action();
        }
        self
    }

    /// Runs `action` if the status is in 200..=299.
    pub fn on_2xx(&self, action: impl FnOnce()) -> &Self {
        if self.is_2xx() {
            action();
        }
        self
    }

    /// Runs `action` if the status is outside 200..=299.
    pub fn on_ko(&self, action: impl FnOnce()) -> &Self {
        if !self.is_2xx() {
            action();
        }
        self
    }

    /// Runs `action` unconditionally.
    pub fn and_then(&self, action: impl FnOnce()) -> &Self {
        action();
        self
    }
}

impl<C> Response<C>
where
    C: Codec,
{
    /// Sends the same request with the same handler again, blocking.
    ///
    /// The transport receives the very same request and handler instances.
    pub fn retry(&self) -> Result<Response<C>> {
        tracing::debug!(url = %self.request.uri(), "Retrying request");
        self.client
            .send(Arc::clone(&self.request), Arc::clone(&self.handler))
    }

    /// Like [`Response::retry`], through [`Client::try_send`].
    pub fn try_retry(&self) -> Result<Response<C>> {
        self.client
            .try_send(Arc::clone(&self.request), Arc::clone(&self.handler))
    }

    /// Like [`Response::retry`], through [`Client::send_async`].
    pub fn retry_async(&self) -> PendingResponse<C> {
        self.client
            .send_async(Arc::clone(&self.request), Arc::clone(&self.handler))
    }

    /// Like [`Response::retry`], through [`Client::send_deferred`].
    pub fn retry_deferred(&self) -> Deferred<Response<C>> {
        self.client
            .send_deferred(Arc::clone(&self.request), Arc::clone(&self.handler))
    }
}

impl<C> fmt::Debug for Response<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.raw.status())
            .field("uri", &self.raw.uri().as_str())
            .field("body", self.raw.body())
            .field("handler", &self.handler)
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use futures_util::future::{BoxFuture, FutureExt};
    use std::cell::Cell;

    struct Fixed(u16);

    impl Transport for Fixed {
        fn execute(&self, request: &Request, _: &Handler) -> Result<RawResponse> {
            let status = StatusCode::from_u16(self.0)
                .map_err(|e| crate::Error::InvalidArgument(e.to_string()))?;
            let mut headers = HeaderMap::new();
            headers.insert("x-trace", "abc".parse().unwrap());
            Ok(RawResponse::new(status, request.uri().clone(), Body::Empty)
                .with_headers(headers)
                .with_version(Version::HTTP_2))
        }

        fn execute_async(
            &self,
            request: Arc<Request>,
            handler: Arc<Handler>,
        ) -> BoxFuture<'static, Result<RawResponse>> {
            let result = self.execute(&request, &handler);
            async move { result }.boxed()
        }
    }

    fn response(status: u16) -> Response {
        let client = Client::builder().transport(Fixed(status)).build().unwrap();
        client
            .send(Request::get("http://localhost/items").unwrap(), Handler::text())
            .unwrap()
    }

    #[test]
    fn test_projections_follow_raw_response() {
        let response = response(201);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.status_code(), 201);
        assert_eq!(response.header("x-trace"), Some("abc"));
        assert_eq!(response.version(), Version::HTTP_2);
        assert_eq!(response.uri().path(), "/items");
        assert!(response.previous_response().is_none());
        assert!(response.secure_session().is_none());

        let raw = response.into_raw();
        assert_eq!(raw.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_status_classes() {
        assert!(response(101).is_1xx());
        assert!(response(200).is_ok());
        assert!(response(204).is_2xx() && !response(204).is_ok());
        assert!(response(304).is_3xx());
        assert!(response(418).is_4xx());
        assert!(response(503).is_5xx());
    }

    #[test]
    fn test_combinators_chain() {
        let fired = Cell::new(Vec::new());
        let push = |tag: &'static str| {
            let mut tags = fired.take();
            tags.push(tag);
            fired.set(tags);
        };

        response(404)
            .on_ok(|| push("ok"))
            .on_2xx(|| push("2xx"))
            .on_ko(|| push("ko"))
            .and_then(|| push("always"));

        assert_eq!(fired.take(), ["ko", "always"]);
    }
}
