//! The client facade.
//!
//! The [`Client`] type owns a transport and a codec and offers four ways of
//! running an exchange. Every one of them wraps the transport's answer in a
//! [`Response`] that can decode its body and replay the request.

use crate::body::BodyPayload;
use crate::codec::{Codec, JsonCodec};
use crate::handler::Handler;
use crate::pending::{Deferred, Pending, PendingResponse};
use crate::request::Request;
use crate::transport::{RawResponse, ReqwestTransport, Transport};
use crate::{Error, Response, Result};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// A handle for sending requests and wrapping their responses.
///
/// Cloning is cheap: clones share the same transport and codec. The client is
/// immutable once built, so concurrent exchanges need no synchronization.
///
/// # Examples
///
/// ```no_run
/// use encore::{Client, Handler, Request};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # fn example() -> Result<(), encore::Error> {
/// let client = Client::new()?;
///
/// let response = client.send(Request::get("https://api.example.com/users/1")?, Handler::text())?;
/// response.on_ko(|| eprintln!("lookup failed"));
///
/// let user: User = response.read_body_for_status(200)?;
/// println!("{} is user {}", user.name, user.id);
/// # Ok(())
/// # }
/// ```
pub struct Client<C = JsonCodec> {
    inner: Arc<ClientInner<C>>,
}

struct ClientInner<C> {
    transport: Arc<dyn Transport>,
    codec: C,
}

impl<C> Clone for Client<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for Client<C>
where
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("codec", &self.inner.codec)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client with the default reqwest transport and [`JsonCodec`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the default transport cannot be built.
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    /// Creates a builder for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl<C> Client<C>
where
    C: Codec,
{
    /// The codec used to encode request values and decode bodies.
    pub fn codec(&self) -> &C {
        &self.inner.codec
    }

    /// The transport performing the exchanges.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Sends a request, blocking the calling thread until the response is
    /// received.
    ///
    /// Passing an `Arc<Request>` or `Arc<Handler>` shares it with the
    /// resulting [`Response`], which replays that exact instance on retry.
    ///
    /// Must not be called from a Tokio worker thread when using the default
    /// transport; use [`Client::send_async`] there.
    ///
    /// # Errors
    ///
    /// * [`Error::Io`] or [`Error::Network`] on I/O and connection faults;
    /// * [`Error::Interrupted`] if the exchange was stopped;
    /// * [`Error::Configuration`] if the transport cannot be initialized.
    pub fn send(
        &self,
        request: impl Into<Arc<Request>>,
        handler: impl Into<Arc<Handler>>,
    ) -> Result<Response<C>> {
        let request = request.into();
        let handler = handler.into();

        tracing::debug!(
            method = %request.method(),
            url = %request.uri(),
            style = "blocking",
            "Sending request"
        );

        let started = Instant::now();
        match self.inner.transport.execute(&request, &handler) {
            Ok(raw) => Ok(self.wrap(raw, request, handler, started)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    method = %request.method(),
                    url = %request.uri(),
                    "Request failed"
                );
                Err(e)
            }
        }
    }

    /// Same as [`Client::send`], but never unwinds.
    ///
    /// A panic raised inside the transport is caught and reported as
    /// [`Error::Interrupted`].
    pub fn try_send(
        &self,
        request: impl Into<Arc<Request>>,
        handler: impl Into<Arc<Handler>>,
    ) -> Result<Response<C>> {
        let request = request.into();
        let handler = handler.into();

        panic::catch_unwind(AssertUnwindSafe(|| self.send(request, handler))).unwrap_or_else(
            |payload| {
                let message = panic_message(payload.as_ref());
                tracing::warn!(panic = %message, "Transport panicked during exchange");
                Err(Error::Interrupted(message))
            },
        )
    }

    /// Sends a request without blocking.
    ///
    /// The exchange is spawned on the current Tokio runtime and the returned
    /// handle resolves to the wrapped response. Failures are reported as
    /// [`Error::AsyncCompletion`] wrapping the same causes as [`Client::send`].
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn send_async(
        &self,
        request: impl Into<Arc<Request>>,
        handler: impl Into<Arc<Handler>>,
    ) -> PendingResponse<C> {
        let request = request.into();
        let handler = handler.into();

        tracing::debug!(
            method = %request.method(),
            url = %request.uri(),
            style = "async",
            "Sending request"
        );

        let exchange = self
            .inner
            .transport
            .execute_async(Arc::clone(&request), Arc::clone(&handler));
        let client = self.clone();

        Pending::spawn(async move {
            let started = Instant::now();
            match exchange.await {
                Ok(raw) => Ok(client.wrap(raw, request, handler, started)),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        method = %request.method(),
                        url = %request.uri(),
                        "Async request failed"
                    );
                    Err(e)
                }
            }
        })
    }

    /// Sends a request without blocking, as a composable [`Deferred`] value.
    ///
    /// Unlike [`Client::send_async`], failures are not wrapped.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn send_deferred(
        &self,
        request: impl Into<Arc<Request>>,
        handler: impl Into<Arc<Handler>>,
    ) -> Deferred<Response<C>> {
        Deferred::from(self.send_async(request, handler))
    }

    /// Encodes `value` with the client's codec into a request payload.
    ///
    /// # Errors
    ///
    /// See [`BodyPayload::serialized`].
    pub fn serialized_body<T>(&self, value: Option<&T>) -> Result<BodyPayload>
    where
        T: Serialize + ?Sized,
    {
        BodyPayload::serialized(&self.inner.codec, value)
    }

    /// Same as [`Client::serialized_body`], but never unwinds.
    ///
    /// A panic raised by the value's `Serialize` implementation is reported as
    /// [`Error::Interrupted`].
    pub fn try_serialized_body<T>(&self, value: Option<&T>) -> Result<BodyPayload>
    where
        T: Serialize + ?Sized,
    {
        panic::catch_unwind(AssertUnwindSafe(|| self.serialized_body(value)))
            .unwrap_or_else(|payload| Err(Error::Interrupted(panic_message(payload.as_ref()))))
    }

    fn wrap(
        &self,
        raw: RawResponse,
        request: Arc<Request>,
        handler: Arc<Handler>,
        started: Instant,
    ) -> Response<C> {
        let latency = started.elapsed();

        tracing::info!(
            status = raw.status().as_u16(),
            latency_ms = latency.as_millis(),
            url = %raw.uri(),
            "Received HTTP response"
        );

        Response::new(raw, handler, request, self.clone(), latency)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "exchange panicked".to_string()
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use encore::{codec::JsonCodec, transport::ReqwestTransport, ClientBuilder};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), encore::Error> {
/// let client = ClientBuilder::new()
///     .transport(
///         ReqwestTransport::builder()
///             .timeout(Duration::from_secs(30))
///             .build()?,
///     )
///     .codec(JsonCodec::pretty())
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder<C = JsonCodec> {
    transport: Option<Arc<dyn Transport>>,
    codec: C,
}

impl ClientBuilder {
    /// Creates a builder using the default transport and [`JsonCodec`].
    pub fn new() -> Self {
        Self {
            transport: None,
            codec: JsonCodec::default(),
        }
    }
}

impl<C> ClientBuilder<C>
where
    C: Codec,
{
    /// Sets the transport.
    pub fn transport(self, transport: impl Transport) -> Self {
        self.shared_transport(Arc::new(transport))
    }

    /// Sets a transport that is shared with other owners.
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the codec.
    pub fn codec<D>(self, codec: D) -> ClientBuilder<D>
    where
        D: Codec,
    {
        ClientBuilder {
            transport: self.transport,
            codec,
        }
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no transport was given and the
    /// default one cannot be built.
    pub fn build(self) -> Result<Client<C>> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                codec: self.codec,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Body;
    use futures_util::future::{BoxFuture, FutureExt};
    use http::StatusCode;

    struct Panicking;

    fn explode() -> Result<RawResponse> {
        panic!("socket exploded")
    }

    impl Transport for Panicking {
        fn execute(&self, _: &Request, _: &Handler) -> Result<RawResponse> {
            explode()
        }

        fn execute_async(
            &self,
            _: Arc<Request>,
            _: Arc<Handler>,
        ) -> BoxFuture<'static, Result<RawResponse>> {
            async { explode() }.boxed()
        }
    }

    struct Echo;

    impl Transport for Echo {
        fn execute(&self, request: &Request, _: &Handler) -> Result<RawResponse> {
            Ok(RawResponse::new(
                StatusCode::OK,
                request.uri().clone(),
                Body::Text(request.uri().path().to_string()),
            ))
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

    #[test]
    fn test_try_send_turns_panics_into_errors() {
        let client = Client::builder().transport(Panicking).build().unwrap();
        let request = Request::get("http://localhost/").unwrap();

        let err = client.try_send(request, Handler::text()).unwrap_err();
        match err {
            Error::Interrupted(message) => assert_eq!(message, "socket exploded"),
            other => panic!("expected Interrupted, got {other:?}"),
        }
    }

    #[test]
    fn test_send_wraps_request_and_handler() {
        let client = Client::builder().transport(Echo).build().unwrap();
        let request = Arc::new(Request::get("http://localhost/echo").unwrap());
        let handler = Arc::new(Handler::text());

        let response = client.send(Arc::clone(&request), Arc::clone(&handler)).unwrap();

        assert!(std::ptr::eq(response.request(), request.as_ref()));
        assert!(std::ptr::eq(response.handler(), handler.as_ref()));
        assert_eq!(response.body().as_text(), Some("/echo"));
    }

    #[test]
    fn test_codec_can_be_replaced() {
        let client = Client::builder()
            .transport(Echo)
            .codec(JsonCodec::pretty())
            .build()
            .unwrap();
        assert!(client.codec().is_pretty());

        let payload = client.serialized_body(Some(&[1, 2])).unwrap();
        assert!(payload.as_text().unwrap().contains('\n'));
    }

    #[tokio::test]
    async fn test_send_async_reports_panics_as_interrupted() {
        let client = Client::builder().transport(Panicking).build().unwrap();
        let request = Request::get("http://localhost/").unwrap();

        let err = client.send_async(request, Handler::text()).await.unwrap_err();
        assert!(matches!(err, Error::AsyncCompletion { .. }));
        assert!(matches!(err.root_cause(), Error::Interrupted(_)));
    }
}
