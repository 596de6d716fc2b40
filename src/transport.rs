//! The transport seam and its default reqwest implementation.
//!
//! A [`Transport`] performs one request/response exchange and returns a
//! [`RawResponse`]. Connection management, TLS, redirects and timeouts are its
//! business; the client only forwards requests and handlers to it.

use crate::body::BodyPayload;
use crate::handler::{Body, BodyStream, Handler};
use crate::request::Request;
use crate::{Error, Result};
use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Version};
use std::io::Read;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use url::Url;

/// Performs request/response exchanges.
///
/// `execute` blocks the calling thread; `execute_async` returns a future the
/// client spawns on the current Tokio runtime. Dropping that future must
/// cancel the exchange.
pub trait Transport: Send + Sync + 'static {
    /// Performs the exchange on the calling thread.
    fn execute(&self, request: &Request, handler: &Handler) -> Result<RawResponse>;

    /// Performs the exchange asynchronously.
    fn execute_async(
        &self,
        request: Arc<Request>,
        handler: Arc<Handler>,
    ) -> BoxFuture<'static, Result<RawResponse>>;
}

/// Details of the TLS session a response was received over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecureSession {
    /// DER-encoded certificate presented by the peer.
    pub peer_certificate: Option<Vec<u8>>,
}

/// A response exactly as the transport produced it.
#[derive(Debug)]
pub struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
    uri: Url,
    version: Version,
    previous: Option<Box<RawResponse>>,
    secure_session: Option<SecureSession>,
}

impl RawResponse {
    /// Creates a response with no headers, HTTP/1.1, no redirect history and
    /// no TLS session.
    pub fn new(status: StatusCode, uri: Url, body: Body) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
            uri,
            version: Version::HTTP_11,
            previous: None,
            secure_session: None,
        }
    }

    /// Sets the headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the protocol version.
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Links the response this one was redirected from.
    pub fn with_previous(mut self, previous: RawResponse) -> Self {
        self.previous = Some(Box::new(previous));
        self
    }

    /// Sets the TLS session details.
    pub fn with_secure_session(mut self, session: SecureSession) -> Self {
        self.secure_session = Some(session);
        self
    }

    /// The status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The headers, in received order.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The materialized body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// The URI the response was received from.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// The protocol version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The response this one was redirected from, if any.
    pub fn previous(&self) -> Option<&RawResponse> {
        self.previous.as_deref()
    }

    /// TLS session details, if the exchange was secured.
    pub fn secure_session(&self) -> Option<&SecureSession> {
        self.secure_session.as_ref()
    }
}

/// Transport backed by `reqwest`.
///
/// Asynchronous exchanges use a `reqwest::Client`; blocking ones use a
/// `reqwest::blocking::Client` built on first use, so a transport created
/// inside an async context never starts the blocking machinery unless asked
/// to. Blocking exchanges must not run on a Tokio worker thread.
///
/// reqwest follows redirects internally, so responses produced here never
/// carry a previous response.
///
/// # Examples
///
/// ```no_run
/// use encore::transport::ReqwestTransport;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), encore::Error> {
/// let transport = ReqwestTransport::builder()
///     .timeout(Duration::from_secs(30))
///     .default_header("User-Agent", "my-app/1.0")?
///     .max_redirects(5)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ReqwestTransport {
    client: reqwest::Client,
    blocking: OnceLock<reqwest::blocking::Client>,
    settings: TransportSettings,
}

#[derive(Debug, Clone)]
struct TransportSettings {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    default_headers: HeaderMap,
    max_redirects: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: None,
            default_headers: HeaderMap::new(),
            max_redirects: 10,
        }
    }
}

impl ReqwestTransport {
    /// Creates a transport with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Creates a builder for configuring the transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::new()
    }

    fn blocking_client(&self) -> Result<&reqwest::blocking::Client> {
        if let Some(client) = self.blocking.get() {
            return Ok(client);
        }

        let settings = &self.settings;
        let mut builder = reqwest::blocking::Client::builder()
            .default_headers(settings.default_headers.clone())
            .redirect(redirect_policy(settings.max_redirects))
            .tls_info(true);
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = settings.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        let client = builder.build().map_err(|e| {
            Error::Configuration(format!("Failed to build blocking HTTP client: {}", e))
        })?;

        // Another thread may have won the race; either client is equivalent.
        let _ = self.blocking.set(client);
        self.blocking.get().ok_or_else(|| {
            Error::Configuration("blocking HTTP client unavailable".to_string())
        })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &Request, handler: &Handler) -> Result<RawResponse> {
        let client = self.blocking_client()?;

        tracing::debug!(
            method = %request.method(),
            url = %request.uri(),
            handler = handler.kind(),
            "Executing blocking HTTP request"
        );

        let mut builder = client
            .request(request.method(), request.uri().clone())
            .headers(request.headers().clone());
        if let Some(content_type) = missing_content_type(request) {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        builder = match request.body() {
            BodyPayload::Empty => builder,
            BodyPayload::Text(text) | BodyPayload::Serialized { text, .. } => {
                builder.body(text.clone())
            }
            BodyPayload::Bytes(bytes) => builder.body(bytes.to_vec()),
            BodyPayload::File(path) => builder.body(std::fs::File::open(path)?),
            BodyPayload::Stream(stream) => match stream.take() {
                Some(reader) => builder.body(reqwest::blocking::Body::new(reader)),
                None => {
                    tracing::warn!(
                        url = %request.uri(),
                        "Stream body already consumed, sending it empty"
                    );
                    builder
                }
            },
        };

        let response = builder.send()?;
        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        let uri = response.url().clone();
        let secure_session = response
            .extensions()
            .get::<reqwest::tls::TlsInfo>()
            .map(session_from);

        let body = match handler {
            Handler::Stream => Body::Stream(BodyStream::new(response)),
            other => other.materialize(response.bytes()?)?,
        };

        Ok(finish(
            RawResponse::new(status, uri, body)
                .with_headers(headers)
                .with_version(version),
            secure_session,
        ))
    }

    fn execute_async(
        &self,
        request: Arc<Request>,
        handler: Arc<Handler>,
    ) -> BoxFuture<'static, Result<RawResponse>> {
        let client = self.client.clone();

        async move {
            tracing::debug!(
                method = %request.method(),
                url = %request.uri(),
                handler = handler.kind(),
                "Executing async HTTP request"
            );

            let mut builder = client
                .request(request.method(), request.uri().clone())
                .headers(request.headers().clone());
            if let Some(content_type) = missing_content_type(&request) {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
            builder = match request.body() {
                BodyPayload::Empty => builder,
                BodyPayload::Text(text) | BodyPayload::Serialized { text, .. } => {
                    builder.body(text.clone())
                }
                BodyPayload::Bytes(bytes) => builder.body(bytes.clone()),
                BodyPayload::File(path) => {
                    let path = path.clone();
                    let content = off_thread("request body reader", move || std::fs::read(path));
                    builder.body(content.await?)
                }
                BodyPayload::Stream(stream) => match stream.take() {
                    Some(mut reader) => {
                        let content = off_thread("request body reader", move || {
                            let mut buf = Vec::new();
                            reader.read_to_end(&mut buf)?;
                            Ok(buf)
                        })
                        .await?;
                        builder.body(content)
                    }
                    None => {
                        tracing::warn!(
                            url = %request.uri(),
                            "Stream body already consumed, sending it empty"
                        );
                        builder
                    }
                },
            };

            let response = builder.send().await?;
            let status = response.status();
            let version = response.version();
            let headers = response.headers().clone();
            let uri = response.url().clone();
            let secure_session = response
                .extensions()
                .get::<reqwest::tls::TlsInfo>()
                .map(session_from);

            let body = materialize_async(handler, response.bytes().await?).await?;

            Ok(finish(
                RawResponse::new(status, uri, body)
                    .with_headers(headers)
                    .with_version(version),
                secure_session,
            ))
        }
        .boxed()
    }
}

fn missing_content_type(request: &Request) -> Option<&'static str> {
    if request.headers().contains_key(CONTENT_TYPE) {
        return None;
    }
    request.body().content_type()
}

fn session_from(info: &reqwest::tls::TlsInfo) -> SecureSession {
    SecureSession {
        peer_certificate: info.peer_certificate().map(<[u8]>::to_vec),
    }
}

fn finish(response: RawResponse, session: Option<SecureSession>) -> RawResponse {
    match session {
        Some(session) => response.with_secure_session(session),
        None => response,
    }
}

/// Runs blocking file or reader I/O on Tokio's blocking pool.
async fn off_thread<F, T>(task: &'static str, work: F) -> Result<T>
where
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Interrupted(format!("{} stopped: {}", task, e)))?
        .map_err(Error::from)
}

/// Async counterpart of [`Handler::materialize`]; file bodies are written
/// off the runtime workers.
async fn materialize_async(handler: Arc<Handler>, bytes: Bytes) -> Result<Body> {
    match handler.as_ref() {
        Handler::File(_) => {
            off_thread("response body writer", move || handler.materialize(bytes)).await
        }
        other => Ok(other.materialize(bytes)?),
    }
}

fn redirect_policy(max_redirects: usize) -> reqwest::redirect::Policy {
    if max_redirects == 0 {
        reqwest::redirect::Policy::none()
    } else {
        reqwest::redirect::Policy::limited(max_redirects)
    }
}

/// Builder for [`ReqwestTransport`].
pub struct ReqwestTransportBuilder {
    settings: TransportSettings,
}

impl ReqwestTransportBuilder {
    /// Creates a builder with default settings: no timeout, up to ten redirects.
    pub fn new() -> Self {
        Self {
            settings: TransportSettings::default(),
        }
    }

    /// Sets the total timeout of an exchange.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.settings.connect_timeout = Some(timeout);
        self
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header value: {}", e)))?;
        self.settings.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the `User-Agent` header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a valid header value.
    pub fn user_agent(self, user_agent: impl AsRef<str>) -> Result<Self> {
        self.default_header(http::header::USER_AGENT.as_str(), user_agent)
    }

    /// Sets how many redirects are followed; `0` disables redirects.
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.settings.max_redirects = max_redirects;
        self
    }

    /// Builds the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the underlying client cannot be built.
    pub fn build(self) -> Result<ReqwestTransport> {
        let settings = self.settings;
        let mut builder = reqwest::Client::builder()
            .default_headers(settings.default_headers.clone())
            .redirect(redirect_policy(settings.max_redirects))
            .tls_info(true);
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = settings.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(ReqwestTransport {
            client,
            blocking: OnceLock::new(),
            settings,
        })
    }
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> Url {
        Url::parse("https://example.com/a").unwrap()
    }

    #[test]
    fn test_raw_response_defaults() {
        let response = RawResponse::new(StatusCode::OK, uri(), Body::Empty);
        assert_eq!(response.version(), Version::HTTP_11);
        assert!(response.previous().is_none());
        assert!(response.secure_session().is_none());
        assert!(response.headers().is_empty());
    }

    #[test]
    fn test_redirect_chain_links_backwards() {
        let first = RawResponse::new(StatusCode::MOVED_PERMANENTLY, uri(), Body::Empty);
        let second = RawResponse::new(StatusCode::FOUND, uri(), Body::Empty).with_previous(first);
        let last = RawResponse::new(StatusCode::OK, uri(), Body::Empty).with_previous(second);

        let statuses: Vec<_> = std::iter::successors(Some(&last), |r| r.previous())
            .map(RawResponse::status)
            .collect();
        assert_eq!(
            statuses,
            [StatusCode::OK, StatusCode::FOUND, StatusCode::MOVED_PERMANENTLY]
        );
    }

    #[tokio::test]
    async fn test_file_bodies_are_written_on_the_blocking_pool() {
        let caller = std::thread::current().id();
        let writer = off_thread("writer", || Ok(std::thread::current().id()))
            .await
            .unwrap();
        assert_ne!(caller, writer);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let body = materialize_async(Arc::new(Handler::file(&path)), Bytes::from_static(b"a,b"))
            .await
            .unwrap();
        assert_eq!(body.as_path(), Some(path.as_path()));
        assert_eq!(std::fs::read(&path).unwrap(), b"a,b");
    }

    #[tokio::test]
    async fn test_file_body_write_failure_is_an_io_error() {
        let handler = Arc::new(Handler::file("/nonexistent/encore/report.csv"));
        let err = materialize_async(handler, Bytes::from_static(b"a,b"))
            .await
            .unwrap_err();
        assert!(err.is_io_failure());
    }

    #[tokio::test]
    async fn test_in_memory_bodies_materialize_inline() {
        let body = materialize_async(Arc::new(Handler::lines()), Bytes::from_static(b"a\nb"))
            .await
            .unwrap();
        assert_eq!(body.as_lines().unwrap(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_builder_rejects_invalid_default_header() {
        let result = ReqwestTransport::builder().default_header("bad header", "x");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_zero_redirects_disables_following() {
        // Policy has no PartialEq; building the transport is enough to check the
        // configuration is accepted.
        let transport = ReqwestTransport::builder().max_redirects(0).build().unwrap();
        assert_eq!(transport.settings.max_redirects, 0);
    }
}
