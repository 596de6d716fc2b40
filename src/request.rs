//! Immutable request descriptors.

use crate::body::BodyPayload;
use crate::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

/// An immutable HTTP request.
///
/// Requests are built with [`Request::builder`] (or one of the method
/// shortcuts) and validated on construction, so a `Request` is never
/// malformed. The client shares them as `Arc<Request>`; a
/// [`Response`](crate::Response) replays the very same instance.
///
/// # Examples
///
/// ```
/// use encore::{BodyPayload, Request};
/// use http::Method;
///
/// let request = Request::builder(Method::POST, "https://api.example.com/users")?
///     .header("x-request-id", "42")?
///     .body(BodyPayload::text("{}"))
///     .build()?;
///
/// assert_eq!(request.method(), Method::POST);
/// assert_eq!(request.header("x-request-id"), Some("42"));
/// # Ok::<(), encore::Error>(())
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Url,
    headers: HeaderMap,
    body: BodyPayload,
}

impl Request {
    /// Starts building a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `uri` does not parse.
    pub fn builder(method: Method, uri: impl AsRef<str>) -> Result<RequestBuilder> {
        Ok(RequestBuilder::new(method, Url::parse(uri.as_ref())?))
    }

    /// A `GET` request without body.
    pub fn get(uri: impl AsRef<str>) -> Result<Self> {
        Self::builder(Method::GET, uri)?.build()
    }

    /// A `DELETE` request without body.
    pub fn delete(uri: impl AsRef<str>) -> Result<Self> {
        Self::builder(Method::DELETE, uri)?.build()
    }

    /// A `POST` request with the given body.
    pub fn post(uri: impl AsRef<str>, body: BodyPayload) -> Result<Self> {
        Self::builder(Method::POST, uri)?.body(body).build()
    }

    /// A `PUT` request with the given body.
    pub fn put(uri: impl AsRef<str>, body: BodyPayload) -> Result<Self> {
        Self::builder(Method::PUT, uri)?.body(body).build()
    }

    /// A `PATCH` request with the given body.
    pub fn patch(uri: impl AsRef<str>, body: BodyPayload) -> Result<Self> {
        Self::builder(Method::PATCH, uri)?.body(body).build()
    }

    /// The request method.
    pub fn method(&self) -> Method {
        self.method.clone()
    }

    /// The target URI.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// The request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The first value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// The request body.
    pub fn body(&self) -> &BodyPayload {
        &self.body
    }
}

/// Builder for [`Request`].
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    uri: Url,
    headers: HeaderMap,
    body: BodyPayload,
}

impl RequestBuilder {
    fn new(method: Method, uri: Url) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: BodyPayload::Empty,
        }
    }

    /// Appends a header. Repeated names keep every value, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the header name or value is invalid.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::InvalidArgument(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::InvalidArgument(format!("Invalid header value: {}", e)))?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Adds a query parameter to the target URI.
    pub fn query_param(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.uri
            .query_pairs_mut()
            .append_pair(key.as_ref(), value.as_ref());
        self
    }

    /// Sets the body.
    pub fn body(mut self, body: BodyPayload) -> Self {
        self.body = body;
        self
    }

    /// Validates and builds the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the URI scheme is not `http` or
    /// `https`, or if the URI has no host.
    pub fn build(self) -> Result<Request> {
        match self.uri.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::InvalidArgument(format!(
                    "unsupported URI scheme '{other}', expected http or https"
                )));
            }
        }
        if self.uri.host_str().map_or(true, str::is_empty) {
            return Err(Error::InvalidArgument(format!("URI '{}' has no host", self.uri)));
        }

        Ok(Request {
            method: self.method,
            uri: self.uri,
            headers: self.headers,
            body: self.body,
        })
    }
}
