//! Error types for exchanges and body decoding.
//!
//! [`Error`] is the crate-wide error returned by sending, retrying, building
//! payloads and the raising decode entry points. [`ReadError`] is the narrower,
//! structured failure returned by the result-object decode entry points
//! (`try_read_body*`); it converts losslessly into [`Error`].

use http::StatusCode;

/// Boxed error used for codec and transport causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type.
///
/// # Examples
///
/// ```no_run
/// use encore::{Client, Error, Handler, Request};
///
/// # fn example() -> Result<(), Error> {
/// let client = Client::new()?;
/// let request = Request::get("https://api.example.com/users/1")?;
///
/// match client.send(request, Handler::text()) {
///     Ok(response) => println!("status {}", response.status_code()),
///     Err(Error::Network(e)) => eprintln!("network failure: {e}"),
///     Err(e) if e.is_io_failure() => eprintln!("i/o failure: {e}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A required argument was missing or the request is malformed.
    ///
    /// Raised before any I/O or decoding takes place.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A local or transport-level I/O fault.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A network-level error reported by the reqwest transport.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The exchange stopped before it could complete.
    ///
    /// Produced when the worker running an exchange panics or is shut down,
    /// and by the `try_*` variants when the transport or codec panics.
    #[error("Exchange interrupted: {0}")]
    Interrupted(String),

    /// The pending exchange was cancelled before it completed.
    #[error("Exchange cancelled")]
    Cancelled,

    /// An asynchronous exchange failed.
    ///
    /// [`PendingResponse`](crate::PendingResponse) wraps every failure in this
    /// variant; use [`Error::root_cause`] to reach the underlying error.
    #[error("Asynchronous exchange failed: {source}")]
    AsyncCompletion {
        /// The failure of the underlying exchange.
        #[source]
        source: Box<Error>,
    },

    /// The response carries no body.
    #[error("the current response body is empty")]
    EmptyBody,

    /// The body (or the value to encode) has a representation that cannot be
    /// decoded or encoded.
    #[error("unsupported body type: {0}")]
    UnsupportedBodyType(String),

    /// A status-gated decode was attempted on a response with another status.
    #[error("the response status code {actual} does not match the expected status code {expected}")]
    StatusMismatch {
        /// The status code the caller asked for.
        expected: u16,
        /// The status code of the response.
        actual: StatusCode,
    },

    /// The body could not be decoded into the requested type.
    #[error("An error occurred while trying to read body: {source}")]
    ReadBody {
        /// The codec or I/O failure.
        #[source]
        source: BoxError,
    },

    /// The codec failed to encode a request body.
    #[error(transparent)]
    Encode(BoxError),

    /// Invalid configuration was provided.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` for I/O faults, whether local or reported by the
    /// network transport.
    pub fn is_io_failure(&self) -> bool {
        match self.root_cause() {
            Error::Io(_) | Error::Network(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if the exchange was interrupted or cancelled.
    pub fn is_interrupted(&self) -> bool {
        matches!(self.root_cause(), Error::Interrupted(_) | Error::Cancelled)
    }

    /// Returns the status code carried by the error, if any.
    ///
    /// Only [`Error::StatusMismatch`] and network errors produced by reqwest
    /// carry one.
    pub fn status(&self) -> Option<StatusCode> {
        match self.root_cause() {
            Error::StatusMismatch { actual, .. } => Some(*actual),
            Error::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Strips every [`Error::AsyncCompletion`] layer.
    ///
    /// ```
    /// use encore::Error;
    ///
    /// let err = Error::AsyncCompletion { source: Box::new(Error::Cancelled) };
    /// assert!(matches!(err.root_cause(), Error::Cancelled));
    /// ```
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::AsyncCompletion { source } = current {
            current = source;
        }
        current
    }

    /// Consuming counterpart of [`Error::root_cause`].
    pub fn into_root_cause(self) -> Error {
        let mut current = self;
        while let Error::AsyncCompletion { source } = current {
            current = *source;
        }
        current
    }

    pub(crate) fn missing(what: &str) -> Self {
        Error::InvalidArgument(format!("{what} must not be absent"))
    }
}

/// Structured failure of a body read.
///
/// Returned by the result-object decode entry points. Every variant maps onto
/// the [`Error`] variant of the same name, except [`ReadError::Decode`] which
/// becomes [`Error::ReadBody`].
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The response carries no body.
    #[error("the current response body is empty")]
    EmptyBody,

    /// The body representation cannot be decoded.
    #[error("the current response body type is not supported: {0}")]
    UnsupportedBodyType(&'static str),

    /// The response status differs from the one the caller expected.
    #[error("the response status code {actual} does not match the expected status code {expected}")]
    StatusMismatch {
        /// The status code the caller asked for.
        expected: u16,
        /// The status code of the response.
        actual: StatusCode,
    },

    /// The codec rejected the content, or the body source could not be read.
    #[error("failed to decode body: {0}")]
    Decode(#[source] BoxError),
}

impl From<ReadError> for Error {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::EmptyBody => Error::EmptyBody,
            ReadError::UnsupportedBodyType(kind) => Error::UnsupportedBodyType(kind.to_string()),
            ReadError::StatusMismatch { expected, actual } => {
                Error::StatusMismatch { expected, actual }
            }
            ReadError::Decode(source) => Error::ReadBody { source },
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
