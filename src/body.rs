//! Outbound request bodies.
//!
//! A [`BodyPayload`] is built from a primitive source (text, bytes, a reader,
//! a file) or by serializing a value through a [`Codec`]. It is attached to a
//! [`Request`](crate::Request) and handed, untouched, to the transport.

use crate::codec::{Codec, ValueShape};
use crate::{Error, Result};
use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// The body of an outbound request. Exactly one variant is active.
///
/// # Examples
///
/// ```
/// use encore::body::BodyPayload;
/// use encore::codec::JsonCodec;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct CreateUser {
///     name: String,
/// }
///
/// let payload = BodyPayload::serialized(
///     &JsonCodec::default(),
///     Some(&CreateUser { name: "Alice".to_string() }),
/// )
/// .unwrap();
///
/// assert_eq!(payload.as_text(), Some(r#"{"name":"Alice"}"#));
/// assert_eq!(payload.content_type(), Some("application/json"));
/// ```
pub enum BodyPayload {
    /// Zero bytes.
    Empty,
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// Content pulled from a reader when the request is sent.
    Stream(StreamPayload),
    /// Content read from a file when the request is sent.
    File(PathBuf),
    /// Text produced by a codec.
    Serialized {
        /// The encoded value.
        text: String,
        /// Media type reported by the codec.
        content_type: &'static str,
    },
}

impl BodyPayload {
    /// A payload carrying zero bytes.
    pub fn none() -> Self {
        BodyPayload::Empty
    }

    /// A text payload.
    pub fn text(text: impl Into<String>) -> Self {
        BodyPayload::Text(text.into())
    }

    /// A byte payload.
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        BodyPayload::Bytes(bytes.into())
    }

    /// A payload streamed from `reader`.
    ///
    /// The reader is consumed by the first exchange; replaying such a request
    /// sends an empty body.
    pub fn stream<R>(reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        BodyPayload::Stream(StreamPayload {
            reader: Mutex::new(Some(Box::new(reader))),
        })
    }

    /// A payload read from the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] with kind `NotFound` if `path` does not resolve to
    /// a readable regular file.
    pub fn file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::File::open(path)?;
        if !path.is_file() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a regular file", path.display()),
            )));
        }
        Ok(BodyPayload::File(path.to_path_buf()))
    }

    /// A payload holding `value` encoded by `codec`.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`] if `value` is `None`;
    /// * [`Error::UnsupportedBodyType`] if the codec refuses the value's shape,
    ///   in which case encoding is not attempted;
    /// * [`Error::Encode`] carrying the codec's own error if encoding fails.
    pub fn serialized<C, T>(codec: &C, value: Option<&T>) -> Result<Self>
    where
        C: Codec,
        T: Serialize + ?Sized,
    {
        let value = value.ok_or_else(|| Error::missing("the value to serialize"))?;

        let shape = ValueShape::of(value);
        if !codec.can_encode(shape) {
            return Err(Error::UnsupportedBodyType(format!(
                "cannot encode a {shape} value as {}",
                codec.content_type()
            )));
        }

        let text = codec
            .encode(value)
            .map_err(|e| Error::Encode(Box::new(e)))?;

        Ok(BodyPayload::Serialized {
            text,
            content_type: codec.content_type(),
        })
    }

    /// The text content, for `Text` and `Serialized` payloads.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            BodyPayload::Text(text) | BodyPayload::Serialized { text, .. } => Some(text),
            _ => None,
        }
    }

    /// The media type implied by the payload, if any.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            BodyPayload::Serialized { content_type, .. } => Some(content_type),
            _ => None,
        }
    }

    /// Returns `true` for [`BodyPayload::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, BodyPayload::Empty)
    }
}

impl Default for BodyPayload {
    fn default() -> Self {
        BodyPayload::Empty
    }
}

impl fmt::Debug for BodyPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyPayload::Empty => f.write_str("Empty"),
            BodyPayload::Text(text) => f.debug_tuple("Text").field(text).finish(),
            BodyPayload::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            BodyPayload::Stream(_) => f.write_str("Stream(..)"),
            BodyPayload::File(path) => f.debug_tuple("File").field(path).finish(),
            BodyPayload::Serialized { text, content_type } => f
                .debug_struct("Serialized")
                .field("text", text)
                .field("content_type", content_type)
                .finish(),
        }
    }
}

/// A reader handed over to the transport once.
pub struct StreamPayload {
    reader: Mutex<Option<Box<dyn Read + Send>>>,
}

impl StreamPayload {
    /// Takes the reader out. Returns `None` once it has been taken.
    pub fn take(&self) -> Option<Box<dyn Read + Send>> {
        self.reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
