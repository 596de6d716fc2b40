//! Response body handlers and the bodies they materialize.

use bytes::Bytes;
use encoding_rs::Encoding;
use std::any::Any;
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Tells the transport how to materialize a response body.
///
/// The client never looks inside a handler; it forwards it to the transport
/// and keeps it for [`Response::retry`](crate::Response::retry).
#[derive(Clone)]
pub enum Handler {
    /// Read and drop the body. The response body is [`Body::Empty`].
    Discarding,
    /// Decode the body as UTF-8 text.
    Text,
    /// Decode the body as text in the given charset.
    ///
    /// Malformed sequences become U+FFFD; a byte order mark is not sniffed.
    TextWith(&'static Encoding),
    /// Keep the raw bytes.
    Bytes,
    /// Split the text body into lines, without their terminators.
    Lines,
    /// Expose the body as a readable stream.
    Stream,
    /// Write the body to the given file and expose its path.
    File(PathBuf),
    /// Drop the body and substitute the given value.
    Replacing(Arc<dyn Any + Send + Sync>),
}

impl Handler {
    /// See [`Handler::Discarding`].
    pub fn discarding() -> Self {
        Handler::Discarding
    }

    /// See [`Handler::Text`].
    pub fn text() -> Self {
        Handler::Text
    }

    /// See [`Handler::TextWith`].
    pub fn text_with(encoding: &'static Encoding) -> Self {
        Handler::TextWith(encoding)
    }

    /// [`Handler::TextWith`] for a charset label such as `"iso-8859-1"`, or
    /// `None` if the label is unknown.
    pub fn text_with_label(label: &str) -> Option<Self> {
        Encoding::for_label(label.as_bytes()).map(Handler::TextWith)
    }

    /// See [`Handler::Bytes`].
    pub fn bytes() -> Self {
        Handler::Bytes
    }

    /// See [`Handler::Lines`].
    pub fn lines() -> Self {
        Handler::Lines
    }

    /// See [`Handler::Stream`].
    pub fn stream() -> Self {
        Handler::Stream
    }

    /// See [`Handler::File`].
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Handler::File(path.into())
    }

    /// See [`Handler::Replacing`].
    pub fn replacing<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Handler::Replacing(Arc::new(value))
    }

    /// Short name of the representation, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Handler::Discarding => "discarding",
            Handler::Text | Handler::TextWith(_) => "text",
            Handler::Bytes => "bytes",
            Handler::Lines => "lines",
            Handler::Stream => "stream",
            Handler::File(_) => "file",
            Handler::Replacing(_) => "replacing",
        }
    }

    /// Materializes a fully received body according to this handler.
    ///
    /// Transports that buffer the whole body use this to build [`Body`].
    ///
    /// # Errors
    ///
    /// Fails if the text is not valid UTF-8 (`Text`, `Lines`) or the target
    /// file cannot be written (`File`). `TextWith` never fails.
    pub fn materialize(&self, bytes: Bytes) -> io::Result<Body> {
        let body = match self {
            Handler::Discarding => Body::Empty,
            Handler::Text => Body::Text(utf8(bytes)?),
            Handler::TextWith(encoding) => {
                let (text, _) = encoding.decode_without_bom_handling(&bytes);
                Body::Text(text.into_owned())
            }
            Handler::Bytes => Body::Bytes(bytes),
            Handler::Lines => Body::Lines(utf8(bytes)?.lines().map(str::to_owned).collect()),
            Handler::Stream => Body::Stream(BodyStream::new(io::Cursor::new(bytes))),
            Handler::File(path) => {
                std::fs::write(path, &bytes)?;
                Body::File(path.clone())
            }
            Handler::Replacing(value) => Body::Opaque(Arc::clone(value)),
        };
        Ok(body)
    }
}

fn utf8(bytes: Bytes) -> io::Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Discarding => f.write_str("Discarding"),
            Handler::Text => f.write_str("Text"),
            Handler::TextWith(encoding) => {
                f.debug_tuple("TextWith").field(&encoding.name()).finish()
            }
            Handler::Bytes => f.write_str("Bytes"),
            Handler::Lines => f.write_str("Lines"),
            Handler::Stream => f.write_str("Stream"),
            Handler::File(path) => f.debug_tuple("File").field(path).finish(),
            Handler::Replacing(_) => f.write_str("Replacing(..)"),
        }
    }
}

/// A response body, in the representation chosen by its [`Handler`].
pub enum Body {
    /// No body.
    Empty,
    /// UTF-8 text.
    Text(String),
    /// Path of the file the body was written to.
    File(PathBuf),
    /// A readable stream; consumed by the first read.
    Stream(BodyStream),
    /// Raw bytes.
    Bytes(Bytes),
    /// Text lines without terminators.
    Lines(Vec<String>),
    /// A value no codec can read, such as the one set by [`Handler::Replacing`].
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Body {
    /// Returns `true` for [`Body::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// The text, for [`Body::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The bytes, for [`Body::Bytes`].
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Body::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The lines, for [`Body::Lines`].
    pub fn as_lines(&self) -> Option<&[String]> {
        match self {
            Body::Lines(lines) => Some(lines),
            _ => None,
        }
    }

    /// The file path, for [`Body::File`].
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Body::File(path) => Some(path),
            _ => None,
        }
    }

    /// The replacing value, for [`Body::Opaque`] holding a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Body::Opaque(value) => value.downcast_ref(),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Body::Empty => "empty",
            Body::Text(_) => "text",
            Body::File(_) => "file",
            Body::Stream(_) => "stream",
            Body::Bytes(_) => "bytes",
            Body::Lines(_) => "lines",
            Body::Opaque(_) => "opaque",
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Body::File(path) => f.debug_tuple("File").field(path).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
            Body::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            Body::Lines(lines) => f.debug_tuple("Lines").field(lines).finish(),
            Body::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

/// A one-shot readable body shared by reference.
///
/// Reads go through an internal lock so that a [`Response`](crate::Response)
/// holding a stream stays `Sync`. Once drained, further reads return EOF.
pub struct BodyStream {
    reader: Mutex<Box<dyn Read + Send>>,
}

impl BodyStream {
    /// Wraps a reader.
    pub fn new<R>(reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            reader: Mutex::new(Box::new(reader)),
        }
    }

    /// Runs `f` with exclusive access to the underlying reader.
    pub fn with_reader<T>(&self, f: impl FnOnce(&mut dyn Read) -> T) -> T {
        let mut guard = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut **guard)
    }

    /// Reads the remaining content.
    pub fn read_to_end(&self) -> io::Result<Vec<u8>> {
        self.with_reader(|reader| {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf)?;
            Ok(buf)
        })
    }
}
