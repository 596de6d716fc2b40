//! Pluggable body codecs.
//!
//! A [`Codec`] turns request values into text and response bodies into typed
//! values. The client owns exactly one codec, [`JsonCodec`] unless another is
//! configured through [`ClientBuilder::codec`](crate::ClientBuilder::codec).
//!
//! Before encoding, the value's top-level [`ValueShape`] is probed and offered
//! to [`Codec::can_encode`]. A codec that refuses the shape makes payload
//! creation fail with [`Error::UnsupportedBodyType`](crate::Error::UnsupportedBodyType)
//! without attempting to encode.

use serde::de::DeserializeOwned;
use serde::ser::{self, Impossible, Serialize};
use std::fmt;
use std::io::Read;

/// Encoding and decoding engine used by the client and its responses.
///
/// Implementations must not change their behaviour while requests are in
/// flight: [`Codec::can_encode`] and [`Codec::encode`] are called one after the
/// other without synchronization.
///
/// # Examples
///
/// ```
/// use encore::codec::{Codec, JsonCodec, ValueShape};
///
/// let codec = JsonCodec::default();
/// assert!(codec.can_encode(ValueShape::Struct));
/// assert!(!codec.can_encode(ValueShape::Unit));
///
/// let text = codec.encode(&vec![1, 2, 3]).unwrap();
/// let back: Vec<u32> = codec.decode_str(&text).unwrap();
/// assert_eq!(back, vec![1, 2, 3]);
/// ```
pub trait Codec: Send + Sync + 'static {
    /// Failure produced while encoding or decoding.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Media type of the encoded text.
    fn content_type(&self) -> &'static str;

    /// Whether values of the given top-level shape can be encoded.
    fn can_encode(&self, shape: ValueShape) -> bool;

    /// Encodes a value to text.
    fn encode<T>(&self, value: &T) -> Result<String, Self::Error>
    where
        T: Serialize + ?Sized;

    /// Decodes a value from text.
    fn decode_str<T>(&self, text: &str) -> Result<T, Self::Error>
    where
        T: DeserializeOwned;

    /// Decodes a value from a byte buffer.
    fn decode_slice<T>(&self, bytes: &[u8]) -> Result<T, Self::Error>
    where
        T: DeserializeOwned;

    /// Decodes a value from a reader, consuming it.
    fn decode_reader<T, R>(&self, reader: R) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
        R: Read;
}

/// JSON codec backed by `serde_json`.
///
/// Optional values, dates (through their serde implementations, e.g. `chrono`
/// with the `serde` feature) and arbitrarily nested generic containers are
/// handled by serde itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    /// A codec producing indented JSON.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    /// Returns `true` if this codec produces indented JSON.
    pub fn is_pretty(&self) -> bool {
        self.pretty
    }
}

impl Codec for JsonCodec {
    type Error = serde_json::Error;

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn can_encode(&self, shape: ValueShape) -> bool {
        // A unit carries no data, there is no JSON document to produce for it.
        !matches!(shape, ValueShape::Unit | ValueShape::Unknown)
    }

    fn encode<T>(&self, value: &T) -> Result<String, Self::Error>
    where
        T: Serialize + ?Sized,
    {
        if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
    }

    fn decode_str<T>(&self, text: &str) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_str(text)
    }

    fn decode_slice<T>(&self, bytes: &[u8]) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(bytes)
    }

    fn decode_reader<T, R>(&self, reader: R) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
        R: Read,
    {
        serde_json::from_reader(reader)
    }
}

/// Top-level shape of a serializable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueShape {
    /// `None`.
    Null,
    /// `()` or a unit struct.
    Unit,
    /// A boolean.
    Bool,
    /// Any integer.
    Integer,
    /// Any floating point number.
    Float,
    /// A string or a character.
    Text,
    /// Raw bytes.
    Bytes,
    /// A sequence or tuple.
    Sequence,
    /// A map.
    Map,
    /// A struct with named fields.
    Struct,
    /// An enum variant.
    Variant,
    /// The value refused to serialize.
    Unknown,
}

impl ValueShape {
    /// Probes the top-level shape of `value` without producing any output.
    ///
    /// ```
    /// use encore::codec::ValueShape;
    /// use std::collections::BTreeMap;
    ///
    /// assert_eq!(ValueShape::of(&42u8), ValueShape::Integer);
    /// assert_eq!(ValueShape::of(&Some("x")), ValueShape::Text);
    /// assert_eq!(ValueShape::of(&BTreeMap::<String, u8>::new()), ValueShape::Map);
    /// assert_eq!(ValueShape::of(&()), ValueShape::Unit);
    /// ```
    pub fn of<T>(value: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        match value.serialize(ShapeProbe) {
            Ok(shape) | Err(ProbeError::Found(shape)) => shape,
            Err(ProbeError::Refused(_)) => ValueShape::Unknown,
        }
    }
}

impl fmt::Display for ValueShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueShape::Null => "null",
            ValueShape::Unit => "unit",
            ValueShape::Bool => "bool",
            ValueShape::Integer => "integer",
            ValueShape::Float => "float",
            ValueShape::Text => "text",
            ValueShape::Bytes => "bytes",
            ValueShape::Sequence => "sequence",
            ValueShape::Map => "map",
            ValueShape::Struct => "struct",
            ValueShape::Variant => "enum variant",
            ValueShape::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Serializer that stops at the first compound type it meets.
struct ShapeProbe;

#[derive(Debug)]
enum ProbeError {
    Found(ValueShape),
    Refused(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Found(shape) => write!(f, "found {shape}"),
            ProbeError::Refused(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ProbeError {}

impl ser::Error for ProbeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ProbeError::Refused(msg.to_string())
    }
}

type Compound = Impossible<ValueShape, ProbeError>;

impl ser::Serializer for ShapeProbe {
    type Ok = ValueShape;
    type Error = ProbeError;
    type SerializeSeq = Compound;
    type SerializeTuple = Compound;
    type SerializeTupleStruct = Compound;
    type SerializeTupleVariant = Compound;
    type SerializeMap = Compound;
    type SerializeStruct = Compound;
    type SerializeStructVariant = Compound;

    fn serialize_bool(self, _: bool) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Bool)
    }

    fn serialize_i8(self, _: i8) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Integer)
    }

    fn serialize_i16(self, _: i16) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Integer)
    }

    fn serialize_i32(self, _: i32) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Integer)
    }

    fn serialize_i64(self, _: i64) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Integer)
    }

    fn serialize_i128(self, _: i128) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Integer)
    }

    fn serialize_u8(self, _: u8) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Integer)
    }

    fn serialize_u16(self, _: u16) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Integer)
    }

    fn serialize_u32(self, _: u32) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Integer)
    }

    fn serialize_u64(self, _: u64) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Integer)
    }

    fn serialize_u128(self, _: u128) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Integer)
    }

    fn serialize_f32(self, _: f32) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Float)
    }

    fn serialize_f64(self, _: f64) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Float)
    }

    fn serialize_char(self, _: char) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Text)
    }

    fn serialize_str(self, _: &str) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Text)
    }

    fn serialize_bytes(self, _: &[u8]) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Bytes)
    }

    fn serialize_none(self) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Null)
    }

    fn serialize_some<T>(self, value: &T) -> Result<ValueShape, ProbeError>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Unit)
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Unit)
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
    ) -> Result<ValueShape, ProbeError> {
        Ok(ValueShape::Variant)
    }

    fn serialize_newtype_struct<T>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<ValueShape, ProbeError>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Result<ValueShape, ProbeError>
    where
        T: Serialize + ?Sized,
    {
        Ok(ValueShape::Variant)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Compound, ProbeError> {
        Err(ProbeError::Found(ValueShape::Sequence))
    }

    fn serialize_tuple(self, _: usize) -> Result<Compound, ProbeError> {
        Err(ProbeError::Found(ValueShape::Sequence))
    }

    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Compound, ProbeError> {
        Err(ProbeError::Found(ValueShape::Sequence))
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Compound, ProbeError> {
        Err(ProbeError::Found(ValueShape::Variant))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Compound, ProbeError> {
        Err(ProbeError::Found(ValueShape::Map))
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Compound, ProbeError> {
        Err(ProbeError::Found(ValueShape::Struct))
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Compound, ProbeError> {
        Err(ProbeError::Found(ValueShape::Variant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize)]
    struct Marker;

    #[derive(Serialize)]
    struct Wrapper(Vec<u8>);

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct User {
        id: u64,
        nickname: Option<String>,
    }

    #[derive(Serialize)]
    enum Command {
        Stop,
        Move { x: i32 },
    }

    struct Refusing;

    impl Serialize for Refusing {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(ser::Error::custom("not today"))
        }
    }

    #[test]
    fn test_shape_probe() {
        assert_eq!(ValueShape::of(&true), ValueShape::Bool);
        assert_eq!(ValueShape::of(&1.5f32), ValueShape::Float);
        assert_eq!(ValueShape::of("text"), ValueShape::Text);
        assert_eq!(ValueShape::of(&None::<u8>), ValueShape::Null);
        assert_eq!(ValueShape::of(&Marker), ValueShape::Unit);
        assert_eq!(ValueShape::of(&Wrapper(vec![1])), ValueShape::Sequence);
        assert_eq!(ValueShape::of(&(1, "a")), ValueShape::Sequence);
        assert_eq!(
            ValueShape::of(&User {
                id: 1,
                nickname: None
            }),
            ValueShape::Struct
        );
        assert_eq!(ValueShape::of(&Command::Stop), ValueShape::Variant);
        assert_eq!(ValueShape::of(&Command::Move { x: 3 }), ValueShape::Variant);
        assert_eq!(ValueShape::of(&Refusing), ValueShape::Unknown);
    }

    #[test]
    fn test_json_codec_capabilities() {
        let codec = JsonCodec::default();
        assert_eq!(codec.content_type(), "application/json");
        assert!(codec.can_encode(ValueShape::Null));
        assert!(codec.can_encode(ValueShape::Sequence));
        assert!(!codec.can_encode(ValueShape::Unit));
        assert!(!codec.can_encode(ValueShape::Unknown));
    }

    #[test]
    fn test_json_codec_decodes_every_source() {
        let codec = JsonCodec::default();
        let text = r#"{"id":7,"nickname":"neo"}"#;
        let expected = User {
            id: 7,
            nickname: Some("neo".to_string()),
        };

        assert_eq!(codec.decode_str::<User>(text).unwrap(), expected);
        assert_eq!(codec.decode_slice::<User>(text.as_bytes()).unwrap(), expected);
        assert_eq!(
            codec.decode_reader::<User, _>(std::io::Cursor::new(text)).unwrap(),
            expected
        );
    }

    #[test]
    fn test_pretty_codec_indents() {
        let codec = JsonCodec::pretty();
        assert!(codec.is_pretty());
        let text = codec
            .encode(&User {
                id: 1,
                nickname: None,
            })
            .unwrap();
        assert!(text.contains('\n'));
        assert!(!JsonCodec::default().is_pretty());
    }
}
