//! Body decoding for [`Response`].
//!
//! Each decode entry point exists in four conventions that detect the same
//! failures at the same moment and only differ in how they report them:
//!
//! | convention        | unconditional      | status-gated                   |
//! |-------------------|--------------------|--------------------------------|
//! | raise             | `read_body`        | `read_body_for_status`         |
//! | result object     | `try_read_body`    | `try_read_body_for_status`     |
//! | nullable-optional | `read_body_opt`    | `read_body_for_status_opt`     |
//! | tri-state option  | `read_body_option` | `read_body_for_status_option`  |

use crate::codec::Codec;
use crate::error::{ReadError, Result};
use crate::handler::Body;
use crate::Response;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;

impl<C> Response<C>
where
    C: Codec,
{
    /// Decodes the body into `T`.
    ///
    /// # Errors
    ///
    /// * [`Error::EmptyBody`](crate::Error::EmptyBody) if there is no body;
    /// * [`Error::UnsupportedBodyType`](crate::Error::UnsupportedBodyType) if
    ///   the body holds an opaque value;
    /// * [`Error::ReadBody`](crate::Error::ReadBody) if the codec rejects the
    ///   content or the body file cannot be opened.
    pub fn read_body<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.attempt(None).map_err(Into::into)
    }

    /// Decodes the body into `T` if the status code equals `status`.
    ///
    /// # Errors
    ///
    /// [`Error::StatusMismatch`](crate::Error::StatusMismatch) if the status
    /// differs, in which case the body is left untouched; otherwise as
    /// [`Response::read_body`].
    pub fn read_body_for_status<T>(&self, status: u16) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.attempt(Some(status)).map_err(Into::into)
    }

    /// Decodes the body into `T`, reporting failures as a [`ReadError`].
    pub fn try_read_body<T>(&self) -> std::result::Result<T, ReadError>
    where
        T: DeserializeOwned,
    {
        self.attempt(None)
    }

    /// Status-gated form of [`Response::try_read_body`].
    pub fn try_read_body_for_status<T>(&self, status: u16) -> std::result::Result<T, ReadError>
    where
        T: DeserializeOwned,
    {
        self.attempt(Some(status))
    }

    /// Decodes the body into `T`, or returns `None` on any failure.
    ///
    /// A `null` document is also `None`, even when `T` could hold it.
    pub fn read_body_opt<T>(&self) -> Option<T>
    where
        T: DeserializeOwned,
    {
        self.attempt::<Option<T>>(None).ok().flatten()
    }

    /// Status-gated form of [`Response::read_body_opt`].
    pub fn read_body_for_status_opt<T>(&self, status: u16) -> Option<T>
    where
        T: DeserializeOwned,
    {
        self.attempt::<Option<T>>(Some(status)).ok().flatten()
    }

    /// Decodes the body into `T`, treating failures and a `null` document
    /// alike as no value.
    ///
    /// ```no_run
    /// # use encore::{Client, Handler, Request};
    /// # fn example() -> Result<(), encore::Error> {
    /// # let client = Client::new()?;
    /// let request = Request::get("https://api.example.com/me/avatar")?;
    /// let response = client.send(request, Handler::text())?;
    /// let avatar: Option<String> = response.read_body_option();
    /// # Ok(())
    /// # }
    /// ```
    pub fn read_body_option<T>(&self) -> Option<T>
    where
        T: DeserializeOwned,
    {
        self.attempt::<Option<T>>(None).ok().flatten()
    }

    /// Status-gated form of [`Response::read_body_option`].
    pub fn read_body_for_status_option<T>(&self, status: u16) -> Option<T>
    where
        T: DeserializeOwned,
    {
        self.attempt::<Option<T>>(Some(status)).ok().flatten()
    }

    fn attempt<T>(&self, expected: Option<u16>) -> std::result::Result<T, ReadError>
    where
        T: DeserializeOwned,
    {
        if let Some(expected) = expected {
            let actual = self.status();
            if actual.as_u16() != expected {
                return Err(ReadError::StatusMismatch { expected, actual });
            }
        }

        let result = self.decode_body();
        if let Err(e) = &result {
            tracing::debug!(
                error = %e,
                body = self.body().kind(),
                target = std::any::type_name::<T>(),
                url = %self.uri(),
                "Failed to read response body"
            );
        }
        result
    }

    fn decode_body<T>(&self) -> std::result::Result<T, ReadError>
    where
        T: DeserializeOwned,
    {
        let codec = self.client().codec();
        let decoded = match self.body() {
            Body::Empty => return Err(ReadError::EmptyBody),
            Body::Opaque(_) => return Err(ReadError::UnsupportedBodyType("opaque value")),
            Body::Text(text) => codec.decode_str(text),
            Body::Bytes(bytes) => codec.decode_slice(bytes),
            Body::Lines(lines) => codec.decode_str(&lines.concat()),
            Body::Stream(stream) => stream.with_reader(|reader| codec.decode_reader(reader)),
            Body::File(path) => {
                let file = File::open(path).map_err(|e| ReadError::Decode(Box::new(e)))?;
                codec.decode_reader(BufReader::new(file))
            }
        };
        decoded.map_err(|e| ReadError::Decode(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use crate::handler::{Body, Handler};
    use crate::request::Request;
    use crate::transport::{RawResponse, Transport};
    use crate::{Client, Error, ReadError, Response, Result};
    use futures_util::future::{BoxFuture, FutureExt};
    use http::StatusCode;
    use serde::Deserialize;
    use std::sync::{Arc, Mutex};

    /// Hands out a prepared body once, then empty bodies.
    struct Canned {
        status: StatusCode,
        body: Mutex<Option<Body>>,
    }

    impl Transport for Canned {
        fn execute(&self, request: &Request, _: &Handler) -> Result<RawResponse> {
            let body = self.body.lock().unwrap().take().unwrap_or(Body::Empty);
            Ok(RawResponse::new(self.status, request.uri().clone(), body))
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

    fn respond(status: u16, body: Body) -> Response {
        let client = Client::builder()
            .transport(Canned {
                status: StatusCode::from_u16(status).unwrap(),
                body: Mutex::new(Some(body)),
            })
            .build()
            .unwrap();
        client
            .send(Request::get("http://localhost/").unwrap(), Handler::text())
            .unwrap()
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct Item {
        id: u32,
    }

    #[test]
    fn test_decodes_every_body_representation() {
        let json = r#"{"id":3}"#;
        let expected = Item { id: 3 };

        assert_eq!(respond(200, Body::Text(json.into())).read_body::<Item>().unwrap(), expected);
        assert_eq!(
            respond(200, Body::Bytes(json.as_bytes().to_vec().into()))
                .read_body::<Item>()
                .unwrap(),
            expected
        );
        assert_eq!(
            respond(200, Body::Stream(crate::handler::BodyStream::new(std::io::Cursor::new(json))))
                .read_body::<Item>()
                .unwrap(),
            expected
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("item.json");
        std::fs::write(&path, json).unwrap();
        assert_eq!(respond(200, Body::File(path)).read_body::<Item>().unwrap(), expected);
    }

    #[test]
    fn test_lines_are_joined_without_separator() {
        let lines = vec![r#"{"id":"#.to_string(), "4".to_string(), "}".to_string()];
        let response = respond(200, Body::Lines(lines));
        assert_eq!(response.read_body::<Item>().unwrap(), Item { id: 4 });
    }

    #[test]
    fn test_empty_body_in_every_convention() {
        let response = respond(200, Body::Empty);
        assert!(matches!(response.read_body::<Item>(), Err(Error::EmptyBody)));
        assert!(matches!(response.try_read_body::<Item>(), Err(ReadError::EmptyBody)));
        assert!(response.read_body_opt::<Item>().is_none());
        assert!(response.read_body_option::<Item>().is_none());
        assert!(matches!(
            response.read_body_for_status::<Item>(200),
            Err(Error::EmptyBody)
        ));
    }

    #[test]
    fn test_status_mismatch_leaves_stream_untouched() {
        let response = respond(
            404,
            Body::Stream(crate::handler::BodyStream::new(std::io::Cursor::new(r#"{"id":9}"#))),
        );

        match response.try_read_body_for_status::<Item>(200) {
            Err(ReadError::StatusMismatch { expected, actual }) => {
                assert_eq!(expected, 200);
                assert_eq!(actual, StatusCode::NOT_FOUND);
            }
            other => panic!("expected StatusMismatch, got {other:?}"),
        }
        assert!(response.read_body_for_status_opt::<Item>(200).is_none());

        // The stream was not consumed by the gated attempts.
        assert_eq!(response.read_body_for_status::<Item>(404).unwrap(), Item { id: 9 });
    }

    #[test]
    fn test_opaque_body_is_unsupported() {
        let response = respond(200, Body::Opaque(Arc::new(5u8)));
        assert!(matches!(
            response.read_body::<Item>(),
            Err(Error::UnsupportedBodyType(_))
        ));
        assert!(matches!(
            response.try_read_body::<Item>(),
            Err(ReadError::UnsupportedBodyType(_))
        ));
    }

    #[test]
    fn test_decode_failure_keeps_codec_error() {
        let response = respond(200, Body::Text("not json".into()));
        match response.read_body::<Item>() {
            Err(Error::ReadBody { source }) => {
                assert!(source.downcast_ref::<serde_json::Error>().is_some());
            }
            other => panic!("expected ReadBody, got {other:?}"),
        }

        // The response stays usable with another target.
        assert!(response.read_body::<serde_json::Value>().is_err());
        assert!(response.read_body_opt::<Item>().is_none());
    }

    #[test]
    fn test_tri_state_treats_null_as_absent() {
        let response = respond(200, Body::Text("null".into()));
        assert!(response.read_body_option::<Item>().is_none());
        assert!(response.read_body_for_status_option::<Item>(200).is_none());
        assert!(response.read_body_opt::<serde_json::Value>().is_none());
        assert!(response.read_body_for_status_opt::<serde_json::Value>(200).is_none());
        assert_eq!(response.read_body::<Option<Item>>().unwrap(), None);

        let response = respond(200, Body::Text(r#"{"id":1}"#.into()));
        assert_eq!(response.read_body_option::<Item>(), Some(Item { id: 1 }));
    }

    #[test]
    fn test_missing_body_file_is_a_decode_failure() {
        let response = respond(200, Body::File("/nonexistent/encore/body.json".into()));
        match response.try_read_body::<Item>() {
            Err(ReadError::Decode(source)) => {
                assert!(source.downcast_ref::<std::io::Error>().is_some());
            }
            other => panic!("expected Decode, got {other:?}"),
        }
    }
}
