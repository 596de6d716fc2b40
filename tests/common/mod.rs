//! Test-double transport shared by the decorator tests.

#![allow(dead_code)]

use bytes::Bytes;
use encore::{Client, Handler, RawResponse, Request, Result, Transport};
use futures_util::future::{BoxFuture, FutureExt};
use http::StatusCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the recording transport answers with.
#[derive(Debug, Clone)]
pub enum Reply {
    /// The text of the request body, or nothing.
    Echo,
    /// A fixed body.
    Fixed(&'static str),
}

/// Answers every exchange from memory and records the identity of the request
/// and handler it was given.
pub struct Recording {
    status: StatusCode,
    reply: Reply,
    delay: Option<Duration>,
    seen: Mutex<Vec<(usize, usize)>>,
}

impl Recording {
    pub fn new(status: u16, reply: Reply) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            reply,
            delay: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Delays asynchronous answers.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Addresses of the `(request, handler)` pairs seen so far.
    pub fn seen(&self) -> Vec<(usize, usize)> {
        self.seen.lock().unwrap().clone()
    }

    fn answer(&self, request: &Request, handler: &Handler) -> Result<RawResponse> {
        self.seen.lock().unwrap().push((address(request), address(handler)));

        let content = match &self.reply {
            Reply::Echo => Bytes::from(request.body().as_text().unwrap_or_default().to_owned()),
            Reply::Fixed(text) => Bytes::from_static(text.as_bytes()),
        };
        let body = handler.materialize(content)?;
        Ok(RawResponse::new(self.status, request.uri().clone(), body))
    }
}

impl Transport for Recording {
    fn execute(&self, request: &Request, handler: &Handler) -> Result<RawResponse> {
        self.answer(request, handler)
    }

    fn execute_async(
        &self,
        request: Arc<Request>,
        handler: Arc<Handler>,
    ) -> BoxFuture<'static, Result<RawResponse>> {
        let result = self.answer(&request, &handler);
        let delay = self.delay;
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        }
        .boxed()
    }
}

pub fn address<T>(value: &T) -> usize {
    value as *const T as usize
}

/// A client over a shared recording transport.
pub fn client_over(transport: &Arc<Recording>) -> Client {
    Client::builder()
        .shared_transport(Arc::clone(transport) as Arc<dyn Transport>)
        .build()
        .unwrap()
}
