//! # Encore - replayable, status-aware HTTP responses
//!
//! Encore is a thin layer over an HTTP transport. It sends a request, keeps the
//! request and the body handler that produced the response, and hands back a
//! [`Response`] decorator that can decode its body through a pluggable
//! [`Codec`] and replay the very same exchange.
//!
//! ## Quick Start
//!
//! ```no_run
//! use encore::{Client, Handler, Request};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//!     email: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), encore::Error> {
//!     let client = Client::new()?;
//!
//!     let payload = client.serialized_body(Some(&CreateUser {
//!         name: "Alice".to_string(),
//!         email: "alice@example.com".to_string(),
//!     }))?;
//!     let request = Request::post("https://api.example.com/users", payload)?;
//!
//!     let response = client.send_async(request, Handler::text()).await?;
//!     response.on_ko(|| eprintln!("creation failed with {}", response.status()));
//!
//!     let user: User = response.read_body_for_status(201)?;
//!     println!("Created {} with id {} in {:?}", user.name, user.id, response.latency());
//!     Ok(())
//! }
//! ```
//!
//! ## Four ways to send
//!
//! * [`Client::send`] blocks the calling thread;
//! * [`Client::try_send`] blocks too, but turns a panicking transport into
//!   [`Error::Interrupted`];
//! * [`Client::send_async`] returns a cancellable [`PendingResponse`] whose
//!   failures are wrapped in [`Error::AsyncCompletion`];
//! * [`Client::send_deferred`] returns a composable [`Deferred`] that reports
//!   the unwrapped cause.
//!
//! Every [`Response`] offers the same four styles for replaying itself
//! ([`Response::retry`] and friends).
//!
//! ## Four ways to decode
//!
//! ```no_run
//! use encore::{Client, Error, Handler, ReadError, Request};
//!
//! # fn example() -> Result<(), Error> {
//! # let client = Client::new()?;
//! let response = client.send(Request::get("https://api.example.com/config")?, Handler::text())?;
//!
//! // Raise.
//! let config: serde_json::Value = response.read_body()?;
//!
//! // Result object.
//! match response.try_read_body_for_status::<serde_json::Value>(200) {
//!     Ok(config) => println!("{config}"),
//!     Err(ReadError::StatusMismatch { actual, .. }) => eprintln!("unexpected {actual}"),
//!     Err(e) => eprintln!("unreadable body: {e}"),
//! }
//!
//! // Optional: failures and a `null` document both give `None`.
//! let maybe: Option<serde_json::Value> = response.read_body_option();
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events and installs no subscriber.

pub mod body;
mod client;
pub mod codec;
mod decode;
mod error;
pub mod handler;
mod pending;
mod request;
mod response;
pub mod transport;

pub use body::BodyPayload;
pub use client::{Client, ClientBuilder};
pub use codec::{Codec, JsonCodec};
pub use error::{BoxError, Error, ReadError, Result};
pub use handler::{Body, Handler};
pub use pending::{Deferred, Pending, PendingResponse};
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use transport::{RawResponse, Transport};
