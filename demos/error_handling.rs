//! Example demonstrating error handling across the four decoding styles.
//!
//! This example shows how to:
//! - Tell HTTP errors apart from transport failures
//! - Decode with a status check and inspect mismatches
//! - Choose between raising, result-object and optional decoding
//! - Unwrap asynchronous failures and cancel a pending exchange
//!
//! Run with: `cargo run --example error_handling`

use encore::{Client, Error, Handler, ReadError, Request};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    id: u32,
    title: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("encore=info")
        .init();

    let client = Client::new()?;
    let api = "https://jsonplaceholder.typicode.com";

    println!("=== Example 1: Status-Gated Decoding ===");
    let request = Request::get(format!("{api}/posts/999999"))?;
    let response = client.send_async(request, Handler::text()).await?;

    match response.read_body_for_status::<Post>(200) {
        Ok(post) => println!("Success: {:?}", post),
        Err(Error::StatusMismatch { expected, actual }) => {
            println!("Expected {} but got {}", expected, actual);
            println!("  Is client error (4xx): {}", response.is_4xx());
            println!("  Raw body: {:?}", response.body().as_text());
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 2: Result Objects ===");
    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct WrongSchema {
        nonexistent_field: String,
    }

    let request = Request::get(format!("{api}/posts/1"))?;
    let response = client.send_async(request, Handler::text()).await?;

    match response.try_read_body::<WrongSchema>() {
        Ok(_) => println!("Unexpected success"),
        Err(ReadError::Decode(source)) => println!("Body did not match: {}", source),
        Err(other) => println!("Could not read body: {}", other),
    }

    // The response is still usable with another target.
    let post: Option<Post> = response.read_body_option();
    println!("Decoded as Post instead: {:?}", post);
    println!();

    println!("=== Example 3: Network Errors ===");
    let request = Request::get("https://this-domain-does-not-exist-12345.invalid/")?;
    match client.send_async(request, Handler::text()).await {
        Ok(_) => println!("Unexpected success"),
        Err(e) => {
            println!("Wrapped: {}", e);
            println!("  Root cause: {}", e.root_cause());
            println!("  I/O failure: {}", e.is_io_failure());
        }
    }

    let request = Request::get("https://this-domain-does-not-exist-12345.invalid/")?;
    let outcome = client
        .send_deferred(request, Handler::text())
        .map(|response| response.status_code())
        .recover(|e| {
            println!("Deferred failure is not wrapped: {}", e);
            Ok(0)
        })
        .await?;
    println!("Outcome: {}", outcome);
    println!();

    println!("=== Example 4: Cancellation ===");
    let pending = client.send_async(Request::get(format!("{api}/posts"))?, Handler::discarding());
    pending.cancel();
    match pending.await {
        Ok(response) => println!("Completed before cancellation: {}", response.status()),
        Err(e) if e.is_interrupted() => println!("Cancelled: {}", e.root_cause()),
        Err(e) => println!("Other error: {}", e),
    }

    Ok(())
}
