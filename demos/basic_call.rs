//! Basic example demonstrating blocking GET and POST requests.
//!
//! This example shows how to:
//! - Create a client with the default transport and codec
//! - Send requests on the calling thread
//! - Decode bodies with and without a status check
//! - Use status combinators and replay a request
//!
//! Run with: `cargo run --example basic_call`

use encore::{Client, Error, Handler, Request};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

const API: &str = "https://jsonplaceholder.typicode.com";

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("encore=debug,basic_call=info")
        .init();

    let client = Client::new()?;

    println!("=== GET Request Example ===");
    let response = client.send(Request::get(format!("{API}/posts/1"))?, Handler::text())?;
    let post: Post = response.read_body_for_status(200)?;

    println!("Post ID: {}", post.id);
    println!("Title: {}", post.title);
    println!("Request latency: {:?}", response.latency());
    println!("Status code: {}", response.status());
    println!();

    println!("=== POST Request Example ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };
    let payload = client.serialized_body(Some(&new_post))?;
    let response = client.send(Request::post(format!("{API}/posts"), payload)?, Handler::bytes())?;

    response
        .on_2xx(|| println!("Created!"))
        .on_ko(|| println!("Creation failed with {}", response.status()));

    if let Some(created) = response.read_body_opt::<Post>() {
        println!("Created post ID: {}", created.id);
    }
    println!();

    println!("=== Replaying a Request ===");
    let again = response.retry()?;
    println!("Replayed {} {} -> {}", again.request().method(), again.uri(), again.status());
    println!("Content-Type: {:?}", again.header("content-type"));

    Ok(())
}
