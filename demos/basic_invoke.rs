//! Basic example demonstrating operation registration and invocation.
//!
//! This example shows how to:
//! - Declare an API surface as operation descriptors
//! - Register typed definitions for schema mapping
//! - Invoke operations by id with a parameter bag
//! - Access response data and metadata
//!
//! Run with: `cargo run --example basic_invoke`

use http::Method;
use parlance::{
    CallContext, Client, Error, OperationDescriptor, ParamLocation, ResponseDescriptor, SchemaRef,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("parlance=debug,basic_invoke=info")
        .init();

    // Declare the surface. A generated SDK would emit these descriptors.
    let get_post = OperationDescriptor::new("getPost", Method::GET, "/posts/{id}")
        .with_param("id", ParamLocation::Path)
        .with_response(
            200,
            ResponseDescriptor::new().with_schema(SchemaRef::Named("Post".to_string())),
        )
        .with_response(404, ResponseDescriptor::new().with_description("Post not found"));

    let create_post = OperationDescriptor::new("createPost", Method::POST, "/posts")
        .with_response(
            201,
            ResponseDescriptor::new().with_schema(SchemaRef::Named("Post".to_string())),
        );

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .operation(get_post)
        .operation(create_post)
        .definition::<Post>("Post")
        .build()?;

    println!("=== Invoking getPost ===");
    let envelope = client
        .invoke("getPost", CallContext::new().param("id", 1))
        .await?;

    let post: Post = envelope.json()?;
    println!("Post ID: {}", post.id);
    println!("Title: {}", post.title);
    println!("Latency: {:?}", envelope.latency);
    println!("Status code: {}", envelope.status);
    println!();

    println!("=== Invoking createPost ===");
    let envelope = client
        .invoke(
            "createPost",
            CallContext::new().body(serde_json::json!({
                "title": "My New Post",
                "body": "This is the content of my new post!",
                "userId": 1,
            })),
        )
        .await?;

    println!("Status code: {}", envelope.status);
    println!("Content-Type: {:?}", envelope.header("content-type"));
    println!("Was retried: {}", envelope.was_retried());

    Ok(())
}
