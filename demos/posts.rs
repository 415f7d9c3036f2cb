//! Walk through the cache behavior against a running posts API.
//!
//! ```text
//! POSTS_API_URL=http://localhost:4000 POSTS_API_TOKEN=ABC cargo run --example posts
//! ```

use posts_api_cache::{error::Result, NewPost, PostApiClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== Posts API Cache - Example ===\n");

    let client = PostApiClient::from_env()?;
    println!("1. Client ready for {}\n", client.config().base_url);

    println!("2. First list request (network):");
    let posts = client.list_posts().await?;
    println!("   ✓ {} posts loaded\n", posts.len());

    println!("3. Second list request (cache):");
    let posts = client.list_posts().await?;
    let tags = client
        .store()
        .provided_tags(&PostApiClient::list_key())
        .unwrap_or_default();
    println!("   ✓ {} posts, {} tags cached\n", posts.len(), tags.len());

    println!("4. Creating a post invalidates Posts:LIST:");
    let created = client
        .add_post(&NewPost::new().with("title", "Hello from Rust"))
        .await?;
    println!("   ✓ Created post {}", created.id);
    let posts = client.list_posts().await?;
    println!("   ✓ List refetched: {} posts\n", posts.len());

    println!("5. Updating the post invalidates its own tag:");
    let edited = created.clone().with("title", "Hello again");
    client.update_post(&created.id, &edited).await?;
    let fetched = client.get_post(&created.id).await?;
    println!("   ✓ {:?}\n", fetched.field("title"));

    println!("6. Deleting the post:");
    client.delete_post(&created.id).await?;
    println!("   ✓ Deleted {}\n", created.id);

    println!("=== Example Complete ===\n");

    Ok(())
}
