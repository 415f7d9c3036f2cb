//! # posts-api-cache
//!
//! Async client for a `/posts` REST API with a client-side, tag-invalidated
//! response cache.
//!
//! ## Features
//!
//! - **Tagged reads:** list results provide one `Posts:<id>` tag per post plus
//!   `Posts:LIST`; single-post reads provide their own `Posts:<id>` tag
//! - **Declarative invalidation:** create invalidates `LIST`, update and
//!   delete invalidate the post's id
//! - **Request de-duplication:** concurrent reads of the same key share one
//!   in-flight request
//! - **Idle eviction:** entries without subscribers are dropped after a
//!   configurable window (10 seconds by default)
//! - **Injectable credentials:** bearer token supplied per request by a
//!   [`CredentialProvider`]
//! - **Owned state:** every client owns its own [`QueryStore`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use posts_api_cache::{NewPost, PostApiClient};
//!
//! # async fn example() -> posts_api_cache::Result<()> {
//! let client = PostApiClient::builder("http://localhost:4000")
//!     .with_token("ABC")
//!     .build()?;
//!
//! let posts = client.list_posts().await?; // network
//! let posts = client.list_posts().await?; // cache
//!
//! client.add_post(&NewPost::new().with("title", "Hello")).await?;
//! let posts = client.list_posts().await?; // network again, LIST was invalidated
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod builder;
pub mod client;
pub mod config;
pub mod credentials;
pub mod entity;
pub mod error;
pub mod key;
pub mod observability;
pub mod store;
pub mod subscription;
pub mod tag;
pub mod transport;

// Re-exports for convenience
pub use builder::PostApiClientBuilder;
pub use client::PostApiClient;
pub use config::{ClientConfig, InvalidationPolicy};
pub use credentials::{CredentialProvider, EnvToken, StaticToken};
pub use entity::{NewPost, Post, TaggedEntity};
pub use error::{Error, Result};
pub use key::QueryKey;
pub use observability::{NoOpMetrics, StoreMetrics};
pub use store::{FetchMode, QueryStore};
pub use subscription::QuerySubscription;
pub use tag::{Tag, TagId, POSTS};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
