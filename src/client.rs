//! Posts API client.

use crate::builder::PostApiClientBuilder;
use crate::config::{ClientConfig, InvalidationPolicy};
use crate::entity::{NewPost, Post, TaggedEntity};
use crate::error::{Error, Result};
use crate::key::QueryKey;
use crate::store::{FetchMode, Fetched, QueryStore};
use crate::subscription::{self, Fetcher, QuerySubscription};
use crate::tag::{collection_tags, Tag};
use crate::transport::BaseQuery;
use futures::FutureExt;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Endpoint name of the collection query.
pub const LIST_POSTS: &str = "listPosts";

/// Endpoint name of the single-post query.
pub const GET_POST: &str = "getPost";

const POSTS_PATH: &str = "posts";

/// CRUD client for `/posts` with a tag-invalidated response cache.
///
/// Reads go through the client's own [`QueryStore`]; writes invalidate the
/// tags they touch:
///
/// | Operation     | Request              | Tags                               |
/// |---------------|----------------------|------------------------------------|
/// | `list_posts`  | `GET /posts`         | provides `Posts:<id>`…, `Posts:LIST` |
/// | `get_post`    | `GET /posts/{id}`    | provides `Posts:<id>`              |
/// | `add_post`    | `POST /posts`        | invalidates `Posts:LIST` on success |
/// | `update_post` | `PUT /posts/{id}`    | invalidates `Posts:<id>` on success |
/// | `delete_post` | `DELETE /posts/{id}` | invalidates `Posts:<id>` per policy |
///
/// Cloning is cheap; clones share the same store.
///
/// # Example
///
/// ```no_run
/// # use posts_api_cache::{NewPost, PostApiClient, Result};
/// # async fn example() -> Result<()> {
/// let client = PostApiClient::builder("http://localhost:4000")
///     .with_token("ABC")
///     .build()?;
///
/// let posts = client.list_posts().await?;
/// let created = client.add_post(&NewPost::new().with("title", "Hello")).await?;
/// // The list was invalidated, this goes back to the network.
/// let posts = client.list_posts().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PostApiClient {
    transport: BaseQuery,
    store: QueryStore,
    config: Arc<ClientConfig>,
}

impl PostApiClient {
    pub(crate) fn from_parts(
        transport: BaseQuery,
        store: QueryStore,
        config: ClientConfig,
    ) -> Self {
        PostApiClient {
            transport,
            store,
            config: Arc::new(config),
        }
    }

    pub fn builder(base_url: impl Into<String>) -> PostApiClientBuilder {
        PostApiClientBuilder::new(ClientConfig::new(base_url))
    }

    /// Client configured from `POSTS_API_URL` and friends, with the token read
    /// from `POSTS_API_TOKEN` on every request.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the environment is incomplete
    pub fn from_env() -> Result<Self> {
        PostApiClientBuilder::new(ClientConfig::from_env()?).build()
    }

    pub fn list_key() -> QueryKey {
        QueryKey::unit(LIST_POSTS)
    }

    pub fn post_key(id: &str) -> QueryKey {
        QueryKey::new(GET_POST, id)
    }

    /// `GET /posts`.
    ///
    /// # Errors
    /// Transport, HTTP and decoding failures; the store is left untouched
    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        subscription::read(
            &self.store,
            &Self::list_key(),
            FetchMode::Cached,
            &self.list_fetcher(),
        )
        .await
    }

    /// `GET /posts/{id}`.
    pub async fn get_post(&self, id: &str) -> Result<Post> {
        subscription::read(
            &self.store,
            &Self::post_key(id),
            FetchMode::Cached,
            &self.post_fetcher(id),
        )
        .await
    }

    /// `POST /posts`. Invalidates `Posts:LIST` on success.
    ///
    /// # Errors
    /// `Error::ApplicationError` if the request cannot be built, otherwise
    /// transport, HTTP or decoding failures. Nothing is invalidated on error.
    pub async fn add_post(&self, body: &NewPost) -> Result<Post> {
        let result = self
            .mutate::<Post, _>(Method::POST, &[POSTS_PATH], body)
            .await
            .map_err(|e| describe("add_post", e));

        self.settle(
            "add_post",
            InvalidationPolicy::OnSuccess,
            result.is_ok(),
            &[Tag::list(Post::tag_type())],
        );
        result
    }

    /// `PUT /posts/{id}`. Invalidates `Posts:{id}` on success.
    pub async fn update_post(&self, id: &str, body: &Post) -> Result<Post> {
        let result = self
            .mutate::<Post, _>(Method::PUT, &[POSTS_PATH, id], body)
            .await
            .map_err(|e| describe("update_post", e));

        self.settle(
            "update_post",
            InvalidationPolicy::OnSuccess,
            result.is_ok(),
            &[Tag::id(Post::tag_type(), id)],
        );
        result
    }

    /// `DELETE /posts/{id}`.
    ///
    /// Invalidates `Posts:{id}` according to
    /// [`ClientConfig::delete_invalidation`]; with the default
    /// [`InvalidationPolicy::Always`] this happens even when the request fails.
    pub async fn delete_post(&self, id: &str) -> Result<()> {
        let result = self
            .transport
            .send(Method::DELETE, &[POSTS_PATH, id])
            .await
            .map(|_| ())
            .map_err(|e| describe("delete_post", e));

        self.settle(
            "delete_post",
            self.config.delete_invalidation,
            result.is_ok(),
            &[Tag::id(Post::tag_type(), id)],
        );
        result
    }

    /// Mount the collection query.
    pub fn subscribe_posts(&self) -> QuerySubscription<Vec<Post>> {
        QuerySubscription::new(self.store.clone(), Self::list_key(), self.list_fetcher())
    }

    /// Mount the single-post query.
    pub fn subscribe_post(&self, id: &str) -> QuerySubscription<Post> {
        QuerySubscription::new(self.store.clone(), Self::post_key(id), self.post_fetcher(id))
    }

    /// Mark every entry providing one of `tags` stale.
    pub fn invalidate_tags(&self, tags: &[Tag]) -> usize {
        self.store.invalidate_tags(tags)
    }

    /// Drop every cached entry.
    pub fn reset(&self) {
        self.store.reset();
    }

    pub fn store(&self) -> &QueryStore {
        &self.store
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn list_fetcher(&self) -> Fetcher {
        collection_fetcher::<Post>(self.transport.clone(), LIST_POSTS)
    }

    fn post_fetcher(&self, id: &str) -> Fetcher {
        resource_fetcher::<Post>(self.transport.clone(), id.to_string(), GET_POST)
    }

    async fn mutate<T, B>(&self, method: Method, segments: &[&str], body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: serde::Serialize,
    {
        let bytes = self.transport.send_json(method, segments, body).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::DeserializationError(format!("{}: {}", segments.join("/"), e)))
    }

    fn settle(&self, operation: &str, policy: InvalidationPolicy, succeeded: bool, tags: &[Tag]) {
        if succeeded || policy == InvalidationPolicy::Always {
            let affected = self.store.invalidate_tags(tags);
            debug!(
                "{} invalidated {} entries (succeeded: {})",
                operation, affected, succeeded
            );
        } else {
            debug!("{} failed, nothing invalidated", operation);
        }
    }
}

/// Prefix transport-independent failures with the operation that raised them.
fn describe(operation: &str, error: Error) -> Error {
    match error {
        Error::ApplicationError(message) => {
            Error::ApplicationError(format!("{} failed: {}", operation, message))
        }
        Error::DeserializationError(message) => {
            Error::DeserializationError(format!("{} response: {}", operation, message))
        }
        other => other,
    }
}

/// Fetcher for a collection endpoint: provides one tag per item plus `LIST`.
fn collection_fetcher<T: TaggedEntity + 'static>(
    transport: BaseQuery,
    endpoint: &'static str,
) -> Fetcher {
    Arc::new(move || {
        let transport = transport.clone();
        async move {
            let body = transport.send(Method::GET, &[POSTS_PATH]).await?;
            let items: Vec<T> = serde_json::from_slice(&body)
                .map_err(|e| Error::DeserializationError(format!("{}: {}", endpoint, e)))?;
            let tags = collection_tags(T::tag_type(), items.iter().map(|item| item.entity_id()));
            Ok(Fetched::new(body, tags))
        }
        .boxed()
    })
}

/// Fetcher for a single-resource endpoint: provides the resource's own tag.
fn resource_fetcher<T: TaggedEntity + 'static>(
    transport: BaseQuery,
    id: String,
    endpoint: &'static str,
) -> Fetcher {
    Arc::new(move || {
        let transport = transport.clone();
        let id = id.clone();
        async move {
            let body = transport.send(Method::GET, &[POSTS_PATH, id.as_str()]).await?;
            let item: T = serde_json::from_slice(&body)
                .map_err(|e| Error::DeserializationError(format!("{}: {}", endpoint, e)))?;
            let mut tags = vec![Tag::id(T::tag_type(), id.as_str())];
            if item.entity_id() != id {
                tags.push(item.tag());
            }
            Ok(Fetched::new(body, tags))
        }
        .boxed()
    })
}
