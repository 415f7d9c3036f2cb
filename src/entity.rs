//! Resources served by the API and how they map onto cache tags.

use crate::tag::{Tag, POSTS};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Trait for resources whose cached entries are tagged by id.
///
/// # Example
///
/// ```
/// use posts_api_cache::{Post, TaggedEntity};
///
/// let post: Post = serde_json::from_str(r#"{"id":"7","title":"hi"}"#).unwrap();
/// assert_eq!(post.tag().to_string(), "Posts:7");
/// ```
pub trait TaggedEntity: Send + Sync + Serialize + for<'de> Deserialize<'de> + Clone {
    /// Tag type shared by every resource of this kind (e.g. `"Posts"`).
    fn tag_type() -> &'static str;

    /// Server-assigned id.
    fn entity_id(&self) -> &str;

    /// Tag for this single resource.
    fn tag(&self) -> Tag {
        Tag::id(Self::tag_type(), self.entity_id())
    }
}

/// A blog post: a server-assigned id plus opaque content fields.
///
/// Content fields (title, description, ...) are kept as a JSON object and
/// sent back to the server untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Post {
    pub fn new(id: impl Into<String>) -> Self {
        Post {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Set a content field, builder style.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        if name != "id" {
            self.fields.insert(name.to_string(), value.into());
        }
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Drop the id, e.g. to re-submit the content as a new post.
    pub fn into_new(self) -> NewPost {
        NewPost {
            fields: self.fields,
        }
    }
}

impl TaggedEntity for Post {
    fn tag_type() -> &'static str {
        POSTS
    }

    fn entity_id(&self) -> &str {
        &self.id
    }
}

/// Body of a create request: a post without its id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl NewPost {
    pub fn new() -> Self {
        NewPost::default()
    }

    /// Set a content field. An `id` field is ignored; the server assigns it.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        if name != "id" {
            self.fields.insert(name.to_string(), value.into());
        }
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}
