//! Cache tags: `(type, id)` pairs that partition the query store.

use std::fmt;

/// The only tag type this client provides.
pub const POSTS: &str = "Posts";

/// Id half of a tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagId {
    /// Collection-level partition (the list endpoint).
    List,
    /// A single resource.
    Id(String),
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagId::List => write!(f, "LIST"),
            TagId::Id(id) => write!(f, "{}", id),
        }
    }
}

/// A `(type, id)` pair identifying a cache partition.
///
/// Invalidating a tag marks every entry that provided a matching pair as stale.
///
/// # Example
///
/// ```
/// use posts_api_cache::Tag;
///
/// assert_eq!(Tag::list("Posts").to_string(), "Posts:LIST");
/// assert_eq!(Tag::id("Posts", "7").to_string(), "Posts:7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    pub kind: &'static str,
    pub id: TagId,
}

impl Tag {
    pub fn list(kind: &'static str) -> Self {
        Tag {
            kind,
            id: TagId::List,
        }
    }

    pub fn id(kind: &'static str, id: impl Into<String>) -> Self {
        Tag {
            kind,
            id: TagId::Id(id.into()),
        }
    }

    pub fn is_list(&self) -> bool {
        self.id == TagId::List
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Tags provided by a collection result: one per item plus the `LIST` tag.
pub fn collection_tags<'a, I>(kind: &'static str, ids: I) -> Vec<Tag>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tags: Vec<Tag> = ids.into_iter().map(|id| Tag::id(kind, id)).collect();
    tags.push(Tag::list(kind));
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_list_tag_is_distinct_from_id_tag() {
        // A post literally named "LIST" must not collide with the sentinel.
        assert_ne!(Tag::list(POSTS), Tag::id(POSTS, "LIST"));
        assert!(Tag::list(POSTS).is_list());
        assert!(!Tag::id(POSTS, "LIST").is_list());
    }

    #[test]
    fn test_collection_tags_example() {
        let tags = collection_tags(POSTS, ["1", "2"]);
        let rendered: Vec<String> = tags.iter().map(Tag::to_string).collect();
        assert_eq!(rendered, vec!["Posts:1", "Posts:2", "Posts:LIST"]);
    }

    #[test]
    fn test_collection_tags_empty() {
        assert_eq!(collection_tags(POSTS, []), vec![Tag::list(POSTS)]);
    }

    proptest! {
        #[test]
        fn prop_collection_has_one_tag_per_item_plus_list(
            ids in proptest::collection::hash_set("[a-z0-9]{1,8}", 0..32)
        ) {
            let tags = collection_tags(POSTS, ids.iter().map(String::as_str));
            prop_assert_eq!(tags.len(), ids.len() + 1);
            prop_assert_eq!(tags.iter().filter(|t| t.is_list()).count(), 1);
            for id in &ids {
                prop_assert!(tags.contains(&Tag::id(POSTS, id.clone())));
            }
        }
    }
}
