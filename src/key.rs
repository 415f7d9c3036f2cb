//! Cache key for query entries.

use std::fmt;

/// Identifies one entry in the query store: endpoint name plus its argument.
///
/// Format: `"{endpoint}:{arg}"`, with an empty argument for argument-less
/// queries (`"listPosts:"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    endpoint: &'static str,
    arg: String,
}

impl QueryKey {
    pub fn new(endpoint: &'static str, arg: impl Into<String>) -> Self {
        QueryKey {
            endpoint,
            arg: arg.into(),
        }
    }

    /// Key for a query that takes no argument.
    pub fn unit(endpoint: &'static str) -> Self {
        QueryKey::new(endpoint, String::new())
    }

    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }

    pub fn arg(&self) -> &str {
        &self.arg
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.endpoint, self.arg)
    }
}
