//! # contract: Interface to the remote record repositories
//!
//! This module defines a single trait ([`RepositoryClient`]) and the record
//! types written through it. Two logical collections are used by the
//! publisher: a long-form content collection (blog entries) and a short-form
//! feed collection (announcement posts).
//!
//! ## Interface & Extensibility
//! - Implement [`RepositoryClient`] for a concrete transport (XRPC over HTTP,
//!   local fixture store, test mock).
//! - The trait is agnostic of authentication: an implementor is handed to the
//!   publisher already bound to an [`Actor`].
//! - All failures surface as [`RepositoryError`]; the publisher decides how to
//!   isolate them.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, so `MockRepositoryClient` is
//!   available in tests and, with the `test-export-mocks` feature, to
//!   downstream crates.

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of the account records are written for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Human-readable handle, e.g. `alice.bsky.social`.
    pub handle: String,
    /// Stable identifier (DID) of the account.
    pub did: String,
}

/// Reference to a record created in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    /// `at://` URI of the created record.
    pub uri: String,
    /// Content hash of the record, when the repository reports one.
    #[serde(default)]
    pub cid: Option<String>,
}

impl RecordRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            cid: None,
        }
    }

    /// Record key: the final path segment of the URI.
    pub fn rkey(&self) -> &str {
        self.uri.rsplit('/').next().unwrap_or(&self.uri)
    }
}

/// Long-form entry written to the content collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentEntry {
    #[serde(rename = "$type")]
    pub record_type: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    pub theme: String,
    /// At most five classification tags.
    pub tags: Vec<String>,
}

/// Short-form post written to the feed collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPost {
    #[serde(rename = "$type")]
    pub record_type: String,
    /// Announcement text, at most 300 characters.
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "langs")]
    pub languages: Vec<String>,
}

/// A record ready to be submitted to a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Content(ContentEntry),
    Feed(FeedPost),
}

impl Record {
    /// The `$type` carried by the record.
    pub fn record_type(&self) -> &str {
        match self {
            Record::Content(entry) => &entry.record_type,
            Record::Feed(post) => &post.record_type,
        }
    }
}

/// Errors raised by repository clients.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("record rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Trait for creating records in a remote repository.
///
/// Implemented by the real XRPC client and by test mocks. Calls are awaited
/// one at a time by the publisher.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Create `record` in `collection`, returning a reference to it.
    async fn create_record(
        &self,
        collection: &str,
        record: Record,
    ) -> Result<RecordRef, RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rkey_is_last_uri_segment() {
        let r = RecordRef::new("at://did:plc:abc/com.whtwnd.blog.entry/3kxyz");
        assert_eq!(r.rkey(), "3kxyz");
    }

    #[test]
    fn feed_post_serializes_with_wire_names() {
        let post = Record::Feed(FeedPost {
            record_type: "app.bsky.feed.post".into(),
            text: "hi".into(),
            created_at: "2024-01-01T00:00:00.000Z".into(),
            languages: vec!["en".into()],
        });
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["$type"], "app.bsky.feed.post");
        assert_eq!(json["createdAt"], "2024-01-01T00:00:00.000Z");
        assert_eq!(json["langs"][0], "en");
    }
}
