//! The TTC service alerts account on Bluesky, read through the public
//! `app.bsky.feed.getAuthorFeed` endpoint.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorFeed {
    #[serde(default)]
    pub feed: Vec<FeedItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedItem {
    pub post: Post,
    /// Present when the item is a repost of someone else's post.
    #[serde(default)]
    pub reason: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub uri: String,
    pub record: PostRecord,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(default)]
    pub text: String,
    pub created_at: Option<String>,
}
