use crate::utils::error::Result;
use async_trait::async_trait;

/// Where the upstream feed text comes from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Retrieves the feed and returns it decoded to text.
    async fn fetch(&self) -> Result<String>;
}
