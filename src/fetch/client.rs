use async_trait::async_trait;
use reqwest::{Request, Response};

/// The transport every upstream request goes through. Wrappers such as
/// [`UrlParam`](super::auth::UrlParam) decorate an inner client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
