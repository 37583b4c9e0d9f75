use crate::fetch::client::HttpClient;
use async_trait::async_trait;

/// Sends the configured API key as a query parameter on every request.
///
/// A URL that already carries `param_name` has it replaced, so endpoint
/// overrides in the config file may embed a key of their own without the
/// request ending up with two.
pub struct UrlParam<C> {
    pub inner: C,
    pub param_name: String,
    pub key: String,
}

impl<C> UrlParam<C> {
    pub fn new(inner: C, param_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            inner,
            param_name: param_name.into(),
            key: key.into(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for UrlParam<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let kept: Vec<(String, String)> = req
            .url()
            .query_pairs()
            .filter(|(name, _)| name != self.param_name.as_str())
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();
        req.url_mut()
            .query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(&self.param_name, &self.key);
        self.inner.execute(req).await
    }
}
