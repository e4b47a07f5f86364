use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{FeedPage, FeedQuery, FetchError, ForumQuery, RemoteSource};
use crate::channel::ChannelKind;
use crate::config::Config;
use crate::constants::CLIENT_USER_AGENT;
use crate::models::{posts_from_values, Post};

/// `RemoteSource` talking JSON over HTTP to the posts API.
#[derive(Debug, Clone)]
pub struct HttpSource {
    http: reqwest::Client,
    api_url: String,
}

impl HttpSource {
    /// Create a client for the API configured in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        Self::with_timeout(&config.api_url, config.http_timeout)
    }

    /// Create a client for `api_url` with a request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(api_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(CLIENT_USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, kind: ChannelKind, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.api_url,
            kind.as_str(),
            urlencoding::encode(name)
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, FetchError> {
        debug!(url = %url, ?query, "Fetching posts");

        let response = self
            .http
            .get(url)
            .query(query)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn fetch_forum(&self, forum: &str, query: &ForumQuery) -> Result<Vec<Post>, FetchError> {
        let url = self.endpoint(ChannelKind::RangeScan, forum);
        let entries: Vec<serde_json::Value> = self.get_json(&url, &query.query_pairs()).await?;
        Ok(posts_from_values(entries))
    }

    async fn fetch_feed(&self, feed: &str, query: &FeedQuery) -> Result<FeedPage, FetchError> {
        let url = self.endpoint(ChannelKind::TokenScan, feed);
        self.get_json(&url, &query.query_pairs()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_names() {
        let source =
            HttpSource::with_timeout("https://example.com/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            source.endpoint(ChannelKind::RangeScan, "World News"),
            "https://example.com/api/forum/World%20News"
        );
        assert_eq!(
            source.endpoint(ChannelKind::TokenScan, "Home"),
            "https://example.com/api/feed/Home"
        );
    }
}
