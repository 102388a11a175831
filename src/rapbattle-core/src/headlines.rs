//! Topic prefill from a news headline endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::NewsConfig;
use crate::error::DebateError;

/// Read-through source for a single suggested topic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HeadlineSource: Send + Sync {
    async fn top_headline(&self) -> Result<Option<String>, DebateError>;
}

#[derive(Debug, Deserialize)]
struct HeadlinesResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
}

/// Client for a newsapi-style JSON endpoint.
pub struct HttpHeadlineClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpHeadlineClient {
    pub fn new(endpoint: &str, api_key: &str) -> Result<Self, DebateError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| DebateError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &NewsConfig) -> Result<Self, DebateError> {
        Self::new(&config.endpoint, &config.api_key)
    }
}

#[async_trait]
impl HeadlineSource for HttpHeadlineClient {
    async fn top_headline(&self) -> Result<Option<String>, DebateError> {
        let response = self
            .http
            .get(&self.endpoint)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| DebateError::Transient(format!("headline request failed: {}", e)))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(DebateError::Transient(format!(
                "headline endpoint returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(DebateError::Permanent(format!(
                "headline endpoint rejected request: {}",
                status
            )));
        }

        let body: HeadlinesResponse = response
            .json()
            .await
            .map_err(|e| DebateError::Permanent(format!("unexpected headline payload: {}", e)))?;

        Ok(body.articles.into_iter().find_map(|a| a.title))
    }
}

/// Source used when no news endpoint is configured.
pub struct NoHeadlines;

#[async_trait]
impl HeadlineSource for NoHeadlines {
    async fn top_headline(&self) -> Result<Option<String>, DebateError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_headlines_returns_none() {
        assert!(NoHeadlines.top_headline().await.unwrap().is_none());
    }

    #[test]
    fn test_headline_payload_shape() {
        let body: HeadlinesResponse =
            serde_json::from_str(r#"{"articles":[{"title":"AI wins again"},{"title":"other"}]}"#)
                .unwrap();
        assert_eq!(body.articles[0].title.as_deref(), Some("AI wins again"));
    }

    #[test]
    fn test_headline_payload_tolerates_missing_articles() {
        let body: HeadlinesResponse = serde_json::from_str("{}").unwrap();
        assert!(body.articles.is_empty());
    }
}
