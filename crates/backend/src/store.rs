//! Article storage collaborator and the Maple backend REST client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// An article as stored by the Maple backend.
///
/// Only the fields the broker reads are typed; everything else is kept
/// in `extra` so a `PUT` never drops data the broker does not know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub uuid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_summary: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Article {
    /// Whether the article already carries a non-blank summary.
    pub fn has_summary(&self) -> bool {
        self.chat_summary
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

/// CRUD access to articles, as needed by summarize jobs and the
/// background sweep.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Fetch one article by uuid; `Ok(None)` if the backend has no such
    /// article.
    async fn article(&self, uuid: &str) -> Result<Option<Article>, BackendError>;

    /// Overwrite an article.
    async fn put_article(&self, article: &Article) -> Result<(), BackendError>;

    /// One page of articles; an empty page marks the end.
    async fn articles_page(&self, limit: u32, page: u32) -> Result<Vec<Article>, BackendError>;
}

/// HTTP client for the Maple backend (`{authority}/api/v1`).
pub struct MapleApi {
    client: reqwest::Client,
    base_url: String,
}

impl MapleApi {
    /// * `authority` - scheme and host, e.g. `http://backend:3000`.
    pub fn new(authority: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("{}/api/v1", authority.trim_end_matches('/')),
        }
    }

    fn article_url(&self) -> String {
        format!("{}/article", self.base_url)
    }
}

#[async_trait]
impl ArticleStore for MapleApi {
    async fn article(&self, uuid: &str) -> Result<Option<Article>, BackendError> {
        let response = self
            .client
            .get(self.article_url())
            .query(&[("uuid", uuid)])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = BackendError::ensure_success(response).await?;

        // The backend answers uuid lookups with a list.
        let mut articles: Vec<Article> = response.json().await?;
        Ok(if articles.is_empty() {
            None
        } else {
            Some(articles.swap_remove(0))
        })
    }

    async fn put_article(&self, article: &Article) -> Result<(), BackendError> {
        let response = self
            .client
            .put(self.article_url())
            .json(article)
            .send()
            .await?;

        BackendError::ensure_success(response).await?;
        tracing::debug!(uuid = %article.uuid, "Article updated on backend");
        Ok(())
    }

    async fn articles_page(&self, limit: u32, page: u32) -> Result<Vec<Article>, BackendError> {
        let response = self
            .client
            .get(self.article_url())
            .query(&[("limit", limit), ("page", page)])
            .send()
            .await?;

        let response = BackendError::ensure_success(response).await?;
        Ok(response.json().await?)
    }
}
