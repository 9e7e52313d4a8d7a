//! Job execution: maps a job to its collaborator call.

use std::sync::Arc;

use maple_backend::{ArticleStore, LlmBackend};
use maple_core::{JobPayload, RequestId, ServerMessage};

use crate::error::ExecutionError;
use crate::queue::Job;

/// Runs jobs against the LLM provider and the article store.
pub struct JobExecutor {
    llm: Arc<dyn LlmBackend>,
    store: Arc<dyn ArticleStore>,
}

impl JobExecutor {
    pub fn new(llm: Arc<dyn LlmBackend>, store: Arc<dyn ArticleStore>) -> Self {
        Self { llm, store }
    }

    /// Execute one job and build the result frame for its requester.
    ///
    /// The caller holds the job's credential for the duration of the
    /// call. No retries happen here; a failed job is simply dropped and
    /// left to the requester's resubmission.
    pub async fn execute(&self, job: &Job) -> Result<ServerMessage, ExecutionError> {
        let credential = &job.credential;
        match &job.payload {
            JobPayload::Summarize { request_id, text } => {
                let text = self.summarize(request_id, text.as_deref(), job).await?;
                Ok(ServerMessage::SummarizeResult {
                    request_id: request_id.clone(),
                    text,
                })
            }
            JobPayload::NameTopic {
                request_id,
                keywords,
            } => {
                let name = self.llm.name_topic(keywords, credential).await?;
                Ok(ServerMessage::TopicNameResult {
                    request_id: request_id.clone(),
                    name,
                })
            }
            JobPayload::BulletSummarize {
                request_id,
                documents,
            } => {
                let bullets = self.llm.bullet_summarize(documents, credential).await?;
                Ok(ServerMessage::BulletSummaryResult {
                    request_id: request_id.clone(),
                    bullets,
                })
            }
        }
    }

    /// Summarize inline text, or the stored article when none is given.
    ///
    /// A stored article that already has a summary is answered without
    /// an LLM call. Fresh summaries of stored articles are written back;
    /// a failed write is logged but the summary is still returned.
    async fn summarize(
        &self,
        request_id: &RequestId,
        text: Option<&str>,
        job: &Job,
    ) -> Result<String, ExecutionError> {
        if let Some(text) = text {
            return Ok(self.llm.summarize(text, &job.credential).await?);
        }

        let mut article = self
            .store
            .article(request_id.as_str())
            .await?
            .ok_or_else(|| ExecutionError::ArticleNotFound(request_id.clone()))?;

        if article.has_summary() {
            tracing::debug!(request_id = %request_id, "Article already summarized");
            return Ok(article.chat_summary.unwrap_or_default());
        }
        if article.content.trim().is_empty() {
            return Err(ExecutionError::EmptyArticle(request_id.clone()));
        }

        let summary = self.llm.summarize(&article.content, &job.credential).await?;

        article.chat_summary = Some(summary.clone());
        match self.store.put_article(&article).await {
            Ok(()) => tracing::info!(
                request_id = %request_id,
                url = %article.url,
                "Updated chat summary for article",
            ),
            Err(e) => tracing::error!(
                request_id = %request_id,
                error = %e,
                "Failed to store chat summary",
            ),
        }

        Ok(summary)
    }
}
