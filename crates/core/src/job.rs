//! Job identity, kinds, credentials and payloads.
//!
//! Everything the broker and the reliable-delivery client need to agree
//! on lives here: the closed set of [`JobKind`]s (which also fixes the
//! dispatch priority), the stable [`RequestId`] used for dedup and
//! result correlation, and the kind-specific [`JobPayload`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// JobKind
// ---------------------------------------------------------------------------

/// The closed set of work the broker knows how to execute.
///
/// Declaration order is dispatch priority: interactive summaries first,
/// bulk bullet summaries last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Summarize,
    NameTopic,
    BulletSummarize,
}

impl JobKind {
    /// All kinds, highest priority first.
    pub const ALL: [JobKind; 3] = [
        JobKind::Summarize,
        JobKind::NameTopic,
        JobKind::BulletSummarize,
    ];

    /// Dispatch rank; lower runs first.
    pub fn priority(self) -> usize {
        match self {
            JobKind::Summarize => 0,
            JobKind::NameTopic => 1,
            JobKind::BulletSummarize => 2,
        }
    }

    /// Whether queued jobs of this kind outlive the session that
    /// submitted them.
    ///
    /// Summaries are written back to the article store, so finishing
    /// them is useful even when nobody is waiting for the reply.
    pub fn survives_disconnect(self) -> bool {
        match self {
            JobKind::Summarize => true,
            JobKind::NameTopic | JobKind::BulletSummarize => false,
        }
    }

    /// Kinds that [`survives_disconnect`](Self::survives_disconnect).
    pub fn disconnect_survivors() -> Vec<JobKind> {
        Self::ALL
            .into_iter()
            .filter(|kind| kind.survives_disconnect())
            .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Summarize => "summarize",
            JobKind::NameTopic => "name_topic",
            JobKind::BulletSummarize => "bullet_summarize",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// Stable, caller-chosen identifier of a request (an article or topic
/// uuid in practice).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Dedup and correlation key shared by the job queue and the client's
/// pending table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobIdentity {
    pub request_id: RequestId,
    pub kind: JobKind,
}

impl JobIdentity {
    pub fn new(request_id: RequestId, kind: JobKind) -> Self {
        Self { request_id, kind }
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.request_id)
    }
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// Number of leading characters kept when a credential is logged.
const FINGERPRINT_PREFIX_LEN: usize = 6;

/// An external LLM API key.
///
/// `Debug` and `Display` only ever print a short fingerprint so keys can
/// be used as structured log fields.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for the collaborator call itself.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn fingerprint(&self) -> String {
        let prefix: String = self.0.chars().take(FINGERPRINT_PREFIX_LEN).collect();
        format!("{prefix}***")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

// ---------------------------------------------------------------------------
// JobPayload
// ---------------------------------------------------------------------------

/// Kind-specific job data. Every variant carries its [`RequestId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// Summarize an article. When `text` is absent the article content
    /// is fetched from the backend store by `request_id`.
    Summarize {
        request_id: RequestId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// Produce a short label for a topic from its keywords.
    NameTopic {
        request_id: RequestId,
        keywords: Vec<String>,
    },
    /// Produce bullet points from a topic's representative documents.
    BulletSummarize {
        request_id: RequestId,
        documents: Vec<String>,
    },
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::Summarize { .. } => JobKind::Summarize,
            JobPayload::NameTopic { .. } => JobKind::NameTopic,
            JobPayload::BulletSummarize { .. } => JobKind::BulletSummarize,
        }
    }

    pub fn request_id(&self) -> &RequestId {
        match self {
            JobPayload::Summarize { request_id, .. }
            | JobPayload::NameTopic { request_id, .. }
            | JobPayload::BulletSummarize { request_id, .. } => request_id,
        }
    }

    pub fn identity(&self) -> JobIdentity {
        JobIdentity::new(self.request_id().clone(), self.kind())
    }

    /// Whether executing this payload writes its result to the article
    /// store. Only stored-article summaries do; inline text is answered
    /// to the requester alone.
    pub fn persists_result(&self) -> bool {
        matches!(self, JobPayload::Summarize { text: None, .. })
    }

    /// Reject payloads the broker could never execute.
    ///
    /// Rules:
    /// - `request_id` must not be blank.
    /// - `NameTopic` needs at least one non-blank keyword.
    /// - `BulletSummarize` needs at least one document.
    /// - An explicit `Summarize` text must not be blank.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.request_id().as_str().trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "{} request is missing request_id",
                self.kind()
            )));
        }
        match self {
            JobPayload::Summarize { text: Some(text), .. } if text.trim().is_empty() => Err(
                CoreError::Validation("summarize text must not be blank".to_string()),
            ),
            JobPayload::Summarize { .. } => Ok(()),
            JobPayload::NameTopic { keywords, .. } => {
                if keywords.iter().all(|k| k.trim().is_empty()) {
                    return Err(CoreError::Validation(
                        "topic name request needs at least one keyword".to_string(),
                    ));
                }
                Ok(())
            }
            JobPayload::BulletSummarize { documents, .. } => {
                if documents.is_empty() {
                    return Err(CoreError::Validation(
                        "bullet summary request needs at least one document".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn priority_follows_declaration_order() {
        let mut kinds = vec![
            JobKind::BulletSummarize,
            JobKind::Summarize,
            JobKind::NameTopic,
        ];
        kinds.sort_by_key(|k| k.priority());
        assert_eq!(kinds, JobKind::ALL.to_vec());
    }

    #[test]
    fn only_summaries_survive_disconnect() {
        assert_eq!(JobKind::disconnect_survivors(), vec![JobKind::Summarize]);
    }

    #[test]
    fn only_stored_article_summaries_persist() {
        let stored = JobPayload::Summarize {
            request_id: "a-1".into(),
            text: None,
        };
        let inline = JobPayload::Summarize {
            request_id: "a-1".into(),
            text: Some("body".into()),
        };
        let topic = JobPayload::NameTopic {
            request_id: "t-1".into(),
            keywords: vec!["road".into()],
        };

        assert!(stored.persists_result());
        assert!(!inline.persists_result());
        assert!(!topic.persists_result());
    }

    #[test]
    fn credential_debug_hides_key() {
        let key = Credential::new("sk-abcdefghijklmnop");
        let printed = format!("{key:?} {key}");
        assert!(!printed.contains("ghijklmnop"));
        assert!(printed.contains("sk-abc***"));
    }

    #[test]
    fn credential_serializes_as_plain_string() {
        let key = Credential::new("k1");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"k1\"");
    }

    #[test]
    fn identity_combines_request_and_kind() {
        let payload = JobPayload::NameTopic {
            request_id: "t-1".into(),
            keywords: vec!["road".into()],
        };
        assert_eq!(
            payload.identity(),
            JobIdentity::new("t-1".into(), JobKind::NameTopic)
        );
        assert_eq!(payload.identity().to_string(), "name_topic/t-1");
    }

    #[test]
    fn blank_request_id_is_rejected() {
        let payload = JobPayload::Summarize {
            request_id: "  ".into(),
            text: None,
        };
        assert_matches!(payload.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn name_topic_needs_keywords() {
        let payload = JobPayload::NameTopic {
            request_id: "t-1".into(),
            keywords: vec![" ".into()],
        };
        assert_matches!(payload.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn bullet_summary_needs_documents() {
        let payload = JobPayload::BulletSummarize {
            request_id: "t-1".into(),
            documents: vec![],
        };
        assert_matches!(payload.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn summarize_without_text_is_valid() {
        let payload = JobPayload::Summarize {
            request_id: "a-1".into(),
            text: None,
        };
        assert!(payload.validate().is_ok());
    }
}
