//! Wire messages exchanged over the broker WebSocket.
//!
//! Every frame is a JSON text message of the shape
//! `{"type": "<kind>", "data": {...}}`. Requesters send
//! [`ClientMessage`]s; the broker answers with [`ServerMessage`]s.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job::{Credential, JobIdentity, JobKind, JobPayload, RequestId};

/// Requests a client may submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Summarize an article, addressed by its uuid.
    SubmitSummarize {
        credential: Credential,
        request_id: RequestId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },

    /// Label a topic from its keywords.
    SubmitTopicName {
        credential: Credential,
        request_id: RequestId,
        keywords: Vec<String>,
    },

    /// Bullet-summarize a topic's representative documents.
    SubmitBulletSummary {
        credential: Credential,
        request_id: RequestId,
        documents: Vec<String>,
    },
}

impl ClientMessage {
    /// Build the submission frame for a payload.
    pub fn submit(credential: Credential, payload: JobPayload) -> Self {
        match payload {
            JobPayload::Summarize { request_id, text } => ClientMessage::SubmitSummarize {
                credential,
                request_id,
                text,
            },
            JobPayload::NameTopic {
                request_id,
                keywords,
            } => ClientMessage::SubmitTopicName {
                credential,
                request_id,
                keywords,
            },
            JobPayload::BulletSummarize {
                request_id,
                documents,
            } => ClientMessage::SubmitBulletSummary {
                credential,
                request_id,
                documents,
            },
        }
    }

    /// Split into credential and payload, validating both.
    pub fn into_submission(self) -> Result<(Credential, JobPayload), CoreError> {
        let (credential, payload) = match self {
            ClientMessage::SubmitSummarize {
                credential,
                request_id,
                text,
            } => (credential, JobPayload::Summarize { request_id, text }),
            ClientMessage::SubmitTopicName {
                credential,
                request_id,
                keywords,
            } => (
                credential,
                JobPayload::NameTopic {
                    request_id,
                    keywords,
                },
            ),
            ClientMessage::SubmitBulletSummary {
                credential,
                request_id,
                documents,
            } => (
                credential,
                JobPayload::BulletSummarize {
                    request_id,
                    documents,
                },
            ),
        };

        if credential.is_empty() {
            return Err(CoreError::Validation(format!(
                "{} request {} is missing credential",
                payload.kind(),
                payload.request_id()
            )));
        }
        payload.validate()?;
        Ok((credential, payload))
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string(self).expect("ClientMessage is always serialisable")
    }
}

/// Results the broker routes back to the submitting session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    SummarizeResult { request_id: RequestId, text: String },
    TopicNameResult { request_id: RequestId, name: String },
    BulletSummaryResult {
        request_id: RequestId,
        bullets: Vec<String>,
    },
}

impl ServerMessage {
    pub fn kind(&self) -> JobKind {
        match self {
            ServerMessage::SummarizeResult { .. } => JobKind::Summarize,
            ServerMessage::TopicNameResult { .. } => JobKind::NameTopic,
            ServerMessage::BulletSummaryResult { .. } => JobKind::BulletSummarize,
        }
    }

    pub fn request_id(&self) -> &RequestId {
        match self {
            ServerMessage::SummarizeResult { request_id, .. }
            | ServerMessage::TopicNameResult { request_id, .. }
            | ServerMessage::BulletSummaryResult { request_id, .. } => request_id,
        }
    }

    /// The acknowledgement key this result settles.
    pub fn identity(&self) -> JobIdentity {
        JobIdentity::new(self.request_id().clone(), self.kind())
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string(self).expect("ServerMessage is always serialisable")
    }
}

/// Parse an inbound client frame.
///
/// Malformed JSON, unknown `type` values and missing fields all surface
/// as [`CoreError::Validation`].
pub fn parse_client_message(text: &str) -> Result<ClientMessage, CoreError> {
    serde_json::from_str(text).map_err(|e| CoreError::Validation(format!("malformed request: {e}")))
}

/// Parse an inbound broker frame.
pub fn parse_server_message(text: &str) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_topic_name_submission() {
        let json = r#"{"type":"submit_topic_name","data":{"credential":"k1","request_id":"t-1","keywords":["road","city"]}}"#;
        let msg = parse_client_message(json).unwrap();
        let (credential, payload) = msg.into_submission().unwrap();
        assert_eq!(credential.expose(), "k1");
        assert_eq!(
            payload,
            JobPayload::NameTopic {
                request_id: "t-1".into(),
                keywords: vec!["road".into(), "city".into()],
            }
        );
    }

    #[test]
    fn parse_summarize_submission_without_text() {
        let json = r#"{"type":"submit_summarize","data":{"credential":"k1","request_id":"a-9"}}"#;
        let (_, payload) = parse_client_message(json)
            .unwrap()
            .into_submission()
            .unwrap();
        assert_eq!(payload.kind(), JobKind::Summarize);
        assert_matches!(payload, JobPayload::Summarize { text: None, .. });
    }

    #[test]
    fn missing_field_is_a_validation_error() {
        let json = r#"{"type":"submit_bullet_summary","data":{"credential":"k1","request_id":"t-1"}}"#;
        assert_matches!(parse_client_message(json), Err(CoreError::Validation(_)));
    }

    #[test]
    fn unknown_type_is_a_validation_error() {
        let json = r#"{"type":"submit_everything","data":{}}"#;
        assert_matches!(parse_client_message(json), Err(CoreError::Validation(_)));
    }

    #[test]
    fn empty_credential_is_rejected() {
        let msg = ClientMessage::submit(
            Credential::new(""),
            JobPayload::Summarize {
                request_id: "a-1".into(),
                text: None,
            },
        );
        assert_matches!(msg.into_submission(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn result_frame_shape() {
        let msg = ServerMessage::TopicNameResult {
            request_id: "t-1".into(),
            name: "Traffic enforcement".into(),
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_text()).unwrap();
        assert_eq!(value["type"], "topic_name_result");
        assert_eq!(value["data"]["request_id"], "t-1");
        assert_eq!(value["data"]["name"], "Traffic enforcement");
    }

    #[test]
    fn result_identity_matches_submission_identity() {
        let payload = JobPayload::BulletSummarize {
            request_id: "t-4".into(),
            documents: vec!["doc".into()],
        };
        let result = ServerMessage::BulletSummaryResult {
            request_id: "t-4".into(),
            bullets: vec!["one".into()],
        };
        assert_eq!(payload.identity(), result.identity());
    }

    #[test]
    fn submit_preserves_payload() {
        let payload = JobPayload::Summarize {
            request_id: "a-2".into(),
            text: Some("body".into()),
        };
        let msg = ClientMessage::submit(Credential::new("k2"), payload.clone());
        let parsed = parse_client_message(&msg.to_text()).unwrap();
        let (_, back) = parsed.into_submission().unwrap();
        assert_eq!(back, payload);
    }
}
