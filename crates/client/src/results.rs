//! Accumulated job results, per kind.

use std::collections::HashMap;

use maple_core::{JobKind, RequestId, ServerMessage};

/// Every result the client has received since the last cleanup.
///
/// A later result for the same request replaces the earlier one.
#[derive(Debug, Default, Clone)]
pub struct JobResults {
    summaries: HashMap<RequestId, String>,
    topic_names: HashMap<RequestId, String>,
    bullet_summaries: HashMap<RequestId, Vec<String>>,
}

impl JobResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::SummarizeResult { request_id, text } => {
                self.summaries.insert(request_id, text);
            }
            ServerMessage::TopicNameResult { request_id, name } => {
                self.topic_names.insert(request_id, name);
            }
            ServerMessage::BulletSummaryResult {
                request_id,
                bullets,
            } => {
                self.bullet_summaries.insert(request_id, bullets);
            }
        }
    }

    pub fn summaries(&self) -> &HashMap<RequestId, String> {
        &self.summaries
    }

    pub fn topic_names(&self) -> &HashMap<RequestId, String> {
        &self.topic_names
    }

    pub fn bullet_summaries(&self) -> &HashMap<RequestId, Vec<String>> {
        &self.bullet_summaries
    }

    pub fn contains(&self, kind: JobKind, request_id: &RequestId) -> bool {
        match kind {
            JobKind::Summarize => self.summaries.contains_key(request_id),
            JobKind::NameTopic => self.topic_names.contains_key(request_id),
            JobKind::BulletSummarize => self.bullet_summaries.contains_key(request_id),
        }
    }

    /// The subset of `ids` that has no `kind` result yet, in input order.
    pub fn missing<'a, I>(&self, kind: JobKind, ids: I) -> Vec<RequestId>
    where
        I: IntoIterator<Item = &'a RequestId>,
    {
        ids.into_iter()
            .filter(|id| !self.contains(kind, id))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty() && self.topic_names.is_empty() && self.bullet_summaries.is_empty()
    }

    pub fn clear(&mut self) {
        self.summaries.clear();
        self.topic_names.clear();
        self.bullet_summaries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_reports_ids_without_result_of_that_kind() {
        let mut results = JobResults::new();
        results.record(ServerMessage::TopicNameResult {
            request_id: "t-1".into(),
            name: "Transit".into(),
        });
        results.record(ServerMessage::BulletSummaryResult {
            request_id: "t-2".into(),
            bullets: vec!["Fares rise".into()],
        });

        let ids: Vec<RequestId> = vec!["t-1".into(), "t-2".into()];

        assert_eq!(results.missing(JobKind::NameTopic, &ids), vec![RequestId::from("t-2")]);
        assert_eq!(results.missing(JobKind::BulletSummarize, &ids), vec![RequestId::from("t-1")]);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut results = JobResults::new();
        results.record(ServerMessage::SummarizeResult {
            request_id: "a-1".into(),
            text: "Short".into(),
        });

        results.clear();

        assert!(results.is_empty());
    }
}
