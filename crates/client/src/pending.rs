//! Client-side table of submissions awaiting their result.

use std::collections::HashMap;

use maple_core::{ClientMessage, JobIdentity, JobKind, RequestId};

/// Un-acknowledged submissions, keyed by `(request_id, kind)`.
///
/// Each entry holds the exact frame last sent so a resubmission sweep
/// can replay it unchanged.
#[derive(Debug, Default)]
pub struct PendingTable {
    records: HashMap<JobIdentity, ClientMessage>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) the frame for `identity`.
    pub fn insert(&mut self, identity: JobIdentity, message: ClientMessage) {
        self.records.insert(identity, message);
    }

    /// Settle a record. Returns `false` if nothing was pending under
    /// `identity`.
    pub fn acknowledge(&mut self, identity: &JobIdentity) -> bool {
        self.records.remove(identity).is_some()
    }

    pub fn contains(&self, identity: &JobIdentity) -> bool {
        self.records.contains_key(identity)
    }

    /// Snapshot of every pending frame, for a resubmission sweep.
    pub fn snapshot(&self) -> Vec<(JobIdentity, ClientMessage)> {
        self.records
            .iter()
            .map(|(identity, message)| (identity.clone(), message.clone()))
            .collect()
    }

    /// Request ids still pending for one kind, sorted.
    pub fn outstanding(&self, kind: JobKind) -> Vec<RequestId> {
        let mut ids: Vec<RequestId> = self
            .records
            .keys()
            .filter(|identity| identity.kind == kind)
            .map(|identity| identity.request_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use maple_core::Credential;

    use super::*;

    fn topic(id: &str) -> (JobIdentity, ClientMessage) {
        (
            JobIdentity::new(id.into(), JobKind::NameTopic),
            ClientMessage::SubmitTopicName {
                credential: Credential::new("k1"),
                request_id: id.into(),
                keywords: vec!["road".into()],
            },
        )
    }

    #[test]
    fn acknowledge_removes_only_matching_kind() {
        let mut table = PendingTable::new();
        let (identity, message) = topic("t-1");
        table.insert(identity, message);

        let other_kind = JobIdentity::new("t-1".into(), JobKind::BulletSummarize);
        assert!(!table.acknowledge(&other_kind));
        assert_eq!(table.len(), 1);

        assert!(table.acknowledge(&JobIdentity::new("t-1".into(), JobKind::NameTopic)));
        assert!(table.is_empty());
    }

    #[test]
    fn reinsert_keeps_one_record() {
        let mut table = PendingTable::new();
        let (identity, message) = topic("t-1");
        table.insert(identity.clone(), message.clone());
        table.insert(identity, message);

        assert_eq!(table.len(), 1);
    }

    #[test]
    fn outstanding_lists_ids_per_kind() {
        let mut table = PendingTable::new();
        for id in ["t-2", "t-1"] {
            let (identity, message) = topic(id);
            table.insert(identity, message);
        }

        assert_eq!(
            table.outstanding(JobKind::NameTopic),
            vec![RequestId::from("t-1"), RequestId::from("t-2")]
        );
        assert!(table.outstanding(JobKind::Summarize).is_empty());
    }
}
