//! Pending job queue with identity dedup and priority selection.

use std::collections::{BTreeMap, HashSet};

use maple_core::types::{SessionId, Timestamp};
use maple_core::{Credential, JobIdentity, JobKind, JobPayload, RequestId};

use crate::ledger::CredentialLedger;

/// A unit of work accepted by the broker.
#[derive(Debug, Clone)]
pub struct Job {
    /// LLM credential the job must run under.
    pub credential: Credential,
    /// Submitting session; `None` for jobs created by background sweeps.
    pub session_id: Option<SessionId>,
    pub payload: JobPayload,
    pub submitted_at: Timestamp,
}

impl Job {
    pub fn new(credential: Credential, session_id: Option<SessionId>, payload: JobPayload) -> Self {
        Self {
            credential,
            session_id,
            payload,
            submitted_at: chrono::Utc::now(),
        }
    }

    /// A job with nobody waiting for its result.
    pub fn background(credential: Credential, payload: JobPayload) -> Self {
        Self::new(credential, None, payload)
    }

    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }

    pub fn request_id(&self) -> &RequestId {
        self.payload.request_id()
    }

    pub fn identity(&self) -> JobIdentity {
        self.payload.identity()
    }
}

/// Jobs waiting for a free credential.
///
/// Holds at most one job per [`JobIdentity`]. Jobs are kept in
/// insertion order; [`take_next`](Self::take_next) applies the kind
/// priority on top of it.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Vec<Job>,
    identities: HashSet<JobIdentity>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job. Returns `false` (and keeps the queued copy) if a
    /// job with the same identity is already waiting.
    pub fn enqueue(&mut self, job: Job) -> bool {
        let identity = job.identity();
        if !self.identities.insert(identity.clone()) {
            tracing::warn!(job = %identity, "Job was not added, already queued");
            return false;
        }
        self.jobs.push(job);
        tracing::debug!(job = %identity, queued = self.jobs.len(), "Job queued");
        true
    }

    /// Remove and return the highest-priority job whose credential is
    /// free in `ledger`, oldest first within a kind.
    pub fn take_next(&mut self, ledger: &CredentialLedger) -> Option<Job> {
        let index = self
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| !ledger.is_reserved(&job.credential))
            .min_by_key(|(position, job)| (job.kind().priority(), *position))
            .map(|(position, _)| position)?;

        let job = self.jobs.remove(index);
        self.identities.remove(&job.identity());
        Some(job)
    }

    /// Drop every job of `session_id` except those whose kind is in
    /// `surviving` and whose result is persisted; a survivor-kind job
    /// with nowhere to put its result goes too.
    ///
    /// Returns the number of jobs removed.
    pub fn remove_for_session(&mut self, session_id: &str, surviving: &[JobKind]) -> usize {
        let before = self.jobs.len();
        let identities = &mut self.identities;
        self.jobs.retain(|job| {
            let keep = job.session_id.as_deref() != Some(session_id)
                || (surviving.contains(&job.kind()) && job.payload.persists_result());
            if !keep {
                identities.remove(&job.identity());
            }
            keep
        });
        before - self.jobs.len()
    }

    pub fn contains(&self, identity: &JobIdentity) -> bool {
        self.identities.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Queue depth per kind, for status reporting.
    pub fn depth_by_kind(&self) -> BTreeMap<JobKind, usize> {
        let mut depth = BTreeMap::new();
        for job in &self.jobs {
            *depth.entry(job.kind()).or_insert(0) += 1;
        }
        depth
    }
}
