//! At-least-once delivery on top of a [`Transport`].
//!
//! [`ReliableClient`] records every submission in a [`PendingTable`]
//! before sending it, and only forgets it once the matching result
//! arrives (or on [`cleanup`](ReliableClient::cleanup)). Anything still
//! pending is replayed by [`resubmit_all`](ReliableClient::resubmit_all),
//! which [`drive_until_drained`](ReliableClient::drive_until_drained)
//! calls on a cadence that scales with the number of pending records.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use maple_core::{
    ClientMessage, CoreError, Credential, JobIdentity, JobKind, JobPayload, RequestId,
    ServerMessage,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::ClientError;
use crate::pending::PendingTable;
use crate::resubmit::ResubmitSchedule;
use crate::results::JobResults;
use crate::transport::Transport;

/// Pause between attempts of a blocking submit.
const SEND_RETRY_DELAY: Duration = Duration::from_secs(1);

/// How [`ReliableClient::drive_until_drained`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every pending record was acknowledged.
    Drained { sweeps: u32 },
    /// The bound elapsed first; the records stay pending.
    TimedOut { outstanding: usize },
}

pub struct ReliableClient {
    transport: Arc<dyn Transport>,
    credential: Credential,
    schedule: ResubmitSchedule,
    pending: Mutex<PendingTable>,
    results: Mutex<JobResults>,
    /// Number of pending records, for waking the drain driver.
    pending_len: watch::Sender<usize>,
}

impl ReliableClient {
    /// A client submitting every job under `credential`.
    pub fn new(transport: Arc<dyn Transport>, credential: Credential) -> Self {
        Self::with_schedule(transport, credential, ResubmitSchedule::default())
    }

    pub fn with_schedule(
        transport: Arc<dyn Transport>,
        credential: Credential,
        schedule: ResubmitSchedule,
    ) -> Self {
        let (pending_len, _) = watch::channel(0);
        Self {
            transport,
            credential,
            schedule,
            pending: Mutex::new(PendingTable::new()),
            results: Mutex::new(JobResults::new()),
            pending_len,
        }
    }

    // Critical sections never panic, so a poisoned lock still holds
    // consistent data.
    fn pending(&self) -> MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn results_guard(&self) -> MutexGuard<'_, JobResults> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_pending<R>(&self, f: impl FnOnce(&mut PendingTable) -> R) -> R {
        let mut pending = self.pending();
        let out = f(&mut pending);
        self.pending_len.send_replace(pending.len());
        out
    }

    /// Record a submission, then send it.
    ///
    /// The record exists before the first send attempt, so a failed
    /// send is still covered by the next resubmission sweep. On a
    /// transport error a blocking submit retries every second until the
    /// frame goes out (or the record is settled meanwhile); a
    /// non-blocking submit returns the error.
    pub async fn submit(
        &self,
        payload: JobPayload,
        block_until_accepted: bool,
    ) -> Result<(), ClientError> {
        if self.credential.is_empty() {
            return Err(CoreError::Validation("client has no credential".into()).into());
        }
        payload.validate()?;

        let identity = payload.identity();
        let message = ClientMessage::submit(self.credential.clone(), payload);
        self.update_pending(|pending| pending.insert(identity.clone(), message.clone()));

        loop {
            match self.transport.send(&message).await {
                Ok(()) => {
                    tracing::debug!(job = %identity, "Submitted job");
                    return Ok(());
                }
                Err(e) if block_until_accepted => {
                    tracing::warn!(job = %identity, error = %e, "Submit failed, retrying");
                    tokio::time::sleep(SEND_RETRY_DELAY).await;
                    if !self.is_pending(&identity) {
                        return Ok(());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Settle the record a result answers and keep the result.
    ///
    /// Returns `false` if no record was pending for it (a duplicate or
    /// late result); the result is kept either way.
    pub fn acknowledge(&self, message: ServerMessage) -> bool {
        let identity = message.identity();
        let settled = self.update_pending(|pending| pending.acknowledge(&identity));
        if settled {
            tracing::debug!(job = %identity, "Received job result");
        } else {
            tracing::debug!(job = %identity, "Received result for a job that was not pending");
        }
        self.results_guard().record(message);
        settled
    }

    /// Acknowledge every frame arriving on `inbound`.
    pub fn spawn_acknowledger(
        self: &Arc<Self>,
        mut inbound: mpsc::UnboundedReceiver<ServerMessage>,
    ) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                client.acknowledge(message);
            }
        })
    }

    /// Resend the last frame of every pending record, with a random
    /// pause between frames. Returns how many frames went out.
    pub async fn resubmit_all(&self) -> usize {
        let records = self.pending().snapshot();
        let mut sent = 0;

        for (i, (identity, message)) in records.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.schedule.jitter()).await;
            }
            // Settled while we were pausing.
            if !self.is_pending(&identity) {
                continue;
            }
            match self.transport.send(&message).await {
                Ok(()) => sent += 1,
                Err(e) => tracing::warn!(job = %identity, error = %e, "Resubmit failed"),
            }
        }

        tracing::debug!(sent, "Resubmitted pending jobs");
        sent
    }

    /// Wait for results, resubmitting on the schedule, until nothing is
    /// pending or `max_wait` elapses.
    ///
    /// Wakes as soon as the last record is acknowledged rather than at
    /// the end of the current wait.
    pub async fn drive_until_drained(&self, max_wait: Option<Duration>) -> DrainOutcome {
        let deadline = max_wait.map(|wait| Instant::now() + wait);
        let mut pending_len = self.pending_len.subscribe();
        let mut sweeps = 0;

        loop {
            let pending = self.pending_count();
            if pending == 0 {
                return DrainOutcome::Drained { sweeps };
            }

            let wait = self.schedule.wait_before_sweep(pending, sweeps);
            let mut wake_at = Instant::now() + wait;
            if let Some(deadline) = deadline {
                wake_at = wake_at.min(deadline);
            }
            tracing::debug!(pending, wait_secs = wait.as_secs(), "Waiting for job results");

            tokio::select! {
                _ = pending_len.wait_for(|len| *len == 0) => {
                    return DrainOutcome::Drained { sweeps };
                }
                _ = tokio::time::sleep_until(wake_at) => {}
            }

            self.log_outstanding();
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                let outstanding = self.pending_count();
                tracing::warn!(outstanding, "Gave up waiting for job results");
                return DrainOutcome::TimedOut { outstanding };
            }

            self.resubmit_all().await;
            sweeps += 1;
        }
    }

    fn log_outstanding(&self) {
        let pending = self.pending();
        for kind in JobKind::ALL {
            let ids = pending.outstanding(kind);
            if !ids.is_empty() {
                let ids: Vec<&str> = ids.iter().map(RequestId::as_str).collect();
                tracing::warn!(%kind, count = ids.len(), ?ids, "Still missing job results");
            }
        }
    }

    /// Forget all pending records and accumulated results.
    pub fn cleanup(&self) {
        self.update_pending(PendingTable::clear);
        self.results_guard().clear();
    }

    pub fn is_pending(&self, identity: &JobIdentity) -> bool {
        self.pending().contains(identity)
    }

    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Request ids of `kind` still awaiting a result.
    pub fn outstanding(&self, kind: JobKind) -> Vec<RequestId> {
        self.pending().outstanding(kind)
    }

    /// Snapshot of every result received since the last cleanup.
    pub fn results(&self) -> JobResults {
        self.results_guard().clone()
    }

    /// The subset of `ids` with no `kind` result yet.
    pub fn missing<'a, I>(&self, kind: JobKind, ids: I) -> Vec<RequestId>
    where
        I: IntoIterator<Item = &'a RequestId>,
    {
        self.results_guard().missing(kind, ids)
    }
}
