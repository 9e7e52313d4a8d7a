//! The scheduler loop and its execution tasks.
//!
//! [`Scheduler`] owns the job queue and the credential ledger behind a
//! single lock. Every dispatch decision (pick the next eligible job and
//! reserve its credential) happens inside one non-suspending critical
//! section, so two decisions can never both win the same credential.
//!
//! [`Scheduler::run`] is the cooperative loop: it dispatches as long as
//! something is eligible, spawning one execution task per job, and parks
//! on a [`Notify`] otherwise. Enqueues and credential releases wake it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use maple_core::{Credential, JobIdentity, JobKind};
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::executor::JobExecutor;
use crate::ledger::CredentialLedger;
use crate::queue::{Job, JobQueue};
use crate::router::{ResultEnvelope, ResultRouter};

/// How often the loop reports queue depth while work is pending.
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Default)]
struct SchedulerState {
    queue: JobQueue,
    ledger: CredentialLedger,
}

/// Queue + ledger owner and dispatch loop.
///
/// Designed to be wrapped in `Arc` and shared with the socket handlers
/// (which submit and cancel) and the execution tasks (which release).
pub struct Scheduler {
    state: Mutex<SchedulerState>,
    wake: Notify,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SchedulerState::default()),
            wake: Notify::new(),
        }
    }

    // Critical sections never panic, so a poisoned lock still holds a
    // consistent queue and ledger.
    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a job. Returns `false` if its identity is already queued.
    pub fn submit(&self, job: Job) -> bool {
        let added = self.state().queue.enqueue(job);
        if added {
            self.wake.notify_one();
        }
        added
    }

    /// Take the next eligible job and reserve its credential.
    ///
    /// The caller owns the reservation and must hand the credential back
    /// through [`release`](Self::release) once the job is finished.
    pub fn dispatch_next(&self) -> Option<Job> {
        let mut state = self.state();
        let SchedulerState { queue, ledger } = &mut *state;

        let job = queue.take_next(ledger)?;
        let reserved = ledger.try_reserve(&job.credential);
        debug_assert!(reserved, "take_next returned a job with a reserved credential");
        Some(job)
    }

    /// Return a credential to the pool and wake the loop.
    pub fn release(&self, credential: &Credential) {
        self.state().ledger.release(credential);
        self.wake.notify_one();
    }

    /// Drop a departed session's queued jobs, except `surviving` kinds.
    pub fn remove_for_session(&self, session_id: &str, surviving: &[JobKind]) -> usize {
        self.state().queue.remove_for_session(session_id, surviving)
    }

    /// Number of jobs waiting.
    pub fn queued(&self) -> usize {
        self.state().queue.len()
    }

    /// Number of credentials with a job running.
    pub fn in_flight(&self) -> usize {
        self.state().ledger.len()
    }

    pub fn is_queued(&self, identity: &JobIdentity) -> bool {
        self.state().queue.contains(identity)
    }

    pub fn is_reserved(&self, credential: &Credential) -> bool {
        self.state().ledger.is_reserved(credential)
    }

    pub fn depth_by_kind(&self) -> BTreeMap<JobKind, usize> {
        self.state().queue.depth_by_kind()
    }

    /// Run the dispatch loop until `cancel` fires.
    ///
    /// Each dispatched job runs on its own task; the loop never waits
    /// for one to finish. Execution failures (and panics) stay inside
    /// the task.
    pub async fn run(
        self: Arc<Self>,
        executor: Arc<JobExecutor>,
        router: ResultRouter,
        cancel: CancellationToken,
    ) {
        tracing::info!("Scheduler loop started");
        let started = Instant::now();
        let mut last_report = Instant::now();

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if last_report.elapsed() >= STATUS_LOG_INTERVAL {
                last_report = Instant::now();
                self.report_status(started);
            }

            match self.dispatch_next() {
                Some(job) => {
                    let guard = CredentialGuard {
                        scheduler: Arc::clone(&self),
                        credential: job.credential.clone(),
                    };
                    tokio::spawn(execute_job(
                        job,
                        guard,
                        Arc::clone(&executor),
                        router.clone(),
                    ));
                    tokio::task::yield_now().await;
                }
                None => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.wake.notified() => {}
                        _ = tokio::time::sleep(STATUS_LOG_INTERVAL) => {}
                    }
                }
            }
        }

        tracing::info!("Scheduler loop stopped");
    }

    fn report_status(&self, started: Instant) {
        let (queued, in_flight) = {
            let state = self.state();
            (state.queue.len(), state.ledger.len())
        };
        if queued > 0 || in_flight > 0 {
            tracing::debug!(
                queued,
                in_flight,
                uptime_hours = started.elapsed().as_secs_f64() / 3600.0,
                "Scheduler status",
            );
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases its credential when dropped, including during a panic
/// unwind inside the execution task.
struct CredentialGuard {
    scheduler: Arc<Scheduler>,
    credential: Credential,
}

impl Drop for CredentialGuard {
    fn drop(&mut self) {
        self.scheduler.release(&self.credential);
    }
}

async fn execute_job(
    job: Job,
    _guard: CredentialGuard,
    executor: Arc<JobExecutor>,
    router: ResultRouter,
) {
    let identity = job.identity();
    let waited_ms = (chrono::Utc::now() - job.submitted_at).num_milliseconds();
    tracing::debug!(
        job = %identity,
        credential = %job.credential,
        waited_ms,
        "Processing job",
    );

    match executor.execute(&job).await {
        Ok(message) => {
            router
                .deliver(ResultEnvelope {
                    session_id: job.session_id,
                    message,
                })
                .await;
        }
        Err(e) => {
            tracing::error!(
                job = %identity,
                credential = %job.credential,
                error = %e,
                "Job failed, dropping without result",
            );
        }
    }
}
