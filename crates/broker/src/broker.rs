//! The broker facade: everything a socket handler needs in one handle.

use std::sync::Arc;

use axum::extract::ws::Message;
use maple_core::messages::parse_client_message;
use maple_core::types::SessionId;
use maple_core::{CoreError, Credential, JobKind, JobPayload};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::executor::JobExecutor;
use crate::queue::Job;
use crate::router::ResultRouter;
use crate::scheduler::Scheduler;
use crate::sessions::SessionRegistry;

/// What happened to an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued,
    /// Same `(request_id, kind)` is already waiting.
    Duplicate,
}

pub struct Broker {
    scheduler: Arc<Scheduler>,
    sessions: Arc<SessionRegistry>,
    router: ResultRouter,
    executor: Arc<JobExecutor>,
}

impl Broker {
    pub fn new(executor: JobExecutor) -> Self {
        let sessions = Arc::new(SessionRegistry::new());
        Self {
            scheduler: Arc::new(Scheduler::new()),
            router: ResultRouter::new(Arc::clone(&sessions)),
            sessions,
            executor: Arc::new(executor),
        }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Spawn the scheduler loop.
    pub fn start(&self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(&self.scheduler).run(
            Arc::clone(&self.executor),
            self.router.clone(),
            cancel,
        ))
    }

    /// Register a session and return its outbound frame channel.
    pub async fn connect(&self, session_id: SessionId) -> mpsc::UnboundedReceiver<Message> {
        tracing::info!(session_id = %session_id, "Session connected");
        self.sessions.add(session_id).await
    }

    /// Unregister a session and drop its queued, cancelable jobs.
    pub async fn disconnect(&self, session_id: &str) {
        self.sessions.remove(session_id).await;
        let removed = self
            .scheduler
            .remove_for_session(session_id, &JobKind::disconnect_survivors());
        tracing::info!(session_id = %session_id, removed, "Session disconnected");
    }

    /// Parse, validate and queue one inbound text frame.
    pub fn handle_frame(&self, session_id: &str, text: &str) -> Result<Submission, CoreError> {
        let (credential, payload) = parse_client_message(text)?.into_submission()?;
        Ok(self.submit(Job::new(credential, Some(session_id.to_string()), payload)))
    }

    /// Queue a job that no session is waiting on.
    pub fn submit_background(&self, credential: Credential, payload: JobPayload) -> Submission {
        self.submit(Job::background(credential, payload))
    }

    fn submit(&self, job: Job) -> Submission {
        if self.scheduler.submit(job) {
            Submission::Queued
        } else {
            Submission::Duplicate
        }
    }
}
