//! Remote work dispatcher
//!
//! Owns the sequencing around [`WorkerClient`]: session setup with retries,
//! wait-then-poll cycles for indexing and jobs, transcript filtering and
//! best-effort teardown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::WorkerError;
use crate::domain::models::config::WorkerConfig;
use crate::domain::models::{
    Artifact, JobStatus, RemediationRequest, WorkerJob, WorkerSession,
};
use crate::domain::ports::WorkerClient;

/// Polling and retry bounds for the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Wait between two status polls.
    pub poll_interval: Duration,
    /// Polls before a job (or index) is declared timed out.
    pub max_poll_attempts: u32,
    /// Wait after creating an index before its first status poll.
    pub index_delay: Duration,
    /// Extra attempts at the whole session setup sequence.
    pub session_retries: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_poll_attempts: 60,
            index_delay: Duration::from_secs(10),
            session_retries: 2,
        }
    }
}

impl From<&WorkerConfig> for DispatcherConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_poll_attempts: config.max_poll_attempts,
            index_delay: config.index_delay(),
            session_retries: config.session_retries,
        }
    }
}

pub struct RemoteWorkDispatcher<W: WorkerClient> {
    client: Arc<W>,
    config: DispatcherConfig,
    instructions: String,
}

impl<W: WorkerClient> RemoteWorkDispatcher<W> {
    /// `instructions` are the fixed system instructions every session's
    /// agent is created with.
    pub fn new(client: Arc<W>, config: DispatcherConfig, instructions: impl Into<String>) -> Self {
        Self {
            client,
            config,
            instructions: instructions.into(),
        }
    }

    pub const fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Acquire a fresh session with `artifacts` indexed and attached.
    ///
    /// A failed attempt releases whatever it acquired and the whole sequence
    /// restarts with a new index, up to `session_retries` extra times.
    #[instrument(skip_all, fields(artifacts = artifacts.len()))]
    pub async fn open_session(&self, artifacts: &[Artifact]) -> Result<WorkerSession, WorkerError> {
        let attempts = self.config.session_retries + 1;
        let mut attempt = 1;

        loop {
            let mut session = WorkerSession::default();
            match self.try_open_session(&mut session, artifacts).await {
                Ok(()) => {
                    info!(session_id = %session.id, attempt, "worker session ready");
                    return Ok(session);
                }
                Err(err) => {
                    warn!(attempt, attempts, error = %err, "session setup failed");
                    self.close_session(&session).await;
                    if attempt >= attempts {
                        return Err(err);
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn try_open_session(
        &self,
        session: &mut WorkerSession,
        artifacts: &[Artifact],
    ) -> Result<(), WorkerError> {
        *session = self.client.create_session(&self.instructions).await?;

        for artifact in artifacts {
            let file_id = self.client.upload_artifact(artifact).await?;
            debug!(name = %artifact.name, file_id = %file_id, "artifact uploaded");
            session.file_ids.push(file_id);
        }

        // Retries within the same second must not collide on the index name.
        let name = format!(
            "azc-{}-{}",
            Local::now().format("%Y%m%d%H%M%S"),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let index_id = self.client.create_index(&name, &session.file_ids).await?;
        session.index_id = Some(index_id.clone());

        sleep(self.config.index_delay).await;
        self.wait_for_index(&index_id).await?;

        self.client.attach_index(session, &index_id).await
    }

    async fn wait_for_index(&self, index_id: &str) -> Result<(), WorkerError> {
        for attempt in 1..=self.config.max_poll_attempts {
            let snapshot = self.client.index_status(index_id).await?;
            match snapshot.status {
                JobStatus::Completed => return Ok(()),
                status if status.is_pending() => {
                    debug!(index_id, attempt, %status, "index still building");
                    sleep(self.config.poll_interval).await;
                }
                _ => {
                    return Err(WorkerError::IndexFailed {
                        index_id: index_id.to_string(),
                        reason: snapshot
                            .last_error
                            .unwrap_or_else(|| "indexing failed".to_string()),
                    });
                }
            }
        }

        Err(WorkerError::TimedOut {
            job_id: index_id.to_string(),
            attempts: self.config.max_poll_attempts,
        })
    }

    /// Post a message without starting a job.
    pub async fn post(
        &self,
        session: &WorkerSession,
        request: &RemediationRequest,
    ) -> Result<String, WorkerError> {
        let message_id = self.client.send_message(session, &request.body).await?;
        debug!(
            session_id = %session.id,
            message_id = %message_id,
            kind = ?request.kind,
            "message posted"
        );
        Ok(message_id)
    }

    /// Send `request`, run a job over it and return the raw response text.
    ///
    /// The response is every transcript message after the request, in order,
    /// joined with newlines.
    #[instrument(skip_all, fields(session_id = %session.id, kind = ?request.kind))]
    pub async fn dispatch(
        &self,
        session: &WorkerSession,
        request: &RemediationRequest,
    ) -> Result<String, WorkerError> {
        let message_id = self.post(session, request).await?;
        let job_id = self.client.start_job(session).await?;
        info!(job_id = %job_id, "worker job started");

        let mut job = WorkerJob::new(job_id, session.id.clone());
        self.wait_for_job(session, &mut job).await?;

        let transcript = self.client.read_transcript(session).await?;
        let position = transcript
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| WorkerError::MissingMessage {
                message_id: message_id.clone(),
            })?;

        let text = transcript[position + 1..]
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(WorkerError::EmptyResponse {
                session_id: session.id.clone(),
            });
        }

        debug!(job_id = %job.id, chars = text.len(), "worker response received");
        Ok(text)
    }

    async fn wait_for_job(
        &self,
        session: &WorkerSession,
        job: &mut WorkerJob,
    ) -> Result<(), WorkerError> {
        for attempt in 1..=self.config.max_poll_attempts {
            sleep(self.config.poll_interval).await;
            let snapshot = self.client.poll_job(session, &job.id).await?;
            job.observe(snapshot)?;
            debug!(job_id = %job.id, attempt, status = %job.status, "job polled");

            match job.status {
                JobStatus::Completed => return Ok(()),
                JobStatus::Failed => {
                    return Err(WorkerError::JobFailed {
                        job_id: job.id.clone(),
                        reason: job
                            .last_error
                            .clone()
                            .unwrap_or_else(|| "no reason given".to_string()),
                    });
                }
                _ => {}
            }
        }

        job.time_out();
        warn!(job_id = %job.id, attempts = self.config.max_poll_attempts, "job timed out");
        Err(WorkerError::TimedOut {
            job_id: job.id.clone(),
            attempts: self.config.max_poll_attempts,
        })
    }

    /// Fail fast when the endpoint or credentials are unusable.
    pub async fn check_connection(&self) -> Result<(), WorkerError> {
        self.client.check_connection().await?;
        info!("worker endpoint reachable");
        Ok(())
    }

    /// Release every remote resource of `session`. Failures are logged only.
    pub async fn close_session(&self, session: &WorkerSession) {
        if session == &WorkerSession::default() {
            return;
        }
        match self.client.teardown_session(session).await {
            Ok(()) => debug!(session_id = %session.id, "worker session released"),
            Err(err) => {
                warn!(session_id = %session.id, error = %err, "failed to release worker session");
            }
        }
    }

    /// Delete leftovers of earlier runs. Failures are logged only.
    pub async fn purge_stale(&self) {
        match self.client.purge_all().await {
            Ok(0) => debug!("no stale worker resources"),
            Ok(removed) => info!(removed, "stale worker resources deleted"),
            Err(err) => warn!(error = %err, "failed to purge stale worker resources"),
        }
    }
}
