//! Scripted worker for testing.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::errors::WorkerError;
use crate::domain::models::{
    Artifact, JobSnapshot, JobStatus, MessageRole, TranscriptMessage, WorkerSession,
};
use crate::domain::ports::WorkerClient;

/// How the next started job behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobScript {
    /// Report `Running` for `polls - 1` polls, then complete with `text`.
    Complete { polls: u32, text: String },
    /// Fail on the first poll with the given reason.
    Fail(String),
    /// Stay `Running` forever.
    Stall,
}

impl JobScript {
    pub fn complete(text: impl Into<String>) -> Self {
        Self::complete_after(1, text)
    }

    pub fn complete_after(polls: u32, text: impl Into<String>) -> Self {
        Self::Complete {
            polls: polls.max(1),
            text: text.into(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    next_id: u32,
    scripts: VecDeque<JobScript>,
    jobs: HashMap<String, (String, JobScript, u32)>,
    delivered: HashSet<String>,
    transcripts: HashMap<String, Vec<TranscriptMessage>>,
    sent: Vec<String>,
    index_failures: u32,
    failing_indexes: HashSet<String>,
    fail_teardowns: bool,
    fail_connection_check: bool,
    connection_checks: u32,
    sessions_created: u32,
    sessions_torn_down: u32,
    indexes_created: u32,
    uploads: Vec<String>,
    polls: u32,
    purges: u32,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }
}

/// In-memory [`WorkerClient`] replaying scripted job outcomes.
///
/// Ids are sequential per kind of resource, e.g. the second index is `vs_2`.
#[derive(Debug, Default)]
pub struct ScriptedWorker {
    state: Mutex<State>,
    index_counter: Mutex<u32>,
}

impl ScriptedWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the behaviour of the next started job.
    pub fn script_job(&self, script: JobScript) {
        self.state().scripts.push_back(script);
    }

    /// Make the next `count` indexes report a failed build.
    pub fn fail_index_builds(&self, count: u32) {
        self.state().index_failures = count;
    }

    /// Make every subsequent teardown fail.
    pub fn fail_teardowns(&self) {
        self.state().fail_teardowns = true;
    }

    /// Make every subsequent connection check fail as unauthorized.
    pub fn fail_connection_check(&self) {
        self.state().fail_connection_check = true;
    }

    pub fn connection_checks(&self) -> u32 {
        self.state().connection_checks
    }

    /// Bodies of every message sent, in order.
    pub fn sent_messages(&self) -> Vec<String> {
        self.state().sent.clone()
    }

    /// Names of every uploaded artifact, in order.
    pub fn uploaded(&self) -> Vec<String> {
        self.state().uploads.clone()
    }

    pub fn sessions_created(&self) -> u32 {
        self.state().sessions_created
    }

    pub fn sessions_torn_down(&self) -> u32 {
        self.state().sessions_torn_down
    }

    pub fn indexes_created(&self) -> u32 {
        self.state().indexes_created
    }

    pub fn polls(&self) -> u32 {
        self.state().polls
    }

    pub fn purges(&self) -> u32 {
        self.state().purges
    }

    /// Jobs scripted but not started yet.
    pub fn pending_scripts(&self) -> usize {
        self.state().scripts.len()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl WorkerClient for ScriptedWorker {
    async fn check_connection(&self) -> Result<(), WorkerError> {
        let mut state = self.state();
        state.connection_checks += 1;
        if state.fail_connection_check {
            return Err(WorkerError::Api {
                status: 401,
                body: "invalid credentials".to_string(),
            });
        }
        Ok(())
    }

    async fn create_session(&self, _instructions: &str) -> Result<WorkerSession, WorkerError> {
        let mut state = self.state();
        state.sessions_created += 1;
        let agent_id = state.id("asst");
        let id = state.id("thread");
        state.transcripts.insert(id.clone(), Vec::new());
        Ok(WorkerSession {
            id,
            agent_id,
            ..Default::default()
        })
    }

    async fn upload_artifact(&self, artifact: &Artifact) -> Result<String, WorkerError> {
        let mut state = self.state();
        state.uploads.push(artifact.name.clone());
        Ok(state.id("file"))
    }

    async fn create_index(&self, _name: &str, _file_ids: &[String]) -> Result<String, WorkerError> {
        let number = {
            let mut counter = self.index_counter.lock().unwrap_or_else(PoisonError::into_inner);
            *counter += 1;
            *counter
        };
        let index_id = format!("vs_{number}");

        let mut state = self.state();
        state.indexes_created += 1;
        if state.index_failures > 0 {
            state.index_failures -= 1;
            state.failing_indexes.insert(index_id.clone());
        }
        Ok(index_id)
    }

    async fn index_status(&self, index_id: &str) -> Result<JobSnapshot, WorkerError> {
        if self.state().failing_indexes.contains(index_id) {
            return Ok(JobSnapshot::failed("file processing error"));
        }
        Ok(JobSnapshot::new(JobStatus::Completed))
    }

    async fn attach_index(
        &self,
        _session: &WorkerSession,
        _index_id: &str,
    ) -> Result<(), WorkerError> {
        Ok(())
    }

    async fn send_message(
        &self,
        session: &WorkerSession,
        text: &str,
    ) -> Result<String, WorkerError> {
        let mut state = self.state();
        let id = state.id("msg");
        state.sent.push(text.to_string());
        state
            .transcripts
            .entry(session.id.clone())
            .or_default()
            .push(TranscriptMessage {
                id: id.clone(),
                role: MessageRole::User,
                text: text.to_string(),
            });
        Ok(id)
    }

    async fn start_job(&self, session: &WorkerSession) -> Result<String, WorkerError> {
        let mut state = self.state();
        let script = state
            .scripts
            .pop_front()
            .ok_or_else(|| WorkerError::InvalidResponse("no scripted job left".to_string()))?;
        let job_id = state.id("run");
        state
            .jobs
            .insert(job_id.clone(), (session.id.clone(), script, 0));
        Ok(job_id)
    }

    async fn poll_job(
        &self,
        _session: &WorkerSession,
        job_id: &str,
    ) -> Result<JobSnapshot, WorkerError> {
        let mut state = self.state();
        state.polls += 1;
        let (thread_id, script, seen) = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| WorkerError::Api {
                status: 404,
                body: format!("no run {job_id}"),
            })?;
        *seen += 1;

        let (snapshot, reply) = match script {
            JobScript::Stall => (JobSnapshot::new(JobStatus::Running), None),
            JobScript::Fail(reason) => (JobSnapshot::failed(reason.clone()), None),
            JobScript::Complete { polls, text } if *seen >= *polls => (
                JobSnapshot::new(JobStatus::Completed),
                Some((thread_id.clone(), text.clone())),
            ),
            JobScript::Complete { .. } => (JobSnapshot::new(JobStatus::Running), None),
        };

        if let Some((thread_id, text)) = reply {
            if state.delivered.insert(job_id.to_string()) {
                let id = state.id("msg");
                state.transcripts.entry(thread_id).or_default().push(TranscriptMessage {
                    id,
                    role: MessageRole::Assistant,
                    text,
                });
            }
        }

        Ok(snapshot)
    }

    async fn read_transcript(
        &self,
        session: &WorkerSession,
    ) -> Result<Vec<TranscriptMessage>, WorkerError> {
        Ok(self
            .state()
            .transcripts
            .get(&session.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn teardown_session(&self, _session: &WorkerSession) -> Result<(), WorkerError> {
        let mut state = self.state();
        state.sessions_torn_down += 1;
        if state.fail_teardowns {
            return Err(WorkerError::Api {
                status: 500,
                body: "teardown failed".to_string(),
            });
        }
        Ok(())
    }

    async fn purge_all(&self) -> Result<usize, WorkerError> {
        self.state().purges += 1;
        Ok(0)
    }
}
