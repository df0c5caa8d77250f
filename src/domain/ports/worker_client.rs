use async_trait::async_trait;

use crate::domain::errors::WorkerError;
use crate::domain::models::{Artifact, JobSnapshot, TranscriptMessage, WorkerSession};

/// Remote worker API
///
/// Thin operations over the hosted agent service. Sequencing (setup
/// retries, polling budgets, transcript filtering) lives in the
/// dispatcher, not in implementations of this trait.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// Prove the endpoint, credentials and project are usable by creating
    /// and deleting a throwaway conversation.
    async fn check_connection(&self) -> Result<(), WorkerError>;

    /// Create an agent and an empty conversation bound to it.
    ///
    /// The returned session has no index and no files yet.
    async fn create_session(&self, instructions: &str) -> Result<WorkerSession, WorkerError>;

    /// Upload a local file and return its remote id.
    async fn upload_artifact(&self, artifact: &Artifact) -> Result<String, WorkerError>;

    /// Create a search index over uploaded files and return its id.
    async fn create_index(&self, name: &str, file_ids: &[String]) -> Result<String, WorkerError>;

    /// Current indexing status of an index.
    async fn index_status(&self, index_id: &str) -> Result<JobSnapshot, WorkerError>;

    /// Make an index searchable from the session's conversation.
    async fn attach_index(&self, session: &WorkerSession, index_id: &str)
        -> Result<(), WorkerError>;

    /// Append a user message to the conversation and return its id.
    async fn send_message(&self, session: &WorkerSession, text: &str)
        -> Result<String, WorkerError>;

    /// Start a job over the conversation and return its id.
    async fn start_job(&self, session: &WorkerSession) -> Result<String, WorkerError>;

    /// Observe a job once.
    async fn poll_job(&self, session: &WorkerSession, job_id: &str)
        -> Result<JobSnapshot, WorkerError>;

    /// All conversation messages in chronological order.
    async fn read_transcript(
        &self,
        session: &WorkerSession,
    ) -> Result<Vec<TranscriptMessage>, WorkerError>;

    /// Delete every remote resource the session holds.
    async fn teardown_session(&self, session: &WorkerSession) -> Result<(), WorkerError>;

    /// Delete leftover remote resources from earlier runs.
    ///
    /// Returns the number of resources removed.
    async fn purge_all(&self) -> Result<usize, WorkerError>;
}
