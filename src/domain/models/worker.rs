//! Remote worker models: sessions, jobs, transcripts and uploaded artifacts.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::errors::WorkerError;

/// Status of a remote job (a worker "run").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    /// Set locally when the poll budget is exhausted.
    TimedOut,
}

impl JobStatus {
    /// Whether the job still needs polling.
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    pub const fn is_terminal(self) -> bool {
        !self.is_pending()
    }

    /// Map a remote status string onto a job status.
    ///
    /// `requires_action` and `cancelling` are still in flight from our point
    /// of view; `cancelled` and `expired` end the job without a result.
    pub fn from_remote(status: &str) -> Option<Self> {
        match status.to_ascii_lowercase().as_str() {
            "queued" => Some(Self::Queued),
            "in_progress" | "running" | "requires_action" | "cancelling" => Some(Self::Running),
            "completed" | "succeeded" => Some(Self::Completed),
            "failed" | "cancelled" | "expired" | "incomplete" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

/// One observation of a remote job returned by polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    /// Remote failure reason, populated when `status` is `Failed`.
    pub last_error: Option<String>,
}

impl JobSnapshot {
    pub const fn new(status: JobStatus) -> Self {
        Self {
            status,
            last_error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            last_error: Some(reason.into()),
        }
    }
}

/// A dispatched job and its last observed status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerJob {
    pub id: String,
    pub session_id: String,
    pub status: JobStatus,
    pub last_error: Option<String>,
}

impl WorkerJob {
    pub fn new(id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            status: JobStatus::Queued,
            last_error: None,
        }
    }

    /// Apply a poll observation. Terminal jobs never change status again.
    pub fn observe(&mut self, snapshot: JobSnapshot) -> Result<(), WorkerError> {
        if self.status.is_terminal() {
            return Err(WorkerError::InvalidResponse(format!(
                "job {} already {}, cannot move to {}",
                self.id, self.status, snapshot.status
            )));
        }
        self.status = snapshot.status;
        self.last_error = snapshot.last_error;
        Ok(())
    }

    /// Mark the job as abandoned after the poll budget ran out.
    pub fn time_out(&mut self) {
        if self.status.is_pending() {
            self.status = JobStatus::TimedOut;
        }
    }
}

/// Remote handles acquired for one outer iteration.
///
/// Carries everything needed to tear the session down again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSession {
    /// Conversation (thread) id.
    pub id: String,
    /// Agent the jobs run against.
    pub agent_id: String,
    /// Search index attached to the conversation, once created.
    pub index_id: Option<String>,
    /// Uploaded artifact ids.
    pub file_ids: Vec<String>,
}

/// Who authored a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A message in a session transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptMessage {
    pub id: String,
    pub role: MessageRole,
    /// Concatenated text content of the message.
    pub text: String,
}

/// A local file to upload into the session index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Name the worker sees the file under.
    pub name: String,
    /// Local path of the file content.
    pub path: PathBuf,
}

impl Artifact {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_status_mapping() {
        assert_eq!(JobStatus::from_remote("queued"), Some(JobStatus::Queued));
        assert_eq!(JobStatus::from_remote("in_progress"), Some(JobStatus::Running));
        assert_eq!(JobStatus::from_remote("requires_action"), Some(JobStatus::Running));
        assert_eq!(JobStatus::from_remote("completed"), Some(JobStatus::Completed));
        assert_eq!(JobStatus::from_remote("expired"), Some(JobStatus::Failed));
        assert_eq!(JobStatus::from_remote("bogus"), None);
    }

    #[test]
    fn job_transitions_stop_at_terminal_states() {
        let mut job = WorkerJob::new("run_1", "thread_1");
        job.observe(JobSnapshot::new(JobStatus::Running)).unwrap();
        job.observe(JobSnapshot::failed("quota")).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.last_error.as_deref(), Some("quota"));
        assert!(job.observe(JobSnapshot::new(JobStatus::Completed)).is_err());
    }

    #[test]
    fn time_out_only_applies_to_pending_jobs() {
        let mut job = WorkerJob::new("run_1", "thread_1");
        job.time_out();
        assert_eq!(job.status, JobStatus::TimedOut);

        let mut done = WorkerJob::new("run_2", "thread_1");
        done.observe(JobSnapshot::new(JobStatus::Completed)).unwrap();
        done.time_out();
        assert_eq!(done.status, JobStatus::Completed);
    }
}
