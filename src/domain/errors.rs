//! Domain errors for the AZC fixer.
//!
//! The taxonomy mirrors the failure classes of the convergence loop:
//! build toolchain failures, invalid worker contracts, remote worker
//! failures and local I/O failures. [`FixerError`] is the umbrella type
//! returned by the controller; configuration errors stop the binary before
//! a controller exists and live with the loader.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the external build toolchain (spawning, locating project files).
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No generated project file found under {0}")]
    ProjectFileNotFound(PathBuf),

    #[error("Build template missing: {0}")]
    TemplateMissing(PathBuf),

    #[error("Toolchain I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The worker response did not satisfy the remediation contract.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("No balanced JSON object found in worker response")]
    NoJsonObject,

    #[error("Worker response JSON is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Worker response is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Worker returned empty updated content")]
    EmptyContent,
}

/// Failures talking to, or reported by, the remote worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Worker API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Worker job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("Worker job {job_id} did not finish after {attempts} polls")]
    TimedOut { job_id: String, attempts: u32 },

    #[error("Index {index_id} failed to build: {reason}")]
    IndexFailed { index_id: String, reason: String },

    #[error("Session {session_id} produced no response text")]
    EmptyResponse { session_id: String },

    #[error("Triggering message {message_id} not found in transcript")]
    MissingMessage { message_id: String },

    #[error("Failed to acquire an access token: {0}")]
    Auth(String),

    #[error("Unexpected worker response: {0}")]
    InvalidResponse(String),

    #[error("Failed to read artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WorkerError {
    /// Returns true if this error is transient and the request may be retried.
    ///
    /// Transient errors are network failures, rate limiting (429) and
    /// server-side errors (5xx). Job-level failures are never transient:
    /// retrying them means starting a fresh session.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}

/// Pipeline phase a dispatch belonged to, recorded on contract/worker errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Checking the endpoint, then opening the session (upload, index, attach).
    SessionSetup,
    /// The outer remediation request.
    Remediation,
    /// An inner compile-recovery request.
    CompileRecovery,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SessionSetup => "session-setup",
            Self::Remediation => "remediation",
            Self::CompileRecovery => "compile-recovery",
        };
        f.write_str(s)
    }
}

/// Umbrella error for a convergence run.
#[derive(Debug, Error)]
pub enum FixerError {
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Invalid worker contract during {phase}: {source}")]
    Contract {
        phase: Phase,
        #[source]
        source: ContractError,
    },

    #[error("Worker failure during {phase}: {source}")]
    Worker {
        phase: Phase,
        #[source]
        source: WorkerError,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FixerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) const fn worker(phase: Phase, source: WorkerError) -> Self {
        Self::Worker { phase, source }
    }

    pub(crate) const fn contract(phase: Phase, source: ContractError) -> Self {
        Self::Contract { phase, source }
    }
}

/// Result alias used across the crate.
pub type FixerResult<T> = Result<T, FixerError>;
