pub mod config;
pub mod contract;
pub mod fixer;
pub mod iteration;
pub mod request;
pub mod violation;
pub mod worker;

pub use config::{
    AuthConfig, AuthMethod, BuildConfig, Config, ConvergenceConfig, LoggingConfig, RetryConfig,
    ToolchainConfig, WorkerConfig, WorkspaceConfig,
};
pub use contract::{
    Analysis, FixContract, Fixes, ReferenceUpdate, Rename, StructuralAddition,
    UPDATED_CONTENT_FIELD,
};
pub use fixer::FixerStrategy;
pub use iteration::{Backup, IterationState, RunOutcome};
pub use request::{RemediationRequest, RequestKind};
pub use violation::{DedupPolicy, ViolationRecord};
pub use worker::{
    Artifact, JobSnapshot, JobStatus, MessageRole, TranscriptMessage, WorkerJob, WorkerSession,
};
