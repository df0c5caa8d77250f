//! Composed requests sent to the remote worker.

/// What a request asks the worker to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Seed the session with the source files and violation log.
    Context,
    /// Fix a batch of analyzer violations.
    Remediation,
    /// Fix compiler errors introduced by a previous fix.
    CompileRecovery,
}

/// Text for one dispatch. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationRequest {
    pub kind: RequestKind,
    pub body: String,
}

impl RemediationRequest {
    pub fn new(kind: RequestKind, body: impl Into<String>) -> Self {
        Self {
            kind,
            body: body.into(),
        }
    }
}
