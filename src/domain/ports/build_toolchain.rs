use async_trait::async_trait;

use crate::domain::errors::BuildError;

/// Combined output of one build invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    /// Captured stdout followed by stderr.
    pub raw_log: String,
    /// Whether the build process exited successfully.
    ///
    /// Analyzer violations are reported as errors, so a failing build
    /// is expected while violations remain.
    pub success: bool,
}

/// External toolchain that compiles the TypeSpec source and builds the SDK.
///
/// Implementations must not interpret their output; the caller decides
/// what counts as a compile error or an analyzer violation.
#[async_trait]
pub trait BuildToolchain: Send + Sync {
    /// Compile the TypeSpec source tree.
    ///
    /// Returns combined diagnostics. An empty (or whitespace-only) string
    /// means the source compiled cleanly.
    async fn compile(&self) -> Result<String, BuildError>;

    /// Copy the fixed project and package templates over the generated
    /// project so the build picks up the analyzers.
    async fn prepare_artifacts(&self) -> Result<(), BuildError>;

    /// Build the generated SDK and capture its log.
    async fn build(&self) -> Result<BuildOutput, BuildError>;
}
