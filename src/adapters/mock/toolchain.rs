//! Scripted toolchain for testing.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::errors::BuildError;
use crate::domain::ports::{BuildOutput, BuildToolchain};

#[derive(Debug, Default)]
struct State {
    compiles: VecDeque<String>,
    builds: VecDeque<String>,
    fail_build_spawn: bool,
    compile_calls: u32,
    prepare_calls: u32,
    build_calls: u32,
}

/// In-memory [`BuildToolchain`] replaying queued outputs.
///
/// An empty compile queue compiles cleanly; an empty build queue builds
/// without violations.
#[derive(Debug, Default)]
pub struct ScriptedToolchain {
    state: Mutex<State>,
}

impl ScriptedToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the diagnostics of the next compile (empty means success).
    pub fn push_compile(&self, diagnostics: impl Into<String>) {
        self.state().compiles.push_back(diagnostics.into());
    }

    /// Queue the raw log of the next build.
    pub fn push_build(&self, raw_log: impl Into<String>) {
        self.state().builds.push_back(raw_log.into());
    }

    /// Make every build fail to spawn.
    pub fn fail_build_spawn(&self) {
        self.state().fail_build_spawn = true;
    }

    pub fn compile_calls(&self) -> u32 {
        self.state().compile_calls
    }

    pub fn prepare_calls(&self) -> u32 {
        self.state().prepare_calls
    }

    pub fn build_calls(&self) -> u32 {
        self.state().build_calls
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BuildToolchain for ScriptedToolchain {
    async fn compile(&self) -> Result<String, BuildError> {
        let mut state = self.state();
        state.compile_calls += 1;
        Ok(state.compiles.pop_front().unwrap_or_default())
    }

    async fn prepare_artifacts(&self) -> Result<(), BuildError> {
        self.state().prepare_calls += 1;
        Ok(())
    }

    async fn build(&self) -> Result<BuildOutput, BuildError> {
        let mut state = self.state();
        state.build_calls += 1;
        if state.fail_build_spawn {
            return Err(BuildError::Spawn {
                program: "dotnet".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "dotnet not found"),
            });
        }
        let raw_log = state
            .builds
            .pop_front()
            .unwrap_or_else(|| "Build succeeded.\n    0 Warning(s)\n    0 Error(s)".to_string());
        let success = !raw_log.contains("error");
        Ok(BuildOutput { raw_log, success })
    }
}
