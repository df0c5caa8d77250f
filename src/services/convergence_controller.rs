//! Convergence controller.
//!
//! Drives the remediation loop for one workspace:
//!
//! - **BUILD** -- compile the TypeSpec source (hard stop on diagnostics),
//!   prepare the generated project and build it.
//! - **EXTRACT** -- turn the build log into violations and persist them.
//!   No violations means converged.
//! - **REMEDIATE** -- back up the source tree, open a worker session, send
//!   the context and the batched remediation request, apply the returned
//!   content.
//! - **RECOVER** -- recompile; while the applied fix does not compile, send
//!   the diagnostics back on the same session, bounded per iteration.
//!
//! The session opened for an iteration is released before the iteration
//! ends, whatever the outcome.

use std::sync::Arc;

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use crate::domain::errors::{FixerError, FixerResult, Phase};
use crate::domain::models::config::Config;
use crate::domain::models::{
    DedupPolicy, IterationState, RemediationRequest, RunOutcome, ViolationRecord, WorkerSession,
};
use crate::domain::ports::{BuildToolchain, WorkerClient};
use crate::infrastructure::workspace::Workspace;
use crate::services::contract_extractor::parse_contract;
use crate::services::dispatcher::RemoteWorkDispatcher;
use crate::services::error_extractor::{extract_violations, render_violation_log};
use crate::services::fixer_registry::FixerRegistry;
use crate::services::prompt_composer::{
    build_compile_recovery_request, build_context_message, build_remediation_request,
};

/// Loop bounds and policies for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceSettings {
    pub max_iterations: u32,
    pub max_recovery_attempts: u32,
    pub dedup: DedupPolicy,
    pub purge_on_start: bool,
}

impl Default for ConvergenceSettings {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            max_recovery_attempts: 3,
            dedup: DedupPolicy::FirstOccurrence,
            purge_on_start: true,
        }
    }
}

impl From<&Config> for ConvergenceSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_iterations: config.convergence.max_iterations,
            max_recovery_attempts: config.convergence.max_recovery_attempts,
            dedup: DedupPolicy::from_flag(config.build.dedup_violations),
            purge_on_start: config.worker.purge_on_start,
        }
    }
}

/// Result of the build half of an iteration.
enum BuildCheck {
    CompileFailed(String),
    Violations(Vec<ViolationRecord>),
}

pub struct ConvergenceController<T: BuildToolchain, W: WorkerClient> {
    toolchain: Arc<T>,
    dispatcher: RemoteWorkDispatcher<W>,
    registry: FixerRegistry,
    workspace: Workspace,
    settings: ConvergenceSettings,
}

impl<T: BuildToolchain, W: WorkerClient> ConvergenceController<T, W> {
    pub fn new(
        toolchain: Arc<T>,
        dispatcher: RemoteWorkDispatcher<W>,
        registry: FixerRegistry,
        workspace: Workspace,
        settings: ConvergenceSettings,
    ) -> Self {
        Self {
            toolchain,
            dispatcher,
            registry,
            workspace,
            settings,
        }
    }

    /// Run until converged, out of budget, cancelled or failed.
    ///
    /// Cancellation is only observed between outer iterations.
    ///
    /// # Errors
    /// An unreachable worker endpoint fails the run before the first build.
    /// Unrecoverable failures (toolchain spawn, I/O, worker or contract
    /// failures) abort the run. Fixes already written stay on disk; the
    /// backup taken at the start of the iteration holds the prior tree.
    pub async fn run(&self, cancel: &CancellationToken) -> FixerResult<RunOutcome> {
        self.workspace.ensure_source_tree()?;
        self.dispatcher
            .check_connection()
            .await
            .map_err(|e| FixerError::worker(Phase::SessionSetup, e))?;
        if self.settings.purge_on_start {
            self.dispatcher.purge_stale().await;
        }

        let mut state = IterationState::new(self.settings.max_iterations);
        info!(
            max_iterations = state.max_iterations,
            max_recovery_attempts = self.settings.max_recovery_attempts,
            codes = ?self.registry.codes().collect::<Vec<_>>(),
            "starting convergence run"
        );

        loop {
            if cancel.is_cancelled() {
                info!(iterations_completed = state.index, "run cancelled");
                return Ok(RunOutcome::Cancelled {
                    iterations_completed: state.index,
                });
            }

            let iteration = state.number();
            let span = info_span!("iteration", iteration);

            let violations = match self.build_and_extract().instrument(span.clone()).await? {
                BuildCheck::CompileFailed(diagnostics) => {
                    error!(iteration, "source does not compile, stopping");
                    return Ok(RunOutcome::CompileFailed { diagnostics });
                }
                BuildCheck::Violations(violations) => violations,
            };

            if violations.is_empty() {
                state.mark_converged();
                info!(iterations = state.index, "no violations left, converged");
                return Ok(RunOutcome::Converged {
                    iterations: state.index,
                });
            }

            if !state.has_budget() {
                warn!(
                    remaining = violations.len(),
                    max_iterations = state.max_iterations,
                    "iteration budget exhausted"
                );
                return Ok(RunOutcome::MaxIterationsReached {
                    remaining: violations,
                });
            }

            if let Some(outcome) = self
                .run_iteration(iteration, &violations)
                .instrument(span)
                .await?
            {
                return Ok(outcome);
            }

            state.advance();
        }
    }

    async fn build_and_extract(&self) -> FixerResult<BuildCheck> {
        let diagnostics = self.toolchain.compile().await?;
        if !diagnostics.trim().is_empty() {
            return Ok(BuildCheck::CompileFailed(diagnostics));
        }

        self.toolchain.prepare_artifacts().await?;
        let output = self.toolchain.build().await?;
        self.workspace.persist_build_log(&output.raw_log)?;

        let violations = extract_violations(&output.raw_log, self.settings.dedup);
        self.workspace
            .persist_violations(&render_violation_log(&violations), Local::now())?;

        if violations.is_empty() && !output.success {
            warn!("build failed without reporting any AZC violation");
        }
        for violation in &violations {
            if !self.registry.can_handle(&violation.code) {
                warn!(
                    code = %violation.code,
                    "no fixer registered for code, it will not be remediated"
                );
            }
        }
        info!(count = violations.len(), success = output.success, "build finished");

        Ok(BuildCheck::Violations(violations))
    }

    /// One remediation attempt. Returns a terminal outcome when the inner
    /// recovery loop runs out, `None` when the next iteration may start.
    async fn run_iteration(
        &self,
        iteration: u32,
        violations: &[ViolationRecord],
    ) -> FixerResult<Option<RunOutcome>> {
        let backup = self.workspace.create_backup(iteration, Local::now())?;
        let request = build_remediation_request(violations, &self.registry);

        let session = self
            .dispatcher
            .open_session(&self.workspace.artifacts())
            .await
            .map_err(|e| FixerError::worker(Phase::SessionSetup, e))?;

        let result = self.remediate(&session, iteration, violations, &request).await;
        self.dispatcher.close_session(&session).await;

        match &result {
            Ok(None) => info!(backup = %backup.path.display(), "iteration applied"),
            Ok(Some(outcome)) => warn!(outcome = outcome.label(), "iteration ended the run"),
            Err(e) => error!(error = %e, backup = %backup.path.display(), "iteration aborted"),
        }
        result
    }

    async fn remediate(
        &self,
        session: &WorkerSession,
        iteration: u32,
        violations: &[ViolationRecord],
        request: &RemediationRequest,
    ) -> FixerResult<Option<RunOutcome>> {
        let context = build_context_message(
            &self.workspace.read_main()?,
            &self.workspace.read_target()?,
            &render_violation_log(violations),
        );
        self.dispatcher
            .post(session, &context)
            .await
            .map_err(|e| FixerError::worker(Phase::Remediation, e))?;

        let response = self
            .dispatcher
            .dispatch(session, request)
            .await
            .map_err(|e| FixerError::worker(Phase::Remediation, e))?;
        self.apply(&response, Phase::Remediation)?;

        let mut attempts = 0;
        loop {
            let diagnostics = self.toolchain.compile().await?;
            if diagnostics.trim().is_empty() {
                return Ok(None);
            }

            if attempts >= self.settings.max_recovery_attempts {
                error!(attempts, "fix still does not compile, giving up");
                return Ok(Some(RunOutcome::RecoveryExhausted {
                    iteration,
                    attempts,
                    diagnostics,
                }));
            }
            attempts += 1;
            warn!(attempt = attempts, "applied fix does not compile, requesting recovery");

            let recovery = build_compile_recovery_request(&diagnostics);
            let response = self
                .dispatcher
                .dispatch(session, &recovery)
                .await
                .map_err(|e| FixerError::worker(Phase::CompileRecovery, e))?;
            self.apply(&response, Phase::CompileRecovery)?;
        }
    }

    fn apply(&self, response: &str, phase: Phase) -> FixerResult<()> {
        let contract = parse_contract(response).map_err(|e| FixerError::contract(phase, e))?;
        info!(
            %phase,
            total_errors = contract.analysis.total_errors,
            changes = contract.reported_change_count(),
            "applying worker fix"
        );
        self.workspace.write_target(&contract.updated_content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{JobScript, ScriptedToolchain, ScriptedWorker};
    use crate::domain::errors::WorkerError;
    use crate::domain::models::config::WorkspaceConfig;
    use crate::services::dispatcher::DispatcherConfig;

    fn contract(content: &str) -> String {
        serde_json::json!({
            "analysis": {"total_errors": 1},
            "updatedContent": content,
        })
        .to_string()
    }

    struct Harness {
        _dir: tempfile::TempDir,
        workspace: Workspace,
        toolchain: Arc<ScriptedToolchain>,
        worker: Arc<ScriptedWorker>,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let src = dir.path().join("src");
            std::fs::create_dir_all(&src).unwrap();
            std::fs::write(src.join("main.tsp"), "namespace Demo;").unwrap();
            std::fs::write(src.join("client.tsp"), "import \"./main.tsp\";").unwrap();
            let workspace = Workspace::new(&WorkspaceConfig {
                root: dir.path().to_path_buf(),
                ..Default::default()
            });
            Self {
                _dir: dir,
                workspace,
                toolchain: Arc::new(ScriptedToolchain::new()),
                worker: Arc::new(ScriptedWorker::new()),
            }
        }

        fn controller(
            &self,
            settings: ConvergenceSettings,
        ) -> ConvergenceController<ScriptedToolchain, ScriptedWorker> {
            let dispatcher = RemoteWorkDispatcher::new(
                Arc::clone(&self.worker),
                DispatcherConfig::default(),
                "instructions",
            );
            ConvergenceController::new(
                Arc::clone(&self.toolchain),
                dispatcher,
                FixerRegistry::builtin(),
                self.workspace.clone(),
                settings,
            )
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_loop_fixes_compile_errors_on_same_session() {
        let h = Harness::new();
        h.toolchain.push_build("error AZC0012: Model 'Wrapper' is too generic");
        h.toolchain.push_compile("");
        h.toolchain.push_compile("client.tsp:1:1 - error unknown-identifier");
        h.worker.script_job(JobScript::complete(contract("broken")));
        h.worker.script_job(JobScript::complete(contract("model Fixed {}")));

        let outcome = h
            .controller(ConvergenceSettings::default())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Converged { iterations: 1 });
        assert_eq!(h.workspace.read_target().unwrap(), "model Fixed {}");
        assert_eq!(h.worker.sessions_created(), 1);
        assert_eq!(h.worker.sessions_torn_down(), 1);
        // context, remediation, recovery
        assert_eq!(h.worker.sent_messages().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn contract_errors_release_the_session() {
        let h = Harness::new();
        h.toolchain.push_build("AZC0030: Model 'DiskOptions' ends with forbidden suffix");
        h.worker.script_job(JobScript::complete("I could not produce a fix."));

        let err = h
            .controller(ConvergenceSettings::default())
            .run(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FixerError::Contract {
                phase: Phase::Remediation,
                ..
            }
        ));
        assert_eq!(h.worker.sessions_torn_down(), 1);
        assert_eq!(h.workspace.read_target().unwrap(), "import \"./main.tsp\";");
    }

    #[tokio::test(start_paused = true)]
    async fn initial_compile_failure_is_a_hard_stop() {
        let h = Harness::new();
        h.toolchain.push_compile("main.tsp:1:1 - error token-expected");

        let outcome = h
            .controller(ConvergenceSettings::default())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::CompileFailed { .. }));
        assert_eq!(h.toolchain.build_calls(), 0);
        assert_eq!(h.worker.sessions_created(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_observed_before_an_iteration() {
        let h = Harness::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = h.controller(ConvergenceSettings::default()).run(&cancel).await.unwrap();

        assert_eq!(outcome, RunOutcome::Cancelled { iterations_completed: 0 });
        assert_eq!(h.toolchain.compile_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn build_spawn_failure_aborts_the_run() {
        let h = Harness::new();
        h.toolchain.fail_build_spawn();

        let err = h
            .controller(ConvergenceSettings::default())
            .run(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FixerError::Build(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_is_skipped_when_disabled() {
        let h = Harness::new();
        let settings = ConvergenceSettings {
            purge_on_start: false,
            ..Default::default()
        };

        h.controller(settings).run(&CancellationToken::new()).await.unwrap();

        assert_eq!(h.worker.purges(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_worker_stops_the_run_before_building() {
        let h = Harness::new();
        h.worker.fail_connection_check();

        let err = h
            .controller(ConvergenceSettings::default())
            .run(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FixerError::Worker {
                phase: Phase::SessionSetup,
                source: WorkerError::Api { status: 401, .. },
            }
        ));
        assert_eq!(h.toolchain.compile_calls(), 0);
        assert_eq!(h.worker.purges(), 0);
        assert_eq!(h.worker.sessions_created(), 0);
    }
}
