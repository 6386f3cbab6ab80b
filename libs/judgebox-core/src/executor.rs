/// Execution Orchestrator - request in, outcome out
///
/// **Pipeline (per request):**
/// Received → Validated → Materialized → Compiled (interpreted languages skip) →
/// Executed → Cleaned → Responded
///
/// Any failure short-circuits the remaining stages but still passes through
/// Cleaned. Nothing escapes as a panic or raw error: every path resolves to an
/// [`ExecutionOutcome`].
///
/// A semaphore bounds how many compile/run pipelines are in flight at once.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn, Span};
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::error::ExecutionError;
use crate::runner::ProcessRunner;
use crate::toolchain::{interpret_run, render_output, Toolchain, ToolchainRegistry};
use crate::types::{ExecutionOutcome, Language, Submission};
use crate::workspace::{Workspace, WorkspaceManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Received,
    Validated,
    Materialized,
    Compiled,
    Executed,
    Cleaned,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::Materialized => "materialized",
            Stage::Compiled => "compiled",
            Stage::Executed => "executed",
            Stage::Cleaned => "cleaned",
            Stage::Responded => "responded",
        };
        f.write_str(name)
    }
}

pub struct Executor {
    config: ExecutorConfig,
    workspaces: WorkspaceManager,
    toolchains: ToolchainRegistry,
    runner: ProcessRunner,
    permits: Arc<Semaphore>,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutionError> {
        config
            .validate()
            .map_err(|e| ExecutionError::InternalError(format!("Invalid executor config: {:#}", e)))?;

        let workspaces = WorkspaceManager::new(&config.workspace_root)?;
        let toolchains = ToolchainRegistry::from_config(&config);
        let permits = Arc::new(Semaphore::new(config.max_concurrent_executions));

        info!(
            workspace_root = %workspaces.root().display(),
            compile_timeout_ms = config.compile_timeout_ms,
            run_timeout_ms = config.run_timeout_ms,
            max_concurrent = config.max_concurrent_executions,
            fail_on_compile_warnings = config.fail_on_compile_warnings,
            "Executor ready"
        );

        Ok(Self {
            config,
            workspaces,
            toolchains,
            runner: ProcessRunner::new(),
            permits,
        })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn workspace_manager(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Permits not currently held by a running pipeline
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Validate, build and run a submission given as raw request fields.
    #[instrument(
        skip(self, code, stdin),
        fields(
            request_id = %Uuid::new_v4(),
            language = %language,
            source_size = code.len(),
            input_size = stdin.len(),
            workspace_id = tracing::field::Empty,
        )
    )]
    pub async fn execute(&self, language: &str, code: &str, stdin: &str) -> ExecutionOutcome {
        let start = Instant::now();
        debug!(stage = %Stage::Received, "Request received");

        let outcome = match self.validate(language, code, stdin) {
            Ok(submission) => {
                debug!(stage = %Stage::Validated, "Request validated");
                self.execute_submission(&submission).await
            }
            Err(e) => Err(e),
        };

        let outcome = match outcome {
            Ok(output) => ExecutionOutcome::Success { output },
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "Execution failed");
                ExecutionOutcome::from(e)
            }
        };

        info!(
            stage = %Stage::Responded,
            outcome = outcome.label(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Execution finished"
        );
        outcome
    }

    /// Run an already validated submission, returning the rendered output.
    pub async fn execute_submission(&self, submission: &Submission) -> Result<String, ExecutionError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ExecutionError::InternalError("Executor is shutting down".to_string()))?;

        let mut workspace = self.workspaces.materialize(submission).await?;
        Span::current().record("workspace_id", tracing::field::display(workspace.id()));
        debug!(
            stage = %Stage::Materialized,
            workspace_id = %workspace.id(),
            "Source written"
        );

        let toolchain = self.toolchains.get(submission.language);
        let result = self
            .compile_and_run(toolchain, &workspace, &submission.stdin)
            .await;

        workspace.cleanup().await;
        debug!(stage = %Stage::Cleaned, workspace_id = %workspace.id(), "Workspace released");

        result
    }

    async fn compile_and_run(
        &self,
        toolchain: &dyn Toolchain,
        workspace: &Workspace,
        stdin: &str,
    ) -> Result<String, ExecutionError> {
        let compiled = toolchain.compile(workspace, &self.runner).await?;
        if let Some(warnings) = compiled.warnings() {
            debug!(warnings = %first_line(warnings), "Compiler emitted warnings");
        }
        debug!(stage = %Stage::Compiled, result = ?compiled, "Compile step done");

        let result = toolchain.run(workspace, stdin, &self.runner).await?;
        debug!(
            stage = %Stage::Executed,
            exit_code = ?result.exit_code,
            timed_out = result.timed_out,
            duration_ms = result.duration.as_millis() as u64,
            "Program finished"
        );

        let program = interpret_run(result, toolchain.limits().run_timeout)?;
        let warnings: Vec<&str> = compiled
            .warnings()
            .into_iter()
            .chain(program.diagnostics.as_deref())
            .collect();

        Ok(render_output(&program.stdout, &warnings))
    }

    fn validate(&self, language: &str, code: &str, stdin: &str) -> Result<Submission, ExecutionError> {
        if code.trim().is_empty() {
            return Err(ExecutionError::InvalidInput("Code is required".to_string()));
        }
        let language: Language = language.parse()?;

        if code.len() > self.config.max_source_bytes {
            return Err(ExecutionError::InvalidInput(format!(
                "Source code exceeds maximum size of {} bytes",
                self.config.max_source_bytes
            )));
        }
        if stdin.len() > self.config.max_input_bytes {
            return Err(ExecutionError::InvalidInput(format!(
                "Input exceeds maximum size of {} bytes",
                self.config.max_input_bytes
            )));
        }

        Ok(Submission::new(language, code, stdin))
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
