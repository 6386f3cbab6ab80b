//! Language toolchain adapters.
//!
//! Each adapter only knows which commands build and run a submission. How a
//! finished process is turned into success or failure is shared below so every
//! language follows the same rules:
//!
//! - timed out: `Timeout`
//! - non-zero exit or killed by a signal: `CompileError` / `RuntimeError` carrying
//!   the diagnostic stream
//! - zero exit with diagnostics: success, diagnostics appended as warnings
//!   (at compile time this becomes fatal when `fail_on_compile_warnings` is set)

pub mod cpp;
pub mod java;
pub mod python;

use async_trait::async_trait;
use std::time::Duration;

use crate::config::ExecutorConfig;
use crate::error::ExecutionError;
use crate::runner::{ProcessCommand, ProcessRunner};
use crate::types::{CompileResult, ExecutionResult, Language, Phase};
use crate::workspace::Workspace;

pub use cpp::CppToolchain;
pub use java::JavaToolchain;
pub use python::PythonToolchain;

/// Separator placed between program output and any diagnostics appended to it.
pub const WARNINGS_SEPARATOR: &str = "\n--- Warnings/Info ---\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub compile_timeout: Duration,
    pub run_timeout: Duration,
    pub fail_on_compile_warnings: bool,
}

impl From<&ExecutorConfig> for Limits {
    fn from(config: &ExecutorConfig) -> Self {
        Self {
            compile_timeout: config.compile_timeout(),
            run_timeout: config.run_timeout(),
            fail_on_compile_warnings: config.fail_on_compile_warnings,
        }
    }
}

#[async_trait]
pub trait Toolchain: Send + Sync {
    fn language(&self) -> Language;

    fn limits(&self) -> &Limits;

    /// Command that builds the workspace, `None` for interpreted languages.
    fn compile_command(&self, workspace: &Workspace) -> Option<ProcessCommand>;

    fn run_command(&self, workspace: &Workspace) -> ProcessCommand;

    fn needs_compile(&self, workspace: &Workspace) -> bool {
        self.compile_command(workspace).is_some()
    }

    async fn compile(
        &self,
        workspace: &Workspace,
        runner: &ProcessRunner,
    ) -> Result<CompileResult, ExecutionError> {
        let Some(command) = self.compile_command(workspace) else {
            return Ok(CompileResult::Skipped);
        };

        let limits = self.limits();
        let result = runner
            .spawn(&command, workspace.directory(), "", limits.compile_timeout)
            .await?;
        interpret_compile(result, limits)
    }

    async fn run(
        &self,
        workspace: &Workspace,
        stdin: &str,
        runner: &ProcessRunner,
    ) -> Result<ExecutionResult, ExecutionError> {
        let command = self.run_command(workspace);
        runner
            .spawn(&command, workspace.directory(), stdin, self.limits().run_timeout)
            .await
    }
}

/// What a successful run printed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramOutput {
    pub stdout: String,
    pub diagnostics: Option<String>,
}

pub fn interpret_compile(
    result: ExecutionResult,
    limits: &Limits,
) -> Result<CompileResult, ExecutionError> {
    if result.timed_out {
        return Err(ExecutionError::Timeout {
            phase: Phase::Compilation,
            limit: limits.compile_timeout,
        });
    }
    if !result.exited_cleanly() {
        return Err(ExecutionError::CompileError(result.failure_message()));
    }
    if result.has_diagnostics() {
        if limits.fail_on_compile_warnings {
            return Err(ExecutionError::CompileError(result.stderr));
        }
        return Ok(CompileResult::Compiled {
            warnings: Some(result.stderr),
        });
    }
    Ok(CompileResult::Compiled { warnings: None })
}

pub fn interpret_run(result: ExecutionResult, limit: Duration) -> Result<ProgramOutput, ExecutionError> {
    if result.timed_out {
        return Err(ExecutionError::Timeout {
            phase: Phase::Execution,
            limit,
        });
    }
    if !result.exited_cleanly() {
        return Err(ExecutionError::RuntimeError(result.failure_message()));
    }
    let diagnostics = result.has_diagnostics().then_some(result.stderr);
    Ok(ProgramOutput {
        stdout: result.stdout,
        diagnostics,
    })
}

/// Program output followed by every non-empty warning block.
pub fn render_output(stdout: &str, warnings: &[&str]) -> String {
    let warnings: Vec<&str> = warnings
        .iter()
        .copied()
        .filter(|w| !w.trim().is_empty())
        .collect();

    let mut output = stdout.to_string();
    if !warnings.is_empty() {
        output.push_str(WARNINGS_SEPARATOR);
        output.push_str(&warnings.join("\n"));
    }
    output
}

/// One adapter per supported language, built from configuration.
pub struct ToolchainRegistry {
    cpp: CppToolchain,
    java: JavaToolchain,
    python: PythonToolchain,
}

impl ToolchainRegistry {
    pub fn from_config(config: &ExecutorConfig) -> Self {
        let limits = Limits::from(config);
        Self {
            cpp: CppToolchain::new(config.toolchains.cpp.clone(), limits),
            java: JavaToolchain::new(config.toolchains.java.clone(), limits),
            python: PythonToolchain::new(config.toolchains.python.clone(), limits),
        }
    }

    pub fn get(&self, language: Language) -> &dyn Toolchain {
        match language {
            Language::Cpp => &self.cpp,
            Language::Java => &self.java,
            Language::Python => &self.python,
        }
    }
}
