use super::*;
use crate::config::PythonToolchainConfig;

pub struct PythonToolchain {
    config: PythonToolchainConfig,
    limits: Limits,
}

impl PythonToolchain {
    pub fn new(config: PythonToolchainConfig, limits: Limits) -> Self {
        Self { config, limits }
    }
}

#[async_trait]
impl Toolchain for PythonToolchain {
    fn language(&self) -> Language {
        Language::Python
    }

    fn limits(&self) -> &Limits {
        &self.limits
    }

    fn compile_command(&self, _workspace: &Workspace) -> Option<ProcessCommand> {
        None
    }

    fn run_command(&self, workspace: &Workspace) -> ProcessCommand {
        let mut cmd = ProcessCommand::new(&self.config.interpreter);
        cmd.args(&self.config.flags);
        cmd.arg(workspace.source_path());
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Submission;
    use crate::workspace::WorkspaceManager;

    #[tokio::test]
    async fn test_compile_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(tmp.path()).unwrap();
        let mut ws = manager
            .materialize(&Submission::new(Language::Python, "print('hi')", ""))
            .await
            .unwrap();

        let toolchain = PythonToolchain::new(
            PythonToolchainConfig::default(),
            Limits::from(&ExecutorConfig::default()),
        );

        assert!(!toolchain.needs_compile(&ws));
        let compiled = toolchain.compile(&ws, &ProcessRunner::new()).await.unwrap();
        assert_eq!(compiled, CompileResult::Skipped);

        let run = toolchain.run_command(&ws);
        assert_eq!(run.args.last().unwrap().as_os_str(), ws.source_path().as_os_str());

        ws.cleanup().await;
    }
}
