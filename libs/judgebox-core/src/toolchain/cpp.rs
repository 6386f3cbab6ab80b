use super::*;
use crate::config::CppToolchainConfig;

pub struct CppToolchain {
    config: CppToolchainConfig,
    limits: Limits,
}

impl CppToolchain {
    pub fn new(config: CppToolchainConfig, limits: Limits) -> Self {
        Self { config, limits }
    }
}

#[async_trait]
impl Toolchain for CppToolchain {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn limits(&self) -> &Limits {
        &self.limits
    }

    fn compile_command(&self, workspace: &Workspace) -> Option<ProcessCommand> {
        let artifact = workspace.artifact_path()?;

        let mut cmd = ProcessCommand::new(&self.config.compiler);
        cmd.args(&self.config.flags);
        cmd.arg(workspace.source_path());
        cmd.arg("-o").arg(artifact);
        Some(cmd)
    }

    fn run_command(&self, workspace: &Workspace) -> ProcessCommand {
        // materialize always assigns an artifact for C++
        let binary = workspace
            .artifact_path()
            .unwrap_or_else(|| workspace.source_path());
        ProcessCommand::new(binary)
    }
}
