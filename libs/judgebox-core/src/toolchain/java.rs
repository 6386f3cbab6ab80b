use super::*;
use crate::config::JavaToolchainConfig;

/// javac + java. The source file is named after its public class, and the
/// runtime is pointed at that class with the workspace as classpath.
pub struct JavaToolchain {
    config: JavaToolchainConfig,
    limits: Limits,
}

impl JavaToolchain {
    pub fn new(config: JavaToolchainConfig, limits: Limits) -> Self {
        Self { config, limits }
    }
}

#[async_trait]
impl Toolchain for JavaToolchain {
    fn language(&self) -> Language {
        Language::Java
    }

    fn limits(&self) -> &Limits {
        &self.limits
    }

    fn compile_command(&self, workspace: &Workspace) -> Option<ProcessCommand> {
        let mut cmd = ProcessCommand::new(&self.config.compiler);
        cmd.args(&self.config.compiler_flags);
        cmd.arg(workspace.source_path());
        Some(cmd)
    }

    fn run_command(&self, workspace: &Workspace) -> ProcessCommand {
        let mut cmd = ProcessCommand::new(&self.config.runtime);
        cmd.args(&self.config.runtime_flags);
        cmd.arg("-cp").arg(workspace.directory());
        cmd.arg(workspace.source_stem());
        cmd
    }
}
