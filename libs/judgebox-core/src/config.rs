// Executor configuration
// Loaded from config/judgebox.json when present, then overridden from the environment

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::Language;

pub const DEFAULT_CONFIG_PATH: &str = "config/judgebox.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CppToolchainConfig {
    pub compiler: String,
    pub flags: Vec<String>,
}

impl Default for CppToolchainConfig {
    fn default() -> Self {
        Self {
            compiler: "g++".to_string(),
            flags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JavaToolchainConfig {
    pub compiler: String,
    pub runtime: String,
    pub compiler_flags: Vec<String>,
    pub runtime_flags: Vec<String>,
}

impl Default for JavaToolchainConfig {
    fn default() -> Self {
        Self {
            compiler: "javac".to_string(),
            runtime: "java".to_string(),
            compiler_flags: vec!["-encoding".to_string(), "UTF-8".to_string()],
            runtime_flags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PythonToolchainConfig {
    pub interpreter: String,
    pub flags: Vec<String>,
}

impl Default for PythonToolchainConfig {
    fn default() -> Self {
        let interpreter = if cfg!(windows) { "python" } else { "python3" };
        Self {
            interpreter: interpreter.to_string(),
            flags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub cpp: CppToolchainConfig,
    pub java: JavaToolchainConfig,
    pub python: PythonToolchainConfig,
}

impl ToolchainConfig {
    /// External binaries a language needs, in invocation order.
    pub fn binaries(&self, language: Language) -> Vec<&str> {
        match language {
            Language::Cpp => vec![self.cpp.compiler.as_str()],
            Language::Java => vec![self.java.compiler.as_str(), self.java.runtime.as_str()],
            Language::Python => vec![self.python.interpreter.as_str()],
        }
    }
}

/// Everything the execution core needs to know about its host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub workspace_root: PathBuf,
    pub compile_timeout_ms: u64,
    pub run_timeout_ms: u64,
    pub max_concurrent_executions: usize,
    /// Treat any compiler diagnostic output as fatal, even on a zero exit
    pub fail_on_compile_warnings: bool,
    pub max_source_bytes: usize,
    pub max_input_bytes: usize,
    pub toolchains: ToolchainConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("codes"),
            compile_timeout_ms: 10_000,
            run_timeout_ms: 10_000,
            max_concurrent_executions: default_concurrency(),
            fail_on_compile_warnings: false,
            max_source_bytes: 1024 * 1024,
            max_input_bytes: 10 * 1024 * 1024,
            toolchains: ToolchainConfig::default(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl ExecutorConfig {
    /// Load configuration from a JSON file. Missing keys fall back to defaults.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Executor config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ExecutorConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(config)
    }

    /// Load config/judgebox.json if it exists, defaults otherwise, then apply env overrides.
    pub fn load_default() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        let config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        let config = config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `JUDGEBOX_*` overrides. The lookup is injected so tests never touch
    /// the process environment.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("JUDGEBOX_WORKSPACE_ROOT") {
            self.workspace_root = PathBuf::from(root);
        }
        if let Some(ms) = lookup("JUDGEBOX_COMPILE_TIMEOUT_MS") {
            self.compile_timeout_ms = ms
                .parse()
                .with_context(|| format!("Invalid JUDGEBOX_COMPILE_TIMEOUT_MS: {}", ms))?;
        }
        if let Some(ms) = lookup("JUDGEBOX_RUN_TIMEOUT_MS") {
            self.run_timeout_ms = ms
                .parse()
                .with_context(|| format!("Invalid JUDGEBOX_RUN_TIMEOUT_MS: {}", ms))?;
        }
        if let Some(n) = lookup("JUDGEBOX_MAX_CONCURRENCY") {
            self.max_concurrent_executions = n
                .parse()
                .with_context(|| format!("Invalid JUDGEBOX_MAX_CONCURRENCY: {}", n))?;
        }
        if let Some(flag) = lookup("JUDGEBOX_FAIL_ON_WARNINGS") {
            self.fail_on_compile_warnings = parse_flag(&flag)
                .with_context(|| format!("Invalid JUDGEBOX_FAIL_ON_WARNINGS: {}", flag))?;
        }

        // JAVA_HOME only replaces binaries still at their bare defaults
        if let Some(java_home) = lookup("JAVA_HOME").filter(|h| !h.trim().is_empty()) {
            let bin = Path::new(&java_home).join("bin");
            let defaults = JavaToolchainConfig::default();
            if self.toolchains.java.compiler == defaults.compiler {
                self.toolchains.java.compiler = bin.join(exe_name("javac")).display().to_string();
            }
            if self.toolchains.java.runtime == defaults.runtime {
                self.toolchains.java.runtime = bin.join(exe_name("java")).display().to_string();
            }
        }
        if let Some(cxx) = lookup("JUDGEBOX_CXX") {
            self.toolchains.cpp.compiler = cxx;
        }
        if let Some(javac) = lookup("JUDGEBOX_JAVAC") {
            self.toolchains.java.compiler = javac;
        }
        if let Some(java) = lookup("JUDGEBOX_JAVA") {
            self.toolchains.java.runtime = java;
        }
        if let Some(python) = lookup("JUDGEBOX_PYTHON") {
            self.toolchains.python.interpreter = python;
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.compile_timeout_ms == 0 || self.run_timeout_ms == 0 {
            bail!("Timeouts must be greater than zero");
        }
        if self.max_concurrent_executions == 0 {
            bail!("max_concurrent_executions must be at least 1");
        }
        if self.workspace_root.as_os_str().is_empty() {
            bail!("workspace_root must not be empty");
        }
        for language in Language::ALL {
            if self.toolchains.binaries(language).iter().any(|b| b.trim().is_empty()) {
                bail!("Toolchain for {} has an empty binary name", language);
            }
        }
        Ok(())
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    /// Write this configuration as pretty JSON, creating parent directories.
    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json_content = serde_json::to_string_pretty(self)
            .context("Failed to serialize executor config")?;

        fs::write(config_path, json_content)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;

        Ok(())
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{}'", other),
    }
}

fn exe_name(tool: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", tool)
    } else {
        tool.to_string()
    }
}
