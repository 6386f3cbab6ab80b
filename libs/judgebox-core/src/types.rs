use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ExecutionError;

/// Languages the execution service knows how to build and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Cpp,
    Java,
    Python,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Cpp, Language::Java, Language::Python];

    /// Resolve a user-supplied language name, case-insensitively.
    pub fn from_alias(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.aliases().contains(&name.as_str()))
    }

    /// Every name accepted for this language on the wire
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Language::Cpp => &["cpp", "c++"],
            Language::Java => &["java"],
            Language::Python => &["python", "python3", "py"],
        }
    }

    pub fn source_extension(&self) -> &'static str {
        match self {
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::Python => "py",
        }
    }

    /// All accepted aliases across every language, in a stable order.
    pub fn all_aliases() -> Vec<&'static str> {
        Self::ALL
            .iter()
            .flat_map(|lang| lang.aliases().iter().copied())
            .collect()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Cpp => write!(f, "cpp"),
            Language::Java => write!(f, "java"),
            Language::Python => write!(f, "python"),
        }
    }
}

impl FromStr for Language {
    type Err = ExecutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_alias(s).ok_or_else(|| ExecutionError::UnsupportedLanguage(s.to_string()))
    }
}

/// One user's code, language and stdin as handed to the execution core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub language: Language,
    pub source_code: String,
    pub stdin: String,
}

impl Submission {
    pub fn new(language: Language, source_code: impl Into<String>, stdin: impl Into<String>) -> Self {
        Self {
            language,
            source_code: source_code.into(),
            stdin: stdin.into(),
        }
    }
}

/// Which half of the pipeline a child process belonged to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Compilation,
    Execution,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Compilation => write!(f, "Compilation"),
            Phase::Execution => write!(f, "Execution"),
        }
    }
}

/// Raw result of one child process, as captured by the process runner.
///
/// Both streams and the exit status are always filled in, including when the
/// process was killed for exceeding its time budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub timed_out: bool,
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn exited_cleanly(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.stderr.trim().is_empty()
    }

    /// Human-readable reason for a failed process, preferring its own diagnostics.
    pub fn failure_message(&self) -> String {
        if self.has_diagnostics() {
            return self.stderr.clone();
        }
        match (self.exit_code, self.signal) {
            (Some(code), _) => format!("Process exited with code {}", code),
            (None, Some(signal)) => format!("Process terminated by signal {}", signal),
            (None, None) => "Process terminated abnormally".to_string(),
        }
    }
}

/// Outcome of a compile step that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileResult {
    /// Interpreted language, nothing to build
    Skipped,
    Compiled { warnings: Option<String> },
}

impl CompileResult {
    pub fn warnings(&self) -> Option<&str> {
        match self {
            CompileResult::Compiled { warnings: Some(w) } => Some(w.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    CompileError,
    RuntimeError,
    Timeout,
    UnsupportedLanguage,
    InvalidInput,
    InternalError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::CompileError => "compile_error",
            FailureKind::RuntimeError => "runtime_error",
            FailureKind::Timeout => "timeout",
            FailureKind::UnsupportedLanguage => "unsupported_language",
            FailureKind::InvalidInput => "invalid_input",
            FailureKind::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized result handed back to the caller of the execution core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success { output: String },
    Failure { kind: FailureKind, message: String },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ExecutionOutcome::Success { .. } => None,
            ExecutionOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Metric/log label for this outcome
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionOutcome::Success { .. } => "success",
            ExecutionOutcome::Failure { kind, .. } => kind.as_str(),
        }
    }
}

impl From<ExecutionError> for ExecutionOutcome {
    fn from(err: ExecutionError) -> Self {
        ExecutionOutcome::Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_aliases() {
        assert_eq!(Language::from_alias("cpp"), Some(Language::Cpp));
        assert_eq!(Language::from_alias("C++"), Some(Language::Cpp));
        assert_eq!(Language::from_alias("Python3"), Some(Language::Python));
        assert_eq!(Language::from_alias("py"), Some(Language::Python));
        assert_eq!(Language::from_alias(" JAVA "), Some(Language::Java));
        assert_eq!(Language::from_alias("ruby"), None);
        assert_eq!(Language::from_alias(""), None);
    }

    #[test]
    fn test_language_from_str_error() {
        let err = "ruby".parse::<Language>().unwrap_err();
        assert_eq!(err, ExecutionError::UnsupportedLanguage("ruby".to_string()));
        assert_eq!(err.to_string(), "Unsupported language: ruby");
    }

    #[test]
    fn test_language_display_is_canonical() {
        assert_eq!(Language::Cpp.to_string(), "cpp");
        assert_eq!(Language::Python.to_string(), "python");
        assert_eq!(Language::all_aliases(), vec!["cpp", "c++", "java", "python", "python3", "py"]);
    }

    #[test]
    fn test_failure_message_prefers_stderr() {
        let mut result = ExecutionResult {
            stdout: String::new(),
            stderr: "boom".to_string(),
            exit_code: Some(1),
            signal: None,
            timed_out: false,
            duration: Duration::from_millis(3),
        };
        assert_eq!(result.failure_message(), "boom");

        result.stderr = "  \n".to_string();
        assert_eq!(result.failure_message(), "Process exited with code 1");

        result.exit_code = None;
        result.signal = Some(11);
        assert_eq!(result.failure_message(), "Process terminated by signal 11");
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome: ExecutionOutcome = ExecutionError::CompileError("bad".to_string()).into();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["kind"], "compile_error");
        assert_eq!(json["message"], "Compilation error: bad");
        assert_eq!(outcome.label(), "compile_error");
    }
}
