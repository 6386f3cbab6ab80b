use std::time::Duration;
use thiserror::Error;

use crate::types::{FailureKind, Phase};

/// Every way a submission can fail. Messages are what the caller sees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("Compilation error: {0}")]
    CompileError(String),
    #[error("Runtime error: {0}")]
    RuntimeError(String),
    #[error("{phase} timeout ({} exceeded)", describe_limit(.limit))]
    Timeout { phase: Phase, limit: Duration },
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ExecutionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExecutionError::InvalidInput(_) => FailureKind::InvalidInput,
            ExecutionError::UnsupportedLanguage(_) => FailureKind::UnsupportedLanguage,
            ExecutionError::CompileError(_) => FailureKind::CompileError,
            ExecutionError::RuntimeError(_) => FailureKind::RuntimeError,
            ExecutionError::Timeout { .. } => FailureKind::Timeout,
            ExecutionError::InternalError(_) => FailureKind::InternalError,
        }
    }
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        ExecutionError::InternalError(err.to_string())
    }
}

fn describe_limit(limit: &Duration) -> String {
    let millis = limit.as_millis();
    if millis % 1000 == 0 {
        let secs = millis / 1000;
        if secs == 1 {
            "1 second".to_string()
        } else {
            format!("{} seconds", secs)
        }
    } else {
        format!("{} milliseconds", millis)
    }
}
