//! Code execution core: write a submission to disk, build it with the host
//! toolchain, run it against stdin under a time limit and report the outcome.

pub mod config;
pub mod error;
pub mod executor;
pub mod runner;
pub mod toolchain;
pub mod types;
pub mod workspace;


pub use config::ExecutorConfig;
pub use error::ExecutionError;
pub use executor::Executor;
pub use types::{ExecutionOutcome, FailureKind, Language, Submission};
