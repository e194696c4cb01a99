//! Error types for the FitLog CLI.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] fitlog_core::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Missing configuration: {0}")]
    MissingConfig(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0} synchronization pass(es) did not complete; re-run `fitlog sync`")]
    SyncIncomplete(usize),
    #[error("Integrity audit found {0} issue(s); see the report above")]
    IntegrityIssuesFound(usize),
    #[error("Deep recovery discards unsynced local changes; re-run with --yes to confirm")]
    ConfirmationRequired,
    #[error("Deep recovery finished with outstanding issues: {0}")]
    RecoveryIncomplete(String),
}
