//! CLI-specific error types and exit code mapping

use vrfcheck_conformance::ConformanceError;
use vrfcheck_core::error::VrfCheckError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// At least one scenario reported a defect.
    #[error("{failed} of {total} scenario(s) failed")]
    ScenarioFailed { failed: usize, total: usize },

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from vrfcheck-core.
    #[error("{0}")]
    Core(#[from] VrfCheckError),

    /// Suite setup failed before any scenario ran.
    #[error("suite error: {0}")]
    Suite(String),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                          |
    /// |------|----------------------------------|
    /// | 0    | All scenarios passed or skipped  |
    /// | 1    | Scenario failure / command error |
    /// | 2    | Configuration error              |
    /// | 10   | IO error                         |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(VrfCheckError::Config(_) | VrfCheckError::Validation(_)) => 2,
            Self::Io(_) | Self::Core(VrfCheckError::Io(_)) => 10,
            Self::ScenarioFailed { .. }
            | Self::Suite(_)
            | Self::JsonSerialize(_)
            | Self::Command(_)
            | Self::Core(_) => 1,
        }
    }
}

impl From<ConformanceError> for CliError {
    fn from(e: ConformanceError) -> Self {
        match e {
            ConformanceError::Config { .. } | ConformanceError::Validation(_) => {
                Self::Config(e.to_string())
            }
            other => Self::Suite(other.to_string()),
        }
    }
}
