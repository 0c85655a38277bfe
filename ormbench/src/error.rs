use ormbench_core::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Faults that abort a whole comparison.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },

    #[error("Results file {} already exists", .0.display())]
    ResultsExist(PathBuf),

    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to format run timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

impl HarnessError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| HarnessError::Io { path, source }
    }
}

/// Why a target failed its liveness probe.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("health probe failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("health probe returned status {0}")]
    Status(u16),
}
