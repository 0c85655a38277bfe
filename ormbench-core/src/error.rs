use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Client count must be at least 1")]
    NoClients,

    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Run duration must be non-zero")]
    ZeroDuration,

    #[error("Think time minimum ({min:?}) is larger than its maximum ({max:?})")]
    ThinkTimeRange {
        min: std::time::Duration,
        max: std::time::Duration,
    },

    #[error("Run budget ({budget:?}) must exceed duration plus grace ({required:?})")]
    BudgetTooSmall {
        budget: std::time::Duration,
        required: std::time::Duration,
    },

    #[error("Invalid target `{0}`, expected NAME=URL[=DESCRIPTION]")]
    TargetSpec(String),

    #[error("Invalid target URL `{url}`: {source}")]
    TargetUrl {
        url: String,
        source: url::ParseError,
    },
}
