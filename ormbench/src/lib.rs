#![doc = include_str!("../README.md")]

pub mod aggregator;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod reporter;

pub use error::{HarnessError, HealthError};
pub use generator::{Generator, VirtualClientState};
pub use orchestrator::execute;
pub use reporter::{Comparison, ComparisonReporter};

pub mod prelude {
    pub use crate::reporter::{Comparison, ComparisonReporter};
    pub use ormbench_core::{
        ConfigError, Operation, Outcome, RequestSample, ResponseStatus, RunConfig, RunOutcome,
        Target, TargetResult, ThinkTime,
    };
}
