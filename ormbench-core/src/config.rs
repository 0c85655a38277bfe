use crate::{
    ConfigError, DEFAULT_CLIENTS, DEFAULT_COOLDOWN, DEFAULT_DURATION, DEFAULT_GRACE,
    DEFAULT_HEALTH_TIMEOUT, DEFAULT_RAMP_RATE, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RUN_BUDGET,
    DEFAULT_THINK_TIME_MAX, DEFAULT_THINK_TIME_MIN, DEFAULT_WORKERS,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::num::NonZeroU32;
use std::time::Duration;

/// Parameters for one comparison run, shared by every target in it.
///
/// Never mutated once a run starts; the persisted comparison report embeds the exact config that
/// produced it.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub clients: usize,
    pub ramp_rate: NonZeroU32,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub duration: Duration,
    pub workers: usize,
    pub think_time: ThinkTime,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub grace: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub run_budget: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub cooldown: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub health_timeout: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub request_timeout: Duration,
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            clients: DEFAULT_CLIENTS,
            ramp_rate: DEFAULT_RAMP_RATE,
            duration: DEFAULT_DURATION,
            workers: DEFAULT_WORKERS,
            think_time: ThinkTime::default(),
            grace: DEFAULT_GRACE,
            run_budget: DEFAULT_RUN_BUDGET,
            cooldown: DEFAULT_COOLDOWN,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            seed: None,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clients == 0 {
            return Err(ConfigError::NoClients);
        }

        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        if self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }

        let ThinkTime { min, max } = self.think_time;
        if min > max {
            return Err(ConfigError::ThinkTimeRange { min, max });
        }

        let required = self.duration + self.grace;
        if self.run_budget <= required {
            return Err(ConfigError::BudgetTooSmall {
                budget: self.run_budget,
                required,
            });
        }

        Ok(())
    }
}

/// Uniform range a virtual client pauses for between two operations.
#[serde_as]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThinkTime {
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub min: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub max: Duration,
}

impl ThinkTime {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }
}

impl Default for ThinkTime {
    fn default() -> Self {
        Self {
            min: DEFAULT_THINK_TIME_MIN,
            max: DEFAULT_THINK_TIME_MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = RunConfig::default();
        assert_eq!(config.clients, 20);
        assert_eq!(config.ramp_rate.get(), 5);
        assert_eq!(config.duration, Duration::from_secs(120));
        assert_eq!(config.workers, 4);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_clients_and_workers() {
        let config = RunConfig {
            clients: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoClients));

        let config = RunConfig {
            workers: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoWorkers));
    }

    #[test]
    fn rejects_inverted_think_time() {
        let config = RunConfig {
            think_time: ThinkTime::new(Duration::from_secs(3), Duration::from_secs(1)),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThinkTimeRange { .. })
        ));
    }

    #[test]
    fn budget_must_cover_duration_and_grace() {
        let config = RunConfig {
            duration: Duration::from_secs(60),
            grace: Duration::from_secs(10),
            run_budget: Duration::from_secs(70),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::BudgetTooSmall {
                budget: Duration::from_secs(70),
                required: Duration::from_secs(70),
            })
        );
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(RunConfig::default()).unwrap();
        assert_eq!(json["duration"], 120.0);
        assert_eq!(json["think_time"]["min"], 1.0);
        assert_eq!(json["ramp_rate"], 5);
    }
}
