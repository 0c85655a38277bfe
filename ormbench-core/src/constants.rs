use std::num::NonZeroU32;
use std::time::Duration;

/// Number of virtual clients used by a default comparison run
pub const DEFAULT_CLIENTS: usize = 20;

/// Virtual clients started per second during ramp-up
pub const DEFAULT_RAMP_RATE: NonZeroU32 = unsafe { NonZeroU32::new_unchecked(5) };

pub const DEFAULT_DURATION: Duration = Duration::from_secs(120);

/// Worker threads backing the async runtime
pub const DEFAULT_WORKERS: usize = 4;

pub const DEFAULT_THINK_TIME_MIN: Duration = Duration::from_secs(1);
pub const DEFAULT_THINK_TIME_MAX: Duration = Duration::from_secs(3);

/// How long in-flight requests may keep running after the run deadline
pub const DEFAULT_GRACE: Duration = Duration::from_secs(10);

/// Hard wall-clock cap for a single target's run
pub const DEFAULT_RUN_BUDGET: Duration = Duration::from_secs(300);

/// Pause between two targets of one comparison
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10);

pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Flavor tag used when a target's health probe does not report one
pub const UNKNOWN_FLAVOR: &str = "unknown";
