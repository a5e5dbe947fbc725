//! Worker pool configuration.

use std::time::Duration;

/// Dispatcher and supervisor settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of generations running at once in this process.
    pub concurrency: usize,
    /// How often the dispatcher polls for pending jobs.
    pub poll_interval: Duration,
    /// A `generating` job untouched for this long is considered stuck.
    pub stale_threshold: Duration,
    /// How often the supervisor scans for stuck jobs.
    pub stale_check_interval: Duration,
    /// How long in-flight jobs may run after shutdown begins.
    pub shutdown_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_interval: Duration::from_millis(1000),
            stale_threshold: Duration::from_secs(900),
            stale_check_interval: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default |
    /// |---------------------------------|---------|
    /// | `WORKER_CONCURRENCY`            | `4`     |
    /// | `WORKER_POLL_INTERVAL_MS`       | `1000`  |
    /// | `STALE_JOB_THRESHOLD_SECS`      | `900`   |
    /// | `STALE_JOB_CHECK_INTERVAL_SECS` | `60`    |
    /// | `SHUTDOWN_TIMEOUT_SECS`         | `30`    |
    pub fn from_env() -> Self {
        let concurrency: usize = parse_env("WORKER_CONCURRENCY", 4);
        assert!(concurrency > 0, "WORKER_CONCURRENCY must be at least 1");

        Self {
            concurrency,
            poll_interval: Duration::from_millis(parse_env("WORKER_POLL_INTERVAL_MS", 1000)),
            stale_threshold: Duration::from_secs(parse_env("STALE_JOB_THRESHOLD_SECS", 900)),
            stale_check_interval: Duration::from_secs(parse_env(
                "STALE_JOB_CHECK_INTERVAL_SECS",
                60,
            )),
            shutdown_grace: Duration::from_secs(parse_env("SHUTDOWN_TIMEOUT_SECS", 30)),
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + ToString,
{
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid number"))
}
