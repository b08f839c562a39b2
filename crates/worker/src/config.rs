use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use applaude_pipeline::{QueueRetryPolicy, TimeLimits};

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Concurrent task loops (default: `4`).
    pub concurrency: usize,
    /// Sleep between polls of an empty queue (default: `1000` ms).
    pub poll_interval: Duration,
    pub time_limits: TimeLimits,
    pub queue_retry: QueueRetryPolicy,
    /// How often idle projects are swept for re-dispatch (default: `60` s).
    pub sweep_interval: Duration,
    /// How long a project must rest before the sweep re-dispatches it
    /// (default: `600` s).
    pub idle_grace: Duration,
    /// Root directory for generated source (default: `./artifacts`).
    pub artifact_dir: PathBuf,
    /// How long shutdown waits for in-flight tasks (default: `30` s).
    pub shutdown_timeout: Duration,
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid {}", std::any::type_name::<T>())),
        None => default,
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default       |
    /// |--------------------------------|---------------|
    /// | `WORKER_CONCURRENCY`           | `4`           |
    /// | `WORKER_POLL_INTERVAL_MS`      | `1000`        |
    /// | `TASK_SOFT_TIME_LIMIT_SECS`    | `240`         |
    /// | `TASK_HARD_TIME_LIMIT_SECS`    | `300`         |
    /// | `TASK_MAX_RETRIES`             | `3`           |
    /// | `TASK_RETRY_DELAY_SECS`        | `60`          |
    /// | `TASK_RETRY_BACKOFF`           | `1.0`         |
    /// | `DISPATCH_SWEEP_INTERVAL_SECS` | `60`          |
    /// | `DISPATCH_IDLE_GRACE_SECS`     | `600`         |
    /// | `ARTIFACT_DIR`                 | `./artifacts` |
    /// | `SHUTDOWN_TIMEOUT_SECS`        | `30`          |
    ///
    /// Panics on values that do not parse.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let limits = TimeLimits::default();
        let retry = QueueRetryPolicy::default();

        let soft = Duration::from_secs(parse_or(
            &lookup,
            "TASK_SOFT_TIME_LIMIT_SECS",
            limits.soft.as_secs(),
        ));
        let hard = Duration::from_secs(parse_or(
            &lookup,
            "TASK_HARD_TIME_LIMIT_SECS",
            limits.hard.as_secs(),
        ));
        let backoff: f64 = parse_or(&lookup, "TASK_RETRY_BACKOFF", retry.backoff);
        assert!(
            backoff.is_finite() && backoff >= 1.0,
            "TASK_RETRY_BACKOFF must be a finite number >= 1",
        );

        Self {
            concurrency: parse_or(&lookup, "WORKER_CONCURRENCY", 4usize).max(1),
            poll_interval: Duration::from_millis(parse_or(&lookup, "WORKER_POLL_INTERVAL_MS", 1000)),
            time_limits: TimeLimits {
                soft: soft.min(hard),
                hard,
            },
            queue_retry: QueueRetryPolicy {
                max_retries: parse_or(&lookup, "TASK_MAX_RETRIES", retry.max_retries),
                delay: Duration::from_secs(parse_or(
                    &lookup,
                    "TASK_RETRY_DELAY_SECS",
                    retry.delay.as_secs(),
                )),
                backoff,
            },
            sweep_interval: Duration::from_secs(parse_or(
                &lookup,
                "DISPATCH_SWEEP_INTERVAL_SECS",
                60,
            )),
            idle_grace: Duration::from_secs(parse_or(&lookup, "DISPATCH_IDLE_GRACE_SECS", 600)),
            artifact_dir: lookup("ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./artifacts")),
            shutdown_timeout: Duration::from_secs(parse_or(&lookup, "SHUTDOWN_TIMEOUT_SECS", 30)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> WorkerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_pipeline_policy() {
        let config = from_pairs(&[]);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.time_limits, TimeLimits::default());
        assert_eq!(config.queue_retry, QueueRetryPolicy::default());
        assert_eq!(config.artifact_dir, PathBuf::from("./artifacts"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = from_pairs(&[
            ("WORKER_CONCURRENCY", "8"),
            ("TASK_HARD_TIME_LIMIT_SECS", "120"),
            ("TASK_SOFT_TIME_LIMIT_SECS", "90"),
            ("TASK_RETRY_BACKOFF", "2.0"),
            ("ARTIFACT_DIR", "/var/lib/applaude"),
        ]);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.time_limits.hard, Duration::from_secs(120));
        assert_eq!(config.time_limits.soft, Duration::from_secs(90));
        assert_eq!(config.queue_retry.backoff, 2.0);
        assert_eq!(config.artifact_dir, PathBuf::from("/var/lib/applaude"));
    }

    #[test]
    fn soft_limit_is_capped_by_hard_limit() {
        let config = from_pairs(&[
            ("TASK_SOFT_TIME_LIMIT_SECS", "500"),
            ("TASK_HARD_TIME_LIMIT_SECS", "100"),
        ]);
        assert_eq!(config.time_limits.soft, Duration::from_secs(100));
    }

    #[test]
    fn zero_concurrency_becomes_one() {
        assert_eq!(from_pairs(&[("WORKER_CONCURRENCY", "0")]).concurrency, 1);
    }

    #[test]
    #[should_panic(expected = "WORKER_CONCURRENCY must be a valid")]
    fn invalid_number_panics() {
        from_pairs(&[("WORKER_CONCURRENCY", "many")]);
    }

    #[test]
    #[should_panic(expected = "TASK_RETRY_BACKOFF must be a finite number")]
    fn infinite_backoff_panics() {
        from_pairs(&[("TASK_RETRY_BACKOFF", "inf")]);
    }

    #[test]
    #[should_panic(expected = "TASK_RETRY_BACKOFF must be a finite number")]
    fn backoff_below_one_panics() {
        from_pairs(&[("TASK_RETRY_BACKOFF", "0.5")]);
    }
}
