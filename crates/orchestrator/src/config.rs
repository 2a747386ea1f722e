//! Orchestrator configuration, loaded from the environment.

use std::time::Duration;

/// Default lease duration for a claimed work unit.
const DEFAULT_LEASE_SECS: u64 = 300;

/// Default delivery attempts per work unit.
const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Default base delay for the exponential retry backoff.
const DEFAULT_RETRY_BASE_SECS: u64 = 30;

/// Default cap on the retry backoff delay.
const DEFAULT_RETRY_CAP_SECS: u64 = 900;

/// Default wall-clock ceiling on a whole execution.
const DEFAULT_EXECUTION_CEILING_SECS: u64 = 6 * 3600;

/// How often the supervisor sweeps for expired leases and overdue
/// executions.
const DEFAULT_SUPERVISOR_INTERVAL_SECS: u64 = 15;

/// How often the dispatcher checks for completed stages.
const DEFAULT_DISPATCH_INTERVAL_SECS: u64 = 5;

/// Output at or below this size is stored inline on the action result;
/// anything larger goes to the artifact store.
const DEFAULT_INLINE_OUTPUT_LIMIT: usize = 32 * 1024;

/// Connection attempts per target before a branch fails with a
/// connection error.
const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;

/// A worker with no heartbeat for this long is marked offline.
const DEFAULT_WORKER_STALE_SECS: u64 = 120;

/// Runtime tuning for the coordinator, dispatcher, and supervisor.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long a worker holds a work unit lease before the supervisor
    /// may reclaim it.
    pub lease: Duration,
    /// Default delivery attempts per work unit (job config overrides).
    pub max_attempts: i32,
    /// Base delay for exponential retry backoff.
    pub retry_base: Duration,
    /// Cap on the retry backoff delay.
    pub retry_cap: Duration,
    /// Wall-clock ceiling on a whole execution, measured from
    /// `scheduled_at`.
    pub execution_ceiling: Duration,
    /// Supervisor sweep interval.
    pub supervisor_interval: Duration,
    /// Dispatcher progression check interval.
    pub dispatch_interval: Duration,
    /// Inline output threshold in bytes.
    pub inline_output_limit: usize,
    /// Connection attempts per target.
    pub connect_attempts: u32,
    /// Heartbeat silence after which a worker is marked offline.
    pub worker_stale: Duration,
}

impl OrchestratorConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            lease: Duration::from_secs(env_u64("OVERSEER_LEASE_SECS", DEFAULT_LEASE_SECS)),
            max_attempts: env_parse("OVERSEER_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
            retry_base: Duration::from_secs(env_u64(
                "OVERSEER_RETRY_BASE_SECS",
                DEFAULT_RETRY_BASE_SECS,
            )),
            retry_cap: Duration::from_secs(env_u64(
                "OVERSEER_RETRY_CAP_SECS",
                DEFAULT_RETRY_CAP_SECS,
            )),
            execution_ceiling: Duration::from_secs(env_u64(
                "OVERSEER_EXECUTION_CEILING_SECS",
                DEFAULT_EXECUTION_CEILING_SECS,
            )),
            supervisor_interval: Duration::from_secs(env_u64(
                "OVERSEER_SUPERVISOR_INTERVAL_SECS",
                DEFAULT_SUPERVISOR_INTERVAL_SECS,
            )),
            dispatch_interval: Duration::from_secs(env_u64(
                "OVERSEER_DISPATCH_INTERVAL_SECS",
                DEFAULT_DISPATCH_INTERVAL_SECS,
            )),
            inline_output_limit: env_parse(
                "OVERSEER_INLINE_OUTPUT_LIMIT",
                DEFAULT_INLINE_OUTPUT_LIMIT,
            ),
            connect_attempts: env_parse("OVERSEER_CONNECT_ATTEMPTS", DEFAULT_CONNECT_ATTEMPTS),
            worker_stale: Duration::from_secs(env_u64(
                "OVERSEER_WORKER_STALE_SECS",
                DEFAULT_WORKER_STALE_SECS,
            )),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(DEFAULT_LEASE_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base: Duration::from_secs(DEFAULT_RETRY_BASE_SECS),
            retry_cap: Duration::from_secs(DEFAULT_RETRY_CAP_SECS),
            execution_ceiling: Duration::from_secs(DEFAULT_EXECUTION_CEILING_SECS),
            supervisor_interval: Duration::from_secs(DEFAULT_SUPERVISOR_INTERVAL_SECS),
            dispatch_interval: Duration::from_secs(DEFAULT_DISPATCH_INTERVAL_SECS),
            inline_output_limit: DEFAULT_INLINE_OUTPUT_LIMIT,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            worker_stale: Duration::from_secs(DEFAULT_WORKER_STALE_SECS),
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env_parse(name, default)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.lease, Duration::from_secs(300));
        assert_eq!(config.max_attempts, 3);
        assert!(config.retry_base < config.retry_cap);
        assert!(config.supervisor_interval < config.lease);
    }
}
