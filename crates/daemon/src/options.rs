//! Daemon configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use herald_dispatch::SetupError;

/// Runtime options for the daemon.
///
/// | variable | meaning | default |
/// |---|---|---|
/// | `HERALD_ANNOUNCE_WORKERS` | announce reporter workers (0 = disabled) | 1 |
/// | `HERALD_REPORT_AGENT` | only report jobs of this agent kind | any |
/// | `HERALD_DRY_RUN` | reporters suppress external side effects | false |
/// | `HERALD_BACKOFF_BASE_MS` | requeue backoff base | 250 |
/// | `HERALD_BACKOFF_MAX_MS` | requeue backoff cap | 180000 |
/// | `HERALD_CONFIG_PATH` | config file watched for restart-on-change | none |
/// | `HERALD_SMOKE` | seed demo jobs and run them to completion | false |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub announce_workers: usize,
    pub report_agent: Option<String>,
    pub dry_run: bool,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub config_path: Option<PathBuf>,
    pub smoke: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            announce_workers: 1,
            report_agent: None,
            dry_run: false,
            backoff_base: Duration::from_millis(250),
            backoff_max: Duration::from_millis(180_000),
            config_path: None,
            smoke: false,
        }
    }
}

impl Options {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut options = Self::default();

        if let Some(raw) = env_var("HERALD_ANNOUNCE_WORKERS") {
            options.announce_workers = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("HERALD_ANNOUNCE_WORKERS: {e}"))?;
        }
        if let Some(agent) = env_var("HERALD_REPORT_AGENT") {
            options.report_agent = Some(agent);
        }
        options.dry_run = env_flag("HERALD_DRY_RUN");
        options.smoke = env_flag("HERALD_SMOKE");
        if let Some(raw) = env_var("HERALD_BACKOFF_BASE_MS") {
            options.backoff_base = Duration::from_millis(
                raw.parse()
                    .map_err(|e| anyhow::anyhow!("HERALD_BACKOFF_BASE_MS: {e}"))?,
            );
        }
        if let Some(raw) = env_var("HERALD_BACKOFF_MAX_MS") {
            options.backoff_max = Duration::from_millis(
                raw.parse()
                    .map_err(|e| anyhow::anyhow!("HERALD_BACKOFF_MAX_MS: {e}"))?,
            );
        }
        if let Some(path) = env_var("HERALD_CONFIG_PATH") {
            options.config_path = Some(PathBuf::from(path));
        }

        Ok(options)
    }

    /// Startup validation: the daemon needs at least one report worker.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.announce_workers == 0 {
            return Err(SetupError::NoReporters);
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_flag(name: &str) -> bool {
    matches!(
        env_var(name).as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = Options::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.announce_workers, 1);
        assert!(!options.dry_run);
    }

    #[test]
    fn zero_workers_fails_validation() {
        let options = Options {
            announce_workers: 0,
            ..Options::default()
        };
        assert!(matches!(options.validate(), Err(SetupError::NoReporters)));
    }
}
