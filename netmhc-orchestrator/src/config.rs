//! Orchestrator configuration
//!
//! Defines all configurable parameters for the orchestrator: where job state
//! lives, where the prediction scripts are, how many work processes may run at
//! once and how results are captured.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory holding one sub-directory per job
    pub jobs_dir: PathBuf,

    /// Directory holding the bundled prediction scripts
    pub scripts_dir: PathBuf,

    /// HTTP bind address (e.g., "127.0.0.1:8080")
    pub bind_addr: String,

    /// Max work processes running at the same time
    pub max_parallel_jobs: usize,

    /// Trailing log lines kept as a job's result when the script writes no result file
    pub result_tail_lines: usize,

    /// Trailing log lines quoted in a failed job's error
    pub error_tail_lines: usize,

    /// Wall-time limit for a running job; none by default
    pub job_timeout: Option<Duration>,

    /// Wall-time limit for a synchronous tool call
    pub sync_timeout: Duration,

    /// Script file extension -> interpreter program
    pub interpreters: HashMap<String, String>,
}

impl Config {
    /// Creates a configuration rooted at `jobs_dir` with defaults for everything else
    pub fn new(jobs_dir: impl Into<PathBuf>) -> Self {
        Self {
            jobs_dir: jobs_dir.into(),
            scripts_dir: PathBuf::from("scripts"),
            bind_addr: "127.0.0.1:8080".to_string(),
            max_parallel_jobs: 2,
            result_tail_lines: 50,
            error_tail_lines: 20,
            job_timeout: None,
            sync_timeout: Duration::from_secs(60),
            interpreters: default_interpreters("python3"),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Every variable is optional:
    /// - NETMHC_JOBS_DIR (default: ./jobs)
    /// - NETMHC_SCRIPTS_DIR (default: ./scripts)
    /// - NETMHC_BIND_ADDR (default: 127.0.0.1:8080)
    /// - NETMHC_MAX_PARALLEL_JOBS (default: 2)
    /// - NETMHC_RESULT_TAIL_LINES (default: 50)
    /// - NETMHC_ERROR_TAIL_LINES (default: 20)
    /// - NETMHC_JOB_TIMEOUT (seconds, default: unset)
    /// - NETMHC_SYNC_TIMEOUT (seconds, default: 60)
    /// - NETMHC_PYTHON (default: python3)
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("NETMHC_JOBS_DIR") {
            config.jobs_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("NETMHC_SCRIPTS_DIR") {
            config.scripts_dir = PathBuf::from(dir);
        }

        if let Ok(addr) = std::env::var("NETMHC_BIND_ADDR") {
            config.bind_addr = addr;
        }

        if let Some(n) = parse_env::<usize>("NETMHC_MAX_PARALLEL_JOBS")? {
            config.max_parallel_jobs = n;
        }

        if let Some(n) = parse_env::<usize>("NETMHC_RESULT_TAIL_LINES")? {
            config.result_tail_lines = n;
        }

        if let Some(n) = parse_env::<usize>("NETMHC_ERROR_TAIL_LINES")? {
            config.error_tail_lines = n;
        }

        config.job_timeout = parse_env::<u64>("NETMHC_JOB_TIMEOUT")?.map(Duration::from_secs);

        if let Some(secs) = parse_env::<u64>("NETMHC_SYNC_TIMEOUT")? {
            config.sync_timeout = Duration::from_secs(secs);
        }

        if let Ok(python) = std::env::var("NETMHC_PYTHON") {
            config.interpreters.insert("py".to_string(), python);
        }

        Ok(config)
    }

    /// Maps scripts with the given extension to an interpreter program
    pub fn with_interpreter(mut self, extension: &str, program: &str) -> Self {
        self.interpreters
            .insert(extension.trim_start_matches('.').to_string(), program.to_string());
        self
    }

    pub fn with_max_parallel_jobs(mut self, max_parallel_jobs: usize) -> Self {
        self.max_parallel_jobs = max_parallel_jobs;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jobs_dir.as_os_str().is_empty() {
            anyhow::bail!("jobs_dir cannot be empty");
        }

        if self.max_parallel_jobs == 0 {
            anyhow::bail!("max_parallel_jobs must be greater than 0");
        }

        if self.result_tail_lines == 0 {
            anyhow::bail!("result_tail_lines must be greater than 0");
        }

        if self.error_tail_lines == 0 {
            anyhow::bail!("error_tail_lines must be greater than 0");
        }

        if self.job_timeout.is_some_and(|t| t.is_zero()) {
            anyhow::bail!("job_timeout must be greater than 0 when set");
        }

        if self.sync_timeout.is_zero() {
            anyhow::bail!("sync_timeout must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("jobs")
    }
}

fn default_interpreters(python: &str) -> HashMap<String, String> {
    HashMap::from([
        ("py".to_string(), python.to_string()),
        ("sh".to_string(), "sh".to_string()),
    ])
}

fn parse_env<T: std::str::FromStr>(name: &str) -> anyhow::Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", name, raw)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.jobs_dir, PathBuf::from("jobs"));
        assert_eq!(config.max_parallel_jobs, 2);
        assert_eq!(config.result_tail_lines, 50);
        assert!(config.job_timeout.is_none());
        assert_eq!(config.sync_timeout, Duration::from_secs(60));
        assert_eq!(config.interpreters.get("py"), Some(&"python3".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.max_parallel_jobs = 0;
        assert!(config.validate().is_err());
        config.max_parallel_jobs = 1;

        config.jobs_dir = PathBuf::new();
        assert!(config.validate().is_err());
        config.jobs_dir = PathBuf::from("/tmp/jobs");

        config.job_timeout = Some(Duration::ZERO);
        assert!(config.validate().is_err());

        config.job_timeout = Some(Duration::from_secs(60));
        assert!(config.validate().is_ok());

        config.sync_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_interpreter() {
        let config = Config::default()
            .with_interpreter(".R", "Rscript")
            .with_max_parallel_jobs(4);

        assert_eq!(config.interpreters.get("R"), Some(&"Rscript".to_string()));
        assert_eq!(config.max_parallel_jobs, 4);
    }
}
