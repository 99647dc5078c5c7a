#![allow(dead_code)]

use netmhc_core::domain::job::{JobId, JobSnapshot};
use netmhc_orchestrator::{Config, JobManager};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Orchestrator rooted in a private temp directory
pub struct Harness {
    pub dir: TempDir,
    pub manager: JobManager,
}

impl Harness {
    pub fn start(max_parallel_jobs: usize) -> Self {
        Self::start_with(|config| config.with_max_parallel_jobs(max_parallel_jobs))
    }

    pub fn start_with(configure: impl FnOnce(Config) -> Config) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let manager = JobManager::start(configure(config_for(&dir))).unwrap();
        Self { dir, manager }
    }

    /// Starts a second orchestrator over the same directories
    pub fn restart(self, configure: impl FnOnce(Config) -> Config) -> Self {
        let Harness { dir, manager } = self;
        drop(manager);
        let manager = JobManager::start(configure(config_for(&dir))).unwrap();
        Self { dir, manager }
    }

    /// Writes an `sh` work script into the scripts directory
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.manager.config().scripts_dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    /// Path in the temp dir that a spy script can touch
    pub fn marker(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub async fn wait_for_terminal(&self, job_id: JobId) -> JobSnapshot {
        wait_until(&self.manager, job_id, |s| s.status.is_terminal()).await
    }
}

pub fn config_for(dir: &TempDir) -> Config {
    let mut config = Config::new(dir.path().join("jobs"));
    config.scripts_dir = dir.path().join("scripts");
    std::fs::create_dir_all(&config.scripts_dir).unwrap();
    config
}

/// Polls a job's status until `done` holds, failing the test after 10s
pub async fn wait_until(
    manager: &JobManager,
    job_id: JobId,
    done: impl Fn(&JobSnapshot) -> bool,
) -> JobSnapshot {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);

    loop {
        let snapshot = manager.get_job_status(job_id).unwrap();
        if done(&snapshot) {
            return snapshot;
        }

        assert!(
            tokio::time::Instant::now() < deadline,
            "job {} stuck in {}",
            job_id,
            snapshot.status
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
