//! Job Service
//!
//! The job façade: submit, status, result, log, cancel and list. Coordinates
//! the job store, the admission controller and the process supervisor. None of
//! these operations ever waits for a work process; submit and cancel only
//! initiate or signal, queries only read the store.

use chrono::Utc;
use netmhc_core::domain::job::{ArgValue, JobArgs, JobId, JobSnapshot, JobStatus};
use netmhc_core::dto::job::JobResultResponse;
use netmhc_core::dto::log::JobLog;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{OrchestratorError, Result};
use crate::repository::{
    job_repository::{JobStore, NewJob, UpdateOutcome},
    log_repository,
};
use crate::service::admission::{Admission, AdmissionController};
use crate::service::supervisor::{ProcessSupervisor, SupervisorSettings};

/// Error recorded on jobs that were running when the orchestrator went down
pub const INTERRUPTED_BY_RESTART: &str = "interrupted by restart";

/// How a cancel request was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAck {
    /// The job was pending and is now cancelled; no process was started
    Cancelled,
    /// The job was running; termination was requested and the final status
    /// shows up once the process has exited
    TerminationRequested,
}

impl CancelAck {
    pub fn message(self) -> &'static str {
        match self {
            CancelAck::Cancelled => "job cancelled before it started",
            CancelAck::TerminationRequested => "termination requested",
        }
    }
}

/// Cheap, cloneable handle to the orchestrator
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    store: Arc<JobStore>,
    admission: AdmissionController,
    supervisor: Arc<ProcessSupervisor>,
}

impl JobManager {
    /// Opens the jobs directory, restores persisted jobs and starts dispatching
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: Config) -> Result<Self> {
        let store = Arc::new(JobStore::open(&config.jobs_dir)?);
        let (exits_tx, exits_rx) = mpsc::unbounded_channel();

        let supervisor = Arc::new(ProcessSupervisor::new(
            Arc::clone(&store),
            SupervisorSettings::from(&config),
            exits_tx,
        ));

        let inner = Arc::new(Inner {
            admission: AdmissionController::new(config.max_parallel_jobs),
            config,
            store,
            supervisor,
        });

        tokio::spawn(dispatch_exits(Arc::downgrade(&inner), exits_rx));

        inner.recover()?;

        info!(
            "Job orchestrator ready (jobs dir: {}, max parallel jobs: {})",
            inner.config.jobs_dir.display(),
            inner.admission.max_parallel()
        );

        Ok(Self { inner })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Directory holding everything the orchestrator keeps for `job_id`
    pub fn job_dir(&self, job_id: JobId) -> PathBuf {
        self.inner.store.job_dir(job_id)
    }

    /// Registers a unit of work and returns its id immediately
    ///
    /// The job starts right away when a slot is free and is queued otherwise.
    /// A relative `script_path` is resolved against the scripts directory.
    pub fn submit_job(
        &self,
        script_path: impl AsRef<Path>,
        args: JobArgs,
        job_name: Option<&str>,
    ) -> Result<JobId> {
        let script_path = script_path.as_ref();
        validate_submission(script_path, &args)?;

        let script_path = if script_path.is_absolute() {
            script_path.to_path_buf()
        } else {
            self.inner.config.scripts_dir.join(script_path)
        };

        let name = match job_name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => default_job_name(&script_path),
        };

        let record = self.inner.store.create(NewJob {
            name,
            script_path,
            args,
        })?;
        let job_id = record.job_id;

        info!(job_id = %job_id, "Job '{}' submitted", record.name);

        match self.inner.admission.try_admit(job_id, record.seq) {
            Admission::Start => {
                if !self.inner.launch(job_id) {
                    self.inner.admission.release(job_id);
                    self.inner.promote_next();
                }
            }
            Admission::Queued { position } => {
                debug!(job_id = %job_id, "Job queued at position {}", position);
            }
        }

        Ok(job_id)
    }

    pub fn get_job_status(&self, job_id: JobId) -> Result<JobSnapshot> {
        self.inner
            .store
            .get(job_id)
            .map(|record| record.snapshot())
            .ok_or_else(|| OrchestratorError::not_found(job_id))
    }

    /// Returns the captured result of a completed job
    pub fn get_job_result(&self, job_id: JobId) -> Result<JobResultResponse> {
        let record = self
            .inner
            .store
            .get(job_id)
            .ok_or_else(|| OrchestratorError::not_found(job_id))?;

        match record.status {
            JobStatus::Pending | JobStatus::Running => Err(OrchestratorError::NotReady {
                job_id,
                status: record.status,
            }),
            JobStatus::Failed => Err(OrchestratorError::JobFailed {
                job_id,
                exit_code: record.exit_code,
                error: record.error.unwrap_or_default(),
            }),
            JobStatus::Cancelled => Err(OrchestratorError::JobCancelled(job_id)),
            JobStatus::Completed => Ok(JobResultResponse {
                job_id,
                result: record.result.unwrap_or_default(),
                exit_code: record.exit_code,
            }),
        }
    }

    /// Reads the job's log; `tail == 0` returns all of it
    pub fn get_job_log(&self, job_id: JobId, tail: usize) -> Result<JobLog> {
        let record = self
            .inner
            .store
            .get(job_id)
            .ok_or_else(|| OrchestratorError::not_found(job_id))?;

        let log = log_repository::read_lines(&record.log_path, tail, record.status.is_terminal())?;

        Ok(JobLog {
            job_id,
            lines: log.lines,
            total_lines: log.total_lines,
        })
    }

    pub fn cancel_job(&self, job_id: JobId) -> Result<CancelAck> {
        loop {
            let record = self
                .inner
                .store
                .get(job_id)
                .ok_or_else(|| OrchestratorError::not_found(job_id))?;

            match record.status {
                status if status.is_terminal() => {
                    return Err(OrchestratorError::AlreadyTerminal { job_id, status });
                }
                JobStatus::Pending => {
                    if self.inner.cancel_pending(job_id) {
                        return Ok(CancelAck::Cancelled);
                    }
                    // promoted in the meantime, cancel it as a running job
                }
                _ => {
                    if self.inner.supervisor.cancel(job_id) {
                        info!(job_id = %job_id, "Cancellation requested for running job");
                    } else {
                        debug!(job_id = %job_id, "Running job already exiting, nothing to signal");
                    }
                    return Ok(CancelAck::TerminationRequested);
                }
            }
        }
    }

    /// Status snapshots ordered by submission time
    pub fn list_jobs(&self, status: Option<JobStatus>) -> Vec<JobSnapshot> {
        self.inner
            .store
            .list(status)
            .iter()
            .map(|record| record.snapshot())
            .collect()
    }

    pub fn running_count(&self) -> usize {
        self.inner.admission.running_count()
    }

    pub fn queued_count(&self) -> usize {
        self.inner.admission.queued_count()
    }
}

impl Inner {
    /// Marks a job running and hands it to the supervisor
    ///
    /// Returns false when the job is no longer pending (e.g. cancelled while
    /// queued); the caller still owns the admission slot in that case.
    fn launch(&self, job_id: JobId) -> bool {
        let cancel_rx = self.supervisor.register(job_id);

        let outcome = self.store.transition(job_id, JobStatus::Pending, |r| {
            r.status = JobStatus::Running;
            r.started_at = Some(Utc::now());
        });

        match outcome {
            Some(UpdateOutcome::Applied(record)) => {
                self.supervisor.spawn(record, cancel_rx);
                true
            }
            other => {
                self.supervisor.unregister(job_id);
                if let Some(outcome) = other {
                    debug!(job_id = %job_id, "Not launching job in status {}", outcome.record().status);
                }
                false
            }
        }
    }

    /// Cancels a job that is still pending; false once it has left `pending`
    fn cancel_pending(&self, job_id: JobId) -> bool {
        let outcome = self.store.transition(job_id, JobStatus::Pending, |r| {
            r.status = JobStatus::Cancelled;
            r.ended_at = Some(Utc::now());
        });

        match outcome {
            Some(UpdateOutcome::Applied(_)) => {
                self.admission.withdraw(job_id);
                info!(job_id = %job_id, "Pending job cancelled");
                true
            }
            _ => false,
        }
    }

    /// Starts queued jobs while slots are free
    fn promote_next(&self) {
        while let Some(job_id) = self.admission.next_queued() {
            if self.launch(job_id) {
                debug!(job_id = %job_id, "Promoted queued job");
            } else {
                self.admission.release(job_id);
            }
        }
    }

    /// Settles jobs left over from a previous run
    fn recover(&self) -> Result<()> {
        let records = self.store.rehydrate()?;

        for record in records {
            match record.status {
                JobStatus::Running => {
                    warn!(job_id = %record.job_id, "Job was running at shutdown, marking failed");
                    self.store.update(record.job_id, |r| {
                        r.status = JobStatus::Failed;
                        r.ended_at = Some(Utc::now());
                        r.error = Some(INTERRUPTED_BY_RESTART.to_string());
                    });
                }
                JobStatus::Pending => {
                    if self.admission.try_admit(record.job_id, record.seq) == Admission::Start
                        && !self.launch(record.job_id)
                    {
                        self.admission.release(record.job_id);
                    }
                }
                _ => {}
            }
        }

        self.promote_next();
        Ok(())
    }
}

/// Frees the slot of every finished job and promotes the next queued one
async fn dispatch_exits(inner: Weak<Inner>, mut exits: mpsc::UnboundedReceiver<JobId>) {
    while let Some(job_id) = exits.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };

        inner.admission.release(job_id);
        inner.promote_next();
    }

    debug!("Exit dispatcher stopped");
}

// =============================================================================
// Validation
// =============================================================================

fn validate_submission(script_path: &Path, args: &JobArgs) -> Result<()> {
    let raw = script_path.as_os_str();
    if raw.is_empty() {
        return Err(OrchestratorError::Validation(
            "script_path cannot be empty".to_string(),
        ));
    }

    if raw.as_encoded_bytes().contains(&0) {
        return Err(OrchestratorError::Validation(
            "script_path contains a NUL byte".to_string(),
        ));
    }

    for (name, value) in args {
        validate_arg_name(name)?;

        if matches!(value, ArgValue::Text(text) if text.contains('\0')) {
            return Err(OrchestratorError::Validation(format!(
                "value of argument '{}' contains a NUL byte",
                name
            )));
        }
    }

    Ok(())
}

fn validate_arg_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(OrchestratorError::Validation(format!(
            "invalid argument name '{}': use letters, digits, '_' or '-' and no leading '-'",
            name
        )))
    }
}

fn default_job_name(script_path: &Path) -> String {
    script_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "job".to_string())
}

/// Parses an externally supplied id; anything unparseable is simply unknown
pub fn parse_job_id(raw: &str) -> Result<JobId> {
    raw.parse().map_err(|_| OrchestratorError::not_found(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn manager_with(dir: &tempfile::TempDir, max_parallel_jobs: usize) -> JobManager {
        let mut config =
            Config::new(dir.path().join("jobs")).with_max_parallel_jobs(max_parallel_jobs);
        config.scripts_dir = dir.path().join("scripts");
        std::fs::create_dir_all(&config.scripts_dir).unwrap();
        JobManager::start(config).unwrap()
    }

    fn write_script(manager: &JobManager, name: &str, body: &str) {
        std::fs::write(manager.config().scripts_dir.join(name), body).unwrap();
    }

    async fn wait_terminal(manager: &JobManager, job_id: JobId) -> JobSnapshot {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let snapshot = manager.get_job_status(job_id).unwrap();
            if snapshot.status.is_terminal() {
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

    #[tokio::test]
    async fn test_cancel_racing_promotion_terminates_process() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(&dir, 1);
        let marker = dir.path().join("spy-ran");
        write_script(&manager, "blocker.sh", "exec sleep 30\n");
        write_script(
            &manager,
            "spy.sh",
            &format!("sleep 1\ntouch '{}'\n", marker.display()),
        );

        let blocker = manager.submit_job("blocker.sh", JobArgs::new(), None).unwrap();
        let spy = manager.submit_job("spy.sh", JobArgs::new(), None).unwrap();
        assert_eq!(manager.get_job_status(spy).unwrap().status, JobStatus::Pending);

        // promotion lands after cancel saw `pending` but before it wrote
        let inner = &manager.inner;
        assert!(inner.admission.withdraw(spy));
        assert!(inner.launch(spy));

        assert!(!inner.cancel_pending(spy));
        assert_eq!(manager.get_job_status(spy).unwrap().status, JobStatus::Running);

        assert_eq!(
            manager.cancel_job(spy).unwrap(),
            CancelAck::TerminationRequested
        );
        assert_eq!(wait_terminal(&manager, spy).await.status, JobStatus::Cancelled);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "cancelled job kept running");

        manager.cancel_job(blocker).unwrap();
        wait_terminal(&manager, blocker).await;
    }

    #[tokio::test]
    async fn test_cancel_before_promotion_never_starts_process() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(&dir, 1);
        let marker = dir.path().join("spy-ran");
        write_script(&manager, "blocker.sh", "exec sleep 30\n");
        write_script(&manager, "spy.sh", &format!("touch '{}'\n", marker.display()));

        let blocker = manager.submit_job("blocker.sh", JobArgs::new(), None).unwrap();
        let spy = manager.submit_job("spy.sh", JobArgs::new(), None).unwrap();

        assert!(manager.inner.cancel_pending(spy));

        // a promotion arriving late must not resurrect it
        assert!(!manager.inner.launch(spy));
        assert_eq!(manager.queued_count(), 0);

        manager.cancel_job(blocker).unwrap();
        wait_terminal(&manager, blocker).await;

        let snapshot = manager.get_job_status(spy).unwrap();
        assert_eq!(snapshot.status, JobStatus::Cancelled);
        assert!(snapshot.started_at.is_none());
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_cancel_after_natural_exit_keeps_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(&dir, 1);
        write_script(&manager, "quick.sh", "echo 42\n");

        let job_id = manager.submit_job("quick.sh", JobArgs::new(), None).unwrap();
        let finished = wait_terminal(&manager, job_id).await;
        assert_eq!(finished.status, JobStatus::Completed);

        assert!(matches!(
            manager.cancel_job(job_id),
            Err(OrchestratorError::AlreadyTerminal {
                status: JobStatus::Completed,
                ..
            })
        ));
        assert!(!manager.inner.supervisor.cancel(job_id));
        assert_eq!(manager.get_job_status(job_id).unwrap(), finished);
        assert_eq!(manager.get_job_result(job_id).unwrap().result, "42");
    }

    #[test]
    fn test_validate_arg_names() {
        assert!(validate_arg_name("allele").is_ok());
        assert!(validate_arg_name("output_dir").is_ok());
        assert!(validate_arg_name("terminal-anchor").is_ok());

        assert!(validate_arg_name("").is_err());
        assert!(validate_arg_name("--input").is_err());
        assert!(validate_arg_name("in put").is_err());
        assert!(validate_arg_name("a;b").is_err());
    }

    #[test]
    fn test_validate_submission() {
        let mut args = JobArgs::new();
        args.insert("input".to_string(), ArgValue::from("peptides.txt"));
        assert!(validate_submission(Path::new("peptide_prediction.py"), &args).is_ok());

        assert!(matches!(
            validate_submission(Path::new(""), &args),
            Err(OrchestratorError::Validation(_))
        ));

        args.insert("bad".to_string(), ArgValue::from("a\0b"));
        assert!(matches!(
            validate_submission(Path::new("peptide_prediction.py"), &args),
            Err(OrchestratorError::Validation(_))
        ));
    }

    #[test]
    fn test_default_job_name() {
        assert_eq!(
            default_job_name(Path::new("/opt/scripts/protein_analysis.py")),
            "protein_analysis"
        );
        assert_eq!(default_job_name(Path::new("/")), "job");
    }

    #[test]
    fn test_parse_job_id() {
        let id = JobId::new();
        assert_eq!(parse_job_id(&id.to_string()).unwrap(), id);
        assert!(matches!(
            parse_job_id("../../etc"),
            Err(OrchestratorError::NotFound(_))
        ));
    }
}
