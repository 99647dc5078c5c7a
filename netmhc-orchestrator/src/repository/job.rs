//! Job Repository
//!
//! File-backed store of Job Records. Each record is held in memory behind its
//! own lock and mirrored to `<jobs_dir>/<job_id>/metadata.json`, so updates to
//! one job are serialized while different jobs never contend.
//!
//! The store is the single choke point for status changes: `update` refuses to
//! touch a record that is already terminal and drops mutations that would break
//! the job state machine.

use chrono::Utc;
use netmhc_core::domain::job::{JobArgs, JobId, JobRecord, JobStatus};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, warn};

const METADATA_FILE: &str = "metadata.json";
const LOG_FILE: &str = "job.log";
const RESULT_FILE: &str = "result.txt";

/// Fields supplied by the submitter
#[derive(Debug, Clone)]
pub struct NewJob {
    pub name: String,
    pub script_path: PathBuf,
    pub args: JobArgs,
}

/// What happened to a requested mutation
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// The mutation was applied; carries the new record
    Applied(JobRecord),
    /// The record was terminal or the status change was illegal; carries the unchanged record
    Rejected(JobRecord),
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied(_))
    }

    pub fn record(&self) -> &JobRecord {
        match self {
            UpdateOutcome::Applied(record) | UpdateOutcome::Rejected(record) => record,
        }
    }
}

/// Thread-safe, file-backed collection of Job Records
pub struct JobStore {
    root: PathBuf,
    jobs: RwLock<HashMap<JobId, Arc<Mutex<JobRecord>>>>,
    next_seq: AtomicU64,
}

impl JobStore {
    /// Opens (and creates if needed) a store rooted at `root`
    ///
    /// The store starts empty; call [`JobStore::rehydrate`] to load persisted jobs.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        Ok(Self {
            root,
            jobs: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        })
    }

    pub fn job_dir(&self, job_id: JobId) -> PathBuf {
        self.root.join(job_id.to_string())
    }

    /// File a work script may write its result to
    pub fn result_path(&self, job_id: JobId) -> PathBuf {
        self.job_dir(job_id).join(RESULT_FILE)
    }

    /// Loads every persisted record found under the root, ordered by submission
    ///
    /// Directories without readable metadata are logged and skipped.
    pub fn rehydrate(&self) -> io::Result<Vec<JobRecord>> {
        let mut loaded = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path().join(METADATA_FILE);
            if !path.is_file() {
                continue;
            }

            match read_metadata(&path) {
                Ok(record) => loaded.push(record),
                Err(e) => warn!("Skipping unreadable job metadata {}: {}", path.display(), e),
            }
        }

        loaded.sort_by_key(|r| (r.submitted_at, r.seq));

        let max_seq = loaded.iter().map(|r| r.seq).max().unwrap_or(0);
        self.next_seq.fetch_max(max_seq + 1, Ordering::SeqCst);

        let mut jobs = write_lock(&self.jobs);
        for record in &loaded {
            jobs.entry(record.job_id)
                .or_insert_with(|| Arc::new(Mutex::new(record.clone())));
        }

        debug!("Rehydrated {} job(s) from {}", loaded.len(), self.root.display());
        Ok(loaded)
    }

    /// Creates a new pending job, its directory and an empty log file
    pub fn create(&self, new_job: NewJob) -> io::Result<JobRecord> {
        let (job_id, dir) = self.allocate_dir()?;
        let log_path = dir.join(LOG_FILE);
        fs::File::create(&log_path)?;

        let record = JobRecord {
            job_id,
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            name: new_job.name,
            script_path: new_job.script_path,
            args: new_job.args,
            status: JobStatus::Pending,
            submitted_at: Utc::now(),
            started_at: None,
            ended_at: None,
            exit_code: None,
            result: None,
            error: None,
            log_path,
        };

        write_metadata(&dir, &record)?;

        write_lock(&self.jobs).insert(job_id, Arc::new(Mutex::new(record.clone())));

        Ok(record)
    }

    /// Get a job by ID
    pub fn get(&self, job_id: JobId) -> Option<JobRecord> {
        self.slot(job_id).map(|slot| lock(&slot).clone())
    }

    /// Applies `mutation` atomically to one record
    ///
    /// Returns `None` for an unknown job. A terminal record, or a mutation whose
    /// status change the state machine forbids, yields `Rejected` and leaves the
    /// record untouched.
    pub fn update<F>(&self, job_id: JobId, mutation: F) -> Option<UpdateOutcome>
    where
        F: FnOnce(&mut JobRecord),
    {
        self.apply(job_id, None, mutation)
    }

    /// Like [`JobStore::update`], but only while the record is still in `from`
    ///
    /// Callers that decided what to do based on an earlier read use this so a
    /// concurrent status change turns their mutation into `Rejected`.
    pub fn transition<F>(
        &self,
        job_id: JobId,
        from: JobStatus,
        mutation: F,
    ) -> Option<UpdateOutcome>
    where
        F: FnOnce(&mut JobRecord),
    {
        self.apply(job_id, Some(from), mutation)
    }

    fn apply<F>(
        &self,
        job_id: JobId,
        expected: Option<JobStatus>,
        mutation: F,
    ) -> Option<UpdateOutcome>
    where
        F: FnOnce(&mut JobRecord),
    {
        let slot = self.slot(job_id)?;
        let mut current = lock(&slot);

        if current.status.is_terminal() {
            debug!(job_id = %job_id, status = %current.status, "Ignoring update of terminal job");
            return Some(UpdateOutcome::Rejected(current.clone()));
        }

        if expected.is_some_and(|from| from != current.status) {
            debug!(
                job_id = %job_id,
                status = %current.status,
                "Job left the expected status, skipping update"
            );
            return Some(UpdateOutcome::Rejected(current.clone()));
        }

        let mut next = current.clone();
        mutation(&mut next);

        // identity fields are immutable
        next.job_id = current.job_id;
        next.seq = current.seq;
        next.submitted_at = current.submitted_at;
        next.log_path = current.log_path.clone();

        if next.status != current.status && !current.status.can_transition_to(next.status) {
            debug!(
                job_id = %job_id,
                "Rejecting illegal transition {} -> {}",
                current.status,
                next.status
            );
            return Some(UpdateOutcome::Rejected(current.clone()));
        }

        if let Err(e) = write_metadata(&self.job_dir(job_id), &next) {
            warn!(job_id = %job_id, "Failed to persist job metadata: {}", e);
        }

        *current = next;
        Some(UpdateOutcome::Applied(current.clone()))
    }

    /// Lists jobs ordered by submission, optionally filtered by status
    pub fn list(&self, status: Option<JobStatus>) -> Vec<JobRecord> {
        let slots: Vec<_> = read_lock(&self.jobs).values().cloned().collect();

        let mut records: Vec<JobRecord> = slots
            .iter()
            .map(|slot| lock(slot).clone())
            .filter(|r| status.is_none_or(|s| r.status == s))
            .collect();

        records.sort_by_key(|r| (r.submitted_at, r.seq));
        records
    }

    fn slot(&self, job_id: JobId) -> Option<Arc<Mutex<JobRecord>>> {
        read_lock(&self.jobs).get(&job_id).cloned()
    }

    /// Picks a fresh id whose directory did not exist yet
    fn allocate_dir(&self) -> io::Result<(JobId, PathBuf)> {
        loop {
            let job_id = JobId::new();
            let dir = self.job_dir(job_id);
            match fs::create_dir(&dir) {
                Ok(()) => return Ok((job_id, dir)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn read_metadata(path: &Path) -> io::Result<JobRecord> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Writes metadata through a temp file so readers never see a torn record
fn write_metadata(dir: &Path, record: &JobRecord) -> io::Result<()> {
    let path = dir.join(METADATA_FILE);
    let tmp = dir.join(format!("{}.tmp", METADATA_FILE));

    let mut payload = serde_json::to_string_pretty(record)?;
    payload.push('\n');

    fs::write(&tmp, payload)?;
    fs::rename(&tmp, &path)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
