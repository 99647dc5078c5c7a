//! Process Supervisor
//!
//! Runs one work script per admitted job as a child process. stdout and stderr
//! go straight into the job's log file, and the exit outcome is written back to
//! the job store. Each process is owned by its own tokio task, so a slow or
//! crashing script never affects another job.
//!
//! Synchronous tool calls use [`run_to_completion`] instead, which captures
//! the output in memory and bounds the run by a wall-time limit.

use chrono::Utc;
use netmhc_core::domain::job::{ArgValue, JobArgs, JobId, JobRecord, JobStatus};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::repository::{job_repository::JobStore, log_repository};

/// Why a work process did not complete successfully
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("process exited with code {code}{}", tail_suffix(.tail))]
    Exit { code: i32, tail: String },

    #[error("process terminated by signal{}", tail_suffix(.tail))]
    Signalled { tail: String },

    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

impl ProcessError {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::Exit { code, .. } => Some(*code),
            _ => None,
        }
    }
}

fn tail_suffix(tail: &str) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!("\n{}", tail)
    }
}

/// How a supervised process ended
#[derive(Debug)]
enum Outcome {
    Exited(ExitStatus),
    Cancelled,
    TimedOut(Duration),
}

/// Settings the supervisor needs from the orchestrator configuration
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub result_tail_lines: usize,
    pub error_tail_lines: usize,
    pub job_timeout: Option<Duration>,
    pub interpreters: HashMap<String, String>,
}

impl From<&Config> for SupervisorSettings {
    fn from(config: &Config) -> Self {
        Self {
            result_tail_lines: config.result_tail_lines,
            error_tail_lines: config.error_tail_lines,
            job_timeout: config.job_timeout,
            interpreters: config.interpreters.clone(),
        }
    }
}

pub struct ProcessSupervisor {
    store: Arc<JobStore>,
    settings: SupervisorSettings,
    cancellations: Mutex<HashMap<JobId, oneshot::Sender<()>>>,
    exits: mpsc::UnboundedSender<JobId>,
}

impl ProcessSupervisor {
    /// Creates a supervisor that reports every finished job on `exits`
    pub fn new(
        store: Arc<JobStore>,
        settings: SupervisorSettings,
        exits: mpsc::UnboundedSender<JobId>,
    ) -> Self {
        Self {
            store,
            settings,
            cancellations: Mutex::new(HashMap::new()),
            exits,
        }
    }

    /// Opens the cancellation channel for a job about to start
    ///
    /// Must happen before the job is marked running, so a cancel request that
    /// observes `running` always finds a live channel.
    pub fn register(&self, job_id: JobId) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.cancellations().insert(job_id, tx);
        rx
    }

    /// Drops the cancellation channel of a job that did not start after all
    pub fn unregister(&self, job_id: JobId) {
        self.cancellations().remove(&job_id);
    }

    /// Asks the process of a running job to terminate
    ///
    /// Returns false when the job has no live process (already finished or
    /// never started).
    pub fn cancel(&self, job_id: JobId) -> bool {
        match self.cancellations().remove(&job_id) {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Starts supervising `record` on a new task
    pub fn spawn(self: &Arc<Self>, record: JobRecord, cancel_rx: oneshot::Receiver<()>) {
        let supervisor = Arc::clone(self);

        tokio::spawn(async move {
            let job_id = record.job_id;
            let result = supervisor.run(&record, cancel_rx).await;

            // result capture and metadata writes touch the disk
            let finalizer = Arc::clone(&supervisor);
            if let Err(e) =
                tokio::task::spawn_blocking(move || finalizer.finalize(&record, result)).await
            {
                error!(job_id = %job_id, "Finalizing job failed: {}", e);
            }

            supervisor.unregister(job_id);
            if supervisor.exits.send(job_id).is_err() {
                debug!(job_id = %job_id, "Exit listener gone");
            }
        });
    }

    async fn run(
        &self,
        record: &JobRecord,
        cancel_rx: oneshot::Receiver<()>,
    ) -> Result<Outcome, ProcessError> {
        let mut child = self.start(record)?;

        info!(
            job_id = %record.job_id,
            pid = child.id().unwrap_or_default(),
            "Started work process for '{}'",
            record.name
        );

        supervise(record.job_id, &mut child, cancel_rx, self.settings.job_timeout)
            .await
            .map_err(|source| ProcessError::Spawn {
                program: record.script_path.display().to_string(),
                source,
            })
    }

    fn start(&self, record: &JobRecord) -> Result<Child, ProcessError> {
        if !record.script_path.is_file() {
            return Err(ProcessError::ScriptNotFound(record.script_path.clone()));
        }

        let invocation =
            build_command(&record.script_path, &record.args, &self.settings.interpreters);
        let program = invocation.program.to_string_lossy().into_owned();
        let spawn_error = |source| ProcessError::Spawn {
            program: program.clone(),
            source,
        };

        let stdout = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&record.log_path)
            .map_err(spawn_error)?;
        let stderr = stdout.try_clone().map_err(spawn_error)?;

        let job_dir = self.store.job_dir(record.job_id);

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .env("JOB_ID", record.job_id.to_string())
            .env("JOB_DIR", &job_dir)
            .env("JOB_RESULT_FILE", self.store.result_path(record.job_id))
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);

        // own group, so cancel and timeout reach everything the script starts
        #[cfg(unix)]
        command.process_group(0);

        command.spawn().map_err(spawn_error)
    }

    /// Writes the terminal state of a job back to the store
    fn finalize(&self, record: &JobRecord, result: Result<Outcome, ProcessError>) {
        let job_id = record.job_id;

        let (status, exit_code, output, failure) = match result {
            Ok(Outcome::Exited(exit)) if exit.success() => {
                let output = self.capture_result(record);
                (JobStatus::Completed, Some(0), Some(output), None)
            }
            Ok(Outcome::Exited(exit)) => {
                let tail = self.error_tail(&record.log_path);
                let err = match exit.code() {
                    Some(code) => ProcessError::Exit { code, tail },
                    None => ProcessError::Signalled { tail },
                };
                (JobStatus::Failed, err.exit_code(), None, Some(err.to_string()))
            }
            Ok(Outcome::Cancelled) => (JobStatus::Cancelled, None, None, None),
            Ok(Outcome::TimedOut(limit)) => {
                let err = ProcessError::TimedOut(limit);
                (JobStatus::Failed, None, None, Some(err.to_string()))
            }
            Err(err) => {
                error!(job_id = %job_id, "Work process could not run: {}", err);
                if let Err(e) = log_repository::append_line(&record.log_path, &err.to_string()) {
                    warn!(job_id = %job_id, "Failed to note error in job log: {}", e);
                }
                (JobStatus::Failed, None, None, Some(err.to_string()))
            }
        };

        let outcome = self.store.update(job_id, |r| {
            r.status = status;
            r.ended_at = Some(Utc::now());
            r.exit_code = exit_code;
            r.result = output;
            r.error = failure;
        });

        match outcome {
            Some(outcome) if outcome.is_applied() => {
                info!(job_id = %job_id, "Job finished: {}", status);
            }
            Some(outcome) => {
                debug!(
                    job_id = %job_id,
                    "Job already {}, discarding {} outcome",
                    outcome.record().status,
                    status
                );
            }
            None => warn!(job_id = %job_id, "Finished job vanished from store"),
        }
    }

    /// Result of a successful job: the result file if the script wrote one,
    /// otherwise the tail of its log
    fn capture_result(&self, record: &JobRecord) -> String {
        let result_file = self.store.result_path(record.job_id);

        match std::fs::read_to_string(&result_file) {
            Ok(content) => return content.trim_end().to_string(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                job_id = %record.job_id,
                "Failed to read {}: {}, falling back to log tail",
                result_file.display(),
                e
            ),
        }

        log_repository::tail_text(&record.log_path, self.settings.result_tail_lines)
            .unwrap_or_else(|e| {
                warn!(job_id = %record.job_id, "Failed to read job log: {}", e);
                String::new()
            })
    }

    fn error_tail(&self, log_path: &Path) -> String {
        log_repository::tail_text(log_path, self.settings.error_tail_lines).unwrap_or_default()
    }

    fn cancellations(&self) -> MutexGuard<'_, HashMap<JobId, oneshot::Sender<()>>> {
        self.cancellations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Waits for `child` to exit, to be cancelled or to run out of time
///
/// An exit that already happened wins over a cancel request arriving at the
/// same moment.
async fn supervise(
    job_id: JobId,
    child: &mut Child,
    mut cancel_rx: oneshot::Receiver<()>,
    timeout: Option<Duration>,
) -> io::Result<Outcome> {
    let deadline = async {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;

        status = child.wait() => status.map(Outcome::Exited),
        Ok(()) = &mut cancel_rx => {
            match child.try_wait()? {
                Some(status) => {
                    debug!(job_id = %job_id, "Work process exited before the cancel request");
                    Ok(Outcome::Exited(status))
                }
                None => {
                    info!(job_id = %job_id, "Terminating work process on request");
                    terminate(child).await;
                    Ok(Outcome::Cancelled)
                }
            }
        }
        _ = deadline => {
            let limit = timeout.unwrap_or_default();
            warn!(job_id = %job_id, "Work process exceeded {}s, terminating", limit.as_secs());
            terminate(child).await;
            Ok(Outcome::TimedOut(limit))
        }
    }
}

/// Kills the process group led by `child`, then reaps it
async fn terminate(child: &mut Child) {
    kill_group(child);
    if let Err(e) = child.wait().await {
        warn!("Failed to reap work process: {}", e);
    }
}

#[cfg(unix)]
fn kill_group(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    // the leader is not reaped yet, so its pid still names our group
    let Some(pid) = child.id() else {
        return;
    };

    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!("Killing process group {} failed: {}", pid, e);
        if let Err(e) = child.start_kill() {
            debug!("Kill failed, process likely gone: {}", e);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!("Kill failed, process likely gone: {}", e);
    }
}

// =============================================================================
// Foreground Runs
// =============================================================================

/// Exit status and output of a script run in the foreground
#[derive(Debug)]
pub struct Captured {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `invocation` to completion and captures its output
///
/// The process group is killed once `limit` has passed.
pub async fn run_to_completion(
    script: &Path,
    invocation: &Invocation,
    limit: Duration,
) -> Result<Captured, ProcessError> {
    if !script.is_file() {
        return Err(ProcessError::ScriptNotFound(script.to_path_buf()));
    }

    let program = invocation.program.to_string_lossy().into_owned();
    let io_error = |source| ProcessError::Spawn {
        program: program.clone(),
        source,
    };

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(io_error)?;
    debug!(pid = child.id().unwrap_or_default(), "Running {} in the foreground", program);

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let finished = tokio::time::timeout(limit, async {
        tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr))
    })
    .await;

    match finished {
        Ok((status, stdout, stderr)) => Ok(Captured {
            status: status.map_err(io_error)?,
            stdout: String::from_utf8_lossy(&stdout.map_err(io_error)?).into_owned(),
            stderr: String::from_utf8_lossy(&stderr.map_err(io_error)?).into_owned(),
        }),
        Err(_) => {
            warn!("{} exceeded {}s, terminating", program, limit.as_secs());
            terminate(&mut child).await;
            Err(ProcessError::TimedOut(limit))
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

// =============================================================================
// Command Line
// =============================================================================

/// Program and argument vector for one work script invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
}

/// Builds the command line for `script`
///
/// Scripts whose extension has a registered interpreter run through it;
/// anything else is executed directly.
pub fn build_command(
    script: &Path,
    args: &JobArgs,
    interpreters: &HashMap<String, String>,
) -> Invocation {
    let interpreter = script
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| interpreters.get(ext));

    let rendered = render_args(args).into_iter().map(OsString::from);

    match interpreter {
        Some(program) => Invocation {
            program: OsString::from(program),
            args: std::iter::once(script.as_os_str().to_owned())
                .chain(rendered)
                .collect(),
        },
        None => Invocation {
            program: script.as_os_str().to_owned(),
            args: rendered.collect(),
        },
    }
}

/// Renders named arguments as `--name value` pairs and bare `--name` switches
pub fn render_args(args: &JobArgs) -> Vec<String> {
    let mut rendered = Vec::with_capacity(args.len() * 2);

    for (name, value) in args {
        match value {
            ArgValue::Text(text) => {
                rendered.push(format!("--{}", name));
                rendered.push(text.clone());
            }
            ArgValue::Flag(true) => rendered.push(format!("--{}", name)),
            ArgValue::Flag(false) => {}
        }
    }

    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpreters() -> HashMap<String, String> {
        HashMap::from([
            ("py".to_string(), "python3".to_string()),
            ("sh".to_string(), "sh".to_string()),
        ])
    }

    #[test]
    fn test_render_args() {
        let mut args = JobArgs::new();
        args.insert("input".to_string(), ArgValue::from("peptides.txt"));
        args.insert("summary".to_string(), ArgValue::from(true));
        args.insert("excel".to_string(), ArgValue::from(false));
        args.insert("allele".to_string(), ArgValue::from("DRB1_0101"));

        assert_eq!(
            render_args(&args),
            vec!["--input", "peptides.txt", "--summary", "--allele", "DRB1_0101"]
        );
    }

    #[test]
    fn test_text_values_are_not_split() {
        let mut args = JobArgs::new();
        args.insert("peptides".to_string(), ArgValue::from("AAA BBB;rm -rf /"));

        assert_eq!(render_args(&args), vec!["--peptides", "AAA BBB;rm -rf /"]);
    }

    #[test]
    fn test_python_script_uses_interpreter() {
        let mut args = JobArgs::new();
        args.insert("allele".to_string(), ArgValue::from("DRB1_0101"));

        let invocation = build_command(
            Path::new("/opt/scripts/peptide_prediction.py"),
            &args,
            &interpreters(),
        );

        assert_eq!(invocation.program, OsString::from("python3"));
        assert_eq!(
            invocation.args,
            vec![
                OsString::from("/opt/scripts/peptide_prediction.py"),
                OsString::from("--allele"),
                OsString::from("DRB1_0101"),
            ]
        );
    }

    #[test]
    fn test_unknown_extension_runs_directly() {
        let invocation = build_command(Path::new("/usr/local/bin/predict"), &JobArgs::new(), &interpreters());

        assert_eq!(invocation.program, OsString::from("/usr/local/bin/predict"));
        assert!(invocation.args.is_empty());
    }

    fn group_command(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script).kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        command
    }

    #[tokio::test]
    async fn test_exit_wins_over_simultaneous_cancel() {
        let mut child = group_command("exit 0").spawn().unwrap();
        assert!(child.wait().await.unwrap().success());

        let (tx, rx) = oneshot::channel();
        tx.send(()).unwrap();

        let outcome = supervise(JobId::new(), &mut child, rx, None).await.unwrap();
        assert!(matches!(outcome, Outcome::Exited(status) if status.success()));
    }

    #[tokio::test]
    async fn test_cancel_kills_background_children() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("late");
        let mut child = group_command(&format!(
            "(sleep 1; touch '{}') &\nwait\n",
            marker.display()
        ))
        .spawn()
        .unwrap();

        let (tx, rx) = oneshot::channel();
        tx.send(()).unwrap();

        let outcome = supervise(JobId::new(), &mut child, rx, None).await.unwrap();
        assert!(matches!(outcome, Outcome::Cancelled));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_timeout_terminates_process() {
        let mut child = group_command("exec sleep 30").spawn().unwrap();
        let (_tx, rx) = oneshot::channel();

        let outcome = supervise(JobId::new(), &mut child, rx, Some(Duration::from_millis(200)))
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::TimedOut(limit) if limit == Duration::from_millis(200)));
        assert!(child.id().is_none());
    }

    fn sh_invocation(script: &Path) -> Invocation {
        let mut args = JobArgs::new();
        args.insert("allele".to_string(), ArgValue::from("DRB1_0101"));
        build_command(script, &args, &interpreters())
    }

    #[tokio::test]
    async fn test_run_to_completion_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("echo.sh");
        std::fs::write(&script, "echo \"args: $*\"\necho warning >&2\nexit 3\n").unwrap();

        let captured = run_to_completion(&script, &sh_invocation(&script), Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(captured.status.code(), Some(3));
        assert_eq!(captured.stdout, "args: --allele DRB1_0101\n");
        assert_eq!(captured.stderr, "warning\n");
    }

    #[tokio::test]
    async fn test_run_to_completion_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("late");
        let script = dir.path().join("slow.sh");
        std::fs::write(
            &script,
            format!("(sleep 1; touch '{}') &\nsleep 30\n", marker.display()),
        )
        .unwrap();

        let err = run_to_completion(&script, &sh_invocation(&script), Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut(_)));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_run_to_completion_missing_script() {
        let script = Path::new("/nonexistent/predict.sh");

        let err = run_to_completion(script, &sh_invocation(script), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::ScriptNotFound(_)));
    }

    #[test]
    fn test_process_error_messages() {
        let exit = ProcessError::Exit {
            code: 3,
            tail: "ERROR: bad allele".to_string(),
        };
        assert_eq!(exit.to_string(), "process exited with code 3\nERROR: bad allele");
        assert_eq!(exit.exit_code(), Some(3));

        let quiet = ProcessError::Exit {
            code: 1,
            tail: String::new(),
        };
        assert_eq!(quiet.to_string(), "process exited with code 1");

        let timeout = ProcessError::TimedOut(Duration::from_secs(90));
        assert_eq!(timeout.to_string(), "timed out after 90s");
        assert_eq!(timeout.exit_code(), None);
    }
}
