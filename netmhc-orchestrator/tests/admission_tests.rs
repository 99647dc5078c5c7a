mod common;

use common::{Harness, wait_until};
use netmhc_core::domain::job::{JobArgs, JobId, JobStatus};
use std::collections::HashSet;

fn status_of(h: &Harness, job_id: JobId) -> JobStatus {
    h.manager.get_job_status(job_id).unwrap().status
}

#[tokio::test]
async fn test_cap_limits_running_jobs() {
    let h = Harness::start(2);
    h.script("slow.sh", "exec sleep 30\n");

    let jobs: Vec<JobId> = (0..5)
        .map(|_| h.manager.submit_job("slow.sh", JobArgs::new(), None).unwrap())
        .collect();

    let statuses: Vec<JobStatus> = jobs.iter().map(|id| status_of(&h, *id)).collect();
    assert_eq!(
        statuses,
        vec![
            JobStatus::Running,
            JobStatus::Running,
            JobStatus::Pending,
            JobStatus::Pending,
            JobStatus::Pending,
        ]
    );
    assert_eq!(h.manager.running_count(), 2);
    assert_eq!(h.manager.queued_count(), 3);
    assert_eq!(h.manager.list_jobs(Some(JobStatus::Pending)).len(), 3);

    for job_id in jobs.iter().rev() {
        h.manager.cancel_job(*job_id).unwrap();
    }
    for job_id in &jobs {
        h.wait_for_terminal(*job_id).await;
    }
}

#[tokio::test]
async fn test_queued_jobs_start_in_submission_order() {
    let h = Harness::start(1);
    let order_file = h.marker("order.txt");
    h.script("blocker.sh", "exec sleep 30\n");
    h.script(
        "record.sh",
        &format!("echo \"$JOB_ID\" >> '{}'\n", order_file.display()),
    );

    let blocker = h.manager.submit_job("blocker.sh", JobArgs::new(), None).unwrap();
    let queued: Vec<JobId> = (0..4)
        .map(|_| h.manager.submit_job("record.sh", JobArgs::new(), None).unwrap())
        .collect();

    assert!(queued.iter().all(|id| status_of(&h, *id) == JobStatus::Pending));

    h.manager.cancel_job(blocker).unwrap();
    for job_id in &queued {
        let snapshot = h.wait_for_terminal(*job_id).await;
        assert_eq!(snapshot.status, JobStatus::Completed);
    }

    let recorded: Vec<String> = std::fs::read_to_string(&order_file)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    let expected: Vec<String> = queued.iter().map(JobId::to_string).collect();
    assert_eq!(recorded, expected);

    let mut started: Vec<_> = queued
        .iter()
        .map(|id| h.manager.get_job_status(*id).unwrap().started_at.unwrap())
        .collect();
    let in_order = started.clone();
    started.sort();
    assert_eq!(started, in_order);
}

#[tokio::test]
async fn test_finished_job_promotes_next() {
    let h = Harness::start(1);
    h.script("quick.sh", "echo done\n");
    h.script("slow.sh", "exec sleep 30\n");

    let first = h.manager.submit_job("quick.sh", JobArgs::new(), None).unwrap();
    let second = h.manager.submit_job("slow.sh", JobArgs::new(), None).unwrap();

    h.wait_for_terminal(first).await;
    wait_until(&h.manager, second, |s| s.status == JobStatus::Running).await;
    assert_eq!(h.manager.running_count(), 1);

    h.manager.cancel_job(second).unwrap();
    h.wait_for_terminal(second).await;
}

#[tokio::test]
async fn test_failed_spawn_frees_its_slot() {
    let h = Harness::start(1);
    h.script("quick.sh", "echo done\n");

    let missing = h.manager.submit_job("missing.sh", JobArgs::new(), None).unwrap();
    let next = h.manager.submit_job("quick.sh", JobArgs::new(), None).unwrap();

    assert_eq!(h.wait_for_terminal(missing).await.status, JobStatus::Failed);
    assert_eq!(h.wait_for_terminal(next).await.status, JobStatus::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_get_unique_ids() {
    let h = Harness::start(1);
    h.script("slow.sh", "exec sleep 30\n");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = h.manager.clone();
        handles.push(tokio::spawn(async move {
            (0..8)
                .map(|_| manager.submit_job("slow.sh", JobArgs::new(), None).unwrap())
                .collect::<Vec<_>>()
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.extend(handle.await.unwrap());
    }

    let unique: HashSet<JobId> = ids.iter().copied().collect();
    assert_eq!(unique.len(), 64);
    assert_eq!(h.manager.list_jobs(None).len(), 64);
    assert_eq!(h.manager.list_jobs(Some(JobStatus::Running)).len(), 1);

    for job_id in &ids {
        let _ = h.manager.cancel_job(*job_id);
    }
}
