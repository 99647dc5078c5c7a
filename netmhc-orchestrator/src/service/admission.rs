//! Admission Controller
//!
//! Bounds the number of work processes running at once. Jobs that cannot start
//! immediately wait in a queue ordered by submission sequence and are handed
//! out one at a time as running jobs finish.

use netmhc_core::domain::job::JobId;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Decision taken for a freshly submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was reserved; the caller must start the job
    Start,
    /// No slot free; `position` is 1-based within the queue
    Queued { position: usize },
}

#[derive(Debug, Default)]
struct Slots {
    running: HashSet<JobId>,
    queue: VecDeque<(u64, JobId)>,
}

pub struct AdmissionController {
    max_parallel: usize,
    slots: Mutex<Slots>,
}

impl AdmissionController {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
            slots: Mutex::new(Slots::default()),
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Reserves a slot for `job_id` or queues it behind earlier submissions
    ///
    /// A job is never started while an earlier-sequenced job is still waiting.
    pub fn try_admit(&self, job_id: JobId, seq: u64) -> Admission {
        let mut slots = self.lock();

        if slots.running.len() < self.max_parallel && slots.queue.is_empty() {
            slots.running.insert(job_id);
            return Admission::Start;
        }

        let at = slots.queue.partition_point(|(queued_seq, _)| *queued_seq < seq);
        slots.queue.insert(at, (seq, job_id));

        Admission::Queued { position: at + 1 }
    }

    /// Pops the oldest queued job and reserves a slot for it, if one is free
    pub fn next_queued(&self) -> Option<JobId> {
        let mut slots = self.lock();

        if slots.running.len() >= self.max_parallel {
            return None;
        }

        let (_, job_id) = slots.queue.pop_front()?;
        slots.running.insert(job_id);
        Some(job_id)
    }

    /// Frees the slot held by `job_id`
    pub fn release(&self, job_id: JobId) -> bool {
        self.lock().running.remove(&job_id)
    }

    /// Drops `job_id` from the queue without starting it
    pub fn withdraw(&self, job_id: JobId) -> bool {
        let mut slots = self.lock();
        let before = slots.queue.len();
        slots.queue.retain(|(_, id)| *id != job_id);
        slots.queue.len() != before
    }

    pub fn running_count(&self) -> usize {
        self.lock().running.len()
    }

    pub fn queued_count(&self) -> usize {
        self.lock().queue.len()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_up_to_cap() {
        let admission = AdmissionController::new(2);

        assert_eq!(admission.try_admit(JobId::new(), 1), Admission::Start);
        assert_eq!(admission.try_admit(JobId::new(), 2), Admission::Start);
        assert_eq!(
            admission.try_admit(JobId::new(), 3),
            Admission::Queued { position: 1 }
        );
        assert_eq!(admission.running_count(), 2);
        assert_eq!(admission.queued_count(), 1);
    }

    #[test]
    fn test_queue_is_fifo_by_sequence() {
        let admission = AdmissionController::new(1);
        let running = JobId::new();
        let (a, b, c) = (JobId::new(), JobId::new(), JobId::new());

        admission.try_admit(running, 1);
        admission.try_admit(b, 3);
        admission.try_admit(c, 4);
        // late arrival with an earlier sequence goes to the front
        assert_eq!(admission.try_admit(a, 2), Admission::Queued { position: 1 });

        assert_eq!(admission.next_queued(), None);

        admission.release(running);
        assert_eq!(admission.next_queued(), Some(a));
        assert_eq!(admission.next_queued(), None);

        admission.release(a);
        assert_eq!(admission.next_queued(), Some(b));
        admission.release(b);
        assert_eq!(admission.next_queued(), Some(c));
    }

    #[test]
    fn test_new_job_waits_behind_queue() {
        let admission = AdmissionController::new(1);
        let first = JobId::new();
        let waiting = JobId::new();

        admission.try_admit(first, 1);
        admission.try_admit(waiting, 2);
        admission.release(first);

        // a free slot exists but an older job is still queued
        assert_eq!(
            admission.try_admit(JobId::new(), 3),
            Admission::Queued { position: 2 }
        );
        assert_eq!(admission.next_queued(), Some(waiting));
    }

    #[test]
    fn test_withdraw() {
        let admission = AdmissionController::new(1);
        let (running, queued) = (JobId::new(), JobId::new());

        admission.try_admit(running, 1);
        admission.try_admit(queued, 2);

        assert!(admission.withdraw(queued));
        assert!(!admission.withdraw(queued));

        admission.release(running);
        assert_eq!(admission.next_queued(), None);
        assert_eq!(admission.running_count(), 0);
    }
}
