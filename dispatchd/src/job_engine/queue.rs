// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::global_config::SelectionOrder;
use crate::job_engine::job::{Job, JobId, JobView};

struct QueueState<P, O> {
    // sorted from least to most urgent
    jobs: VecDeque<Job<P, O>>,
    closed: bool,
}

/// Pending jobs in urgency order. All mutation is serialized by one mutex; the
/// condvar signals "became non-empty" and "closed".
pub struct JobQueue<P, O> {
    state: Mutex<QueueState<P, O>>,
    not_empty: Condvar,
    selection: SelectionOrder,
}

impl<P, O> JobQueue<P, O> {
    pub fn new(selection: SelectionOrder) -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            selection,
        }
    }

    // A panic while the lock is held cannot leave the VecDeque half-updated,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, QueueState<P, O>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a job at its place in the urgency order. Returns false (and
    /// drops the job) if the queue has been closed.
    pub fn push(&self, job: Job<P, O>) -> bool {
        let mut state = self.lock();
        if state.closed {
            warn!("Queue closed, dropping job {}", job.id());
            return false;
        }
        Self::insert_sorted(&mut state.jobs, job);
        self.not_empty.notify_one();
        true
    }

    /// Pushes `count` placeholders under a single lock and returns their ids.
    pub fn reserve(&self, count: u32) -> Vec<JobId> {
        let mut state = self.lock();
        if state.closed || count == 0 {
            return Vec::new();
        }
        let ids: Vec<JobId> = (0..count)
            .map(|_| {
                let placeholder = Job::placeholder(JobId::random());
                let id = placeholder.id();
                Self::insert_sorted(&mut state.jobs, placeholder);
                id
            })
            .collect();
        debug!("Reserved {} placeholder(s)", ids.len());
        self.not_empty.notify_one();
        ids
    }

    fn insert_sorted(jobs: &mut VecDeque<Job<P, O>>, job: Job<P, O>) {
        // after all jobs that are not more urgent, so equal jobs keep insertion order
        let index = jobs.partition_point(|queued| queued.urgency_cmp(&job) != Ordering::Greater);
        jobs.insert(index, job);
    }

    /// Removes the next job according to the selection order. Never blocks.
    pub fn pop(&self) -> Option<Job<P, O>> {
        let mut state = self.lock();
        match self.selection {
            SelectionOrder::LeastUrgentFirst => state.jobs.pop_front(),
            SelectionOrder::MostUrgentFirst => state.jobs.pop_back(),
        }
    }

    pub fn delete(&self, id: JobId) -> bool {
        let mut state = self.lock();
        match state.jobs.iter().position(|job| job.id() == id) {
            Some(index) => {
                state.jobs.remove(index);
                true
            }
            None => false,
        }
    }

    /// Removes every pending job matching `predicate` and returns their ids.
    pub fn delete_where<F>(&self, mut predicate: F) -> Vec<JobId>
    where
        F: FnMut(&JobView<'_, P>) -> bool,
    {
        let mut state = self.lock();
        let mut removed = Vec::new();
        state.jobs.retain(|job| {
            if predicate(&job.view()) {
                removed.push(job.id());
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn placeholder_count(&self) -> usize {
        self.lock()
            .jobs
            .iter()
            .filter(|job| job.is_placeholder())
            .count()
    }

    /// Blocks until at least one job is pending (true) or the queue is closed
    /// (false). A subsequent `pop` may still come back empty.
    pub fn wait_non_empty(&self) -> bool {
        let mut state = self.lock();
        while state.jobs.is_empty() && !state.closed {
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        !state.closed
    }

    /// Rejects further pushes, wakes all waiters and drops every pending job.
    /// Returns how many jobs were dropped.
    pub fn close(&self) -> usize {
        let dropped = {
            let mut state = self.lock();
            state.closed = true;
            self.not_empty.notify_all();
            std::mem::take(&mut state.jobs)
        };
        dropped.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
