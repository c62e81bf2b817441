// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::cmp::Ordering;
use std::fmt;
use std::time::Instant;

use async_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::error::{JobError, JobResult};

pub type Priority = u16;

/// Identity of a submitted job. Random, so collisions are possible but negligible.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    pub fn random() -> Self {
        JobId(rand::random())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

enum JobKind<P, O> {
    Placeholder,
    Work {
        payload: P,
        reply: Sender<JobResult<O>>,
    },
}

/// A pending unit of work. Immutable after creation.
pub struct Job<P, O> {
    id: JobId,
    priority: Priority,
    submitted_at: Instant,
    task_count: u32,
    kind: JobKind<P, O>,
}

impl<P, O> Job<P, O> {
    /// Creates a job together with the ticket its result will be delivered to.
    pub fn new(id: JobId, payload: P, priority: Priority, task_count: u32) -> (Self, JobTicket<O>) {
        let (reply, result) = async_channel::bounded(1);
        let job = Self {
            id,
            priority,
            submitted_at: Instant::now(),
            task_count: task_count.max(1),
            kind: JobKind::Work { payload, reply },
        };
        (job, JobTicket { id, result })
    }

    /// A no-op job that only occupies one unit of worker capacity.
    pub fn placeholder(id: JobId) -> Self {
        Self {
            id,
            priority: 0,
            submitted_at: Instant::now(),
            task_count: 1,
            kind: JobKind::Placeholder,
        }
    }

    pub fn with_submitted_at(mut self, submitted_at: Instant) -> Self {
        self.submitted_at = submitted_at;
        self
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    pub fn task_count(&self) -> u32 {
        self.task_count
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, JobKind::Placeholder)
    }

    pub fn payload(&self) -> Option<&P> {
        match &self.kind {
            JobKind::Placeholder => None,
            JobKind::Work { payload, .. } => Some(payload),
        }
    }

    pub fn view(&self) -> JobView<'_, P> {
        JobView {
            id: self.id,
            priority: self.priority,
            submitted_at: self.submitted_at,
            task_count: self.task_count,
            is_placeholder: self.is_placeholder(),
            payload: self.payload(),
        }
    }

    /// Number of placeholders that reserve the remaining sub-units of this job.
    pub(crate) fn reserved_placeholders(&self) -> u32 {
        if self.is_placeholder() {
            0
        } else {
            self.task_count - 1
        }
    }

    /// Compares urgency: `Greater` means `self` should run before `other` in
    /// most-urgent-first order.
    pub fn urgency_cmp(&self, other: &Self) -> Ordering {
        match (self.is_placeholder(), other.is_placeholder()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self
                .priority
                .cmp(&other.priority)
                .then_with(|| self.submitted_at.cmp(&other.submitted_at)),
        }
    }

    pub(crate) fn into_parts(self) -> (JobId, Option<(P, Sender<JobResult<O>>)>) {
        match self.kind {
            JobKind::Placeholder => (self.id, None),
            JobKind::Work { payload, reply } => (self.id, Some((payload, reply))),
        }
    }
}

impl<P, O> fmt::Debug for Job<P, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("task_count", &self.task_count)
            .field("placeholder", &self.is_placeholder())
            .finish()
    }
}

/// Read-only view of a pending job, handed to cancellation predicates.
#[derive(Debug)]
pub struct JobView<'a, P> {
    pub id: JobId,
    pub priority: Priority,
    pub submitted_at: Instant,
    pub task_count: u32,
    pub is_placeholder: bool,
    pub payload: Option<&'a P>,
}

/// Receiving end of a job's result channel.
#[derive(Debug)]
pub struct JobTicket<O> {
    id: JobId,
    result: Receiver<JobResult<O>>,
}

impl<O> JobTicket<O> {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Blocks the current thread until the job's result arrives.
    pub fn wait(self) -> JobResult<O> {
        self.result
            .recv_blocking()
            .unwrap_or(Err(JobError::Dropped { job: self.id }))
    }

    pub async fn recv(self) -> JobResult<O> {
        self.result
            .recv()
            .await
            .unwrap_or(Err(JobError::Dropped { job: self.id }))
    }

    /// Returns the result if it is already available.
    pub fn try_recv(&self) -> Option<JobResult<O>> {
        match self.result.try_recv() {
            Ok(result) => Some(result),
            Err(async_channel::TryRecvError::Empty) => None,
            Err(async_channel::TryRecvError::Closed) => Some(Err(JobError::Dropped { job: self.id })),
        }
    }
}
