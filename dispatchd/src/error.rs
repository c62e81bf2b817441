// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use thiserror::Error;

use crate::job_engine::job::JobId;

/// Error delivered through a job's result channel.
#[derive(Debug, Error)]
pub enum JobError {
    /// The transport returned an error while executing the job.
    #[error("worker {worker} failed to {operation} for job {job}")]
    Transport {
        worker: usize,
        job: JobId,
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// The result channel closed before a value was written, i.e. the job was
    /// cancelled or dropped at shutdown.
    #[error("job {job} was dropped before it produced a result")]
    Dropped { job: JobId },
}

impl JobError {
    pub fn transport(
        worker: usize,
        job: JobId,
        operation: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        JobError::Transport {
            worker,
            job,
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn job_id(&self) -> JobId {
        match self {
            JobError::Transport { job, .. } | JobError::Dropped { job } => *job,
        }
    }
}

pub type JobResult<T> = Result<T, JobError>;
