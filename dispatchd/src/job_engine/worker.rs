// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::JobError;
use crate::global_config::Reservation;
use crate::job_engine::job::Job;
use crate::job_engine::queue::JobQueue;
use crate::job_engine::shutdown::ShutdownSignal;
use crate::transport::{ExecutionContext, Transport};

pub(crate) type Relay<T> =
    Arc<Mutex<Receiver<Job<<T as Transport>::Payload, <T as Transport>::Output>>>>;

/// One member of the worker pool. Runs on its own thread until shutdown.
pub(crate) struct Worker<T: Transport> {
    pub(crate) index: usize,
    pub(crate) transport: Arc<T>,
    pub(crate) queue: Arc<JobQueue<T::Payload, T::Output>>,
    pub(crate) relay: Relay<T>,
    pub(crate) shutdown: Arc<ShutdownSignal>,
    pub(crate) time_slice: Duration,
    pub(crate) reservation: Reservation,
}

impl<T: Transport> Worker<T> {
    pub(crate) fn run(self) {
        info!("Worker {} started", self.index);
        while !self.shutdown.is_triggered() {
            let Some(job) = self.receive() else {
                // the dispatch loop is gone
                break;
            };
            if self.shutdown.is_triggered() {
                // handed over while `close` was running
                debug!("Worker {} dropping job {} received after shutdown", self.index, job.id());
                break;
            }
            let started = Instant::now();
            if !self.process(job) {
                break;
            }
            // at most one job per time slice, no matter how fast the transport is
            let remaining = self.time_slice.saturating_sub(started.elapsed());
            if self.shutdown.wait_timeout(remaining) {
                break;
            }
        }
        info!("Worker {} stopped", self.index);
    }

    fn receive(&self) -> Option<Job<T::Payload, T::Output>> {
        let relay = self.relay.lock().unwrap_or_else(PoisonError::into_inner);
        relay.recv().ok()
    }

    /// Executes one job and delivers its result. Returns false if the worker
    /// has to stop because the result could not be delivered during shutdown.
    fn process(&self, job: Job<T::Payload, T::Output>) -> bool {
        let priority = job.priority();
        let task_count = job.task_count();
        let reserved = job.reserved_placeholders();

        let (id, work) = job.into_parts();
        let Some((payload, reply)) = work else {
            debug!("Worker {} spent a time slice on placeholder {}", self.index, id);
            return true;
        };

        if self.reservation == Reservation::OnExecute && reserved > 0 {
            self.queue.reserve(reserved);
        }

        let ctx = ExecutionContext {
            worker: self.index,
            job: id,
            priority,
            task_count,
        };
        debug!("Worker {} executing job {}", self.index, id);
        let result = self.transport.execute(&ctx, &payload).map_err(|err| {
            warn!("Worker {} failed job {}: {:#}", self.index, id, err);
            JobError::transport(self.index, id, self.transport.operation(), err)
        });

        if reply.try_send(result).is_err() {
            debug!("Result of job {} dropped, nobody is waiting for it", id);
            return !self.shutdown.is_triggered();
        }
        true
    }
}
