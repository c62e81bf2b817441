// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::sync::mpsc::{self, SendError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::Context;
use log::{debug, info, warn};

use crate::global_config::{DispatcherConfig, Reservation};
use crate::job_engine::job::{Job, JobId, JobTicket, JobView, Priority};
use crate::job_engine::queue::JobQueue;
use crate::job_engine::shutdown::ShutdownSignal;
use crate::job_engine::worker::Worker;
use crate::transport::Transport;

/// Owns the queue, the coordinator thread and the worker pool.
pub struct Dispatcher<T: Transport> {
    queue: Arc<JobQueue<T::Payload, T::Output>>,
    shutdown: Arc<ShutdownSignal>,
    reservation: Reservation,
    coordinator: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Transport> Dispatcher<T> {
    /// Starts the coordinator and `config.workers` worker threads.
    pub fn new(config: DispatcherConfig, transport: T) -> anyhow::Result<Self> {
        let queue = Arc::new(JobQueue::new(config.selection));
        let shutdown = Arc::new(ShutdownSignal::new());
        let transport = Arc::new(transport);

        // zero capacity: a send only completes once a worker takes the job
        let (relay_tx, relay_rx) = mpsc::sync_channel(0);
        let relay_rx = Arc::new(Mutex::new(relay_rx));

        let worker_count = config.workers.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let worker = Worker {
                index,
                transport: transport.clone(),
                queue: queue.clone(),
                relay: relay_rx.clone(),
                shutdown: shutdown.clone(),
                time_slice: config.time_slice,
                reservation: config.reservation,
            };
            let handle = thread::Builder::new()
                .name(format!("dispatchd-worker-{index}"))
                .spawn(move || worker.run())
                .with_context(|| format!("failed to spawn worker {index}"))?;
            workers.push(handle);
        }
        // only the workers may keep the receiver alive
        drop(relay_rx);

        let coordinator = thread::Builder::new()
            .name("dispatchd-coordinator".to_string())
            .spawn({
                let queue = queue.clone();
                move || dispatch_loop(queue, relay_tx)
            })
            .context("failed to spawn the dispatch loop")?;

        info!(
            "Dispatcher started with {} worker(s), time slice {:?}, {:?}",
            worker_count, config.time_slice, config.selection
        );

        Ok(Self {
            queue,
            shutdown,
            reservation: config.reservation,
            coordinator: Some(coordinator),
            workers,
        })
    }

    /// Queues a job and returns immediately. A `task_count` above one reserves
    /// `task_count - 1` additional time slices through placeholder jobs.
    pub fn submit(
        &self,
        payload: T::Payload,
        priority: Priority,
        task_count: u32,
    ) -> JobTicket<T::Output> {
        let (job, ticket) = Job::new(JobId::random(), payload, priority, task_count);
        let reserved = job.reserved_placeholders();
        debug!(
            "Submitting job {} (priority {}, {} task(s))",
            ticket.id(),
            priority,
            job.task_count()
        );

        if self.queue.push(job) && self.reservation == Reservation::OnSubmit {
            self.queue.reserve(reserved);
        }
        ticket
    }

    /// Removes a job that has not been handed to a worker yet.
    pub fn cancel(&self, id: JobId) -> bool {
        let cancelled = self.queue.delete(id);
        debug!("Cancel job {}: {}", id, if cancelled { "removed" } else { "missed" });
        cancelled
    }

    pub fn cancel_where<F>(&self, predicate: F) -> Vec<JobId>
    where
        F: FnMut(&JobView<'_, T::Payload>) -> bool,
    {
        let cancelled = self.queue.delete_where(predicate);
        debug!("Cancelled {} job(s) by predicate", cancelled.len());
        cancelled
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_placeholders(&self) -> usize {
        self.queue.placeholder_count()
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Stops hand-offs. Jobs that already reached a worker run to completion;
    /// pending jobs are dropped and their tickets resolve to `JobError::Dropped`.
    pub fn close(&self) {
        if self.shutdown.is_triggered() {
            return;
        }
        self.shutdown.trigger();
        let dropped = self.queue.close();
        info!("Dispatcher closed, {} pending job(s) dropped", dropped);
    }

    pub fn wait_until_finished(&mut self) {
        self.close();
        if let Some(coordinator) = self.coordinator.take() {
            if coordinator.join().is_err() {
                warn!("Dispatch loop panicked");
            }
        }
        for (index, worker) in self.workers.drain(..).enumerate() {
            if worker.join().is_err() {
                warn!("Worker {} panicked", index);
            }
        }
        info!("Dispatcher finished");
    }
}

impl<T: Transport> Drop for Dispatcher<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Hands the next job to whichever worker is ready, one at a time.
pub(crate) fn dispatch_loop<P, O>(queue: Arc<JobQueue<P, O>>, relay: SyncSender<Job<P, O>>) {
    info!("Dispatch loop started");
    while queue.wait_non_empty() {
        let Some(job) = queue.pop() else {
            // a cancellation won the race against us
            continue;
        };
        if queue.is_closed() {
            debug!("Dropping job {} popped during shutdown", job.id());
            break;
        }
        debug!("Handing job {} to the worker pool", job.id());
        if let Err(SendError(job)) = relay.send(job) {
            debug!("No worker left to take job {}", job.id());
            break;
        }
    }
    info!("Dispatch loop stopped");
}
