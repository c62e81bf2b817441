// SPDX-License-Identifier: MIT
// dispatchd: priority-ordered job dispatcher for rate-limited transports
//
// - Callers submit jobs with a priority and a sub-task count.
// - A fixed pool of worker threads executes them through a Transport.
// - Every worker completes at most one job per time slice.
//
// Author: Johannes Leupolz <dev@leupolz.eu>

pub mod actions;
pub mod error;
pub mod global_config;
pub mod job_engine;
pub mod transport;

pub use error::JobError;
pub use global_config::{DispatcherConfig, Reservation, SelectionOrder};
pub use job_engine::dispatcher::Dispatcher;
pub use job_engine::job::{Job, JobId, JobTicket, JobView, Priority};
pub use job_engine::queue::JobQueue;
pub use transport::{EchoTransport, ExecutionContext, Transport};
