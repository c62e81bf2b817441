// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>
//! # Design: Priority Queue + Self-Throttling Worker Pool (threads)
//!
//! ## Overview
//! Jobs are executed by a fixed number of worker threads against a rate-limited
//! `Transport`. Each worker finishes at most one job per time slice.
//!
//! - `submit` pushes into a lock-guarded queue kept in urgency order and never blocks.
//! - A single coordinator thread waits on the queue's condvar, pops one job and
//!   hands it over a zero-capacity channel, i.e. only to a worker that is ready.
//! - Workers execute the job, write the result into the job's one-shot channel
//!   and then sleep out the rest of their time slice.
//! - Multi-part jobs reserve capacity by pushing placeholder jobs, which cost a
//!   time slice but never reach the transport.
//! - Cancellation only works while a job is still queued.
//! - `close` stops hand-offs; a job that a worker already started runs to completion.
//!
//! ```text
//!         submit()/cancel()
//!               |
//!               v
//!         +-----+---------------------------+
//!         | JobQueue (Mutex + Condvar)      |
//!         +-----+---------------------------+
//!               | wait_non_empty + pop
//!         +-----v------+
//!         | dispatch   |  sync_channel(0)
//!         | loop       +-------+----------+----------+
//!         +------------+       |          |          |
//!                          +---v----+ +---v----+ +---v----+
//!                          |worker 0| |worker 1| |worker n|
//!                          +---+----+ +---+----+ +---+----+
//!                              |          |          |
//!                              v          v          v
//!                         Transport::execute -> JobTicket
//! ```

pub mod dispatcher;
pub mod job;
pub mod queue;
pub mod shutdown;
mod worker;

#[cfg(test)]
mod tests;
