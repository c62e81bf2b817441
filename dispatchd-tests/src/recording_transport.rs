// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::bail;
use dispatchd::{ExecutionContext, JobId, Transport};

use crate::test_log::{LoggedExecution, TestLog};

#[derive(Debug, Clone, Copy)]
pub struct Execution {
    pub job: JobId,
    pub worker: usize,
    pub value: u32,
    pub at: Instant,
}

#[derive(Debug)]
struct Recorder {
    created: Instant,
    latency: Duration,
    executions: Mutex<Vec<Execution>>,
    started: Condvar,
    failing: Mutex<HashSet<u32>>,
    held: Mutex<HashSet<u32>>,
    released: Condvar,
}

/// Transport for tests: records every execution of a `u32` payload and
/// answers with the payload. Single values can be made to fail or to block
/// until released.
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    recorder: Arc<Recorder>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            recorder: Arc::new(Recorder {
                created: Instant::now(),
                latency,
                executions: Mutex::new(Vec::new()),
                started: Condvar::new(),
                failing: Mutex::new(HashSet::new()),
                held: Mutex::new(HashSet::new()),
                released: Condvar::new(),
            }),
        }
    }

    pub fn fail_on(&self, value: u32) {
        self.recorder.failing.lock().unwrap().insert(value);
    }

    /// Executions of `value` block until `release` is called.
    pub fn hold(&self, value: u32) {
        self.recorder.held.lock().unwrap().insert(value);
    }

    pub fn release(&self) {
        self.recorder.held.lock().unwrap().clear();
        self.recorder.released.notify_all();
    }

    /// Blocks until `value` has started executing. Returns false on timeout.
    pub fn wait_for(&self, value: u32, timeout: Duration) -> bool {
        let executions = self.recorder.executions.lock().unwrap();
        let (executions, _) = self
            .recorder
            .started
            .wait_timeout_while(executions, timeout, |executions| {
                !executions.iter().any(|execution| execution.value == value)
            })
            .unwrap();
        executions.iter().any(|execution| execution.value == value)
    }

    pub fn executions(&self) -> Vec<Execution> {
        self.recorder.executions.lock().unwrap().clone()
    }

    /// Executed payloads in start order
    pub fn values(&self) -> Vec<u32> {
        self.executions().iter().map(|execution| execution.value).collect()
    }

    pub fn test_log(&self) -> TestLog {
        TestLog {
            executions: self
                .executions()
                .iter()
                .map(|execution| LoggedExecution {
                    job: execution.job.0,
                    worker: execution.worker,
                    value: execution.value,
                    offset_ms: execution.at.duration_since(self.recorder.created).as_millis(),
                })
                .collect(),
        }
    }
}

impl Transport for RecordingTransport {
    type Payload = u32;
    type Output = u32;

    fn operation(&self) -> &str {
        "record value"
    }

    fn execute(&self, ctx: &ExecutionContext, value: &u32) -> anyhow::Result<u32> {
        {
            let mut executions = self.recorder.executions.lock().unwrap();
            executions.push(Execution {
                job: ctx.job,
                worker: ctx.worker,
                value: *value,
                at: Instant::now(),
            });
            self.recorder.started.notify_all();
        }

        let held = self.recorder.held.lock().unwrap();
        drop(
            self.recorder
                .released
                .wait_while(held, |held| held.contains(value))
                .unwrap(),
        );

        if !self.recorder.latency.is_zero() {
            thread::sleep(self.recorder.latency);
        }
        if self.recorder.failing.lock().unwrap().contains(value) {
            bail!("value {value} is configured to fail");
        }
        Ok(*value)
    }
}
