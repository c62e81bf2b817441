// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use anyhow::anyhow;
use log::debug;
use serde_json::{json, Value};

use crate::job_engine::job::{JobId, Priority};

/// What a transport gets to know about the job it executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub worker: usize,
    pub job: JobId,
    pub priority: Priority,
    pub task_count: u32,
}

/// Executes job payloads against the outside world, e.g. a rate-limited remote API.
///
/// `execute` is called synchronously on a worker thread, once per job. It
/// should return errors instead of panicking; there is no timeout, so a hung
/// call occupies its worker until it returns.
pub trait Transport: Send + Sync + 'static {
    type Payload: Send + 'static;
    type Output: Send + 'static;

    /// Name of the operation, used as context in error messages
    fn operation(&self) -> &str;

    fn execute(&self, ctx: &ExecutionContext, payload: &Self::Payload) -> anyhow::Result<Self::Output>;
}

/// Loopback transport: answers every JSON payload with itself. A payload
/// object with a `"fail"` member is answered with an error instead.
#[derive(Debug, Default, Clone)]
pub struct EchoTransport;

impl Transport for EchoTransport {
    type Payload = Value;
    type Output = Value;

    fn operation(&self) -> &str {
        "echo payload"
    }

    fn execute(&self, ctx: &ExecutionContext, payload: &Value) -> anyhow::Result<Value> {
        debug!("Worker {} echoing job {}", ctx.worker, ctx.job);
        if let Some(reason) = payload.get("fail") {
            let reason = reason.as_str().map(str::to_owned).unwrap_or_else(|| reason.to_string());
            return Err(anyhow!(reason));
        }
        Ok(json!({
            "worker": ctx.worker,
            "priority": ctx.priority,
            "echo": payload,
        }))
    }
}
