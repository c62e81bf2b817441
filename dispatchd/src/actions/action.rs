// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::job_engine::job::{JobId, Priority};

fn one() -> u32 {
    1
}

/// One line of input to the daemon.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "action")]
pub enum Action {
    #[serde(rename = "submit")]
    Submit {
        payload: Value,
        #[serde(default)]
        priority: Priority,
        #[serde(default = "one", rename = "task-count")]
        task_count: u32,
    },

    #[serde(rename = "cancel")]
    Cancel { id: JobId },

    /// Cancels every pending job with a priority below the given one.
    #[serde(rename = "cancel-below")]
    CancelBelow { priority: Priority },
}

/// One line of output of the daemon.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event")]
pub enum Reply {
    #[serde(rename = "submitted")]
    Submitted { id: JobId },

    #[serde(rename = "cancelled")]
    Cancelled { id: JobId, removed: bool },

    #[serde(rename = "cancelled-below")]
    CancelledBelow { priority: Priority, ids: Vec<JobId> },

    #[serde(rename = "result")]
    Result {
        id: JobId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ok: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "error")]
    Error { line: usize, message: String },
}
