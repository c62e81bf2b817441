// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoggedExecution {
    pub job: u64,

    pub worker: usize,

    pub value: u32,

    /// Milliseconds since the transport was created
    pub offset_ms: u128,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct TestLog {
    pub executions: Vec<LoggedExecution>,
}

impl TestLog {
    /// Pretty JSON, meant for assertion messages.
    pub fn dump(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("<unprintable test log: {e}>"))
    }
}
