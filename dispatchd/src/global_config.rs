// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_TIME_SLICE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub workers: usize,
    /// Minimum wall-clock duration of one worker cycle.
    pub time_slice: Duration,
    pub selection: SelectionOrder,
    pub reservation: Reservation,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            time_slice: DEFAULT_TIME_SLICE,
            selection: SelectionOrder::default(),
            reservation: Reservation::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_time_slice(mut self, time_slice: Duration) -> Self {
        self.time_slice = time_slice;
        self
    }

    pub fn with_selection(mut self, selection: SelectionOrder) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_reservation(mut self, reservation: Reservation) -> Self {
        self.reservation = reservation;
        self
    }
}

/// The end of the urgency order that `pop` takes from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[clap(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SelectionOrder {
    #[default]
    /// Default: take the least urgent job first. Placeholders drain first, then
    /// older before newer on equal priority, highest priority last.
    LeastUrgentFirst,
    /// Take the most urgent job first. Placeholders only run when nothing else is pending.
    MostUrgentFirst,
}

/// When the extra capacity of a multi-part job is reserved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[clap(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Reservation {
    #[default]
    /// Default: push the placeholders together with the job
    OnSubmit,
    /// Let the worker push the placeholders right before it executes the job
    OnExecute,
}
