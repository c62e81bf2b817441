// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::io::{BufRead, Write};

use anyhow::Context;
use futures::executor::block_on;
use futures::future::join_all;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use super::action::{Action, Reply};
use crate::job_engine::dispatcher::Dispatcher;
use crate::job_engine::job::JobTicket;
use crate::transport::Transport;

/// Applies one action. Tickets of submitted jobs are collected in `tickets`.
pub fn handle_action<T>(
    dispatcher: &Dispatcher<T>,
    action: Action,
    tickets: &mut Vec<JobTicket<T::Output>>,
) -> Reply
where
    T: Transport<Payload = Value>,
{
    match action {
        Action::Submit {
            payload,
            priority,
            task_count,
        } => {
            let ticket = dispatcher.submit(payload, priority, task_count);
            let id = ticket.id();
            tickets.push(ticket);
            Reply::Submitted { id }
        }
        Action::Cancel { id } => Reply::Cancelled {
            id,
            removed: dispatcher.cancel(id),
        },
        Action::CancelBelow { priority } => Reply::CancelledBelow {
            priority,
            ids: dispatcher.cancel_where(|job| !job.is_placeholder && job.priority < priority),
        },
    }
}

/// Parses one input line. Blank lines are skipped.
pub fn handle_cli_line<T>(
    dispatcher: &Dispatcher<T>,
    line_no: usize,
    line: &str,
    tickets: &mut Vec<JobTicket<T::Output>>,
) -> Option<Reply>
where
    T: Transport<Payload = Value>,
{
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<Action>(line) {
        Ok(action) => Some(handle_action(dispatcher, action, tickets)),
        Err(err) => {
            warn!("Ignoring line {}: {}", line_no, err);
            Some(Reply::Error {
                line: line_no,
                message: err.to_string(),
            })
        }
    }
}

/// Waits for all tickets at once and turns them into result replies, in
/// submission order.
pub fn collect_results<O: Serialize>(tickets: Vec<JobTicket<O>>) -> Vec<Reply> {
    let pending = tickets.into_iter().map(|ticket| async move {
        let id = ticket.id();
        (id, ticket.recv().await)
    });
    block_on(join_all(pending))
        .into_iter()
        .map(|(id, result)| match result {
            Ok(output) => match serde_json::to_value(output) {
                Ok(ok) => Reply::Result {
                    id,
                    ok: Some(ok),
                    error: None,
                },
                Err(err) => Reply::Result {
                    id,
                    ok: None,
                    error: Some(format!("unserializable output: {err}")),
                },
            },
            Err(err) => Reply::Result {
                id,
                ok: None,
                error: Some(format!("{:#}", anyhow::Error::from(err))),
            },
        })
        .collect()
}

/// Reads actions from `input` until EOF, writes one reply per action to
/// `output`, then one result per submitted job.
pub fn run_session<T, R, W>(dispatcher: &Dispatcher<T>, input: R, mut output: W) -> anyhow::Result<()>
where
    T: Transport<Payload = Value>,
    T::Output: Serialize,
    R: BufRead,
    W: Write,
{
    let mut tickets = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line = line.context("failed to read action")?;
        if let Some(reply) = handle_cli_line(dispatcher, index + 1, &line, &mut tickets) {
            write_reply(&mut output, &reply)?;
        }
    }

    debug!("Input closed, waiting for {} job(s)", tickets.len());
    for reply in collect_results(tickets) {
        write_reply(&mut output, &reply)?;
    }
    Ok(())
}

fn write_reply<W: Write>(output: &mut W, reply: &Reply) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *output, reply).context("failed to encode reply")?;
    output.write_all(b"\n")?;
    output.flush()?;
    Ok(())
}
