// SPDX-License-Identifier: MIT
// dispatchd: priority-ordered job dispatcher for rate-limited transports
//
// - Reads one JSON action per line from stdin (submit, cancel, cancel-below).
// - Answers every action with one JSON line on stdout.
// - Prints the result of every submitted job once stdin is closed.
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::io;
use std::time::Duration;

use clap::Parser;
use log::info;

use dispatchd::actions::handle_action::run_session;
use dispatchd::{Dispatcher, DispatcherConfig, EchoTransport, Reservation, SelectionOrder};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Number of worker threads
    #[arg(long, default_value_t = dispatchd::global_config::DEFAULT_WORKERS)]
    workers: usize,

    /// Minimum duration of one worker cycle in milliseconds
    #[arg(long = "time-slice-ms", value_name = "MS", default_value_t = 1000)]
    time_slice_ms: u64,

    /// End of the urgency order that is taken first
    #[arg(long, value_enum, default_value_t)]
    selection: SelectionOrder,

    /// When multi-part jobs reserve their extra time slices
    #[arg(long, value_enum, default_value_t)]
    reservation: Reservation,
}

fn validate_args(args: &Args) -> Result<(), String> {
    if args.workers == 0 {
        return Err("--workers must be at least 1".into());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {e}");
        std::process::exit(2);
    }

    let config = DispatcherConfig::default()
        .with_workers(args.workers)
        .with_time_slice(Duration::from_millis(args.time_slice_ms))
        .with_selection(args.selection)
        .with_reservation(args.reservation);

    info!("Starting dispatchd");
    let mut dispatcher = Dispatcher::new(config, EchoTransport)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let result = run_session(&dispatcher, stdin.lock(), stdout.lock());

    info!("Stopping dispatchd");
    dispatcher.wait_until_finished();
    result
}
