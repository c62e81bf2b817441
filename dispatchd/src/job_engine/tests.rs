use crate::error::JobError;
use crate::global_config::{DispatcherConfig, Reservation, SelectionOrder};
use crate::job_engine::dispatcher::{dispatch_loop, Dispatcher};
use crate::job_engine::job::{Job, JobId};
use crate::job_engine::queue::JobQueue;
use crate::job_engine::shutdown::ShutdownSignal;
use crate::job_engine::worker::Worker;
use crate::transport::{ExecutionContext, Transport};

use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::anyhow;

/// A latch the test opens to let blocked jobs continue
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    cvar: Condvar,
}

impl Gate {
    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cvar.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cvar.wait(open).unwrap();
        }
    }
}

enum Step {
    Value(u32),
    Fail(&'static str),
    Blocked(u32),
}

#[derive(Default)]
struct TestTransport {
    gate: Arc<Gate>,
    started: Arc<Mutex<Vec<u32>>>,
}

impl Transport for TestTransport {
    type Payload = Step;
    type Output = u32;

    fn operation(&self) -> &str {
        "run test step"
    }

    fn execute(&self, _ctx: &ExecutionContext, payload: &Step) -> anyhow::Result<u32> {
        match payload {
            Step::Value(value) => {
                self.started.lock().unwrap().push(*value);
                Ok(*value)
            }
            Step::Fail(reason) => Err(anyhow!(*reason)),
            Step::Blocked(value) => {
                self.started.lock().unwrap().push(*value);
                self.gate.wait();
                Ok(*value)
            }
        }
    }
}

fn config() -> DispatcherConfig {
    DispatcherConfig::default()
        .with_workers(1)
        .with_time_slice(Duration::from_millis(10))
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached within 5s");
        thread::sleep(Duration::from_millis(5));
    }
}

/// Starts a dispatcher whose only worker is stuck in job 0 and whose
/// coordinator is stuck handing over job 1, so further submissions stay queued.
fn stalled_dispatcher(config: DispatcherConfig) -> (Dispatcher<TestTransport>, Arc<Gate>) {
    let transport = TestTransport::default();
    let gate = transport.gate.clone();
    let started = transport.started.clone();
    let dispatcher = Dispatcher::new(config.with_workers(1), transport).unwrap();

    let _blocker = dispatcher.submit(Step::Blocked(0), 0, 1);
    wait_until(|| started.lock().unwrap().contains(&0));
    let _filler = dispatcher.submit(Step::Value(1), 0, 1);
    wait_until(|| dispatcher.pending() == 0);

    (dispatcher, gate)
}

#[test]
fn test_submit_and_wait() {
    let mut dispatcher = Dispatcher::new(config(), TestTransport::default()).unwrap();

    let ticket = dispatcher.submit(Step::Value(42), 1, 1);
    assert_eq!(ticket.wait().unwrap(), 42);

    dispatcher.wait_until_finished();
}

#[test]
fn test_transport_error_is_wrapped() {
    let mut dispatcher = Dispatcher::new(config(), TestTransport::default()).unwrap();

    let ticket = dispatcher.submit(Step::Fail("quota exceeded"), 1, 1);
    let id = ticket.id();
    let err = ticket.wait().unwrap_err();

    match &err {
        JobError::Transport {
            worker,
            job,
            operation,
            source,
        } => {
            assert_eq!(*worker, 0);
            assert_eq!(*job, id);
            assert_eq!(operation, "run test step");
            assert_eq!(source.to_string(), "quota exceeded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.job_id(), id);
    assert!(err.to_string().contains("run test step"));

    dispatcher.wait_until_finished();
}

#[test]
fn test_task_count_reserves_placeholders_on_submit() {
    let (mut dispatcher, gate) = stalled_dispatcher(config());

    let ticket = dispatcher.submit(Step::Value(7), 1, 3);
    assert_eq!(dispatcher.pending(), 3);
    assert_eq!(dispatcher.pending_placeholders(), 2);

    gate.open();
    assert_eq!(ticket.wait().unwrap(), 7);
    dispatcher.wait_until_finished();
}

#[test]
fn test_zero_task_count_counts_as_one() {
    let (mut dispatcher, gate) = stalled_dispatcher(config());

    let _ticket = dispatcher.submit(Step::Value(7), 1, 0);
    assert_eq!(dispatcher.pending(), 1);
    assert_eq!(dispatcher.pending_placeholders(), 0);

    gate.open();
    dispatcher.wait_until_finished();
}

#[test]
fn test_task_count_reserves_placeholders_on_execute() {
    let config = config()
        .with_reservation(Reservation::OnExecute)
        .with_time_slice(Duration::from_millis(500));
    let (mut dispatcher, gate) = stalled_dispatcher(config);

    let ticket = dispatcher.submit(Step::Value(3), 1, 3);
    assert_eq!(dispatcher.pending(), 1);
    assert_eq!(dispatcher.pending_placeholders(), 0);

    gate.open();
    assert_eq!(ticket.wait().unwrap(), 3);

    // reserved right before execution; while the worker sleeps out its slice
    // the coordinator holds one placeholder and the other one stays queued
    wait_until(|| dispatcher.pending_placeholders() == 1);
    dispatcher.wait_until_finished();
}

#[test]
fn test_cancel_pending_job() {
    let (mut dispatcher, gate) = stalled_dispatcher(config());

    let ticket = dispatcher.submit(Step::Value(5), 1, 1);
    let id = ticket.id();

    assert!(dispatcher.cancel(id));
    assert!(!dispatcher.cancel(id));
    assert!(matches!(ticket.wait(), Err(JobError::Dropped { job }) if job == id));

    gate.open();
    dispatcher.wait_until_finished();
}

#[test]
fn test_cancel_where() {
    let (mut dispatcher, gate) = stalled_dispatcher(config());

    let low = dispatcher.submit(Step::Value(1), 1, 1);
    let high = dispatcher.submit(Step::Value(9), 9, 1);
    let multi_part = dispatcher.submit(Step::Value(2), 2, 3);

    let mut cancelled = dispatcher.cancel_where(|view| !view.is_placeholder && view.priority < 5);
    cancelled.sort();
    let mut expected = vec![low.id(), multi_part.id()];
    expected.sort();

    assert_eq!(cancelled, expected);
    assert_eq!(dispatcher.pending(), 3);
    assert_eq!(dispatcher.pending_placeholders(), 2);

    gate.open();
    assert_eq!(high.wait().unwrap(), 9);
    assert!(matches!(low.wait(), Err(JobError::Dropped { .. })));
    dispatcher.wait_until_finished();
}

#[test]
fn test_close_drops_pending_but_finishes_in_flight() {
    let (mut dispatcher, gate) = stalled_dispatcher(config());

    let pending = dispatcher.submit(Step::Value(2), 1, 1);
    dispatcher.close();
    assert!(dispatcher.is_closed());

    gate.open();
    dispatcher.wait_until_finished();

    assert!(matches!(pending.wait(), Err(JobError::Dropped { .. })));
}

#[test]
fn test_in_flight_job_delivers_after_close() {
    let transport = TestTransport::default();
    let gate = transport.gate.clone();
    let started = transport.started.clone();
    let mut dispatcher = Dispatcher::new(config(), transport).unwrap();

    let in_flight = dispatcher.submit(Step::Blocked(4), 1, 1);
    wait_until(|| started.lock().unwrap().contains(&4));

    dispatcher.close();
    gate.open();

    assert_eq!(in_flight.wait().unwrap(), 4);
    dispatcher.wait_until_finished();
}

#[test]
fn test_submit_after_close_is_dropped() {
    let mut dispatcher = Dispatcher::new(config(), TestTransport::default()).unwrap();
    dispatcher.wait_until_finished();

    let ticket = dispatcher.submit(Step::Value(1), 1, 3);
    assert_eq!(dispatcher.pending(), 0);
    assert!(matches!(ticket.wait(), Err(JobError::Dropped { .. })));
}

#[test]
fn test_most_urgent_first_dispatch_order() {
    let transport = TestTransport::default();
    let started = transport.started.clone();
    let gate = transport.gate.clone();
    let config = config().with_selection(SelectionOrder::MostUrgentFirst);
    let mut dispatcher = Dispatcher::new(config, transport).unwrap();

    let _blocker = dispatcher.submit(Step::Blocked(0), 0, 1);
    wait_until(|| started.lock().unwrap().contains(&0));
    let _filler = dispatcher.submit(Step::Value(100), 0, 1);
    wait_until(|| dispatcher.pending() == 0);

    let tickets: Vec<_> = [(10, 1), (30, 3), (20, 2)]
        .into_iter()
        .map(|(value, priority)| dispatcher.submit(Step::Value(value), priority, 1))
        .collect();

    gate.open();
    for ticket in tickets {
        ticket.wait().unwrap();
    }

    assert_eq!(*started.lock().unwrap(), vec![0, 100, 30, 20, 10]);
    dispatcher.wait_until_finished();
}

#[test]
fn test_drop_closes_dispatcher() {
    let (stalled, gate) = stalled_dispatcher(config());
    let pending = stalled.submit(Step::Value(3), 1, 1);

    drop(stalled);
    gate.open();

    assert!(matches!(pending.wait(), Err(JobError::Dropped { .. })));
}

#[test]
fn test_worker_drops_job_received_after_shutdown() {
    let transport = TestTransport::default();
    let started = transport.started.clone();
    let shutdown = Arc::new(ShutdownSignal::new());
    let (relay_tx, relay_rx) = mpsc::sync_channel(0);

    let worker = Worker {
        index: 0,
        transport: Arc::new(transport),
        queue: Arc::new(JobQueue::new(SelectionOrder::default())),
        relay: Arc::new(Mutex::new(relay_rx)),
        shutdown: shutdown.clone(),
        time_slice: Duration::ZERO,
        reservation: Reservation::OnSubmit,
    };
    let handle = thread::spawn(move || worker.run());

    let (warmup, warmup_ticket) = Job::new(JobId(1), Step::Value(1), 1, 1);
    relay_tx.send(warmup).unwrap();
    assert_eq!(warmup_ticket.wait().unwrap(), 1);

    // either the worker is parked in receive and gets the job, or it already
    // saw the signal and left; in both cases the job must not run
    shutdown.trigger();
    let (late, late_ticket) = Job::new(JobId(2), Step::Value(2), 1, 1);
    let _ = relay_tx.send(late);

    assert!(matches!(late_ticket.wait(), Err(JobError::Dropped { job }) if job == JobId(2)));
    handle.join().unwrap();
    assert_eq!(*started.lock().unwrap(), vec![1]);
}

#[test]
fn test_dispatch_loop_with_concurrent_submitters() {
    let queue: Arc<JobQueue<u32, u32>> = Arc::new(JobQueue::new(SelectionOrder::default()));
    let (relay_tx, relay_rx) = mpsc::sync_channel::<Job<u32, u32>>(0);
    let coordinator = {
        let queue = queue.clone();
        thread::spawn(move || dispatch_loop(queue, relay_tx))
    };
    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let collector = {
        let dispatched = dispatched.clone();
        thread::spawn(move || {
            for job in relay_rx.iter() {
                dispatched.lock().unwrap().push(job.id());
            }
        })
    };

    // every submitter cancels each other job right away, so the coordinator
    // regularly wakes up to a job that is already gone
    let submitters: Vec<_> = (0..4u64)
        .map(|submitter| {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut cancelled = Vec::new();
                for n in 0..100u64 {
                    let id = JobId(submitter * 1000 + n);
                    let (job, _ticket) = Job::new(id, n as u32, (n % 5) as u16, 1);
                    queue.push(job);
                    if n % 2 == 0 && queue.delete(id) {
                        cancelled.push(id);
                    }
                }
                cancelled
            })
        })
        .collect();
    let cancelled: HashSet<JobId> = submitters
        .into_iter()
        .flat_map(|submitter| submitter.join().unwrap())
        .collect();

    wait_until(|| dispatched.lock().unwrap().len() + cancelled.len() == 400);
    queue.close();
    coordinator.join().unwrap();
    collector.join().unwrap();

    let dispatched = dispatched.lock().unwrap();

    let unique: HashSet<JobId> = dispatched.iter().copied().collect();
    assert_eq!(unique.len(), dispatched.len());
    assert!(unique.is_disjoint(&cancelled));
    assert_eq!(dispatched.len() + cancelled.len(), 400);
}
