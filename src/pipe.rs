//! Concurrent stage pipeline.
//!
//! A [`Pipe`] chains [`Stage`]s so that many items can move through them at
//! once. Every stage boundary is a channel, and every stage has one
//! forwarding thread that reads its input channel and hands each arriving item
//! to the worker pool as its own task:
//!
//! ```text
//!            ┌──────────┐          ┌──────────┐
//! receive ──▶│ stage 0  │── link ─▶│ stage 1  │── exit ──▶ deliver
//!            │ forward  │          │ forward  │
//!            └────┬─────┘          └────┬─────┘
//!                 │ spawn per item      │ spawn per item
//!                 ▼                     ▼
//!            ┌─────────────────────────────────┐
//!            │ worker pool (item tasks)        │
//!            └─────────────────────────────────┘
//! ```
//!
//! ## Ordering
//!
//! Items inside one stage run in parallel and leave the stage in whatever
//! order they finish. [`Pipe::deliver`] therefore returns whichever item
//! completes the last stage first, not the oldest one. The only ordering
//! guarantee is per item: every item passes every stage exactly once, in the
//! declared order. Callers that need to know which input an output belongs to
//! must carry that identity inside the item.
//!
//! ## Lifecycle
//!
//! ```text
//!             receive (outstanding 0 → 1)
//!    ┌──────┐ ───────────────────────────▶ ┌─────────┐
//!    │ Idle │                              │ Running │
//!    └──────┘ ◀─────────────────────────── └─────────┘
//!             deliver (outstanding 1 → 0)
//! ```
//!
//! An idle pipe owns no threads and no channels. The first `receive` creates
//! fresh channels, a worker pool sized by [`PipelineConfig`], and one
//! forwarding thread per stage. The `deliver` that takes the last
//! outstanding item closes the channels and joins the forwarding threads.
//!
//! Every Idle → Running edge pays for that start-up: up to one pool thread
//! per core plus the forwarding threads. Feed a pipe in batches
//! ([`Pipe::process`], or many `receive`s before the first `deliver`). A
//! caller that alternates `receive` and `deliver` one item at a time starts
//! and stops the whole pipe for every item.
//!
//! A single control mutex guards the outstanding counter and the state
//! transition. Sends and receives on the data channels happen outside it, so
//! a caller blocked in `deliver` never holds up `receive`.
//!
//! ## Failures
//!
//! The pipe itself never inspects item contents. Item-level failures are part
//! of the item (use `Result` as the item type) and travel to `deliver` like
//! any other value. A stage that panics is caught in its task; the panic is
//! resumed on the thread that delivers that item, after the pipe's own
//! bookkeeping is done.

use crate::config::{PipelineConfig, effective_threads};
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipeError {
    #[error("failed to spawn stage worker: {0}")]
    Spawn(#[from] io::Error),
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] ThreadPoolBuildError),
}

/// One step of a [`Pipe`].
///
/// Implemented for any `Fn(T) -> T` closure that can be shared across
/// threads.
pub trait Stage<T>: Send + Sync {
    fn handle(&self, item: T) -> T;
}

impl<T, F> Stage<T> for F
where
    F: Fn(T) -> T + Send + Sync,
{
    fn handle(&self, item: T) -> T {
        self(item)
    }
}

/// What travels over the links: an item, or the panic a stage raised on it.
type Outcome<T> = Result<T, Box<dyn Any + Send>>;

/// Chains stages so many items can be processed by them concurrently.
pub struct Pipe<T> {
    stages: Vec<Arc<dyn Stage<T>>>,
    threads: usize,
    control: Mutex<Control<T>>,
    live_workers: Arc<AtomicUsize>,
}

struct Control<T> {
    outstanding: usize,
    state: State<T>,
}

enum State<T> {
    Idle,
    Running(Running<T>),
}

/// Everything that exists only while items are in flight.
struct Running<T> {
    entry: Sender<Outcome<T>>,
    exit: Arc<Mutex<Receiver<Outcome<T>>>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T> Running<T> {
    /// Close the entry link and wait for every forwarding thread to drain.
    ///
    /// Closing the entry makes stage 0's loop end, which drops its output
    /// sender and ends stage 1's loop, and so on down the chain.
    fn shutdown(self) {
        drop(self.entry);
        for worker in self.workers {
            // Forwarding loops don't run user code, a join error can't carry
            // anything actionable.
            let _ = worker.join();
        }
    }
}

impl<T: Send + 'static> Pipe<T> {
    /// A pipe with the stages connected in the given order.
    ///
    /// No threads are started until the first [`receive`](Self::receive).
    pub fn new(stages: Vec<Arc<dyn Stage<T>>>, config: &PipelineConfig) -> Self {
        Self {
            stages,
            threads: effective_threads(config),
            control: Mutex::new(Control {
                outstanding: 0,
                state: State::Idle,
            }),
            live_workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A pipe without stages: items come out as they went in.
    pub fn identity() -> Self {
        Self::new(Vec::new(), &PipelineConfig::default())
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Items received but not yet delivered.
    pub fn outstanding(&self) -> usize {
        self.lock().outstanding
    }

    pub fn is_running(&self) -> bool {
        matches!(self.lock().state, State::Running(_))
    }

    /// Forwarding threads currently alive, across all runs of this pipe.
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::SeqCst)
    }

    /// Put an item into the first stage, starting the workers if the pipe
    /// was idle.
    ///
    /// Starting builds a new worker pool and spawns the forwarding threads,
    /// so the first `receive` of a run is far more expensive than the rest.
    pub fn receive(&self, item: T) -> Result<(), PipeError> {
        let entry = {
            let mut control = self.lock();
            let running = match std::mem::replace(&mut control.state, State::Idle) {
                State::Running(running) => running,
                State::Idle => {
                    let running = self.start()?;
                    tracing::debug!(
                        stages = self.stages.len(),
                        threads = self.threads,
                        "pipe started"
                    );
                    running
                }
            };
            let entry = running.entry.clone();
            control.state = State::Running(running);
            control.outstanding += 1;
            entry
        };
        // The entry receiver lives until the outstanding count we just
        // raised drops back to zero, so this send can't fail.
        let _ = entry.send(Ok(item));
        Ok(())
    }

    /// Block until an item has passed every stage and return it.
    ///
    /// Returns `None` when nothing is outstanding, or when another caller
    /// took the last item while this one was waiting. Taking the last
    /// outstanding item tears the workers down before returning.
    pub fn deliver(&self) -> Option<T> {
        let exit = {
            let control = self.lock();
            match &control.state {
                State::Running(running) if control.outstanding > 0 => Arc::clone(&running.exit),
                _ => return None,
            }
        };

        let outcome = exit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv()
            .ok()?;

        let finished = {
            let mut control = self.lock();
            control.outstanding -= 1;
            if control.outstanding == 0 {
                Some(std::mem::replace(&mut control.state, State::Idle))
            } else {
                None
            }
        };
        if let Some(State::Running(running)) = finished {
            running.shutdown();
            tracing::debug!(live_workers = self.live_workers(), "pipe stopped");
        }

        match outcome {
            Ok(item) => Some(item),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Run every item through the pipe and collect the results.
    ///
    /// The result order is completion order, not input order. If the pipe
    /// can't start, the items already received are still drained before the
    /// error is returned.
    pub fn process<I>(&self, items: I) -> Result<Vec<T>, PipeError>
    where
        I: IntoIterator<Item = T>,
    {
        let out = Mutex::new(Vec::new());
        self.process_and_consume(items, |item| {
            out.lock().unwrap_or_else(PoisonError::into_inner).push(item)
        })?;
        Ok(out.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    /// Run every item through the pipe, handing each one to `consumer` as
    /// soon as it is delivered.
    ///
    /// Consumer calls run concurrently on the rayon global pool while later
    /// items are still in flight. Returns the number of items received.
    pub fn process_and_consume<I, C>(&self, items: I, consumer: C) -> Result<usize, PipeError>
    where
        I: IntoIterator<Item = T>,
        C: Fn(T) + Sync,
    {
        let mut received = 0;
        let mut failure = None;
        for item in items {
            if let Err(err) = self.receive(item) {
                failure = Some(err);
                break;
            }
            received += 1;
        }

        let consumer = &consumer;
        rayon::scope(|scope| {
            for _ in 0..received {
                if let Some(item) = self.deliver() {
                    scope.spawn(move |_| consumer(item));
                }
            }
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(received),
        }
    }

    fn start(&self) -> Result<Running<T>, PipeError> {
        let (entry, mut link) = mpsc::channel();
        if self.stages.is_empty() {
            return Ok(Running {
                entry,
                exit: Arc::new(Mutex::new(link)),
                workers: Vec::new(),
            });
        }

        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(self.threads)
                .thread_name(|i| format!("pipe-task-{i}"))
                .build()?,
        );

        let mut workers = Vec::with_capacity(self.stages.len());
        for (index, stage) in self.stages.iter().enumerate() {
            let (output, next) = mpsc::channel();
            let stage = Arc::clone(stage);
            let pool = Arc::clone(&pool);
            let live = Arc::clone(&self.live_workers);
            live.fetch_add(1, Ordering::SeqCst);

            let spawned = thread::Builder::new()
                .name(format!("pipe-stage-{index}"))
                .spawn(move || forward(stage, link, output, pool, live));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    self.live_workers.fetch_sub(1, Ordering::SeqCst);
                    Running {
                        entry,
                        exit: Arc::new(Mutex::new(next)),
                        workers,
                    }
                    .shutdown();
                    return Err(err.into());
                }
            }
            link = next;
        }

        Ok(Running {
            entry,
            exit: Arc::new(Mutex::new(link)),
            workers,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Control<T>> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Drop for Pipe<T> {
    fn drop(&mut self) {
        let control = self
            .control
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let State::Running(running) = std::mem::replace(&mut control.state, State::Idle) {
            running.shutdown();
        }
    }
}

/// Forwarding loop of one stage: spawn a task per arriving item until the
/// input link closes.
fn forward<T: Send + 'static>(
    stage: Arc<dyn Stage<T>>,
    input: Receiver<Outcome<T>>,
    output: Sender<Outcome<T>>,
    pool: Arc<ThreadPool>,
    live: Arc<AtomicUsize>,
) {
    for outcome in input {
        match outcome {
            Ok(item) => {
                let stage = Arc::clone(&stage);
                let output = output.clone();
                pool.spawn(move || {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| stage.handle(item)));
                    let _ = output.send(outcome);
                });
            }
            // An earlier stage panicked on this item; pass the payload along.
            Err(payload) => {
                let _ = output.send(Err(payload));
            }
        }
    }
    live.fetch_sub(1, Ordering::SeqCst);
}
