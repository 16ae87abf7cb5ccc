//! Off-thread execution of API calls with continuations delivered back to the
//! owning thread.
//!
//! # Design
//! Each `run_async` call spawns one worker thread and parks its continuation
//! in a table owned by the dispatcher. Only the worker's outcome crosses
//! threads: it is sent over a channel tagged with the call id, and nothing
//! runs on the caller's side until the owning thread calls
//! [`Dispatcher::pump`] or [`Dispatcher::pump_timeout`] from its event loop.
//! Continuations therefore need not be `Send` and may hold `Rc` state.
//!
//! A continuation runs exactly one of `on_success` / `on_error`, then
//! `on_finally`. A panicking worker is reported through `on_error`, and if the
//! worker thread cannot be spawned the error is queued the same way, so every
//! call completes exactly once.
//!
//! There is no ordering between concurrent calls and no cancellation.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error};

/// A worker's result on its way back to the owning thread.
type Outcome = Result<Box<dyn Any + Send>, anyhow::Error>;
type Continuation = Box<dyn FnOnce(Outcome)>;

pub struct Dispatcher {
    tx: Sender<(u64, Outcome)>,
    rx: Receiver<(u64, Outcome)>,
    // Never leaves the owning thread; also keeps the dispatcher `!Send`.
    pending: RefCell<HashMap<u64, Continuation>>,
    next_id: Cell<u64>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            pending: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
        }
    }

    /// Run `worker` on a new thread; deliver its result to `on_success` or
    /// `on_error` on the next pump.
    pub fn run_async<T, E, W, S, F>(&self, worker: W, on_success: S, on_error: F)
    where
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static,
        W: FnOnce() -> Result<T, E> + Send + 'static,
        S: FnOnce(T) + 'static,
        F: FnOnce(anyhow::Error) + 'static,
    {
        self.run_async_then(worker, on_success, on_error, || {});
    }

    /// Like [`run_async`](Self::run_async), then runs `on_finally` after
    /// whichever continuation ran.
    pub fn run_async_then<T, E, W, S, F, D>(&self, worker: W, on_success: S, on_error: F, on_finally: D)
    where
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static,
        W: FnOnce() -> Result<T, E> + Send + 'static,
        S: FnOnce(T) + 'static,
        F: FnOnce(anyhow::Error) + 'static,
        D: FnOnce() + 'static,
    {
        let id = self.next_id.get();
        self.next_id.set(id.wrapping_add(1));

        let continuation: Continuation = Box::new(move |outcome| {
            let typed = outcome.and_then(|value| {
                value
                    .downcast::<T>()
                    .map(|value| *value)
                    .map_err(|_| anyhow!("worker result has an unexpected type"))
            });
            match typed {
                Ok(value) => on_success(value),
                Err(err) => on_error(err),
            }
            on_finally();
        });
        self.pending.borrow_mut().insert(id, continuation);

        let worker_tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name("api-worker".to_string())
            .spawn(move || {
                let outcome: Outcome = match panic::catch_unwind(AssertUnwindSafe(worker)) {
                    Ok(Ok(value)) => Ok(Box::new(value) as Box<dyn Any + Send>),
                    Ok(Err(err)) => Err(err.into()),
                    Err(payload) => Err(anyhow!("worker panicked: {}", panic_message(&*payload))),
                };
                if worker_tx.send((id, outcome)).is_err() {
                    debug!("dispatcher dropped before worker finished");
                }
            });

        if let Err(e) = spawned {
            error!(error = %e, "failed to spawn API worker");
            // The worker never ran, so this is the only delivery for `id`.
            if self.tx.send((id, Err(anyhow!("failed to spawn worker: {e}")))).is_err() {
                debug!("dispatcher channel closed");
            }
        }
    }

    /// Run every continuation that is ready, without blocking.
    pub fn pump(&self) -> usize {
        let mut ran = 0;
        while let Ok((id, outcome)) = self.rx.try_recv() {
            ran += self.complete(id, outcome);
        }
        ran
    }

    /// Wait up to `timeout` for one continuation, then drain the rest.
    pub fn pump_timeout(&self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok((id, outcome)) => self.complete(id, outcome) + self.pump(),
            Err(_) => 0,
        }
    }

    /// Calls whose continuation has not run yet.
    pub fn in_flight(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Pump until nothing is in flight or `timeout` elapses. Returns whether
    /// everything completed.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.pump_timeout(remaining);
        }
        true
    }

    fn complete(&self, id: u64, outcome: Outcome) -> usize {
        // The borrow ends before the continuation runs, so it may start
        // another call.
        let continuation = self.pending.borrow_mut().remove(&id);
        match continuation {
            Some(continuation) => {
                continuation(outcome);
                1
            }
            None => 0,
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
