//! Dispatch/poll bridge between the control thread and background org workers.
//!
//! The control thread (editor shell or CLI loop) must never block on network
//! I/O. Each remote operation is dispatched onto its own worker thread, which
//! runs exactly one blocking org call and hands the outcome back through a
//! single-producer/single-consumer channel. A `Poller` owns the receiving end
//! and delivers the outcome to its completion action exactly once.

use anyhow::Result;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};
use tokio::runtime::Builder;

/// Default spacing between poller ticks when the caller does not override it.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Failure reasons a poller can deliver for a dispatched operation.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The worker thread terminated without ever populating its result slot.
    #[error("worker terminated without delivering a result")]
    WorkerGone,
    /// The overall wait budget elapsed before the worker delivered anything.
    #[error("operation did not complete within {0:?}")]
    DeadlineExceeded(Duration),
}

/// One in-flight remote call: the consuming end of a worker's result slot.
///
/// Exactly one worker writes to the slot; exactly one poller consumes it.
pub struct PendingOperation<T> {
    receiver: Option<Receiver<Result<T>>>,
    started: Instant,
    interval: Duration,
    deadline: Option<Duration>,
}

impl<T> PendingOperation<T> {
    pub fn new(receiver: Receiver<Result<T>>) -> Self {
        Self {
            receiver: Some(receiver),
            started: Instant::now(),
            interval: DEFAULT_POLL_INTERVAL,
            deadline: None,
        }
    }

    /// Set the tick spacing used by blocking waits.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Impose a hard overall wait budget, measured from dispatch.
    /// Without one the poller waits indefinitely, as the interactive
    /// host can always re-issue the command.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll the slot for completion without blocking.
    /// Returns `Some(result)` exactly once; `None` while the worker runs.
    /// A result already sitting in the slot always wins over an elapsed
    /// deadline; the deadline only fails an operation whose slot is empty.
    pub fn poll(&mut self) -> Option<Result<T>> {
        if let Some(rx) = &self.receiver {
            match rx.try_recv() {
                Ok(res) => {
                    self.receiver = None;
                    return Some(res);
                }
                Err(TryRecvError::Empty) => {
                    if let Some(deadline) = self.deadline {
                        if self.started.elapsed() >= deadline {
                            self.receiver = None;
                            return Some(Err(BridgeError::DeadlineExceeded(deadline).into()));
                        }
                    }
                }
                Err(TryRecvError::Disconnected) => {
                    // Worker died (panic or drop) with the slot still empty.
                    self.receiver = None;
                    return Some(Err(BridgeError::WorkerGone.into()));
                }
            }
        }
        None
    }

    /// Check if the worker result is still outstanding.
    pub fn is_running(&self) -> bool {
        self.receiver.is_some()
    }

    /// Block the calling thread until the slot resolves, ticking at the
    /// operation's interval. For call sites that need the value in hand
    /// before proceeding (cache warm-up); never call on a UI thread.
    pub fn join(mut self) -> Result<T> {
        loop {
            if let Some(result) = self.poll() {
                return result;
            }
            thread::sleep(self.interval);
        }
    }
}

/// Start one worker thread for a single blocking org call and return the
/// pending operation immediately. Dispatch itself cannot fail; every failure
/// surfaces through the poller.
///
/// The worker builds a current-thread runtime so the future produced by
/// `builder` does not need to be `Send`.
pub fn dispatch<T, FutBuilder, Fut>(builder: FutBuilder) -> PendingOperation<T>
where
    T: Send + 'static,
    FutBuilder: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<T>> + 'static,
{
    let (tx, rx) = std::sync::mpsc::channel();
    thread::spawn(move || {
        let result = match Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime.block_on(builder()),
            Err(e) => Err(anyhow::anyhow!("Failed to create async runtime: {}", e)),
        };
        // The poller may already have given up; a dead receiver is fine.
        let _ = tx.send(result);
    });
    PendingOperation::new(rx)
}

/// Observable poller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Worker still running, slot empty.
    Waiting,
    /// Slot was populated; the success action has run.
    Ready,
    /// Worker failed, died, or the deadline elapsed; the failure action has run.
    Failed,
}

impl PollState {
    pub fn is_done(&self) -> bool {
        !matches!(self, PollState::Waiting)
    }
}

/// Drives one `PendingOperation` to completion and runs its completion
/// action exactly once.
///
/// `tick()` is non-blocking; a host with its own timer calls it on every
/// tick until `is_done()`. Hosts without a timer use `wait()`, which sleeps
/// the operation's interval between ticks on the calling thread.
pub struct Poller<T> {
    op: PendingOperation<T>,
    state: PollState,
    on_ready: Option<Box<dyn FnOnce(T) + Send>>,
    on_failed: Option<Box<dyn FnOnce(anyhow::Error) + Send>>,
}

impl<T> Poller<T> {
    pub fn new(
        op: PendingOperation<T>,
        on_ready: impl FnOnce(T) + Send + 'static,
        on_failed: impl FnOnce(anyhow::Error) + Send + 'static,
    ) -> Self {
        Self {
            op,
            state: PollState::Waiting,
            on_ready: Some(Box::new(on_ready)),
            on_failed: Some(Box::new(on_failed)),
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    /// One non-blocking check. Idempotent after the terminal state: the
    /// completion action never runs a second time.
    pub fn tick(&mut self) -> PollState {
        if self.state.is_done() {
            return self.state;
        }
        match self.op.poll() {
            None => PollState::Waiting,
            Some(Ok(payload)) => {
                self.state = PollState::Ready;
                // Both callbacks are dropped so neither can fire later.
                self.on_failed.take();
                if let Some(action) = self.on_ready.take() {
                    action(payload);
                }
                self.state
            }
            Some(Err(err)) => {
                self.state = PollState::Failed;
                self.on_ready.take();
                if let Some(action) = self.on_failed.take() {
                    action(err);
                }
                self.state
            }
        }
    }

    /// Block the calling thread, ticking at the operation's interval until
    /// the poller reaches a terminal state. Only for hosts that own no timer
    /// loop (the CLI, cache warm-up); never call this on a UI thread.
    pub fn wait(mut self) -> PollState {
        let interval = self.op.interval();
        loop {
            let state = self.tick();
            if state.is_done() {
                return state;
            }
            thread::sleep(interval);
        }
    }
}
