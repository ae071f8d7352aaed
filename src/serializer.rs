//! Command serializer - one worker thread, one queue, strict FIFO
//!
//! All device I/O and all page mutation runs as jobs on a single dedicated
//! thread that owns the state `S`. Any thread may enqueue; only the worker
//! ever touches `S`, so the state needs no locks and is not even required to
//! be `Send` (it is built on the worker by the `init` closure).
//!
//! ```text
//!  app threads ──┐
//!                ├──► UnboundedSender<Message<S>> ──► worker thread ──► &mut S
//!  driver thread ┘          (FIFO)                    (one job at a time)
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace};

use crate::error::{Result, SessionError};

/// Unit of work executed against the worker-owned state
pub type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Run {
        label: &'static str,
        job: Job<S>,
    },
    Close {
        label: &'static str,
        finalize: Job<S>,
        done: oneshot::Sender<()>,
    },
}

/// Handle to a single-worker job queue
///
/// Cheap to clone; every clone feeds the same worker.
pub struct Serializer<S> {
    tx: mpsc::UnboundedSender<Message<S>>,
    /// `true` once closed. Submitters hold the read guard across check and
    /// send, so nothing can be accepted after the close message is queued.
    closed: Arc<RwLock<bool>>,
}

impl<S> Clone for Serializer<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<S: 'static> Serializer<S> {
    /// Start the worker thread
    ///
    /// `init` runs first on the worker and builds the state; it receives a
    /// handle so the state can enqueue follow-up work for itself.
    pub fn spawn<F>(name: &str, init: F) -> Result<Self>
    where
        F: FnOnce(Serializer<S>) -> S + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            tx,
            closed: Arc::new(RwLock::new(false)),
        };

        let worker_handle = handle.clone();
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let state = init(worker_handle);
                run(rx, state);
            })
            .map_err(SessionError::WorkerSpawn)?;

        debug!(worker = name, "Serializer worker spawned");
        Ok(handle)
    }

    /// Enqueue a job, fire-and-forget
    ///
    /// Fails with `SessionClosed` once [`Serializer::close`] was called.
    pub fn submit<F>(&self, label: &'static str, job: F) -> Result<()>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        let closed = self.closed.read();
        if *closed {
            return Err(SessionError::SessionClosed);
        }
        self.send(Message::Run {
            label,
            job: Box::new(job),
        })
    }

    /// Enqueue follow-up work from inside a running job
    ///
    /// Unlike `submit` this is still accepted while a close is pending, so
    /// work queued before the close can finish what it started.
    pub fn defer<F>(&self, label: &'static str, job: F) -> Result<()>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.send(Message::Run {
            label,
            job: Box::new(job),
        })
    }

    /// Run a job and block until it has produced its result
    ///
    /// Must not be called from inside a job (the worker would wait on
    /// itself) nor from an async context; use [`Serializer::call_async`] there.
    pub fn call<R, F>(&self, label: &'static str, job: F) -> Result<R>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let rx = self.enqueue_call(label, job)?;
        rx.blocking_recv().map_err(|_| self.lost(label))
    }

    /// Async flavour of [`Serializer::call`]
    pub async fn call_async<R, F>(&self, label: &'static str, job: F) -> Result<R>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let rx = self.enqueue_call(label, job)?;
        rx.await.map_err(|_| self.lost(label))
    }

    /// Stop accepting work and shut the worker down
    ///
    /// Everything already queued (and anything it defers) still runs, then
    /// `finalize`, then the worker exits and the returned receiver fires.
    pub fn close<F>(&self, label: &'static str, finalize: F) -> Result<oneshot::Receiver<()>>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        let mut closed = self.closed.write();
        if *closed {
            return Err(SessionError::SessionClosed);
        }
        *closed = true;
        let (done, done_rx) = oneshot::channel();
        self.send(Message::Close {
            label,
            finalize: Box::new(finalize),
            done,
        })?;
        Ok(done_rx)
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    fn enqueue_call<R, F>(&self, label: &'static str, job: F) -> Result<oneshot::Receiver<R>>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(label, move |state| {
            let _ = tx.send(job(state));
        })?;
        Ok(rx)
    }

    fn send(&self, message: Message<S>) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| SessionError::SessionClosed)
    }

    /// Error for a job whose answer never arrived
    fn lost(&self, label: &'static str) -> SessionError {
        if self.is_closed() {
            SessionError::SessionClosed
        } else {
            SessionError::WorkerFailed(label)
        }
    }
}

/// Worker loop: one job at a time until a close message was handled
fn run<S>(mut rx: mpsc::UnboundedReceiver<Message<S>>, mut state: S) {
    while let Some(message) = rx.blocking_recv() {
        match message {
            Message::Run { label, job } => execute(&mut state, label, job),
            Message::Close {
                label,
                finalize,
                done,
            } => {
                // Drain what was queued before the close, plus its follow-ups
                while let Ok(message) = rx.try_recv() {
                    match message {
                        Message::Run { label, job } => execute(&mut state, label, job),
                        Message::Close { .. } => {}
                    }
                }
                execute(&mut state, label, finalize);
                let _ = done.send(());
                break;
            }
        }
    }
    debug!("Serializer worker stopped");
}

fn execute<S>(state: &mut S, label: &'static str, job: Job<S>) {
    trace!(job = label, "Running job");
    if panic::catch_unwind(AssertUnwindSafe(|| job(state))).is_err() {
        error!(job = label, "Job panicked, worker continues");
    }
}
