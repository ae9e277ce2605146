//! Worker-thread host
//!
//! Runs a [`Session`] on its own thread, postMessage-style: the host sends
//! [`HostRequest`] values in, console lines and canvas updates flow out as
//! [`WorkerEvent`]s, and each run's completion resolves a dedicated
//! [`oneshot`] reply exactly once. The worker loop waits on its request
//! queue with a short timeout and pumps the trampoline between messages, so
//! sleeps and queued slices progress even when the host is quiet.

pub mod oneshot;
pub mod transport;

use std::collections::VecDeque;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::canvas::render::RecordingPainter;
use crate::exec::script::{Op, ScriptedVm};
use crate::session::{RunResult, Session, SessionError};
use transport::{HostRequest, WorkerEvent};

/// How long the worker blocks on its queue before pumping anyway.
const PUMP_INTERVAL: Duration = Duration::from_millis(5);

enum Envelope {
    Request(HostRequest),
    RunJob {
        request: HostRequest,
        done: oneshot::Sender<RunResult>,
    },
}

/// Reply handle for one submitted run.
#[derive(Debug)]
pub struct RunHandle {
    pub id: u64,
    reply: oneshot::Receiver<RunResult>,
}

impl RunHandle {
    /// Block until the run finalizes.
    pub fn wait(self) -> Result<RunResult, SessionError> {
        self.reply.recv().map_err(|_| SessionError::WorkerDisconnected)
    }

    /// Non-blocking probe for the result.
    pub fn try_wait(&self) -> Option<Result<RunResult, SessionError>> {
        self.reply
            .try_recv()
            .map(|r| r.map_err(|_| SessionError::WorkerDisconnected))
    }
}

/// Owning handle to the worker thread.
pub struct WorkerHost {
    requests: mpsc::Sender<Envelope>,
    events: mpsc::Receiver<WorkerEvent>,
    handle: Option<JoinHandle<()>>,
    next_id: u64,
}

impl std::fmt::Debug for WorkerHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHost")
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl WorkerHost {
    /// Spawn the worker thread with a fresh scripted-VM session.
    pub fn spawn() -> std::io::Result<Self> {
        let (req_tx, req_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("restep-worker".to_string())
            .spawn(move || worker_loop(req_rx, event_tx))?;
        Ok(WorkerHost {
            requests: req_tx,
            events: event_rx,
            handle: Some(handle),
            next_id: 0,
        })
    }

    /// Submit a program. The returned handle resolves when that run (not a
    /// run queued after it) finalizes.
    pub fn run(
        &mut self,
        program: Vec<Op>,
        step_mode: bool,
        operation_budget: Option<u32>,
    ) -> Result<RunHandle, SessionError> {
        let id = self.next_id;
        self.next_id += 1;
        let (done, reply) = oneshot::channel();
        self.requests
            .send(Envelope::RunJob {
                request: HostRequest::Run {
                    id,
                    program,
                    step_mode,
                    operation_budget,
                },
                done,
            })
            .map_err(|_| SessionError::WorkerDisconnected)?;
        Ok(RunHandle { id, reply })
    }

    pub fn cancel(&self) -> Result<(), SessionError> {
        self.send(HostRequest::Cancel)
    }

    pub fn provide_input(&self, reply: &str) -> Result<(), SessionError> {
        self.send(HostRequest::ProvideInput {
            reply: reply.to_string(),
        })
    }

    pub fn notify_click(&self) -> Result<(), SessionError> {
        self.send(HostRequest::NotifyClick)
    }

    pub fn pointer_moved(&self, x: f64, y: f64) -> Result<(), SessionError> {
        self.send(HostRequest::PointerMoved { x, y })
    }

    /// Report a loaded image and its measured dimensions.
    pub fn image_loaded(&self, url: &str, width: f64, height: f64) -> Result<(), SessionError> {
        self.send(HostRequest::ImageLoaded {
            url: url.to_string(),
            width,
            height,
        })
    }

    /// Next queued worker event, if any.
    pub fn poll_event(&self) -> Option<WorkerEvent> {
        self.events.try_recv().ok()
    }

    fn send(&self, request: HostRequest) -> Result<(), SessionError> {
        self.requests
            .send(Envelope::Request(request))
            .map_err(|_| SessionError::WorkerDisconnected)
    }
}

impl Drop for WorkerHost {
    fn drop(&mut self) {
        let _ = self.requests.send(Envelope::Request(HostRequest::Shutdown));
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }
}

fn worker_loop(requests: mpsc::Receiver<Envelope>, events: mpsc::Sender<WorkerEvent>) {
    let mut session = Session::new(ScriptedVm::new());
    let out_tx = events.clone();
    let err_tx = events.clone();
    session.set_output_handlers(
        Box::new(move |line| {
            let _ = out_tx.send(WorkerEvent::Output {
                line: line.to_string(),
            });
        }),
        Box::new(move |line| {
            let _ = err_tx.send(WorkerEvent::ErrorOutput {
                line: line.to_string(),
            });
        }),
    );

    // Reply senders in submission order; runs finalize in the same order.
    let mut pending: VecDeque<(u64, oneshot::Sender<RunResult>)> = VecDeque::new();
    let mut painter = RecordingPainter::new();
    let mut announced_images: FxHashSet<String> = FxHashSet::default();

    loop {
        match requests.recv_timeout(PUMP_INTERVAL) {
            Ok(Envelope::RunJob { request, done }) => {
                if let HostRequest::Run {
                    id,
                    program,
                    step_mode,
                    operation_budget,
                } = request
                {
                    debug!(id, "worker accepted run");
                    pending.push_back((id, done));
                    session.run(program, step_mode, operation_budget);
                }
            }
            Ok(Envelope::Request(request)) => match request {
                HostRequest::Cancel => session.cancel(),
                HostRequest::ProvideInput { reply } => session.provide_input(&reply),
                HostRequest::NotifyClick => session.notify_click(),
                HostRequest::PointerMoved { x, y } => session.pointer_moved(x, y),
                HostRequest::ImageLoaded { url, width, height } => {
                    announced_images.remove(&url);
                    session.image_loaded(&url, Some((width, height)), Instant::now());
                }
                HostRequest::Run { .. } => {
                    // Run requests arrive as RunJob envelopes only.
                }
                HostRequest::Shutdown => return,
            },
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }

        let now = Instant::now();
        session.pump(now);

        if session.render(&mut painter, now) {
            if let Some(snapshot) = session.surface().observed().cloned() {
                let _ = events.send(WorkerEvent::CanvasUpdate { snapshot });
            }
        }
        for url in session.surface().renderer().pending_images() {
            if announced_images.insert(url.clone()) {
                let _ = events.send(WorkerEvent::ImageNeeded { url });
            }
        }

        while let Some(result) = session.take_result() {
            match pending.pop_front() {
                Some((id, done)) => {
                    debug!(id, "worker run done");
                    let _ = events.send(WorkerEvent::RunDone {
                        id,
                        result: result.clone(),
                    });
                    let _ = done.send(result);
                }
                None => warn!("run result with no pending reply"),
            }
        }
    }
}
