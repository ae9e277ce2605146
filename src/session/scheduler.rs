//! Step scheduler
//!
//! The trampoline that runs guest code in bounded slices. Control flow is an
//! explicit state machine driven by [`Resumer::pump`]: the host loop calls
//! `pump(now)` whenever it likes, and each call executes at most one slice.
//! A resumption is always a fresh `pump` call, never a synchronous re-entry,
//! so guest recursion can never grow the host stack.
//!
//! Suspensions park the machine in [`Phase::Suspended`] until the matching
//! host resolver fires: time passing (observed through the `now` handed to
//! `pump`) for sleeps, [`Resumer::provide_input`] for input,
//! [`Resumer::notify_click`] for clicks.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::history::{
    StepFrame, StepLog, MAX_REPLAY_LINES, PROGRAM_ENDED_LINE, PROGRAM_ENDED_MARKER,
};
use super::RunResult;
use crate::canvas::Surface;
use crate::exec::command::SuspendCommand;
use crate::exec::{ExecContext, GuestFault, Interpreter, SliceOutcome, ACTIVE_INPUT_GLOBAL};
use crate::output::OutputBuffer;

/// Name recorded for module-level frames.
const MODULE_CODE_NAME: &str = "<module>";

/// Console text appended when a run is cancelled mid-flight.
const INTERRUPT_TEXT: &str = "KeyboardInterrupt";

/// What the machine is waiting on while suspended.
#[derive(Debug, Clone, PartialEq)]
pub enum Wait {
    /// Asleep until the deadline; the next `pump` at or past it resumes.
    /// `None` means the requested duration has no representable deadline
    /// on this clock: the run sleeps forever, though it stays cancellable.
    Sleep { until: Option<Instant> },
    /// Waiting for a console reply to the given prompt.
    Input { prompt: String },
    /// Waiting for one pointer-down on the surface.
    Click,
}

/// Scheduler state. At most one run is active at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// No run has started yet.
    Idle,
    /// A slice is due; the next `pump` executes it.
    Running,
    /// Parked on a host-mediated wait.
    Suspended(Wait),
    /// The last run completed and its result is available.
    Finished,
}

/// Host-side resolver for input suspensions. When installed, it is invoked
/// once per suspension with the prompt and its reply resumes the guest
/// without parking.
pub type InputHandler = Box<dyn FnMut(&str) -> String + Send>;

struct RunRequest<P> {
    program: P,
    step_mode: bool,
    interrupt_frequency: Option<u32>,
}

impl<P> std::fmt::Debug for RunRequest<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunRequest")
            .field("step_mode", &self.step_mode)
            .field("interrupt_frequency", &self.interrupt_frequency)
            .finish_non_exhaustive()
    }
}

/// The trampoline. Owns the guest interpreter and all per-session state it
/// may touch: surface, console, and the step log.
pub struct Resumer<I: Interpreter> {
    interp: I,
    surface: Surface,
    output: OutputBuffer,
    log: StepLog,
    phase: Phase,
    step_mode: bool,
    interrupt_frequency: Option<u32>,
    cancel_requested: bool,
    queued: VecDeque<RunRequest<I::Program>>,
    input_handler: Option<InputHandler>,
    // One entry per finalized run, oldest first. A queued run's promotion
    // must not drop the result of the run it follows.
    results: VecDeque<RunResult>,
}

impl<I: Interpreter> std::fmt::Debug for Resumer<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resumer")
            .field("phase", &self.phase)
            .field("step_mode", &self.step_mode)
            .field("queued", &self.queued.len())
            .field("frames", &self.log.len())
            .finish_non_exhaustive()
    }
}

impl<I: Interpreter> Resumer<I> {
    pub fn new(interp: I) -> Self {
        Resumer {
            interp,
            surface: Surface::new(),
            output: OutputBuffer::new(),
            log: StepLog::new(),
            phase: Phase::Idle,
            step_mode: false,
            interrupt_frequency: None,
            cancel_requested: false,
            queued: VecDeque::new(),
            input_handler: None,
            results: VecDeque::new(),
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running | Phase::Suspended(_))
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut OutputBuffer {
        &mut self.output
    }

    pub fn log(&self) -> &StepLog {
        &self.log
    }

    /// The most recently finalized run's summary.
    pub fn result(&self) -> Option<&RunResult> {
        self.results.back()
    }

    /// Remove and return the oldest untaken run summary.
    pub fn take_result(&mut self) -> Option<RunResult> {
        self.results.pop_front()
    }

    pub fn set_input_handler(&mut self, handler: Option<InputHandler>) {
        self.input_handler = handler;
    }

    /// Begin (or queue) a run. When a run is already active the request
    /// waits its turn; it starts as soon as the active run finalizes.
    pub fn run(&mut self, program: I::Program, step_mode: bool, interrupt_frequency: Option<u32>) {
        let request = RunRequest {
            program,
            step_mode,
            interrupt_frequency,
        };
        if self.is_running() {
            debug!(queued = self.queued.len() + 1, "run queued behind active run");
            self.queued.push_back(request);
        } else {
            // A fresh start; any still-untaken result belongs to a run the
            // host no longer cares about.
            self.results.clear();
            self.start(request);
        }
    }

    /// Request cancellation of the active run. Observed at the next slice
    /// boundary; a slice already executing is not preempted.
    pub fn cancel(&mut self) {
        if self.is_running() {
            self.cancel_requested = true;
        }
    }

    /// Resolve an input suspension. Ignored in any other phase.
    pub fn provide_input(&mut self, reply: &str) {
        if !matches!(self.phase, Phase::Suspended(Wait::Input { .. })) {
            return;
        }
        self.output.append_to_last(reply);
        self.interp.write_global(ACTIVE_INPUT_GLOBAL, reply);
        self.phase = Phase::Running;
    }

    /// Resolve a click suspension. Ignored in any other phase.
    pub fn notify_click(&mut self) {
        if matches!(self.phase, Phase::Suspended(Wait::Click)) {
            self.phase = Phase::Running;
        }
    }

    /// Advance the machine by at most one slice. Never errors outward; a
    /// guest fault finalizes the run with its text in the console stream.
    pub fn pump(&mut self, now: Instant) {
        if self.cancel_requested && self.is_running() {
            self.finalize_cancelled(now);
            return;
        }
        match self.phase.clone() {
            Phase::Idle | Phase::Finished => {}
            Phase::Suspended(Wait::Sleep { until }) => {
                if until.is_some_and(|deadline| now >= deadline) {
                    self.phase = Phase::Running;
                    self.execute_slice(now);
                }
            }
            // Input and click waits park until their resolver fires.
            Phase::Suspended(_) => {}
            Phase::Running => self.execute_slice(now),
        }
    }

    fn start(&mut self, request: RunRequest<I::Program>) {
        info!(
            step_mode = request.step_mode,
            interrupt_frequency = ?request.interrupt_frequency,
            "starting run"
        );
        self.output.clear();
        self.log.clear();
        self.cancel_requested = false;
        self.step_mode = request.step_mode;
        self.interrupt_frequency = request.interrupt_frequency;
        self.interp.load(request.program);
        self.phase = Phase::Running;
    }

    fn execute_slice(&mut self, now: Instant) {
        let outcome = {
            let mut ctx = ExecContext {
                surface: &mut self.surface,
                output: &mut self.output,
                now,
            };
            self.interp.run_slice(&mut ctx, self.interrupt_frequency)
        };
        match outcome {
            Ok(SliceOutcome::Running { line }) => {
                self.capture_frame(line);
                self.phase = Phase::Running;
            }
            Ok(SliceOutcome::Suspended(cmd)) => self.handle_suspension(cmd, now),
            Ok(SliceOutcome::Finished) => self.finalize(now, None),
            Err(fault) => self.finalize(now, Some(fault)),
        }
    }

    fn handle_suspension(&mut self, cmd: SuspendCommand, now: Instant) {
        match cmd {
            SuspendCommand::Continue => {
                // A plain yield: the next slice runs on the next pump.
                self.capture_frame(self.interp.line());
                self.phase = Phase::Running;
            }
            SuspendCommand::Sleep { seconds } => {
                // Non-positive and non-finite durations do not wait. A
                // finite duration too large for the clock (conversion or
                // deadline arithmetic fails) parks with no deadline.
                if seconds.is_finite() && seconds > 0.0 {
                    let until = Duration::try_from_secs_f64(seconds)
                        .ok()
                        .and_then(|duration| now.checked_add(duration));
                    self.phase = Phase::Suspended(Wait::Sleep { until });
                } else {
                    self.phase = Phase::Running;
                }
            }
            SuspendCommand::Input { prompt } => {
                self.output.append_line(&prompt);
                match self.input_handler.as_mut() {
                    Some(handler) => {
                        let reply = handler(&prompt);
                        self.output.append_to_last(&reply);
                        self.interp.write_global(ACTIVE_INPUT_GLOBAL, &reply);
                        self.phase = Phase::Running;
                    }
                    None => {
                        self.phase = Phase::Suspended(Wait::Input { prompt });
                    }
                }
            }
            SuspendCommand::AwaitClick => {
                self.phase = Phase::Suspended(Wait::Click);
            }
        }
    }

    fn capture_frame(&mut self, line: i32) {
        if !self.step_mode {
            return;
        }
        self.log.push(StepFrame {
            line,
            log_offset: self.output.offset(),
            code_name: MODULE_CODE_NAME.to_string(),
            locals: self.interp.locals(),
            shapes: self.surface.snapshot_live(),
        });
    }

    fn finalize_cancelled(&mut self, now: Instant) {
        warn!("run cancelled");
        self.output.append_error(INTERRUPT_TEXT);
        self.finalize(now, None);
    }

    fn finalize(&mut self, _now: Instant, fault: Option<GuestFault>) {
        if let Some(fault) = &fault {
            warn!(line = fault.line, "guest fault: {}", fault.message);
            self.output.append_error(&fault.to_string());
        }
        // Error text is reported separately in the result, then merged into
        // the main stream so scrubbing replays it in order.
        let errors = self.output.errors().to_vec();
        self.output.merge_errors();

        // Bound the retained console and rebase frame offsets with it.
        if self.output.offset() > MAX_REPLAY_LINES {
            let dropped = self.output.offset() - MAX_REPLAY_LINES;
            debug!(dropped, "truncating console to replay window");
            self.output.drop_prefix(dropped);
            self.log.rebase(dropped);
        }

        if self.step_mode {
            // Terminal pseudo-frame: scrubbing to it shows the whole console
            // (the offset past the end clamps) and the final canvas.
            self.log.push(StepFrame {
                line: PROGRAM_ENDED_LINE,
                log_offset: self.output.offset() + 1,
                code_name: PROGRAM_ENDED_MARKER.to_string(),
                locals: Default::default(),
                shapes: self.surface.snapshot_live(),
            });
        }

        self.results.push_back(RunResult {
            output: self.output.lines().to_vec(),
            errors,
            shapes: self.surface.observed().cloned(),
        });
        self.interp.reset();
        self.cancel_requested = false;
        self.phase = Phase::Finished;
        info!(frames = self.log.len(), "run finished");

        if let Some(next) = self.queued.pop_front() {
            self.start(next);
        }
    }
}
