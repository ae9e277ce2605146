//! Session layer
//!
//! One `Session` is one learner sitting at the tool: a guest interpreter, a
//! drawing surface, a console buffer, and the step scheduler that ties them
//! together. The submodules split the concerns:
//! - [`scheduler`]: the pump-driven trampoline and suspension handling
//! - [`history`]: the recorded step log scrubbing replays
//!
//! The facade below is the whole host boundary: start and cancel runs,
//! resolve suspensions, read the step list, and slice the console at a
//! recorded offset.

pub mod history;
pub mod scheduler;

use std::time::Instant;

use thiserror::Error;

use crate::canvas::{render::Painter, CanvasSnapshot, Surface};
use crate::exec::Interpreter;
use crate::output::LineHandler;
use history::StepFrame;
use scheduler::Resumer;
pub use scheduler::{InputHandler, Phase, Wait};

/// End-of-run summary handed back to the host. Serializable so the worker
/// transport can carry it across the thread boundary as a message.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunResult {
    /// Full console stream, error text merged at the end.
    pub output: Vec<String>,
    /// Error text alone, in emission order.
    pub errors: Vec<String>,
    /// The renderer's observed canvas state, if a canvas was created.
    pub shapes: Option<CanvasSnapshot>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("step frame {index} out of range (log has {len} frames)")]
    FrameOutOfRange { index: usize, len: usize },
    #[error("worker thread disconnected")]
    WorkerDisconnected,
}

/// Host facade over one interpreter session.
#[derive(Debug)]
pub struct Session<I: Interpreter> {
    resumer: Resumer<I>,
}

impl<I: Interpreter> Session<I> {
    pub fn new(interp: I) -> Self {
        Session {
            resumer: Resumer::new(interp),
        }
    }

    /// Start a run, or queue it behind the active one. `interrupt_frequency`
    /// is the per-slice operation budget; `None` runs without interruption
    /// (no intermediate frames even in step mode).
    pub fn run(&mut self, program: I::Program, step_mode: bool, interrupt_frequency: Option<u32>) {
        self.resumer.run(program, step_mode, interrupt_frequency);
    }

    pub fn cancel(&mut self) {
        self.resumer.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.resumer.is_running()
    }

    pub fn phase(&self) -> &Phase {
        self.resumer.phase()
    }

    /// Drive the trampoline. Call from the host loop with the current time.
    pub fn pump(&mut self, now: Instant) {
        self.resumer.pump(now);
    }

    pub fn provide_input(&mut self, reply: &str) {
        self.resumer.provide_input(reply);
    }

    pub fn notify_click(&mut self) {
        self.resumer.notify_click();
    }

    /// Install a resolver that answers input prompts without parking.
    pub fn set_input_handler(&mut self, handler: Option<InputHandler>) {
        self.resumer.set_input_handler(handler);
    }

    /// Install console sinks invoked with each appended line.
    pub fn set_output_handlers(&mut self, stdout: LineHandler, stderr: LineHandler) {
        self.resumer.output_mut().set_handlers(stdout, stderr);
    }

    /// The recorded step frames of the current (or last) run.
    pub fn step_list(&self) -> &[StepFrame] {
        self.resumer.log().frames()
    }

    /// The console prefix visible at a recorded step: every line emitted
    /// before that frame ran. The terminal frame's past-the-end offset
    /// clamps to the full stream.
    pub fn output_at(&self, index: usize) -> Result<&[String], SessionError> {
        let frame = self
            .resumer
            .log()
            .get(index)
            .ok_or(SessionError::FrameOutOfRange {
                index,
                len: self.resumer.log().len(),
            })?;
        Ok(self.resumer.output().prefix(frame.log_offset))
    }

    pub fn result(&self) -> Option<&RunResult> {
        self.resumer.result()
    }

    pub fn take_result(&mut self) -> Option<RunResult> {
        self.resumer.take_result()
    }

    pub fn surface(&self) -> &Surface {
        self.resumer.surface()
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        self.resumer.surface_mut()
    }

    /// Report a pointer move; a following [`notify_click`](Self::notify_click)
    /// lands at this position.
    pub fn pointer_moved(&mut self, x: f64, y: f64) {
        self.resumer.surface_mut().set_pointer_pos(x, y);
    }

    /// Report a finished image load; schedules one repaint. When the host
    /// measured the image, the natural size is backfilled onto
    /// dimensionless shapes so guest size queries have an answer.
    pub fn image_loaded(&mut self, url: &str, natural_size: Option<(f64, f64)>, now: Instant) {
        self.resumer.surface_mut().image_loaded(url, natural_size, now);
    }

    /// Fire a due repaint against the host's painter, if one is armed.
    pub fn render(&mut self, painter: &mut dyn Painter, now: Instant) -> bool {
        self.resumer.surface_mut().render(painter, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::script::{Op, ScriptedVm};
    use super::history::PROGRAM_ENDED_LINE;

    fn finish(session: &mut Session<ScriptedVm>) {
        let now = Instant::now();
        for _ in 0..10_000 {
            if !session.is_running() {
                return;
            }
            session.pump(now);
        }
        panic!("run did not finish");
    }

    #[test]
    fn output_at_replays_console_prefixes() {
        let mut session = Session::new(ScriptedVm::new());
        session.run(
            vec![
                Op::Print { text: "one".to_string() },
                Op::Print { text: "two".to_string() },
            ],
            true,
            Some(1),
        );
        finish(&mut session);
        let frames = session.step_list();
        // Frame offsets name prefixes of the final stream.
        for (i, frame) in frames.iter().enumerate() {
            let visible = session.output_at(i).unwrap();
            assert_eq!(visible.len(), frame.log_offset.min(2));
        }
        // Terminal frame shows everything.
        let last = frames.len() - 1;
        assert_eq!(frames[last].line, PROGRAM_ENDED_LINE);
        assert_eq!(
            session.output_at(last).unwrap(),
            &["one".to_string(), "two".to_string()]
        );
    }

    #[test]
    fn output_at_rejects_out_of_range_indices() {
        let session: Session<ScriptedVm> = Session::new(ScriptedVm::new());
        let err = session.output_at(3).unwrap_err();
        assert!(matches!(
            err,
            SessionError::FrameOutOfRange { index: 3, len: 0 }
        ));
    }

    #[test]
    fn output_handlers_observe_lines_as_they_appear() {
        use std::sync::{Arc, Mutex};
        let seen = Arc::new(Mutex::new(Vec::new()));
        let out = Arc::clone(&seen);
        let err = Arc::clone(&seen);
        let mut session = Session::new(ScriptedVm::new());
        session.set_output_handlers(
            Box::new(move |line| out.lock().unwrap().push(line.to_string())),
            Box::new(move |line| err.lock().unwrap().push(format!("! {line}"))),
        );
        session.run(
            vec![
                Op::Print { text: "hi".to_string() },
                Op::Fault { message: "boom".to_string() },
            ],
            false,
            None,
        );
        finish(&mut session);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["hi".to_string(), "! Error on line 2: boom".to_string()]
        );
    }
}
