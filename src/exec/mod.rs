//! Guest execution boundary
//!
//! The guest-language interpreter is a black box behind the [`Interpreter`]
//! trait: the scheduler only asks it to run one bounded slice at a time and
//! inspects the declared outcome. This module defines that boundary:
//! - [`command`]: the [`SuspendCommand`] vocabulary
//! - [`value`]: tagged guest values
//! - [`script`]: a deterministic scripted VM implementing the trait, used by
//!   the demo binary, the worker, and the tests
//!
//! A guest fault is not a host error: the scheduler catches it, copies the
//! text into the console stream, and treats the run as finished.

pub mod command;
pub mod script;
pub mod value;

use std::time::Instant;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::canvas::Surface;
use crate::output::OutputBuffer;
use command::SuspendCommand;

/// Name of the guest-visible global the scheduler writes an input reply
/// into before resuming an `input` suspension.
pub const ACTIVE_INPUT_GLOBAL: &str = "__active_input__";

/// Session state a slice may touch: the drawing surface and the console.
/// Passed in per slice; the interpreter holds no references between slices.
pub struct ExecContext<'a> {
    pub surface: &'a mut Surface,
    pub output: &'a mut OutputBuffer,
    pub now: Instant,
}

/// What a slice reports back to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum SliceOutcome {
    /// The operation budget ran out before the program finished.
    Running { line: i32 },
    /// Guest code requested a host-mediated wait.
    Suspended(SuspendCommand),
    /// The program completed.
    Finished,
}

/// An uncaught error raised by guest code.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Error on line {line}: {message}")]
pub struct GuestFault {
    pub message: String,
    pub line: i32,
}

/// The interpreter boundary.
///
/// `run_slice` executes up to `budget` guest operations (the whole program
/// if `None`) and returns the declared state. The scheduler serializes all
/// calls; implementations need no internal synchronization.
pub trait Interpreter {
    /// Interpreter-specific program representation.
    type Program;

    /// Load a program and rewind to its start.
    fn load(&mut self, program: Self::Program);

    /// Execute one bounded slice.
    fn run_slice(
        &mut self,
        ctx: &mut ExecContext<'_>,
        budget: Option<u32>,
    ) -> Result<SliceOutcome, GuestFault>;

    /// Current source line (1-based).
    fn line(&self) -> i32;

    /// Printable snapshot of local bindings, captured into step frames.
    fn locals(&self) -> FxHashMap<String, String>;

    fn read_global(&self, name: &str) -> Option<String>;

    fn write_global(&mut self, name: &str, value: &str);

    /// Clear transient guest-visible state after a run.
    fn reset(&mut self);
}
