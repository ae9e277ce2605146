//! Scripted guest VM
//!
//! A small deterministic interpreter over an explicit op list, implementing
//! the [`Interpreter`] boundary. One op is one guest operation for budget
//! purposes, and one op is one "source line" (line numbers are 1-based op
//! indices), which makes step-history assertions exact.
//!
//! This is the guest the demo binary and the test suite run. It covers the
//! student-visible surface: printing, locals, canvas calls, loops, the three
//! blocking primitives, and an explicit fault.

use serde::{Deserialize, Serialize};

use super::command::SuspendCommand;
use super::value::GuestValue;
use super::{ExecContext, GuestFault, Interpreter, SliceOutcome, ACTIVE_INPUT_GLOBAL};
use rustc_hash::FxHashMap;

/// One guest operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Print a literal line.
    Print { text: String },
    /// Print the printable form of a local.
    PrintLocal { name: String },
    /// Bind a numeric local.
    Let { name: String, value: f64 },
    /// Add to a numeric local; no-op if absent or non-numeric.
    Add { name: String, delta: f64 },
    CreateCanvas { width: f64, height: f64 },
    CreateRect {
        store: String,
        left_x: f64,
        top_y: f64,
        right_x: f64,
        bottom_y: f64,
        color: String,
        outline: String,
    },
    CreateOval {
        store: String,
        left_x: f64,
        top_y: f64,
        right_x: f64,
        bottom_y: f64,
        color: String,
        outline: String,
    },
    CreateLine {
        store: String,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        color: String,
    },
    CreateText { store: String, x: f64, y: f64, text: String },
    CreateImage { store: String, x: f64, y: f64, url: String },
    MoveBy { target: String, dx: f64, dy: f64 },
    MoveTo { target: String, x: f64, y: f64 },
    SetHidden { target: String, hidden: bool },
    SetColor { target: String, color: String },
    SetOutline { target: String, color: String },
    DeleteShape { target: String },
    /// Store the number of visible shapes overlapping the query box.
    CountOverlapping {
        store: String,
        left_x: f64,
        top_y: f64,
        right_x: f64,
        bottom_y: f64,
    },
    /// Blocking: real-time delay.
    Sleep { seconds: f64 },
    /// Blocking: prompt the host for a line, bind the reply to `store`.
    Input { prompt: String, store: String },
    /// Blocking: wait for one pointer-down on the surface.
    AwaitClick,
    /// Bind the last reported pointer position, (-1, -1) before any.
    ReadPointer { store_x: String, store_y: String },
    /// Bind a shape's width and height; -1 while an image's natural size
    /// has not been reported yet.
    ImageSize {
        target: String,
        store_width: String,
        store_height: String,
    },
    /// Yield to the host loop without waiting on anything.
    Yield,
    Jump { to: usize },
    /// Decrement a numeric local; jump to `to` while it stays positive.
    LoopDec { name: String, to: usize },
    /// Raise an uncaught guest error.
    Fault { message: String },
    End,
}

enum Step {
    Next,
    Jumped,
    Suspend(SuspendCommand),
    Finished,
}

/// The scripted VM. All state is rewound by [`Interpreter::reset`].
#[derive(Debug, Default)]
pub struct ScriptedVm {
    program: Vec<Op>,
    pc: usize,
    locals: FxHashMap<String, GuestValue>,
    globals: FxHashMap<String, String>,
    pending_input_store: Option<String>,
    finished: bool,
}

impl ScriptedVm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(program: Vec<Op>) -> Self {
        let mut vm = Self::new();
        vm.load(program);
        vm
    }

    fn shape_target(&self, name: &str) -> Option<crate::canvas::shape::ShapeId> {
        self.locals.get(name).and_then(GuestValue::as_shape)
    }

    fn exec_op(&mut self, op: &Op, ctx: &mut ExecContext<'_>) -> Result<Step, GuestFault> {
        let now = ctx.now;
        match op {
            Op::Print { text } => {
                ctx.output.append_line(text);
            }
            Op::PrintLocal { name } => {
                let printable = self
                    .locals
                    .get(name)
                    .map(|v| v.to_string())
                    .ok_or_else(|| GuestFault {
                        message: format!("name '{}' is not defined", name),
                        line: self.line(),
                    })?;
                ctx.output.append_line(&printable);
            }
            Op::Let { name, value } => {
                self.locals.insert(name.clone(), GuestValue::Num(*value));
            }
            Op::Add { name, delta } => {
                if let Some(GuestValue::Num(n)) = self.locals.get_mut(name) {
                    *n += delta;
                }
            }
            Op::CreateCanvas { width, height } => {
                ctx.surface.create_canvas(*width, *height, now);
            }
            Op::CreateRect {
                store,
                left_x,
                top_y,
                right_x,
                bottom_y,
                color,
                outline,
            } => {
                let id = ctx.surface.mutate(now, |c| {
                    c.create_rect(*left_x, *top_y, *right_x, *bottom_y, color, outline)
                });
                if let Some(id) = id {
                    self.locals.insert(store.clone(), GuestValue::Shape(id));
                }
            }
            Op::CreateOval {
                store,
                left_x,
                top_y,
                right_x,
                bottom_y,
                color,
                outline,
            } => {
                let id = ctx.surface.mutate(now, |c| {
                    c.create_oval(*left_x, *top_y, *right_x, *bottom_y, color, outline)
                });
                if let Some(id) = id {
                    self.locals.insert(store.clone(), GuestValue::Shape(id));
                }
            }
            Op::CreateLine {
                store,
                x1,
                y1,
                x2,
                y2,
                color,
            } => {
                let id = ctx
                    .surface
                    .mutate(now, |c| c.create_line(*x1, *y1, *x2, *y2, color));
                if let Some(id) = id {
                    self.locals.insert(store.clone(), GuestValue::Shape(id));
                }
            }
            Op::CreateText { store, x, y, text } => {
                let id = ctx.surface.mutate(now, |c| {
                    c.create_text(*x, *y, text, "Arial", "12px", "BLACK", "nw")
                });
                if let Some(id) = id {
                    self.locals.insert(store.clone(), GuestValue::Shape(id));
                }
            }
            Op::CreateImage { store, x, y, url } => {
                let id = ctx.surface.mutate(now, |c| c.create_image(*x, *y, url));
                if let Some(id) = id {
                    self.locals.insert(store.clone(), GuestValue::Shape(id));
                }
            }
            Op::MoveBy { target, dx, dy } => {
                if let Some(id) = self.shape_target(target) {
                    ctx.surface.mutate(now, |c| c.move_by(id, *dx, *dy));
                }
            }
            Op::MoveTo { target, x, y } => {
                if let Some(id) = self.shape_target(target) {
                    ctx.surface.mutate(now, |c| c.move_to(id, *x, *y));
                }
            }
            Op::SetHidden { target, hidden } => {
                if let Some(id) = self.shape_target(target) {
                    ctx.surface.mutate(now, |c| c.set_hidden(id, *hidden));
                }
            }
            Op::SetColor { target, color } => {
                if let Some(id) = self.shape_target(target) {
                    ctx.surface.mutate(now, |c| c.set_fill_color(id, color));
                }
            }
            Op::SetOutline { target, color } => {
                if let Some(id) = self.shape_target(target) {
                    ctx.surface.mutate(now, |c| c.set_outline_color(id, color));
                }
            }
            Op::DeleteShape { target } => {
                if let Some(id) = self.shape_target(target) {
                    ctx.surface.mutate(now, |c| c.delete(id));
                }
            }
            Op::CountOverlapping {
                store,
                left_x,
                top_y,
                right_x,
                bottom_y,
            } => {
                let count = ctx
                    .surface
                    .query(|c| c.find_overlapping(*left_x, *top_y, *right_x, *bottom_y).len())
                    .unwrap_or(0);
                self.locals
                    .insert(store.clone(), GuestValue::Num(count as f64));
            }
            Op::Sleep { seconds } => {
                return Ok(Step::Suspend(SuspendCommand::Sleep { seconds: *seconds }));
            }
            Op::Input { prompt, store } => {
                self.pending_input_store = Some(store.clone());
                return Ok(Step::Suspend(SuspendCommand::Input {
                    prompt: prompt.clone(),
                }));
            }
            Op::AwaitClick => {
                return Ok(Step::Suspend(SuspendCommand::AwaitClick));
            }
            Op::ImageSize {
                target,
                store_width,
                store_height,
            } => {
                if let Some(id) = self.shape_target(target) {
                    let size = ctx
                        .surface
                        .query(|c| (c.shape_width(id), c.shape_height(id)));
                    if let Some((width, height)) = size {
                        self.locals.insert(
                            store_width.clone(),
                            GuestValue::Num(width.unwrap_or(-1.0)),
                        );
                        self.locals.insert(
                            store_height.clone(),
                            GuestValue::Num(height.unwrap_or(-1.0)),
                        );
                    }
                }
            }
            Op::ReadPointer { store_x, store_y } => {
                let (x, y) = ctx.surface.pointer_pos();
                self.locals.insert(store_x.clone(), GuestValue::Num(x));
                self.locals.insert(store_y.clone(), GuestValue::Num(y));
            }
            Op::Yield => {
                return Ok(Step::Suspend(SuspendCommand::Continue));
            }
            Op::Jump { to } => {
                self.pc = *to;
                return Ok(Step::Jumped);
            }
            Op::LoopDec { name, to } => {
                if let Some(GuestValue::Num(n)) = self.locals.get_mut(name) {
                    *n -= 1.0;
                    if *n > 0.0 {
                        self.pc = *to;
                        return Ok(Step::Jumped);
                    }
                }
            }
            Op::Fault { message } => {
                return Err(GuestFault {
                    message: message.clone(),
                    line: self.line(),
                });
            }
            Op::End => {
                return Ok(Step::Finished);
            }
        }
        Ok(Step::Next)
    }
}

impl Interpreter for ScriptedVm {
    type Program = Vec<Op>;

    fn load(&mut self, program: Self::Program) {
        self.program = program;
        self.reset();
    }

    fn run_slice(
        &mut self,
        ctx: &mut ExecContext<'_>,
        budget: Option<u32>,
    ) -> Result<SliceOutcome, GuestFault> {
        // Deliver a pending input reply before executing anything.
        if let Some(store) = self.pending_input_store.take() {
            let value = self.globals.remove(ACTIVE_INPUT_GLOBAL).unwrap_or_default();
            self.locals.insert(store, GuestValue::Str(value));
        }

        let mut executed: u32 = 0;
        loop {
            if self.finished || self.pc >= self.program.len() {
                self.finished = true;
                return Ok(SliceOutcome::Finished);
            }
            if let Some(limit) = budget {
                if executed >= limit.max(1) {
                    return Ok(SliceOutcome::Running { line: self.line() });
                }
            }
            let op = self.program[self.pc].clone();
            executed += 1;
            match self.exec_op(&op, ctx)? {
                Step::Next => self.pc += 1,
                Step::Jumped => {}
                Step::Suspend(cmd) => {
                    // Resume past the blocking op.
                    self.pc += 1;
                    return Ok(SliceOutcome::Suspended(cmd));
                }
                Step::Finished => {
                    self.finished = true;
                    return Ok(SliceOutcome::Finished);
                }
            }
        }
    }

    fn line(&self) -> i32 {
        (self.pc + 1) as i32
    }

    fn locals(&self) -> FxHashMap<String, String> {
        self.locals
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect()
    }

    fn read_global(&self, name: &str) -> Option<String> {
        self.globals.get(name).cloned()
    }

    fn write_global(&mut self, name: &str, value: &str) {
        self.globals.insert(name.to_string(), value.to_string());
    }

    fn reset(&mut self) {
        self.pc = 0;
        self.locals.clear();
        self.globals.clear();
        self.pending_input_store = None;
        self.finished = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Surface;
    use crate::output::OutputBuffer;
    use std::time::Instant;

    fn ctx_parts() -> (Surface, OutputBuffer) {
        (Surface::new(), OutputBuffer::new())
    }

    fn slice(
        vm: &mut ScriptedVm,
        surface: &mut Surface,
        output: &mut OutputBuffer,
        budget: Option<u32>,
    ) -> Result<SliceOutcome, GuestFault> {
        let mut ctx = ExecContext {
            surface,
            output,
            now: Instant::now(),
        };
        vm.run_slice(&mut ctx, budget)
    }

    #[test]
    fn runs_whole_program_without_budget() {
        let (mut surface, mut output) = ctx_parts();
        let mut vm = ScriptedVm::with_program(vec![
            Op::Print { text: "a".to_string() },
            Op::Print { text: "b".to_string() },
        ]);
        let outcome = slice(&mut vm, &mut surface, &mut output, None).unwrap();
        assert_eq!(outcome, SliceOutcome::Finished);
        assert_eq!(output.lines(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn budget_interrupts_with_current_line() {
        let (mut surface, mut output) = ctx_parts();
        let mut vm = ScriptedVm::with_program(vec![
            Op::Print { text: "a".to_string() },
            Op::Print { text: "b".to_string() },
            Op::Print { text: "c".to_string() },
        ]);
        let outcome = slice(&mut vm, &mut surface, &mut output, Some(2)).unwrap();
        assert_eq!(outcome, SliceOutcome::Running { line: 3 });
        let outcome = slice(&mut vm, &mut surface, &mut output, Some(2)).unwrap();
        assert_eq!(outcome, SliceOutcome::Finished);
    }

    #[test]
    fn loop_dec_jumps_while_positive() {
        let (mut surface, mut output) = ctx_parts();
        let mut vm = ScriptedVm::with_program(vec![
            Op::Let { name: "i".to_string(), value: 3.0 },
            Op::Print { text: "tick".to_string() },
            Op::LoopDec { name: "i".to_string(), to: 1 },
        ]);
        let outcome = slice(&mut vm, &mut surface, &mut output, None).unwrap();
        assert_eq!(outcome, SliceOutcome::Finished);
        assert_eq!(output.offset(), 3);
    }

    #[test]
    fn input_suspends_then_binds_delivered_global() {
        let (mut surface, mut output) = ctx_parts();
        let mut vm = ScriptedVm::with_program(vec![
            Op::Input {
                prompt: "guess? ".to_string(),
                store: "answer".to_string(),
            },
            Op::PrintLocal { name: "answer".to_string() },
        ]);
        let outcome = slice(&mut vm, &mut surface, &mut output, None).unwrap();
        assert_eq!(
            outcome,
            SliceOutcome::Suspended(SuspendCommand::Input {
                prompt: "guess? ".to_string()
            })
        );
        vm.write_global(ACTIVE_INPUT_GLOBAL, "5");
        let outcome = slice(&mut vm, &mut surface, &mut output, None).unwrap();
        assert_eq!(outcome, SliceOutcome::Finished);
        assert_eq!(output.lines(), &["5".to_string()]);
    }

    #[test]
    fn canvas_ops_bind_shape_handles() {
        let (mut surface, mut output) = ctx_parts();
        let mut vm = ScriptedVm::with_program(vec![
            Op::CreateCanvas { width: 100.0, height: 100.0 },
            Op::CreateRect {
                store: "r".to_string(),
                left_x: 0.0,
                top_y: 0.0,
                right_x: 10.0,
                bottom_y: 10.0,
                color: "red".to_string(),
                outline: "TRANSPARENT".to_string(),
            },
            Op::MoveBy { target: "r".to_string(), dx: 5.0, dy: 5.0 },
            Op::CountOverlapping {
                store: "n".to_string(),
                left_x: 0.0,
                top_y: 0.0,
                right_x: 100.0,
                bottom_y: 100.0,
            },
            Op::PrintLocal { name: "n".to_string() },
        ]);
        let outcome = slice(&mut vm, &mut surface, &mut output, None).unwrap();
        assert_eq!(outcome, SliceOutcome::Finished);
        assert_eq!(output.lines(), &["1".to_string()]);
        let canvas = surface.canvas().unwrap();
        assert_eq!(canvas.shape_count(), 1);
        let id = canvas.shapes().keys().next().copied().unwrap();
        assert_eq!(canvas.coords(id), Some((5.0, 5.0)));
    }

    #[test]
    fn fault_carries_the_faulting_line() {
        let (mut surface, mut output) = ctx_parts();
        let mut vm = ScriptedVm::with_program(vec![
            Op::Print { text: "before".to_string() },
            Op::Fault { message: "division by zero".to_string() },
        ]);
        let err = slice(&mut vm, &mut surface, &mut output, None).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.to_string(), "Error on line 2: division by zero");
    }

    #[test]
    fn undefined_local_is_a_guest_fault() {
        let (mut surface, mut output) = ctx_parts();
        let mut vm = ScriptedVm::with_program(vec![Op::PrintLocal {
            name: "ghost".to_string(),
        }]);
        let err = slice(&mut vm, &mut surface, &mut output, None).unwrap_err();
        assert!(err.message.contains("ghost"));
    }
}
