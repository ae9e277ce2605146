//! Step history
//!
//! Every recorded step frame pins the guest's state at one executed line:
//! the line number, how many console lines existed before it ran, the name
//! of the enclosing code object, the printable locals, and optionally a
//! canvas snapshot. Scrubbing replays the log instead of re-running guest
//! code, so playback of a recorded run never re-executes side effects.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::canvas::CanvasSnapshot;

/// Line number of the synthetic terminal frame appended after every run.
pub const PROGRAM_ENDED_LINE: i32 = -1;

/// Code-object name carried by the terminal frame.
pub const PROGRAM_ENDED_MARKER: &str = "Program Ended";

/// Cap on retained console lines. Chattier runs keep only the most recent
/// window, with every frame offset rebased to the truncated console.
pub const MAX_REPLAY_LINES: usize = 1000;

/// One recorded step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFrame {
    /// 1-based guest source line, or [`PROGRAM_ENDED_LINE`].
    pub line: i32,
    /// Console lines emitted before this step ran. Monotonic across the log.
    pub log_offset: usize,
    /// Name of the executing code object ("<module>", a function name, or
    /// [`PROGRAM_ENDED_MARKER`]).
    pub code_name: String,
    /// Printable local bindings at this step.
    pub locals: FxHashMap<String, String>,
    /// Canvas state at this step; absent when no canvas exists yet.
    pub shapes: Option<CanvasSnapshot>,
}

impl StepFrame {
    pub fn is_terminal(&self) -> bool {
        self.line == PROGRAM_ENDED_LINE
    }
}

/// Append-only frame log for one run.
#[derive(Debug, Default)]
pub struct StepLog {
    frames: Vec<StepFrame>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: StepFrame) {
        self.frames.push(frame);
    }

    pub fn frames(&self) -> &[StepFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StepFrame> {
        self.frames.get(index)
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Shift every offset down by `dropped` console lines, saturating at
    /// zero. Called after the console buffer's front is truncated so frame
    /// offsets keep indexing the retained suffix. Frames older than the
    /// window all collapse to offset zero, which replays as "no console yet"
    /// rather than indexing out of range.
    pub fn rebase(&mut self, dropped: usize) {
        for frame in &mut self.frames {
            frame.log_offset = frame.log_offset.saturating_sub(dropped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(line: i32, log_offset: usize) -> StepFrame {
        StepFrame {
            line,
            log_offset,
            code_name: "<module>".to_string(),
            locals: FxHashMap::default(),
            shapes: None,
        }
    }

    #[test]
    fn rebase_shifts_offsets_and_saturates() {
        let mut log = StepLog::new();
        log.push(frame(1, 100));
        log.push(frame(2, 250));
        log.push(frame(3, 1250));
        log.rebase(250);
        let offsets: Vec<usize> = log.frames().iter().map(|f| f.log_offset).collect();
        assert_eq!(offsets, vec![0, 0, 1000]);
    }

    #[test]
    fn offsets_never_decrease_across_the_log() {
        let mut log = StepLog::new();
        log.push(frame(1, 0));
        log.push(frame(2, 0));
        log.push(frame(3, 2));
        let offsets: Vec<usize> = log.frames().iter().map(|f| f.log_offset).collect();
        assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn terminal_frame_is_recognized() {
        let mut f = frame(PROGRAM_ENDED_LINE, 5);
        f.code_name = PROGRAM_ENDED_MARKER.to_string();
        assert!(f.is_terminal());
        assert!(!frame(3, 5).is_terminal());
    }
}
