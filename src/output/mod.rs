//! Console output buffer
//!
//! A line-oriented, append-only buffer with a monotonically increasing write
//! offset. A captured "offset at step N" always names a prefix of the final
//! buffer, which is what makes console replay during scrubbing a pure slice.
//!
//! Guest fault text is collected separately and merged into the main stream
//! at run end, so the scrub control replays stdout and the final error in
//! the order the learner saw them.
//!
//! Actual display is an external collaborator: every appended line is also
//! handed to the pluggable stdout/stderr handlers.

/// Handler invoked with each appended line.
pub type LineHandler = Box<dyn FnMut(&str) + Send>;

/// Append-only console buffer with addressable line offsets.
pub struct OutputBuffer {
    lines: Vec<String>,
    errors: Vec<String>,
    stdout_handler: Option<LineHandler>,
    stderr_handler: Option<LineHandler>,
}

impl std::fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("lines", &self.lines)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl OutputBuffer {
    pub fn new() -> Self {
        OutputBuffer {
            lines: Vec::new(),
            errors: Vec::new(),
            stdout_handler: None,
            stderr_handler: None,
        }
    }

    /// Install stdout/stderr line handlers. Defaults do nothing.
    pub fn set_handlers(&mut self, stdout: LineHandler, stderr: LineHandler) {
        self.stdout_handler = Some(stdout);
        self.stderr_handler = Some(stderr);
    }

    /// Append one line of guest output.
    pub fn append_line(&mut self, text: &str) {
        self.lines.push(text.to_string());
        if let Some(handler) = self.stdout_handler.as_mut() {
            handler(text);
        }
    }

    /// Append text to the last line, starting a new line if the buffer is
    /// empty. Used to echo an input reply onto its prompt line.
    pub fn append_to_last(&mut self, text: &str) {
        match self.lines.last_mut() {
            Some(last) => last.push_str(text),
            None => self.lines.push(text.to_string()),
        }
    }

    /// Record guest fault text. Routed to the stderr handler immediately and
    /// merged into the main stream by [`merge_errors`](Self::merge_errors).
    pub fn append_error(&mut self, text: &str) {
        self.errors.push(text.to_string());
        if let Some(handler) = self.stderr_handler.as_mut() {
            handler(text);
        }
    }

    /// Move collected error lines to the end of the main stream. Called once
    /// when a run finishes.
    pub fn merge_errors(&mut self) {
        self.lines.append(&mut self.errors);
    }

    /// Current write offset in lines. Only ever increases within a run.
    pub fn offset(&self) -> usize {
        self.lines.len()
    }

    /// The prefix of the buffer up to `offset` lines. Offsets past the end
    /// clamp to the full buffer.
    pub fn prefix(&self, offset: usize) -> &[String] {
        &self.lines[..offset.min(self.lines.len())]
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Drop the first `n` lines. Used when the step log is truncated to its
    /// retention window, so rebased frame offsets still index this buffer.
    pub fn drop_prefix(&mut self, n: usize) {
        self.lines.drain(..n.min(self.lines.len()));
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Reset for a new run. Handlers survive the reset.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.errors.clear();
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}
