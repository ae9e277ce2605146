//! # Introduction
//!
//! restep runs guest programs in bounded cooperative slices, recording a
//! step frame after each slice so a finished run can be scrubbed backward
//! and forward without re-executing guest code. Guest programs draw on a
//! shape canvas whose repaints are coalesced to a fixed frame rate.
//!
//! ## Execution pipeline
//!
//! ```text
//! Program → Interpreter slices → Resumer → StepLog → scrubbing
//!                 │                                     │
//!                 └── Canvas → Renderer → Painter ──────┘
//! ```
//!
//! 1. [`exec`] — the [`exec::Interpreter`] slice boundary, the
//!    [`exec::command::SuspendCommand`] vocabulary, and a deterministic
//!    scripted VM.
//! 2. [`session`] — the pump-driven [`session::scheduler::Resumer`]
//!    trampoline and the recorded [`session::history::StepLog`].
//! 3. [`canvas`] — the shape store, overlap queries, and the rate-limited
//!    renderer behind the [`canvas::render::Painter`] seam.
//! 4. [`output`] — the append-only console buffer whose line offsets make
//!    console replay a pure slice.
//! 5. [`worker`] — an optional worker-thread host speaking serde messages;
//!    not required for in-process embedding.
//!
//! ## Suspension protocol
//!
//! Guest code never blocks the host. A blocking primitive returns a
//! [`exec::command::SuspendCommand`] (`sleep`, `input`, `await_click`, or a
//! plain yield) and the trampoline parks until the host resolves it:
//! time passing, [`session::Session::provide_input`], or
//! [`session::Session::notify_click`].

pub mod canvas;
pub mod exec;
pub mod output;
pub mod session;
pub mod worker;
