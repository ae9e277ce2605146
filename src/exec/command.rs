//! Suspension command vocabulary
//!
//! When guest code calls a blocking primitive it does not halt; the slice
//! returns control to the scheduler carrying one of these commands plus the
//! context needed to resume. Commands are transient — they are never stored
//! in the step history.

use serde::{Deserialize, Serialize};

/// What a slice asks of the host instead of finishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum SuspendCommand {
    /// Not a real wait: yield to the host loop and schedule another slice
    /// immediately. Keeps a long-running guest from starving the host.
    Continue,
    /// Re-invoke after a real-time delay; nothing is delivered back.
    Sleep { seconds: f64 },
    /// Ask the host for a line of input; the reply is echoed onto the
    /// prompt line and delivered into guest-visible state before resuming.
    Input { prompt: String },
    /// Park until exactly one pointer-down is observed on the surface.
    AwaitClick,
}
