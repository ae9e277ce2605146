//! Worker wire messages
//!
//! The host and the worker thread exchange tagged serde messages. The shapes
//! mirror a web-worker postMessage protocol: every run request carries an id
//! and its completion event echoes the id back, while console and canvas
//! traffic flows as untagged-by-id events.

use serde::{Deserialize, Serialize};

use crate::canvas::CanvasSnapshot;
use crate::exec::script::Op;
use crate::session::RunResult;

/// Host-to-worker request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostRequest {
    /// Start (or queue) a program.
    Run {
        id: u64,
        program: Vec<Op>,
        step_mode: bool,
        operation_budget: Option<u32>,
    },
    /// Cancel the active run at the next slice boundary.
    Cancel,
    /// Resolve an input suspension.
    ProvideInput { reply: String },
    /// Resolve a click suspension.
    NotifyClick,
    /// Update the pointer position the guest reads.
    PointerMoved { x: f64, y: f64 },
    /// An image the renderer asked for finished loading, with the
    /// dimensions the host measured. Answers [`WorkerEvent::ImageNeeded`];
    /// the size is backfilled onto dimensionless shapes so guest size
    /// queries resolve.
    ImageLoaded { url: String, width: f64, height: f64 },
    /// Stop the worker loop.
    Shutdown,
}

/// Worker-to-host event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// One guest stdout line, forwarded as it appears.
    Output { line: String },
    /// One guest error line, forwarded as it appears.
    ErrorOutput { line: String },
    /// The renderer repainted; the observed canvas state.
    CanvasUpdate { snapshot: CanvasSnapshot },
    /// The renderer needs an image it has not seen loaded. The host loads
    /// and measures it, then replies with [`HostRequest::ImageLoaded`].
    ImageNeeded { url: String },
    /// A run finalized. `result` is the end-of-run summary.
    RunDone { id: u64, result: RunResult },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_round_trip_through_json() {
        let req = HostRequest::Run {
            id: 3,
            program: vec![Op::Print {
                text: "hi".to_string(),
            }],
            step_mode: true,
            operation_budget: Some(1),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"kind\":\"run\""));
        let back: HostRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn events_carry_their_tag() {
        let event = WorkerEvent::ImageNeeded {
            url: "cat.png".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"image_needed\""));
    }
}
