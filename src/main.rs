// restep: step-replay runner for scripted guest programs

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use restep::canvas::render::RecordingPainter;
use restep::exec::script::{Op, ScriptedVm};
use restep::session::history::PROGRAM_ENDED_LINE;
use restep::session::scheduler::Wait;
use restep::session::{Phase, Session};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Parse command-line arguments
    let args: Vec<String> = std::env::args().collect();
    let program: Vec<Op> = match args.get(1) {
        Some(path) => {
            if !Path::new(path).exists() {
                eprintln!("Error: File '{}' not found", path);
                eprintln!(
                    "Usage: {} [program.json]",
                    args.first().map(|s| s.as_str()).unwrap_or("restep")
                );
                std::process::exit(1);
            }
            let source = fs::read_to_string(path)?;
            serde_json::from_str(&source)?
        }
        None => {
            eprintln!("No program file given; running the built-in demo.");
            demo_program()
        }
    };

    let mut session = Session::new(ScriptedVm::new());
    session.set_output_handlers(
        Box::new(|line| println!("{line}")),
        Box::new(|line| eprintln!("{line}")),
    );
    // Any input prompt is answered with a fixed reply so the demo never
    // parks; embedders wire this to a real console instead.
    session.set_input_handler(Some(Box::new(|_prompt| "42".to_string())));

    session.run(program, true, Some(1));
    let mut painter = RecordingPainter::new();
    while session.is_running() {
        let now = Instant::now();
        session.pump(now);
        session.render(&mut painter, now);
        if let Phase::Suspended(Wait::Sleep { .. }) = session.phase() {
            thread::sleep(Duration::from_millis(5));
        }
    }
    // Flush the final coalesced repaint.
    thread::sleep(Duration::from_millis(20));
    session.render(&mut painter, Instant::now());

    // Dump the recorded step history.
    eprintln!();
    eprintln!("step history ({} frames):", session.step_list().len());
    for (index, frame) in session.step_list().iter().enumerate() {
        let shapes = frame.shapes.as_ref().map_or(0, |s| s.len());
        if frame.line == PROGRAM_ENDED_LINE {
            eprintln!("  [{index:3}] {}", frame.code_name);
        } else {
            eprintln!(
                "  [{index:3}] line {:3}  console {:4}  shapes {shapes}",
                frame.line, frame.log_offset
            );
        }
    }

    if let Some(result) = session.result() {
        eprintln!();
        eprintln!(
            "run finished: {} output lines, {} errors, {} shapes",
            result.output.len(),
            result.errors.len(),
            result.shapes.as_ref().map_or(0, |s| s.len())
        );
    }

    Ok(())
}

/// A small program touching every suspension except input parking: draws,
/// moves, sleeps, and reports an overlap count.
fn demo_program() -> Vec<Op> {
    vec![
        Op::Print { text: "drawing...".to_string() },
        Op::CreateCanvas { width: 400.0, height: 400.0 },
        Op::CreateRect {
            store: "box".to_string(),
            left_x: 10.0,
            top_y: 10.0,
            right_x: 60.0,
            bottom_y: 60.0,
            color: "red".to_string(),
            outline: "black".to_string(),
        },
        Op::CreateOval {
            store: "ball".to_string(),
            left_x: 100.0,
            top_y: 100.0,
            right_x: 140.0,
            bottom_y: 140.0,
            color: "blue".to_string(),
            outline: "TRANSPARENT".to_string(),
        },
        Op::Let { name: "i".to_string(), value: 5.0 },
        Op::MoveBy { target: "ball".to_string(), dx: -10.0, dy: -10.0 },
        Op::Sleep { seconds: 0.05 },
        Op::LoopDec { name: "i".to_string(), to: 5 },
        Op::CountOverlapping {
            store: "n".to_string(),
            left_x: 0.0,
            top_y: 0.0,
            right_x: 100.0,
            bottom_y: 100.0,
        },
        Op::Print { text: "overlapping the corner:".to_string() },
        Op::PrintLocal { name: "n".to_string() },
    ]
}
