// Integration tests for the session layer: sliced runs, suspension
// handling, and scrubbing the recorded step history.

use std::time::{Duration, Instant};

use restep::exec::script::{Op, ScriptedVm};
use restep::session::history::{PROGRAM_ENDED_LINE, PROGRAM_ENDED_MARKER};
use restep::session::{Phase, Session, Wait};

fn pump_until_done(session: &mut Session<ScriptedVm>, now: Instant) {
    for _ in 0..100_000 {
        if !session.is_running() {
            return;
        }
        session.pump(now);
    }
    panic!("run did not finish, phase {:?}", session.phase());
}

fn print_op(text: &str) -> Op {
    Op::Print {
        text: text.to_string(),
    }
}

#[test]
fn test_step_history_ends_with_the_terminal_frame() {
    let mut session = Session::new(ScriptedVm::new());
    session.run(
        vec![print_op("a"), print_op("b"), print_op("c")],
        true,
        Some(1),
    );
    pump_until_done(&mut session, Instant::now());

    let frames = session.step_list();
    assert!(!frames.is_empty());
    let last = frames.last().unwrap();
    assert_eq!(last.line, PROGRAM_ENDED_LINE);
    assert_eq!(last.code_name, PROGRAM_ENDED_MARKER);
    assert!(last.locals.is_empty());
}

#[test]
fn test_frame_offsets_never_decrease() {
    let mut session = Session::new(ScriptedVm::new());
    session.run(
        vec![
            Op::Let { name: "i".to_string(), value: 20.0 },
            print_op("tick"),
            Op::LoopDec { name: "i".to_string(), to: 1 },
        ],
        true,
        Some(3),
    );
    pump_until_done(&mut session, Instant::now());

    let offsets: Vec<usize> = session
        .step_list()
        .iter()
        .map(|frame| frame.log_offset)
        .collect();
    assert!(offsets.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn test_scrubbing_replays_console_prefixes() {
    let mut session = Session::new(ScriptedVm::new());
    session.run(
        vec![print_op("one"), print_op("two"), print_op("three")],
        true,
        Some(1),
    );
    pump_until_done(&mut session, Instant::now());

    let full = session.result().unwrap().output.clone();
    assert_eq!(full, vec!["one", "two", "three"]);

    for index in 0..session.step_list().len() {
        let frame_offset = session.step_list()[index].log_offset;
        let visible = session.output_at(index).expect("frame in range");
        // Each frame shows exactly the prefix written before it, clamped
        // for the terminal frame's past-the-end offset.
        assert_eq!(visible, &full[..frame_offset.min(full.len())]);
    }
}

#[test]
fn test_input_reply_is_echoed_onto_the_prompt_line() {
    let mut session = Session::new(ScriptedVm::new());
    let now = Instant::now();
    session.run(
        vec![
            Op::Input {
                prompt: "What is your guess? ".to_string(),
                store: "guess".to_string(),
            },
            Op::PrintLocal { name: "guess".to_string() },
        ],
        false,
        None,
    );
    session.pump(now);
    assert!(matches!(session.phase(), Phase::Suspended(Wait::Input { .. })));

    session.provide_input("5");
    pump_until_done(&mut session, now);

    assert_eq!(
        session.result().unwrap().output,
        vec!["What is your guess? 5".to_string(), "5".to_string()]
    );
}

#[test]
fn test_cancel_stops_a_tight_loop_with_bounded_history() {
    let mut session = Session::new(ScriptedVm::new());
    let now = Instant::now();
    session.run(
        vec![
            Op::Let { name: "i".to_string(), value: 1_000_000.0 },
            print_op("spin"),
            Op::LoopDec { name: "i".to_string(), to: 1 },
        ],
        true,
        Some(1),
    );
    for _ in 0..10 {
        session.pump(now);
    }
    session.cancel();
    session.pump(now);

    assert!(!session.is_running());
    let result = session.result().unwrap();
    assert_eq!(result.errors, vec!["KeyboardInterrupt".to_string()]);
    // Only the slices pumped before the cancel, plus the terminal frame.
    assert!(session.step_list().len() <= 11);
    assert!(session.step_list().last().unwrap().is_terminal());
}

#[test]
fn test_sleep_suspension_respects_wall_clock_passed_to_pump() {
    let mut session = Session::new(ScriptedVm::new());
    let t0 = Instant::now();
    session.run(
        vec![Op::Sleep { seconds: 1.0 }, print_op("awake")],
        false,
        None,
    );
    session.pump(t0);
    assert!(matches!(session.phase(), Phase::Suspended(Wait::Sleep { .. })));

    session.pump(t0 + Duration::from_millis(500));
    assert!(session.is_running());
    assert!(session.result().is_none());

    pump_until_done(&mut session, t0 + Duration::from_millis(1100));
    assert_eq!(session.result().unwrap().output, vec!["awake".to_string()]);
}

#[test]
fn test_guest_fault_appears_after_stdout_in_the_stream() {
    let mut session = Session::new(ScriptedVm::new());
    session.run(
        vec![
            print_op("working"),
            Op::Fault { message: "name 'x' is not defined".to_string() },
        ],
        true,
        Some(1),
    );
    pump_until_done(&mut session, Instant::now());

    let result = session.result().unwrap();
    assert_eq!(
        result.output,
        vec![
            "working".to_string(),
            "Error on line 2: name 'x' is not defined".to_string()
        ]
    );
    assert_eq!(result.errors.len(), 1);
    // The run still gets its terminal frame.
    assert!(session.step_list().last().unwrap().is_terminal());
}

#[test]
fn test_step_frames_capture_locals_and_shapes() {
    let mut session = Session::new(ScriptedVm::new());
    session.run(
        vec![
            Op::Let { name: "speed".to_string(), value: 4.0 },
            Op::CreateCanvas { width: 200.0, height: 200.0 },
            Op::CreateOval {
                store: "ball".to_string(),
                left_x: 0.0,
                top_y: 0.0,
                right_x: 20.0,
                bottom_y: 20.0,
                color: "blue".to_string(),
                outline: "TRANSPARENT".to_string(),
            },
            Op::MoveBy { target: "ball".to_string(), dx: 4.0, dy: 0.0 },
        ],
        true,
        Some(1),
    );
    pump_until_done(&mut session, Instant::now());

    let frames = session.step_list();
    // First frame: only the local exists, no canvas yet.
    assert_eq!(frames[0].locals.get("speed"), Some(&"4".to_string()));
    assert!(frames[0].shapes.is_none());
    // A later frame carries the canvas with the ball on it.
    let with_shapes = frames
        .iter()
        .find(|frame| frame.shapes.is_some())
        .expect("no frame captured the canvas");
    assert_eq!(with_shapes.shapes.as_ref().unwrap().width, 200.0);
    // The terminal frame sees the moved ball.
    let final_shapes = frames.last().unwrap().shapes.as_ref().unwrap();
    assert_eq!(final_shapes.len(), 1);
}

#[test]
fn test_run_result_shapes_come_from_the_observed_state() {
    let mut session = Session::new(ScriptedVm::new());
    session.run(
        vec![
            Op::CreateCanvas { width: 100.0, height: 100.0 },
            Op::CreateRect {
                store: "r".to_string(),
                left_x: 0.0,
                top_y: 0.0,
                right_x: 10.0,
                bottom_y: 10.0,
                color: "green".to_string(),
                outline: "black".to_string(),
            },
        ],
        false,
        None,
    );
    pump_until_done(&mut session, Instant::now());

    let shapes = session.result().unwrap().shapes.clone().unwrap();
    assert_eq!(shapes.len(), 1);
    assert_eq!(shapes.width, 100.0);
}

#[test]
fn test_click_wait_resumes_at_the_reported_pointer_position() {
    let mut session = Session::new(ScriptedVm::new());
    let now = Instant::now();
    session.run(
        vec![
            Op::AwaitClick,
            Op::ReadPointer {
                store_x: "x".to_string(),
                store_y: "y".to_string(),
            },
            Op::PrintLocal { name: "x".to_string() },
            Op::PrintLocal { name: "y".to_string() },
        ],
        false,
        None,
    );
    session.pump(now);
    assert!(matches!(session.phase(), Phase::Suspended(Wait::Click)));

    session.pointer_moved(120.0, 80.0);
    session.notify_click();
    pump_until_done(&mut session, now);

    assert_eq!(
        session.result().unwrap().output,
        vec!["120".to_string(), "80".to_string()]
    );
}

#[test]
fn test_count_overlapping_through_a_full_run() {
    let mut session = Session::new(ScriptedVm::new());
    session.run(
        vec![
            Op::CreateCanvas { width: 400.0, height: 400.0 },
            Op::CreateRect {
                store: "a".to_string(),
                left_x: 0.0,
                top_y: 0.0,
                right_x: 10.0,
                bottom_y: 10.0,
                color: "red".to_string(),
                outline: "TRANSPARENT".to_string(),
            },
            Op::CreateLine {
                store: "l".to_string(),
                x1: 0.0,
                y1: 0.0,
                x2: 10.0,
                y2: 10.0,
                color: "black".to_string(),
            },
            // Far away from both shapes.
            Op::CountOverlapping {
                store: "far".to_string(),
                left_x: 20.0,
                top_y: 20.0,
                right_x: 30.0,
                bottom_y: 30.0,
            },
            // Overlapping the rect's corner; the line crosses it too.
            Op::CountOverlapping {
                store: "near".to_string(),
                left_x: 5.0,
                top_y: 5.0,
                right_x: 15.0,
                bottom_y: 15.0,
            },
            Op::PrintLocal { name: "far".to_string() },
            Op::PrintLocal { name: "near".to_string() },
        ],
        false,
        None,
    );
    pump_until_done(&mut session, Instant::now());

    assert_eq!(
        session.result().unwrap().output,
        vec!["0".to_string(), "2".to_string()]
    );
}
