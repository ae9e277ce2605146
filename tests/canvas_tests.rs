// Integration tests for the drawing surface: shape store, overlap
// queries, and the coalesced renderer.

use std::time::{Duration, Instant};

use restep::canvas::render::{
    compose_alt_text, PaintOp, RecordingPainter, Renderer, REDRAW_INTERVAL,
};
use restep::canvas::Canvas;

#[test]
fn test_move_to_then_move_composes_for_images() {
    let mut canvas = Canvas::new(400.0, 400.0);
    let id = canvas.create_image_with_size(0.0, 0.0, 50.0, 30.0, "cat.png");

    canvas.move_to(id, 100.0, 200.0);
    canvas.move_by(id, -20.0, 10.0);

    assert_eq!(canvas.coords(id), Some((80.0, 210.0)));
    assert_eq!(canvas.shape_width(id), Some(50.0));
    assert_eq!(canvas.shape_height(id), Some(30.0));
}

#[test]
fn test_contained_rect_is_reported() {
    let mut canvas = Canvas::new(400.0, 400.0);
    let inner = canvas.create_rect(40.0, 40.0, 60.0, 60.0, "red", "TRANSPARENT");

    // Query box fully contains the rect.
    let found = canvas.find_overlapping(0.0, 0.0, 100.0, 100.0);
    assert_eq!(found, vec![inner]);
}

#[test]
fn test_rect_overlapping_query_corner_is_reported() {
    let mut canvas = Canvas::new(400.0, 400.0);
    let id = canvas.create_rect(0.0, 0.0, 10.0, 10.0, "red", "TRANSPARENT");

    let found = canvas.find_overlapping(5.0, 5.0, 15.0, 15.0);
    assert_eq!(found, vec![id]);
}

#[test]
fn test_far_away_line_is_not_reported() {
    let mut canvas = Canvas::new(400.0, 400.0);
    canvas.create_line(0.0, 0.0, 10.0, 10.0, "black");

    let found = canvas.find_overlapping(20.0, 20.0, 30.0, 30.0);
    assert!(found.is_empty());
}

#[test]
fn test_parallel_line_never_intersects_the_query_edges() {
    let mut canvas = Canvas::new(400.0, 400.0);
    // Collinear with the query's top edge and outside the shrunk box.
    canvas.create_line(-50.0, 10.0, -20.0, 10.0, "black");

    let found = canvas.find_overlapping(0.0, 10.0, 40.0, 40.0);
    assert!(found.is_empty());
}

#[test]
fn test_line_crossing_the_query_is_reported() {
    let mut canvas = Canvas::new(400.0, 400.0);
    let id = canvas.create_line(0.0, 0.0, 100.0, 100.0, "black");

    let found = canvas.find_overlapping(40.0, 20.0, 60.0, 80.0);
    assert_eq!(found, vec![id]);
}

#[test]
fn test_image_without_size_never_overlaps() {
    let mut canvas = Canvas::new(400.0, 400.0);
    canvas.create_image(10.0, 10.0, "cat.png");

    let found = canvas.find_overlapping(0.0, 0.0, 100.0, 100.0);
    assert!(found.is_empty());
}

#[test]
fn test_text_never_overlaps() {
    let mut canvas = Canvas::new(400.0, 400.0);
    canvas.create_text(50.0, 50.0, "hello", "Arial", "12px", "BLACK", "nw");

    let found = canvas.find_overlapping(0.0, 0.0, 100.0, 100.0);
    assert!(found.is_empty());
}

#[test]
fn test_redraw_requests_coalesce_into_one_repaint() {
    let mut canvas = Canvas::new(400.0, 400.0);
    let mut renderer = Renderer::new();
    let mut painter = RecordingPainter::new();
    let t0 = Instant::now();

    for i in 0..10 {
        canvas.create_rect(i as f64, 0.0, i as f64 + 5.0, 5.0, "red", "TRANSPARENT");
        renderer.request_redraw(&canvas, t0);
    }
    // Before the interval elapses nothing fires.
    assert!(!renderer.tick(&canvas, &mut painter, t0));

    let t1 = t0 + REDRAW_INTERVAL + Duration::from_millis(1);
    assert!(renderer.tick(&canvas, &mut painter, t1));
    // One clear, then one op per shape.
    assert!(matches!(painter.ops[0], PaintOp::Clear { .. }));
    assert_eq!(painter.current_frame().len(), 10);
    assert!(painter
        .current_frame()
        .iter()
        .all(|op| matches!(op, PaintOp::Rect { .. })));

    // Nothing further is armed.
    assert!(!renderer.tick(&canvas, &mut painter, t1 + REDRAW_INTERVAL));
}

#[test]
fn test_observed_state_is_fresh_even_while_coalescing() {
    let mut canvas = Canvas::new(400.0, 400.0);
    let mut renderer = Renderer::new();
    let t0 = Instant::now();

    canvas.create_rect(0.0, 0.0, 10.0, 10.0, "red", "TRANSPARENT");
    renderer.request_redraw(&canvas, t0);
    canvas.create_oval(20.0, 20.0, 40.0, 40.0, "blue", "TRANSPARENT");
    renderer.request_redraw(&canvas, t0);

    // No repaint has fired, but the observed copy is already current.
    let observed = renderer.observed_state().expect("no observed state");
    assert_eq!(observed.len(), 2);
}

#[test]
fn test_alt_text_describes_the_scene() {
    let mut canvas = Canvas::new(400.0, 400.0);
    assert_eq!(
        compose_alt_text(&canvas),
        "The canvas is currently blank."
    );

    canvas.create_rect(0.0, 0.0, 30.0, 20.0, "red", "TRANSPARENT");
    let one = compose_alt_text(&canvas);
    assert!(one.starts_with("There is 1 shape on the canvas."));
    assert!(one.contains("Red rectangle with TRANSPARENT outline"));

    canvas.create_line(0.0, 0.0, 10.0, 0.0, "black");
    let two = compose_alt_text(&canvas);
    assert!(two.starts_with("There are 2 shapes on the canvas."));
}
