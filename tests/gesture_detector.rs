mod support;

use support::{assert_bracketed, Harness, INCH_PX, SCREEN_HEIGHT, SCREEN_WIDTH};
use touch_explorer::{
    touch::stroke::polyline, AccessibilityEventType as A, ExplorerConfig, ExplorerMode, GestureId,
    GestureResult, Point, PointerPhase, RawPointerSample,
};

const VIRTUAL_DISPLAY: u32 = 5;
const SEGMENT_MS: u64 = 400;

#[derive(Clone, Copy)]
enum Leg {
    Up,
    Down,
    Left,
    Right,
}

impl Leg {
    fn step(self, from: Point) -> Point {
        match self {
            Leg::Up => from.offset(0.0, -INCH_PX),
            Leg::Down => from.offset(0.0, INCH_PX),
            Leg::Left => from.offset(-INCH_PX, 0.0),
            Leg::Right => from.offset(INCH_PX, 0.0),
        }
    }
}

fn legs(gesture: GestureId) -> &'static [Leg] {
    use Leg::{Down, Left, Right, Up};
    match gesture {
        GestureId::SwipeUp => &[Up],
        GestureId::SwipeDown => &[Down],
        GestureId::SwipeLeft => &[Left],
        GestureId::SwipeRight => &[Right],
        GestureId::SwipeLeftAndRight => &[Left, Right],
        GestureId::SwipeRightAndLeft => &[Right, Left],
        GestureId::SwipeUpAndDown => &[Up, Down],
        GestureId::SwipeDownAndUp => &[Down, Up],
        GestureId::SwipeLeftAndUp => &[Left, Up],
        GestureId::SwipeLeftAndDown => &[Left, Down],
        GestureId::SwipeRightAndUp => &[Right, Up],
        GestureId::SwipeRightAndDown => &[Right, Down],
        GestureId::SwipeUpAndLeft => &[Up, Left],
        GestureId::SwipeUpAndRight => &[Up, Right],
        GestureId::SwipeDownAndLeft => &[Down, Left],
        GestureId::SwipeDownAndRight => &[Down, Right],
    }
}

fn center() -> Point {
    Point::new(SCREEN_WIDTH / 2.0, SCREEN_HEIGHT / 2.0)
}

fn vertices(gesture: GestureId) -> Vec<Point> {
    let mut points = vec![center()];
    for leg in legs(gesture) {
        let last = *points.last().expect("path has a start");
        points.push(leg.step(last));
    }
    points
}

fn perform(harness: &mut Harness, vertices: &[Point]) -> Vec<GestureResult> {
    harness.clear();
    let display_id = harness.explorer.display_id();
    let gesture = polyline(display_id, vertices, SEGMENT_MS).expect("valid polyline");
    harness.play(&gesture);
    harness.session_results()
}

#[test]
fn recognizes_every_path_gesture_on_virtual_display() {
    let mut harness = Harness::on_display(VIRTUAL_DISPLAY, ExplorerConfig::default());

    for gesture in GestureId::ALL {
        let results = perform(&mut harness, &vertices(gesture));
        match results.as_slice() {
            [GestureResult::Discrete(event)] => {
                assert_eq!(event.gesture, gesture);
                assert_eq!(event.display_id, VIRTUAL_DISPLAY);
            }
            other => panic!("{gesture:?}: unexpected results {other:?}"),
        }

        let types = harness.accessibility_types();
        assert_eq!(
            types,
            vec![
                A::TouchInteractionStart,
                A::GestureDetectionStart,
                A::GestureDetectionEnd,
                A::TouchInteractionEnd,
            ],
            "{gesture:?}"
        );
        assert_bracketed(&types);
        assert_eq!(harness.hover_count(), 0, "{gesture:?}");
        assert!(harness.touch_events().is_empty(), "{gesture:?}");
        assert_eq!(harness.explorer.mode(), ExplorerMode::Idle);
    }
}

#[test]
fn gesture_ids_follow_platform_numbering() {
    let ids: Vec<u32> = GestureId::ALL.iter().map(|gesture| gesture.id()).collect();
    assert_eq!(ids, (1..=16).collect::<Vec<_>>());
}

#[test]
fn diagonal_path_is_unrecognized() {
    let mut harness = Harness::new();
    let start = center();
    let results = perform(&mut harness, &[start, start.offset(300.0, 300.0)]);

    assert_eq!(results, vec![GestureResult::PathUnrecognized]);
    assert_eq!(
        harness.accessibility_types(),
        vec![
            A::TouchInteractionStart,
            A::GestureDetectionStart,
            A::GestureDetectionEnd,
            A::TouchInteractionEnd,
        ]
    );
}

#[test]
fn three_legged_path_is_unrecognized() {
    let mut harness = Harness::new();
    let start = center();
    let corner = Leg::Right.step(start);
    let second = Leg::Down.step(corner);
    let results = perform(&mut harness, &[start, corner, second, Leg::Left.step(second)]);

    assert_eq!(results, vec![GestureResult::PathUnrecognized]);
}

#[test]
fn held_gesture_times_out_into_exploration() {
    let config = ExplorerConfig::default();
    let mut harness = Harness::new();
    let start = center();
    let sample = |phase, x: f32, t_ms| RawPointerSample::new(0, 0, phase, Point::new(x, start.y), t_ms);

    harness.send(1_000, &[sample(PointerPhase::Down, start.x, 1_000)]);
    harness.send(1_010, &[sample(PointerPhase::Move, start.x + 30.0, 1_010)]);
    assert_eq!(harness.explorer.mode(), ExplorerMode::GestureDetecting);

    harness.advance_to(1_000 + config.max_gesture_duration_ms);
    assert_eq!(harness.explorer.mode(), ExplorerMode::Exploring);
    assert_eq!(
        harness.accessibility_types(),
        vec![
            A::TouchInteractionStart,
            A::GestureDetectionStart,
            A::GestureDetectionEnd,
            A::TouchExplorationGestureStart,
            A::ViewHoverEnter,
        ]
    );

    harness.send(3_100, &[sample(PointerPhase::Up, start.x + 30.0, 3_100)]);
    let types = harness.accessibility_types();
    assert_bracketed(&types);
    assert_eq!(harness.session_results(), vec![GestureResult::Completed]);
}

#[test]
fn slower_than_threshold_never_detects() {
    let config = ExplorerConfig {
        min_gesture_velocity_px_per_ms: 2.0,
        ..ExplorerConfig::default()
    };
    let mut harness = Harness::with_config(config);
    let results = perform(&mut harness, &vertices(GestureId::SwipeRight));

    assert_eq!(results, vec![GestureResult::Completed]);
    assert!(!harness
        .accessibility_types()
        .contains(&A::GestureDetectionStart));
}
