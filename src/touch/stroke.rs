use std::collections::BTreeSet;

use super::{
    config::ExplorerConfig,
    error::GestureBuildError,
    types::{DisplayId, Point, PointerId, PointerPhase, RawPointerSample, MAX_POINTERS},
};

pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 10;
pub const CLICK_DURATION_MS: u64 = 100;
const DOUBLE_TAP_GAP_MS: u64 = 20;
const MULTI_TAP_DURATION_MS: u64 = 60;
const MULTI_TAP_GAP_MS: u64 = 40;

/// One finger's path, traversed at constant speed over `duration_ms`.
#[derive(Clone, Debug, PartialEq)]
pub struct StrokeDescription {
    path: Vec<Point>,
    start_ms: u64,
    duration_ms: u64,
}

impl StrokeDescription {
    pub fn new(path: Vec<Point>, start_ms: u64, duration_ms: u64) -> Result<Self, GestureBuildError> {
        if path.is_empty() {
            return Err(GestureBuildError::EmptyPath);
        }
        if duration_ms == 0 {
            return Err(GestureBuildError::ZeroDuration);
        }
        Ok(Self {
            path,
            start_ms,
            duration_ms,
        })
    }

    pub fn point(at: Point, start_ms: u64, duration_ms: u64) -> Result<Self, GestureBuildError> {
        Self::new(vec![at], start_ms, duration_ms)
    }

    pub fn line(from: Point, to: Point, start_ms: u64, duration_ms: u64) -> Result<Self, GestureBuildError> {
        Self::new(vec![from, to], start_ms, duration_ms)
    }

    pub fn path(&self) -> &[Point] {
        &self.path
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.duration_ms
    }

    /// Position `offset_ms` into the stroke, by arc length.
    pub fn position_at(&self, offset_ms: u64) -> Point {
        let first = self.path[0];
        let fraction = (offset_ms.min(self.duration_ms) as f32) / self.duration_ms as f32;
        let total: f32 = self.path.windows(2).map(|w| w[0].distance_to(w[1])).sum();
        if total <= f32::EPSILON {
            return first;
        }

        let mut remaining = total * fraction;
        for pair in self.path.windows(2) {
            let length = pair[0].distance_to(pair[1]);
            if remaining <= length {
                return if length <= f32::EPSILON {
                    pair[1]
                } else {
                    pair[0].lerp(pair[1], remaining / length)
                };
            }
            remaining -= length;
        }
        self.path[self.path.len() - 1]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GestureFrame {
    pub offset_ms: u64,
    pub samples: Vec<RawPointerSample>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GestureDescription {
    display_id: DisplayId,
    strokes: Vec<StrokeDescription>,
}

impl GestureDescription {
    pub fn new(display_id: DisplayId, strokes: Vec<StrokeDescription>) -> Result<Self, GestureBuildError> {
        if strokes.is_empty() {
            return Err(GestureBuildError::NoStrokes);
        }
        if strokes.len() > MAX_POINTERS {
            return Err(GestureBuildError::TooManyStrokes(MAX_POINTERS));
        }
        Ok(Self { display_id, strokes })
    }

    pub fn display_id(&self) -> DisplayId {
        self.display_id
    }

    pub fn strokes(&self) -> &[StrokeDescription] {
        &self.strokes
    }

    pub fn duration_ms(&self) -> u64 {
        self.strokes.iter().map(StrokeDescription::end_ms).max().unwrap_or(0)
    }

    /// Pointer ids per stroke: the lowest id not held by a stroke still
    /// down when this one starts.
    pub fn pointer_ids(&self) -> Vec<PointerId> {
        let mut order: Vec<usize> = (0..self.strokes.len()).collect();
        order.sort_by_key(|&idx| (self.strokes[idx].start_ms, idx));

        let mut ids = vec![0; self.strokes.len()];
        let mut held: Vec<(PointerId, u64)> = Vec::new();
        for idx in order {
            let stroke = &self.strokes[idx];
            held.retain(|&(_, end_ms)| end_ms >= stroke.start_ms);
            let mut id = 0;
            while held.iter().any(|&(taken, _)| taken == id) {
                id += 1;
            }
            held.push((id, stroke.end_ms()));
            ids[idx] = id;
        }
        ids
    }

    /// Samples the gesture into input frames: every stroke start and end
    /// plus every `interval_ms` tick. Moves repeating the previous position
    /// are skipped.
    pub fn frames(&self, interval_ms: u64) -> Vec<GestureFrame> {
        let interval_ms = interval_ms.max(1);
        let end_ms = self.duration_ms();
        let mut times: BTreeSet<u64> = (0..=end_ms / interval_ms).map(|k| k * interval_ms).collect();
        for stroke in &self.strokes {
            times.insert(stroke.start_ms);
            times.insert(stroke.end_ms());
        }

        let ids = self.pointer_ids();
        let mut last: Vec<Option<Point>> = vec![None; self.strokes.len()];
        let mut frames = Vec::new();
        for t in times {
            let mut samples = Vec::new();
            for (idx, stroke) in self.strokes.iter().enumerate() {
                let sample = |phase, position| RawPointerSample::new(self.display_id, ids[idx], phase, position, t);
                if t == stroke.start_ms {
                    let position = stroke.position_at(0);
                    last[idx] = Some(position);
                    samples.push(sample(PointerPhase::Down, position));
                } else if t > stroke.start_ms && t < stroke.end_ms() {
                    let position = stroke.position_at(t - stroke.start_ms);
                    if last[idx] != Some(position) {
                        last[idx] = Some(position);
                        samples.push(sample(PointerPhase::Move, position));
                    }
                } else if t == stroke.end_ms() {
                    samples.push(sample(PointerPhase::Up, stroke.position_at(stroke.duration_ms)));
                }
            }
            if !samples.is_empty() {
                frames.push(GestureFrame { offset_ms: t, samples });
            }
        }
        frames
    }
}

pub fn click(display_id: DisplayId, at: Point) -> Result<GestureDescription, GestureBuildError> {
    GestureDescription::new(display_id, vec![StrokeDescription::point(at, 0, CLICK_DURATION_MS)?])
}

/// Press held for one and a half long-press timeouts.
pub fn long_click(
    display_id: DisplayId,
    at: Point,
    config: &ExplorerConfig,
) -> Result<GestureDescription, GestureBuildError> {
    let hold_ms = config.long_press_timeout_ms * 3 / 2;
    GestureDescription::new(display_id, vec![StrokeDescription::point(at, 0, hold_ms)?])
}

pub fn swipe(
    display_id: DisplayId,
    from: Point,
    to: Point,
    duration_ms: u64,
) -> Result<GestureDescription, GestureBuildError> {
    GestureDescription::new(display_id, vec![StrokeDescription::line(from, to, 0, duration_ms)?])
}

/// Path through `vertices`, `segment_ms` per segment.
pub fn polyline(
    display_id: DisplayId,
    vertices: &[Point],
    segment_ms: u64,
) -> Result<GestureDescription, GestureBuildError> {
    let segments = vertices.len().saturating_sub(1).max(1) as u64;
    GestureDescription::new(
        display_id,
        vec![StrokeDescription::new(vertices.to_vec(), 0, segment_ms * segments)?],
    )
}

pub fn double_tap(display_id: DisplayId, at: Point) -> Result<GestureDescription, GestureBuildError> {
    let second_start = CLICK_DURATION_MS + DOUBLE_TAP_GAP_MS;
    GestureDescription::new(
        display_id,
        vec![
            StrokeDescription::point(at, 0, CLICK_DURATION_MS)?,
            StrokeDescription::point(at, second_start, CLICK_DURATION_MS)?,
        ],
    )
}

pub fn double_tap_and_hold(
    display_id: DisplayId,
    at: Point,
    config: &ExplorerConfig,
) -> Result<GestureDescription, GestureBuildError> {
    let second_start = CLICK_DURATION_MS + DOUBLE_TAP_GAP_MS;
    GestureDescription::new(
        display_id,
        vec![
            StrokeDescription::point(at, 0, CLICK_DURATION_MS)?,
            StrokeDescription::point(at, second_start, config.long_press_timeout_ms * 3 / 2)?,
        ],
    )
}

/// `taps` quick taps alternating between `at` and a point just inside
/// `slop_px` of it.
pub fn multi_tap(
    display_id: DisplayId,
    at: Point,
    taps: usize,
    slop_px: f32,
) -> Result<GestureDescription, GestureBuildError> {
    let strokes = (0..taps)
        .map(|idx| {
            let position = if idx % 2 == 0 { at } else { at.offset(slop_px * 0.9, 0.0) };
            let start_ms = idx as u64 * (CLICK_DURATION_MS + DOUBLE_TAP_GAP_MS);
            StrokeDescription::point(position, start_ms, CLICK_DURATION_MS)
        })
        .collect::<Result<Vec<_>, _>>()?;
    GestureDescription::new(display_id, strokes)
}

/// First finger held at `held_at` while a second finger taps `taps` times
/// at `tap_at`, starting `first_tap_delay_ms` after the first finger.
pub fn second_finger_multi_tap(
    display_id: DisplayId,
    held_at: Point,
    tap_at: Point,
    taps: usize,
    first_tap_delay_ms: u64,
) -> Result<GestureDescription, GestureBuildError> {
    let tap_period_ms = MULTI_TAP_DURATION_MS + MULTI_TAP_GAP_MS;
    let taps_end_ms = first_tap_delay_ms + taps as u64 * tap_period_ms;
    let mut strokes = vec![StrokeDescription::point(held_at, 0, taps_end_ms + MULTI_TAP_GAP_MS)?];
    for idx in 0..taps as u64 {
        strokes.push(StrokeDescription::point(
            tap_at,
            first_tap_delay_ms + idx * tap_period_ms,
            MULTI_TAP_DURATION_MS,
        )?);
    }
    GestureDescription::new(display_id, strokes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_descriptions() {
        assert_eq!(
            StrokeDescription::new(Vec::new(), 0, 10),
            Err(GestureBuildError::EmptyPath)
        );
        assert_eq!(
            StrokeDescription::point(Point::default(), 0, 0),
            Err(GestureBuildError::ZeroDuration)
        );
        assert_eq!(GestureDescription::new(0, Vec::new()), Err(GestureBuildError::NoStrokes));
    }

    #[test]
    fn swipe_frames_interpolate_and_bracket() {
        let gesture = swipe(0, Point::new(0.0, 0.0), Point::new(100.0, 0.0), 40).expect("valid");
        let frames = gesture.frames(10);

        let offsets: Vec<_> = frames.iter().map(|f| f.offset_ms).collect();
        assert_eq!(offsets, vec![0, 10, 20, 30, 40]);
        assert_eq!(frames[0].samples[0].phase, PointerPhase::Down);
        assert_eq!(frames[2].samples[0].position, Point::new(50.0, 0.0));
        assert_eq!(frames[4].samples[0].phase, PointerPhase::Up);
        assert_eq!(frames[4].samples[0].position, Point::new(100.0, 0.0));
    }

    #[test]
    fn stationary_stroke_has_no_moves() {
        let frames = click(0, Point::new(5.0, 5.0)).expect("valid").frames(10);
        let phases: Vec<_> = frames.iter().flat_map(|f| f.samples.iter().map(|s| s.phase)).collect();
        assert_eq!(phases, vec![PointerPhase::Down, PointerPhase::Up]);
    }

    #[test]
    fn sequential_strokes_reuse_pointer_ids() {
        let at = Point::new(10.0, 10.0);
        assert_eq!(double_tap(0, at).expect("valid").pointer_ids(), vec![0, 0]);

        let held = second_finger_multi_tap(0, at, Point::new(200.0, 10.0), 2, 100).expect("valid");
        assert_eq!(held.pointer_ids(), vec![0, 1, 1]);
    }

    #[test]
    fn polyline_spends_equal_time_per_segment() {
        let gesture = polyline(
            0,
            &[Point::new(0.0, 0.0), Point::new(100.0, 0.0), Point::new(100.0, 100.0)],
            100,
        )
        .expect("valid");
        let stroke = &gesture.strokes()[0];
        assert_eq!(stroke.duration_ms(), 200);
        assert_eq!(stroke.position_at(100), Point::new(100.0, 0.0));
        assert_eq!(stroke.position_at(150), Point::new(100.0, 50.0));
    }
}
