use super::types::{GestureId, Point, SwipeDirection};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathPoint {
    pub position: Point,
    pub time_ms: u64,
}

/// Positions of the primary pointer during one session.
#[derive(Clone, Debug, Default)]
pub struct TouchPath {
    points: Vec<PathPoint>,
}

impl TouchPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, position: Point, time_ms: u64) {
        if self.points.last().map(|last| last.position) == Some(position) {
            return;
        }
        self.points.push(PathPoint { position, time_ms });
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn restart(&mut self, position: Point, time_ms: u64) {
        self.clear();
        self.push(position, time_ms);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PathPoint] {
        &self.points
    }
}

impl FromIterator<Point> for TouchPath {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        let mut path = TouchPath::new();
        for (idx, position) in iter.into_iter().enumerate() {
            path.push(position, idx as u64);
        }
        path
    }
}

/// Screen-space compass; north is towards smaller y.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompassDirection {
    East,
    NorthEast,
    North,
    NorthWest,
    West,
    SouthWest,
    South,
    SouthEast,
}

impl CompassDirection {
    const SECTORS: [CompassDirection; 8] = [
        CompassDirection::East,
        CompassDirection::NorthEast,
        CompassDirection::North,
        CompassDirection::NorthWest,
        CompassDirection::West,
        CompassDirection::SouthWest,
        CompassDirection::South,
        CompassDirection::SouthEast,
    ];

    pub fn quantize(dx: f32, dy: f32) -> Option<Self> {
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        let angle = (-dy).atan2(dx);
        let sector = (angle / core::f32::consts::FRAC_PI_4).round() as i32;
        Some(Self::SECTORS[sector.rem_euclid(8) as usize])
    }

    pub fn cardinal(self) -> Option<SwipeDirection> {
        match self {
            CompassDirection::East => Some(SwipeDirection::Right),
            CompassDirection::North => Some(SwipeDirection::Up),
            CompassDirection::West => Some(SwipeDirection::Left),
            CompassDirection::South => Some(SwipeDirection::Down),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathClassification {
    Gesture(GestureId),
    Unrecognized,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathMatcher {
    min_segment_px: f32,
}

impl PathMatcher {
    pub fn new(min_segment_px: f32) -> Self {
        Self { min_segment_px }
    }

    /// Total over every input: a path is one of the 16 discrete gestures or
    /// unrecognized.
    pub fn classify(&self, path: &TouchPath) -> PathClassification {
        let points = path.points();
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return PathClassification::Unrecognized;
        };
        let start = first.position;
        let end = last.position;

        let (corner_idx, deviation) = farthest_from_segment(points, start, end);
        let two_segments = deviation >= self.min_segment_px
            && start.distance_to(points[corner_idx].position) >= self.min_segment_px
            && points[corner_idx].position.distance_to(end) >= self.min_segment_px;

        if !two_segments {
            return self.classify_single(start, end);
        }

        let corner = points[corner_idx].position;
        if !self.is_straight(&points[..=corner_idx]) || !self.is_straight(&points[corner_idx..]) {
            return PathClassification::Unrecognized;
        }

        let (Some(first_dir), Some(second_dir)) = (segment_direction(start, corner), segment_direction(corner, end))
        else {
            return PathClassification::Unrecognized;
        };
        match GestureId::combination(first_dir, second_dir) {
            Some(gesture) => PathClassification::Gesture(gesture),
            None => PathClassification::Gesture(GestureId::swipe(first_dir)),
        }
    }

    fn classify_single(&self, start: Point, end: Point) -> PathClassification {
        if start.distance_to(end) < self.min_segment_px {
            return PathClassification::Unrecognized;
        }
        match segment_direction(start, end) {
            Some(direction) => PathClassification::Gesture(GestureId::swipe(direction)),
            None => PathClassification::Unrecognized,
        }
    }

    fn is_straight(&self, points: &[PathPoint]) -> bool {
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return true;
        };
        let (_, deviation) = farthest_from_segment(points, first.position, last.position);
        deviation < self.min_segment_px
    }
}

fn segment_direction(from: Point, to: Point) -> Option<SwipeDirection> {
    let (dx, dy) = from.delta_to(to);
    CompassDirection::quantize(dx, dy)?.cardinal()
}

fn farthest_from_segment(points: &[PathPoint], start: Point, end: Point) -> (usize, f32) {
    let mut best = (0usize, 0.0f32);
    for (idx, point) in points.iter().enumerate() {
        let distance = distance_to_segment(point.position, start, end);
        if distance > best.1 {
            best = (idx, distance);
        }
    }
    best
}

fn distance_to_segment(point: Point, start: Point, end: Point) -> f32 {
    let (sx, sy) = start.delta_to(end);
    let length_sq = sx * sx + sy * sy;
    if length_sq <= f32::EPSILON {
        return point.distance_to(start);
    }
    let (px, py) = start.delta_to(point);
    let t = ((px * sx + py * sy) / length_sq).clamp(0.0, 1.0);
    point.distance_to(start.lerp(end, t))
}
