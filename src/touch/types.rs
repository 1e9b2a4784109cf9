use core::fmt;

pub const MAX_POINTERS: usize = 10;

pub type DisplayId = u32;
pub type PointerId = u32;
pub type SessionId = u64;

/// Lookup key into the externally owned node tree. Holding one never keeps
/// the node alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn delta_to(self, other: Point) -> (f32, f32) {
        (other.x - self.x, other.y - self.y)
    }

    pub fn distance_to(self, other: Point) -> f32 {
        let (dx, dy) = self.delta_to(other);
        dx.hypot(dy)
    }

    pub fn midpoint(self, other: Point) -> Self {
        Self::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }

    pub fn lerp(self, other: Point, fraction: f32) -> Self {
        Self::new(
            self.x + (other.x - self.x) * fraction,
            self.y + (other.y - self.y) * fraction,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// Sample as delivered by the input subsystem.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawPointerSample {
    pub pointer_id: PointerId,
    pub display_id: DisplayId,
    pub position: Point,
    pub raw_position: Point,
    pub event_time_ms: u64,
    pub phase: PointerPhase,
}

impl RawPointerSample {
    pub fn new(
        display_id: DisplayId,
        pointer_id: PointerId,
        phase: PointerPhase,
        position: Point,
        event_time_ms: u64,
    ) -> Self {
        Self {
            pointer_id,
            display_id,
            position,
            raw_position: position,
            event_time_ms,
            phase,
        }
    }
}

/// Normalized sample. `receipt_ms` is monotonic per display and drives every
/// timer decision; `event_time_ms` is kept for downstream consumers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerSample {
    pub pointer_id: PointerId,
    pub display_id: DisplayId,
    pub position: Point,
    pub raw_position: Point,
    pub event_time_ms: u64,
    pub receipt_ms: u64,
    pub phase: PointerPhase,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionAction {
    Down,
    PointerDown(PointerId),
    Move,
    PointerUp(PointerId),
    Up,
    Cancel,
    HoverEnter,
    HoverMove,
    HoverExit,
}

impl MotionAction {
    pub fn label(self) -> &'static str {
        match self {
            MotionAction::Down => "down",
            MotionAction::PointerDown(_) => "pointer_down",
            MotionAction::Move => "move",
            MotionAction::PointerUp(_) => "pointer_up",
            MotionAction::Up => "up",
            MotionAction::Cancel => "cancel",
            MotionAction::HoverEnter => "hover_enter",
            MotionAction::HoverMove => "hover_move",
            MotionAction::HoverExit => "hover_exit",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionPointer {
    pub id: PointerId,
    pub position: Point,
    pub raw_position: Point,
}

/// Touch or hover motion forwarded to the view hierarchy.
#[derive(Clone, Debug, PartialEq)]
pub struct MotionEvent {
    pub action: MotionAction,
    pub display_id: DisplayId,
    pub event_time_ms: u64,
    pub pointers: heapless::Vec<MotionPointer, MAX_POINTERS>,
    pub target: Option<NodeId>,
}

impl MotionEvent {
    pub fn primary(&self) -> Option<&MotionPointer> {
        self.pointers.first()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessibilityEventType {
    ViewClicked,
    ViewLongClicked,
    ViewFocused,
    ViewHoverEnter,
    ViewHoverExit,
    TouchExplorationGestureStart,
    TouchExplorationGestureEnd,
    ViewAccessibilityFocused,
    GestureDetectionStart,
    GestureDetectionEnd,
    TouchInteractionStart,
    TouchInteractionEnd,
}

impl AccessibilityEventType {
    pub const ALL: [AccessibilityEventType; 12] = [
        AccessibilityEventType::ViewClicked,
        AccessibilityEventType::ViewLongClicked,
        AccessibilityEventType::ViewFocused,
        AccessibilityEventType::ViewHoverEnter,
        AccessibilityEventType::ViewHoverExit,
        AccessibilityEventType::TouchExplorationGestureStart,
        AccessibilityEventType::TouchExplorationGestureEnd,
        AccessibilityEventType::ViewAccessibilityFocused,
        AccessibilityEventType::GestureDetectionStart,
        AccessibilityEventType::GestureDetectionEnd,
        AccessibilityEventType::TouchInteractionStart,
        AccessibilityEventType::TouchInteractionEnd,
    ];

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }

    /// Platform integer constant for the event type.
    pub fn as_raw(self) -> u32 {
        match self {
            AccessibilityEventType::ViewClicked => 0x0000_0001,
            AccessibilityEventType::ViewLongClicked => 0x0000_0002,
            AccessibilityEventType::ViewFocused => 0x0000_0008,
            AccessibilityEventType::ViewHoverEnter => 0x0000_0080,
            AccessibilityEventType::ViewHoverExit => 0x0000_0100,
            AccessibilityEventType::TouchExplorationGestureStart => 0x0000_0200,
            AccessibilityEventType::TouchExplorationGestureEnd => 0x0000_0400,
            AccessibilityEventType::ViewAccessibilityFocused => 0x0000_8000,
            AccessibilityEventType::GestureDetectionStart => 0x0004_0000,
            AccessibilityEventType::GestureDetectionEnd => 0x0008_0000,
            AccessibilityEventType::TouchInteractionStart => 0x0010_0000,
            AccessibilityEventType::TouchInteractionEnd => 0x0020_0000,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AccessibilityEventType::ViewClicked => "view_clicked",
            AccessibilityEventType::ViewLongClicked => "view_long_clicked",
            AccessibilityEventType::ViewFocused => "view_focused",
            AccessibilityEventType::ViewHoverEnter => "view_hover_enter",
            AccessibilityEventType::ViewHoverExit => "view_hover_exit",
            AccessibilityEventType::TouchExplorationGestureStart => "exploration_start",
            AccessibilityEventType::TouchExplorationGestureEnd => "exploration_end",
            AccessibilityEventType::ViewAccessibilityFocused => "accessibility_focused",
            AccessibilityEventType::GestureDetectionStart => "gesture_detection_start",
            AccessibilityEventType::GestureDetectionEnd => "gesture_detection_end",
            AccessibilityEventType::TouchInteractionStart => "interaction_start",
            AccessibilityEventType::TouchInteractionEnd => "interaction_end",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessibilityEventRecord {
    pub event_type: AccessibilityEventType,
    pub display_id: DisplayId,
    pub event_time_ms: u64,
    pub node: Option<NodeId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GestureId {
    SwipeUp,
    SwipeDown,
    SwipeLeft,
    SwipeRight,
    SwipeLeftAndRight,
    SwipeRightAndLeft,
    SwipeUpAndDown,
    SwipeDownAndUp,
    SwipeLeftAndUp,
    SwipeLeftAndDown,
    SwipeRightAndUp,
    SwipeRightAndDown,
    SwipeUpAndLeft,
    SwipeUpAndRight,
    SwipeDownAndLeft,
    SwipeDownAndRight,
}

impl GestureId {
    pub const ALL: [GestureId; 16] = [
        GestureId::SwipeUp,
        GestureId::SwipeDown,
        GestureId::SwipeLeft,
        GestureId::SwipeRight,
        GestureId::SwipeLeftAndRight,
        GestureId::SwipeRightAndLeft,
        GestureId::SwipeUpAndDown,
        GestureId::SwipeDownAndUp,
        GestureId::SwipeLeftAndUp,
        GestureId::SwipeLeftAndDown,
        GestureId::SwipeRightAndUp,
        GestureId::SwipeRightAndDown,
        GestureId::SwipeUpAndLeft,
        GestureId::SwipeUpAndRight,
        GestureId::SwipeDownAndLeft,
        GestureId::SwipeDownAndRight,
    ];

    /// Platform gesture id, 1-based in declaration order.
    pub fn id(self) -> u32 {
        match self {
            GestureId::SwipeUp => 1,
            GestureId::SwipeDown => 2,
            GestureId::SwipeLeft => 3,
            GestureId::SwipeRight => 4,
            GestureId::SwipeLeftAndRight => 5,
            GestureId::SwipeRightAndLeft => 6,
            GestureId::SwipeUpAndDown => 7,
            GestureId::SwipeDownAndUp => 8,
            GestureId::SwipeLeftAndUp => 9,
            GestureId::SwipeLeftAndDown => 10,
            GestureId::SwipeRightAndUp => 11,
            GestureId::SwipeRightAndDown => 12,
            GestureId::SwipeUpAndLeft => 13,
            GestureId::SwipeUpAndRight => 14,
            GestureId::SwipeDownAndLeft => 15,
            GestureId::SwipeDownAndRight => 16,
        }
    }

    pub fn swipe(direction: SwipeDirection) -> Self {
        match direction {
            SwipeDirection::Up => GestureId::SwipeUp,
            SwipeDirection::Down => GestureId::SwipeDown,
            SwipeDirection::Left => GestureId::SwipeLeft,
            SwipeDirection::Right => GestureId::SwipeRight,
        }
    }

    /// Two-segment gesture; `None` when both segments point the same way.
    pub fn combination(first: SwipeDirection, second: SwipeDirection) -> Option<Self> {
        use SwipeDirection::{Down, Left, Right, Up};
        let gesture = match (first, second) {
            (Left, Right) => GestureId::SwipeLeftAndRight,
            (Right, Left) => GestureId::SwipeRightAndLeft,
            (Up, Down) => GestureId::SwipeUpAndDown,
            (Down, Up) => GestureId::SwipeDownAndUp,
            (Left, Up) => GestureId::SwipeLeftAndUp,
            (Left, Down) => GestureId::SwipeLeftAndDown,
            (Right, Up) => GestureId::SwipeRightAndUp,
            (Right, Down) => GestureId::SwipeRightAndDown,
            (Up, Left) => GestureId::SwipeUpAndLeft,
            (Up, Right) => GestureId::SwipeUpAndRight,
            (Down, Left) => GestureId::SwipeDownAndLeft,
            (Down, Right) => GestureId::SwipeDownAndRight,
            (Left, Left) | (Right, Right) | (Up, Up) | (Down, Down) => return None,
        };
        Some(gesture)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessibilityGestureEvent {
    pub gesture: GestureId,
    pub display_id: DisplayId,
}

/// Outcome of one interaction session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureResult {
    Discrete(AccessibilityGestureEvent),
    PathUnrecognized,
    /// Session ended without path classification (tap, exploration, drag,
    /// delegation).
    Completed,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExplorerMode {
    Idle,
    Undecided,
    Exploring,
    GestureDetecting,
    Dragging,
    Delegating,
    AwaitingRelease,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExplorerOutput {
    Accessibility(AccessibilityEventRecord),
    Touch(MotionEvent),
    Hover(MotionEvent),
    SessionEnd {
        session: SessionId,
        result: GestureResult,
    },
}

impl ExplorerOutput {
    pub fn accessibility_type(&self) -> Option<AccessibilityEventType> {
        match self {
            ExplorerOutput::Accessibility(record) => Some(record.event_type),
            _ => None,
        }
    }
}
