use super::types::{DisplayId, MotionAction, MotionEvent, MotionPointer, Point, PointerId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragVerdict {
    Undecided,
    Drag,
    Independent,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerTravel {
    pub down: Point,
    pub now: Point,
}

impl PointerTravel {
    fn vector(self) -> (f32, f32) {
        self.down.delta_to(self.now)
    }

    fn length(self) -> f32 {
        self.down.distance_to(self.now)
    }
}

/// Decides whether two pointers move together. One pointer sliding more than
/// twice the slop while the other rests is treated as independent movement.
pub fn classify_two_pointers(
    first: PointerTravel,
    second: PointerTravel,
    touch_slop_px: f32,
    angle_cos: f32,
) -> DragVerdict {
    let first_len = first.length();
    let second_len = second.length();

    if first_len < touch_slop_px && second_len < touch_slop_px {
        return DragVerdict::Undecided;
    }
    if first_len < touch_slop_px || second_len < touch_slop_px {
        return if first_len.max(second_len) > touch_slop_px * 2.0 {
            DragVerdict::Independent
        } else {
            DragVerdict::Undecided
        };
    }

    let (ax, ay) = first.vector();
    let (bx, by) = second.vector();
    let cos = (ax * bx + ay * by) / (first_len * second_len);
    if cos >= angle_cos {
        DragVerdict::Drag
    } else {
        DragVerdict::Independent
    }
}

/// Collapses a two-finger drag into one synthetic pointer: it goes down where
/// the trailing finger is, follows the midpoint of both fingers and lifts
/// where the trailing finger lifts.
#[derive(Clone, Debug)]
pub struct DragCoordinator {
    display_id: DisplayId,
    dragging_id: PointerId,
    anchor_id: Option<PointerId>,
    emit_on: PointerId,
    dragging_at: (Point, Point),
    anchor_at: Point,
    last_emitted: Point,
}

impl DragCoordinator {
    /// `dragging` is the trailing finger as `(id, position, raw_position)`.
    pub fn start(
        display_id: DisplayId,
        dragging: (PointerId, Point, Point),
        anchor: (PointerId, Point),
        now_ms: u64,
    ) -> (Self, MotionEvent) {
        let (dragging_id, position, raw_position) = dragging;
        let coordinator = Self {
            display_id,
            dragging_id,
            anchor_id: Some(anchor.0),
            emit_on: dragging_id.max(anchor.0),
            dragging_at: (position, raw_position),
            anchor_at: anchor.1,
            last_emitted: position,
        };
        let down = coordinator.event(MotionAction::Down, now_ms, position, raw_position);
        (coordinator, down)
    }

    pub fn dragging_id(&self) -> PointerId {
        self.dragging_id
    }

    pub fn tracks(&self, pointer_id: PointerId) -> bool {
        pointer_id == self.dragging_id || self.anchor_id == Some(pointer_id)
    }

    /// Feeds one pointer update and returns the synthetic move, emitted once
    /// per input frame on the last pointer of the frame.
    pub fn update(
        &mut self,
        pointer_id: PointerId,
        position: Point,
        raw_position: Point,
        now_ms: u64,
    ) -> Option<MotionEvent> {
        if pointer_id == self.dragging_id {
            self.dragging_at = (position, raw_position);
        } else if self.anchor_id == Some(pointer_id) {
            self.anchor_at = position;
        } else {
            return None;
        }
        if pointer_id != self.emit_on {
            return None;
        }

        let target = match self.anchor_id {
            Some(_) => self.dragging_at.0.midpoint(self.anchor_at),
            None => self.dragging_at.0,
        };
        if target == self.last_emitted {
            return None;
        }
        self.last_emitted = target;
        let (dx, dy) = self.dragging_at.0.delta_to(self.dragging_at.1);
        Some(self.event(MotionAction::Move, now_ms, target, target.offset(dx, dy)))
    }

    /// Anchor finger lifted; the synthetic pointer now follows the trailing
    /// finger alone.
    pub fn release_anchor(&mut self) {
        self.anchor_id = None;
        self.emit_on = self.dragging_id;
    }

    pub fn finish(&self, now_ms: u64) -> MotionEvent {
        self.event(MotionAction::Up, now_ms, self.dragging_at.0, self.dragging_at.1)
    }

    /// Trailing finger lifted at `position`.
    pub fn lift(&mut self, now_ms: u64, position: Point, raw_position: Point) -> MotionEvent {
        self.dragging_at = (position, raw_position);
        self.finish(now_ms)
    }

    pub fn cancel(&self, now_ms: u64) -> MotionEvent {
        self.event(MotionAction::Cancel, now_ms, self.last_emitted, self.dragging_at.1)
    }

    fn event(&self, action: MotionAction, now_ms: u64, position: Point, raw_position: Point) -> MotionEvent {
        let mut pointers = heapless::Vec::new();
        let _ = pointers.push(MotionPointer {
            id: self.dragging_id,
            position,
            raw_position,
        });
        MotionEvent {
            action,
            display_id: self.display_id,
            event_time_ms: now_ms,
            pointers,
            target: None,
        }
    }
}
