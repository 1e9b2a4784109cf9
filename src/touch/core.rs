use statig::{blocking::IntoStateMachineExt as _, prelude::*};

use super::{
    config::ExplorerConfig,
    drag::{classify_two_pointers, DragCoordinator, DragVerdict, PointerTravel},
    error::TouchError,
    path::{PathClassification, PathMatcher, TouchPath},
    tap::{ActivationKind, TapDisambiguator},
    timers::{DueTimer, TimerKind},
    types::{
        AccessibilityEventRecord, AccessibilityEventType, AccessibilityGestureEvent, DisplayId,
        ExplorerMode, ExplorerOutput, GestureResult, MotionAction, MotionEvent, MotionPointer,
        NodeId, Point, PointerId, PointerPhase, PointerSample, SessionId, MAX_POINTERS,
    },
};

const OP_CAPACITY: usize = 48;

#[derive(Clone, Copy, Debug)]
pub(crate) struct PointerInput {
    pub(crate) sample: PointerSample,
    /// Node under the sample position at the time it was received.
    pub(crate) target: Option<NodeId>,
    /// The target handles raw touch itself.
    pub(crate) delegates_touch: bool,
}

#[derive(Clone, Copy, Debug)]
enum ExplorerEvent {
    Pointer(PointerInput),
    Timer(DueTimer),
    Interrupt { now_ms: u64 },
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum CoreOp {
    Emit(ExplorerOutput),
    Activate {
        kind: ActivationKind,
        now_ms: u64,
    },
    ArmTimer {
        kind: TimerKind,
        session: SessionId,
        deadline_ms: u64,
    },
    CancelTimer(TimerKind),
    CancelAllTimers,
}

#[derive(Debug, Default)]
pub(crate) struct CoreOutput {
    pub(crate) ops: heapless::Vec<CoreOp, OP_CAPACITY>,
}

#[derive(Debug, Default)]
struct DispatchContext {
    ops: heapless::Vec<CoreOp, OP_CAPACITY>,
    dropped: usize,
}

impl DispatchContext {
    fn push(&mut self, op: CoreOp) {
        if self.ops.push(op).is_err() {
            self.dropped += 1;
        }
    }

    fn finish(self) -> CoreOutput {
        if self.dropped > 0 {
            log::warn!("explorer dropped {} outputs past capacity", self.dropped);
        }
        CoreOutput { ops: self.ops }
    }
}

pub(crate) struct ExplorerCore {
    machine: statig::blocking::StateMachine<ExplorerHsm>,
}

impl ExplorerCore {
    pub(crate) fn new(display_id: DisplayId, config: ExplorerConfig) -> Self {
        Self {
            machine: ExplorerHsm::new(display_id, config).state_machine(),
        }
    }

    pub(crate) fn pointer(&mut self, input: PointerInput) -> CoreOutput {
        self.dispatch(ExplorerEvent::Pointer(input))
    }

    pub(crate) fn timer(&mut self, due: DueTimer) -> CoreOutput {
        self.dispatch(ExplorerEvent::Timer(due))
    }

    pub(crate) fn interrupt(&mut self, now_ms: u64) -> CoreOutput {
        self.dispatch(ExplorerEvent::Interrupt { now_ms })
    }

    pub(crate) fn mode(&self) -> ExplorerMode {
        match self.machine.state() {
            State::Idle { .. } => ExplorerMode::Idle,
            State::Undecided { .. }
            | State::TapPending { .. }
            | State::SecondTap { .. }
            | State::MultiPointer { .. } => ExplorerMode::Undecided,
            State::Exploring { .. } => ExplorerMode::Exploring,
            State::GestureDetecting { .. } => ExplorerMode::GestureDetecting,
            State::Dragging { .. } => ExplorerMode::Dragging,
            State::Delegating { .. } => ExplorerMode::Delegating,
            State::AwaitingRelease { .. } => ExplorerMode::AwaitingRelease,
        }
    }

    fn dispatch(&mut self, event: ExplorerEvent) -> CoreOutput {
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&event, &mut context);
        context.finish()
    }
}

#[derive(Clone, Copy, Debug)]
struct TrackedPointer {
    id: PointerId,
    down_position: Point,
    down_ms: u64,
    position: Point,
    raw_position: Point,
}

impl TrackedPointer {
    fn travel(&self) -> PointerTravel {
        PointerTravel {
            down: self.down_position,
            now: self.position,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct HoverState {
    active: bool,
    node: Option<NodeId>,
    position: Point,
}

struct ExplorerHsm {
    config: ExplorerConfig,
    display_id: DisplayId,
    matcher: PathMatcher,
    session: SessionId,
    next_session: SessionId,
    pointers: heapless::Vec<TrackedPointer, MAX_POINTERS>,
    primary: Option<PointerId>,
    primary_target: Option<NodeId>,
    path: TouchPath,
    hover: HoverState,
    exploring: bool,
    gesture_detecting: bool,
    delegated: bool,
    drag: Option<DragCoordinator>,
    taps: TapDisambiguator,
    multi_touched: bool,
}

impl ExplorerHsm {
    fn new(display_id: DisplayId, config: ExplorerConfig) -> Self {
        Self {
            config,
            display_id,
            matcher: PathMatcher::new(config.min_gesture_segment_px),
            session: 0,
            next_session: 1,
            pointers: heapless::Vec::new(),
            primary: None,
            primary_target: None,
            path: TouchPath::new(),
            hover: HoverState::default(),
            exploring: false,
            gesture_detecting: false,
            delegated: false,
            drag: None,
            taps: TapDisambiguator::new(&config),
            multi_touched: false,
        }
    }

    fn reset_session_state(&mut self) {
        self.pointers.clear();
        self.primary = None;
        self.primary_target = None;
        self.path.clear();
        self.hover = HoverState::default();
        self.exploring = false;
        self.gesture_detecting = false;
        self.delegated = false;
        self.drag = None;
        self.taps.reset();
        self.multi_touched = false;
    }

    fn emit(&self, context: &mut DispatchContext, output: ExplorerOutput) {
        context.push(CoreOp::Emit(output));
    }

    fn emit_accessibility(
        &self,
        context: &mut DispatchContext,
        event_type: AccessibilityEventType,
        now_ms: u64,
        node: Option<NodeId>,
    ) {
        self.emit(
            context,
            ExplorerOutput::Accessibility(AccessibilityEventRecord {
                event_type,
                display_id: self.display_id,
                event_time_ms: now_ms,
                node,
            }),
        );
    }

    fn arm(&self, context: &mut DispatchContext, kind: TimerKind, deadline_ms: u64) {
        context.push(CoreOp::ArmTimer {
            kind,
            session: self.session,
            deadline_ms,
        });
    }

    fn cancel(&self, context: &mut DispatchContext, kind: TimerKind) {
        context.push(CoreOp::CancelTimer(kind));
    }

    fn press(&mut self, sample: &PointerSample) -> TrackedPointer {
        let pointer = TrackedPointer {
            id: sample.pointer_id,
            down_position: sample.position,
            down_ms: sample.receipt_ms,
            position: sample.position,
            raw_position: sample.raw_position,
        };
        if let Some(existing) = self.pointers.iter_mut().find(|p| p.id == pointer.id) {
            *existing = pointer;
        } else if self.pointers.push(pointer).is_err() {
            log::warn!(
                "display {} pointer table full, ignoring pointer {}",
                self.display_id,
                pointer.id
            );
        }
        pointer
    }

    fn update_pointer(&mut self, sample: &PointerSample) -> Option<TrackedPointer> {
        let pointer = self
            .pointers
            .iter_mut()
            .find(|p| p.id == sample.pointer_id)?;
        pointer.position = sample.position;
        pointer.raw_position = sample.raw_position;
        Some(*pointer)
    }

    fn release(&mut self, sample: &PointerSample) -> Option<TrackedPointer> {
        let mut pointer = self
            .pointers
            .iter()
            .find(|p| p.id == sample.pointer_id)
            .copied()?;
        self.pointers.retain(|p| p.id != sample.pointer_id);
        pointer.position = sample.position;
        pointer.raw_position = sample.raw_position;
        Some(pointer)
    }

    fn is_primary(&self, pointer_id: PointerId) -> bool {
        self.primary == Some(pointer_id)
    }

    fn primary_pointer(&self) -> Option<TrackedPointer> {
        let primary = self.primary?;
        self.pointers.iter().find(|p| p.id == primary).copied()
    }

    /// Movement of every pointer is measured from here on.
    fn rebase_pointers(&mut self) {
        for pointer in self.pointers.iter_mut() {
            pointer.down_position = pointer.position;
        }
    }

    fn motion(&self, action: MotionAction, now_ms: u64) -> MotionEvent {
        self.motion_with(action, now_ms, &self.pointers)
    }

    fn motion_with(
        &self,
        action: MotionAction,
        now_ms: u64,
        pointers: &[TrackedPointer],
    ) -> MotionEvent {
        let mut list = heapless::Vec::new();
        for pointer in pointers {
            let _ = list.push(MotionPointer {
                id: pointer.id,
                position: pointer.position,
                raw_position: pointer.raw_position,
            });
        }
        MotionEvent {
            action,
            display_id: self.display_id,
            event_time_ms: now_ms,
            pointers: list,
            target: None,
        }
    }

    fn hover_event(
        &self,
        action: MotionAction,
        now_ms: u64,
        position: Point,
        target: Option<NodeId>,
    ) -> MotionEvent {
        let mut pointers = heapless::Vec::new();
        let _ = pointers.push(MotionPointer {
            id: self.primary.unwrap_or_default(),
            position,
            raw_position: position,
        });
        MotionEvent {
            action,
            display_id: self.display_id,
            event_time_ms: now_ms,
            pointers,
            target,
        }
    }

    fn begin_session(&mut self, context: &mut DispatchContext, input: &PointerInput) -> Outcome<State> {
        let now_ms = input.sample.receipt_ms;
        self.reset_session_state();
        self.session = self.next_session;
        self.next_session = self.next_session.wrapping_add(1);
        log::debug!("display {} session {} started", self.display_id, self.session);

        self.emit_accessibility(context, AccessibilityEventType::TouchInteractionStart, now_ms, None);
        let pointer = self.press(&input.sample);
        self.primary = Some(pointer.id);
        self.primary_target = input.target;

        if !self.config.touch_exploration_enabled || input.delegates_touch {
            return self.delegate_all(context, now_ms);
        }

        self.path.restart(pointer.position, now_ms);
        self.arm(
            context,
            TimerKind::ExplorationDelay,
            now_ms.saturating_add(self.config.double_tap_timeout_ms),
        );
        Transition(State::undecided())
    }

    fn end_session(&mut self, context: &mut DispatchContext, now_ms: u64, result: GestureResult) {
        self.emit_accessibility(context, AccessibilityEventType::TouchInteractionEnd, now_ms, None);
        if let Some(kind) = self.taps.take_pending() {
            context.push(CoreOp::Activate { kind, now_ms });
        }
        context.push(CoreOp::CancelAllTimers);
        self.emit(
            context,
            ExplorerOutput::SessionEnd {
                session: self.session,
                result,
            },
        );
        log::debug!(
            "display {} session {} ended: {:?}",
            self.display_id,
            self.session,
            result
        );
        self.reset_session_state();
    }

    fn finish_session(
        &mut self,
        context: &mut DispatchContext,
        now_ms: u64,
        result: GestureResult,
    ) -> Outcome<State> {
        self.end_session(context, now_ms, result);
        Transition(State::idle())
    }

    /// Closes every open stream and bracket, then ends the session as
    /// cancelled. Pending activations are dropped.
    fn abort_session(&mut self, context: &mut DispatchContext, now_ms: u64) -> Outcome<State> {
        if let Some(drag) = self.drag.take() {
            self.emit(context, ExplorerOutput::Touch(drag.cancel(now_ms)));
        }
        if self.delegated && !self.pointers.is_empty() {
            self.emit(context, ExplorerOutput::Touch(self.motion(MotionAction::Cancel, now_ms)));
        }
        self.end_exploration(context, now_ms);
        self.end_gesture_detection(context, now_ms);
        self.taps.reset();
        log::debug!(
            "{}",
            TouchError::InterruptedSession {
                display_id: self.display_id,
                session: self.session,
            }
        );
        self.finish_session(context, now_ms, GestureResult::Cancelled)
    }

    fn start_exploration(
        &mut self,
        context: &mut DispatchContext,
        now_ms: u64,
        position: Point,
        target: Option<NodeId>,
    ) {
        self.exploring = true;
        self.emit_accessibility(
            context,
            AccessibilityEventType::TouchExplorationGestureStart,
            now_ms,
            None,
        );
        self.hover_enter(context, now_ms, position, target);
    }

    fn end_exploration(&mut self, context: &mut DispatchContext, now_ms: u64) {
        self.hover_exit(context, now_ms);
        if self.exploring {
            self.exploring = false;
            self.emit_accessibility(
                context,
                AccessibilityEventType::TouchExplorationGestureEnd,
                now_ms,
                None,
            );
        }
    }

    fn hover_enter(
        &mut self,
        context: &mut DispatchContext,
        now_ms: u64,
        position: Point,
        target: Option<NodeId>,
    ) {
        self.hover = HoverState {
            active: true,
            node: target,
            position,
        };
        if let Some(node) = target {
            self.emit_accessibility(context, AccessibilityEventType::ViewHoverEnter, now_ms, Some(node));
        }
        self.emit(
            context,
            ExplorerOutput::Hover(self.hover_event(MotionAction::HoverEnter, now_ms, position, target)),
        );
    }

    fn hover_move(
        &mut self,
        context: &mut DispatchContext,
        now_ms: u64,
        position: Point,
        target: Option<NodeId>,
    ) {
        if !self.hover.active {
            return;
        }
        self.hover.position = position;
        if target != self.hover.node {
            self.hover_exit(context, now_ms);
            self.hover_enter(context, now_ms, position, target);
            return;
        }
        self.emit(
            context,
            ExplorerOutput::Hover(self.hover_event(MotionAction::HoverMove, now_ms, position, target)),
        );
    }

    /// The finger left behind by a lifted second finger explores unless
    /// another tap follows within the double-tap window.
    fn rearm_exploration_delay(&mut self, context: &mut DispatchContext, now_ms: u64) {
        let deadline_ms = now_ms.saturating_add(self.config.double_tap_timeout_ms);
        self.arm(context, TimerKind::ExplorationDelay, deadline_ms);
    }

    fn hover_exit(&mut self, context: &mut DispatchContext, now_ms: u64) {
        if !self.hover.active {
            return;
        }
        let HoverState { node, position, .. } = self.hover;
        self.hover = HoverState::default();
        // A vanished node still gets its exit under the last known id.
        if let Some(node) = node {
            self.emit_accessibility(context, AccessibilityEventType::ViewHoverExit, now_ms, Some(node));
        }
        self.emit(
            context,
            ExplorerOutput::Hover(self.hover_event(MotionAction::HoverExit, now_ms, position, node)),
        );
    }

    /// Replays an unanswered first tap as a short exploration.
    fn flush_tap_exploration(&mut self, context: &mut DispatchContext, now_ms: u64) {
        let Some(position) = self.taps.first_tap_position() else {
            return;
        };
        self.start_exploration(context, now_ms, position, self.primary_target);
        self.end_exploration(context, now_ms);
    }

    fn start_gesture_detection(&mut self, context: &mut DispatchContext, now_ms: u64, down_ms: u64) {
        self.gesture_detecting = true;
        self.emit_accessibility(context, AccessibilityEventType::GestureDetectionStart, now_ms, None);
        self.arm(
            context,
            TimerKind::GestureTimeout,
            down_ms.saturating_add(self.config.max_gesture_duration_ms),
        );
    }

    fn end_gesture_detection(&mut self, context: &mut DispatchContext, now_ms: u64) {
        if !self.gesture_detecting {
            return;
        }
        self.gesture_detecting = false;
        self.cancel(context, TimerKind::GestureTimeout);
        self.emit_accessibility(context, AccessibilityEventType::GestureDetectionEnd, now_ms, None);
    }

    /// Single pointer left the slop: fast movement is a path gesture, slow
    /// movement explores.
    fn decide_single(
        &mut self,
        context: &mut DispatchContext,
        now_ms: u64,
        pointer: TrackedPointer,
        target: Option<NodeId>,
    ) -> Option<Outcome<State>> {
        let travel = pointer.down_position.distance_to(pointer.position);
        if travel <= self.config.touch_slop_px {
            return None;
        }
        self.cancel(context, TimerKind::ExplorationDelay);

        let elapsed_ms = now_ms.saturating_sub(pointer.down_ms).max(1);
        let velocity = travel / elapsed_ms as f32;
        if velocity >= self.config.min_gesture_velocity_px_per_ms {
            self.start_gesture_detection(context, now_ms, pointer.down_ms);
            Some(Transition(State::gesture_detecting()))
        } else {
            self.start_exploration(context, now_ms, pointer.position, target);
            Some(Transition(State::exploring()))
        }
    }

    fn decide_pair(&mut self, context: &mut DispatchContext, now_ms: u64) -> Option<Outcome<State>> {
        let first = *self.pointers.first()?;
        let second = *self.pointers.get(1)?;
        match classify_two_pointers(
            first.travel(),
            second.travel(),
            self.config.touch_slop_px,
            self.config.dragging_angle_cos,
        ) {
            DragVerdict::Undecided => None,
            DragVerdict::Drag => {
                let (trailing, anchor) = if (second.down_ms, second.id) >= (first.down_ms, first.id) {
                    (second, first)
                } else {
                    (first, second)
                };
                let (drag, down) = DragCoordinator::start(
                    self.display_id,
                    (trailing.id, trailing.position, trailing.raw_position),
                    (anchor.id, anchor.position),
                    now_ms,
                );
                log::debug!(
                    "display {} dragging with pointer {}",
                    self.display_id,
                    trailing.id
                );
                self.drag = Some(drag);
                self.taps.reset();
                context.push(CoreOp::CancelAllTimers);
                self.emit(context, ExplorerOutput::Touch(down));
                Some(Transition(State::dragging()))
            }
            DragVerdict::Independent => {
                let outcome = self.delegate_all(context, now_ms);
                self.emit(context, ExplorerOutput::Touch(self.motion(MotionAction::Move, now_ms)));
                Some(outcome)
            }
        }
    }

    /// Starts forwarding raw touch, replaying the pointers already down.
    fn delegate_all(&mut self, context: &mut DispatchContext, now_ms: u64) -> Outcome<State> {
        log::debug!(
            "display {} delegating {} pointers",
            self.display_id,
            self.pointers.len()
        );
        context.push(CoreOp::CancelAllTimers);
        self.taps.reset();
        self.delegated = true;
        for count in 1..=self.pointers.len() {
            let action = if count == 1 {
                MotionAction::Down
            } else {
                MotionAction::PointerDown(self.pointers[count - 1].id)
            };
            self.emit(
                context,
                ExplorerOutput::Touch(self.motion_with(action, now_ms, &self.pointers[..count])),
            );
        }
        Transition(State::delegating())
    }

    /// Another finger joined before any decision was made.
    fn extra_pointer_down(&mut self, context: &mut DispatchContext, input: &PointerInput) -> Outcome<State> {
        let now_ms = input.sample.receipt_ms;
        let pointer = self.press(&input.sample);
        self.multi_touched = true;
        self.cancel(context, TimerKind::ExplorationDelay);
        self.cancel(context, TimerKind::LongPress);
        self.taps.abandon_primary();
        self.end_gesture_detection(context, now_ms);
        if self.pointers.len() > 2 {
            return self.delegate_all(context, now_ms);
        }
        self.rebase_pointers();
        self.taps.extra_pointer_down(pointer.id, now_ms, pointer.position);
        Transition(State::multi_pointer())
    }

    fn gesture_result(&self) -> GestureResult {
        match self.matcher.classify(&self.path) {
            PathClassification::Gesture(gesture) => {
                GestureResult::Discrete(AccessibilityGestureEvent {
                    gesture,
                    display_id: self.display_id,
                })
            }
            PathClassification::Unrecognized => GestureResult::PathUnrecognized,
        }
    }
}

#[state_machine(initial = "State::idle()")]
impl ExplorerHsm {
    #[state]
    fn idle(&mut self, context: &mut DispatchContext, event: &ExplorerEvent) -> Outcome<State> {
        match event {
            ExplorerEvent::Pointer(input) if input.sample.phase == PointerPhase::Down => {
                self.begin_session(context, input)
            }
            _ => Handled,
        }
    }

    #[state]
    fn undecided(&mut self, context: &mut DispatchContext, event: &ExplorerEvent) -> Outcome<State> {
        match event {
            ExplorerEvent::Pointer(input) => {
                let sample = input.sample;
                let now_ms = sample.receipt_ms;
                match sample.phase {
                    PointerPhase::Down => self.extra_pointer_down(context, input),
                    PointerPhase::Move => {
                        let Some(pointer) = self.update_pointer(&sample) else {
                            return Handled;
                        };
                        if !self.is_primary(pointer.id) {
                            return Handled;
                        }
                        self.primary_target = input.target;
                        self.path.push(pointer.position, now_ms);
                        self.decide_single(context, now_ms, pointer, input.target)
                            .unwrap_or(Handled)
                    }
                    PointerPhase::Up => {
                        let Some(pointer) = self.release(&sample) else {
                            return Handled;
                        };
                        self.cancel(context, TimerKind::ExplorationDelay);
                        if self.multi_touched {
                            return self.finish_session(context, now_ms, GestureResult::Completed);
                        }
                        self.primary_target = input.target;
                        let deadline_ms = self.taps.first_tap(now_ms, pointer.position);
                        self.arm(context, TimerKind::DoubleTap, deadline_ms);
                        Transition(State::tap_pending())
                    }
                    PointerPhase::Cancel => self.abort_session(context, now_ms),
                }
            }
            ExplorerEvent::Timer(due) if due.kind == TimerKind::ExplorationDelay => {
                let Some(pointer) = self.primary_pointer() else {
                    return Handled;
                };
                self.start_exploration(context, due.deadline_ms, pointer.position, self.primary_target);
                Transition(State::exploring())
            }
            ExplorerEvent::Timer(_) => Handled,
            ExplorerEvent::Interrupt { now_ms } => self.abort_session(context, *now_ms),
        }
    }

    #[state]
    fn tap_pending(&mut self, context: &mut DispatchContext, event: &ExplorerEvent) -> Outcome<State> {
        match event {
            ExplorerEvent::Pointer(input) if input.sample.phase == PointerPhase::Down => {
                let now_ms = input.sample.receipt_ms;
                let at = input.sample.position;
                if !self.taps.accepts_second_tap(now_ms, at) {
                    self.flush_tap_exploration(context, now_ms);
                    self.end_session(context, now_ms, GestureResult::Completed);
                    return self.begin_session(context, input);
                }

                self.cancel(context, TimerKind::DoubleTap);
                let pointer = self.press(&input.sample);
                self.primary = Some(pointer.id);
                self.primary_target = input.target;
                self.path.restart(pointer.position, now_ms);
                let deadline_ms = self.taps.second_tap_down(now_ms);
                self.arm(context, TimerKind::LongPress, deadline_ms);
                Transition(State::second_tap())
            }
            ExplorerEvent::Pointer(_) => Handled,
            ExplorerEvent::Timer(due) if due.kind == TimerKind::DoubleTap => {
                self.flush_tap_exploration(context, due.deadline_ms);
                self.finish_session(context, due.deadline_ms, GestureResult::Completed)
            }
            ExplorerEvent::Timer(_) => Handled,
            ExplorerEvent::Interrupt { now_ms } => self.abort_session(context, *now_ms),
        }
    }

    #[state]
    fn second_tap(&mut self, context: &mut DispatchContext, event: &ExplorerEvent) -> Outcome<State> {
        match event {
            ExplorerEvent::Pointer(input) => {
                let sample = input.sample;
                let now_ms = sample.receipt_ms;
                match sample.phase {
                    PointerPhase::Down => self.extra_pointer_down(context, input),
                    PointerPhase::Move => {
                        let Some(pointer) = self.update_pointer(&sample) else {
                            return Handled;
                        };
                        if !self.is_primary(pointer.id) {
                            return Handled;
                        }
                        self.primary_target = input.target;
                        self.path.push(pointer.position, now_ms);
                        if pointer.down_position.distance_to(pointer.position)
                            <= self.config.touch_slop_px
                        {
                            return Handled;
                        }
                        // The second press wandered off: it starts a fresh decision.
                        self.cancel(context, TimerKind::LongPress);
                        self.taps.abandon_primary();
                        self.decide_single(context, now_ms, pointer, input.target)
                            .unwrap_or(Handled)
                    }
                    PointerPhase::Up => {
                        if self.release(&sample).is_none() {
                            return Handled;
                        }
                        self.cancel(context, TimerKind::LongPress);
                        let _ = self.taps.second_tap_up();
                        self.finish_session(context, now_ms, GestureResult::Completed)
                    }
                    PointerPhase::Cancel => self.abort_session(context, now_ms),
                }
            }
            ExplorerEvent::Timer(due) if due.kind == TimerKind::LongPress => {
                if let Some(kind) = self.taps.long_press_elapsed() {
                    context.push(CoreOp::Activate {
                        kind,
                        now_ms: due.deadline_ms,
                    });
                }
                Transition(State::awaiting_release())
            }
            ExplorerEvent::Timer(_) => Handled,
            ExplorerEvent::Interrupt { now_ms } => self.abort_session(context, *now_ms),
        }
    }

    #[state]
    fn exploring(&mut self, context: &mut DispatchContext, event: &ExplorerEvent) -> Outcome<State> {
        match event {
            ExplorerEvent::Pointer(input) => {
                let sample = input.sample;
                let now_ms = sample.receipt_ms;
                match sample.phase {
                    PointerPhase::Down => {
                        let pointer = self.press(&sample);
                        self.multi_touched = true;
                        if self.pointers.len() > 2 {
                            self.end_exploration(context, now_ms);
                            return self.delegate_all(context, now_ms);
                        }
                        self.rebase_pointers();
                        self.taps.extra_pointer_down(pointer.id, now_ms, pointer.position);
                        Handled
                    }
                    PointerPhase::Move => {
                        let Some(pointer) = self.update_pointer(&sample) else {
                            return Handled;
                        };
                        if self.is_primary(pointer.id) {
                            self.primary_target = input.target;
                            self.hover_move(context, now_ms, pointer.position, input.target);
                            return Handled;
                        }
                        if !self.taps.extra_pointer_moved(pointer.id, pointer.position) {
                            return Handled;
                        }
                        self.end_exploration(context, now_ms);
                        self.taps.reset();
                        self.decide_pair(context, now_ms)
                            .unwrap_or(Transition(State::multi_pointer()))
                    }
                    PointerPhase::Up => {
                        let Some(pointer) = self.release(&sample) else {
                            return Handled;
                        };
                        if !self.is_primary(pointer.id) {
                            self.taps.extra_pointer_up(pointer.id, now_ms, pointer.position);
                            return Handled;
                        }
                        self.hover.position = pointer.position;
                        self.end_exploration(context, now_ms);
                        if self.pointers.is_empty() {
                            self.finish_session(context, now_ms, GestureResult::Completed)
                        } else {
                            Transition(State::awaiting_release())
                        }
                    }
                    PointerPhase::Cancel => self.abort_session(context, now_ms),
                }
            }
            ExplorerEvent::Timer(_) => Handled,
            ExplorerEvent::Interrupt { now_ms } => self.abort_session(context, *now_ms),
        }
    }

    #[state]
    fn gesture_detecting(
        &mut self,
        context: &mut DispatchContext,
        event: &ExplorerEvent,
    ) -> Outcome<State> {
        match event {
            ExplorerEvent::Pointer(input) => {
                let sample = input.sample;
                let now_ms = sample.receipt_ms;
                match sample.phase {
                    PointerPhase::Down => self.extra_pointer_down(context, input),
                    PointerPhase::Move => {
                        if let Some(pointer) = self.update_pointer(&sample) {
                            if self.is_primary(pointer.id) {
                                self.primary_target = input.target;
                                self.path.push(pointer.position, now_ms);
                            }
                        }
                        Handled
                    }
                    PointerPhase::Up => {
                        let Some(pointer) = self.release(&sample) else {
                            return Handled;
                        };
                        self.path.push(pointer.position, now_ms);
                        self.end_gesture_detection(context, now_ms);
                        let result = self.gesture_result();
                        self.finish_session(context, now_ms, result)
                    }
                    PointerPhase::Cancel => self.abort_session(context, now_ms),
                }
            }
            ExplorerEvent::Timer(due) if due.kind == TimerKind::GestureTimeout => {
                self.end_gesture_detection(context, due.deadline_ms);
                let Some(pointer) = self.primary_pointer() else {
                    return Handled;
                };
                log::debug!("display {} gesture timed out, exploring", self.display_id);
                self.start_exploration(context, due.deadline_ms, pointer.position, self.primary_target);
                Transition(State::exploring())
            }
            ExplorerEvent::Timer(_) => Handled,
            ExplorerEvent::Interrupt { now_ms } => self.abort_session(context, *now_ms),
        }
    }

    #[state]
    fn multi_pointer(&mut self, context: &mut DispatchContext, event: &ExplorerEvent) -> Outcome<State> {
        match event {
            ExplorerEvent::Pointer(input) => {
                let sample = input.sample;
                let now_ms = sample.receipt_ms;
                match sample.phase {
                    PointerPhase::Down => {
                        let pointer = self.press(&sample);
                        if self.pointers.len() > 2 {
                            return self.delegate_all(context, now_ms);
                        }
                        self.rebase_pointers();
                        self.taps.extra_pointer_down(pointer.id, now_ms, pointer.position);
                        Handled
                    }
                    PointerPhase::Move => {
                        let Some(pointer) = self.update_pointer(&sample) else {
                            return Handled;
                        };
                        if !self.is_primary(pointer.id) {
                            let _ = self.taps.extra_pointer_moved(pointer.id, pointer.position);
                        }
                        self.decide_pair(context, now_ms).unwrap_or(Handled)
                    }
                    PointerPhase::Up => {
                        let Some(pointer) = self.release(&sample) else {
                            return Handled;
                        };
                        if self.is_primary(pointer.id) {
                            self.primary = self.pointers.first().map(|p| p.id);
                            if let Some(promoted) = self.pointers.first() {
                                self.path.restart(promoted.position, now_ms);
                            }
                        } else {
                            self.taps.extra_pointer_up(pointer.id, now_ms, pointer.position);
                        }
                        match self.pointers.len() {
                            0 => self.finish_session(context, now_ms, GestureResult::Completed),
                            1 => {
                                self.rearm_exploration_delay(context, now_ms);
                                Transition(State::undecided())
                            }
                            _ => Handled,
                        }
                    }
                    PointerPhase::Cancel => self.abort_session(context, now_ms),
                }
            }
            ExplorerEvent::Timer(_) => Handled,
            ExplorerEvent::Interrupt { now_ms } => self.abort_session(context, *now_ms),
        }
    }

    #[state]
    fn dragging(&mut self, context: &mut DispatchContext, event: &ExplorerEvent) -> Outcome<State> {
        match event {
            ExplorerEvent::Pointer(input) => {
                let sample = input.sample;
                let now_ms = sample.receipt_ms;
                match sample.phase {
                    PointerPhase::Down => {
                        self.press(&sample);
                        if let Some(drag) = self.drag.take() {
                            self.emit(context, ExplorerOutput::Touch(drag.finish(now_ms)));
                        }
                        self.delegate_all(context, now_ms)
                    }
                    PointerPhase::Move => {
                        let Some(pointer) = self.update_pointer(&sample) else {
                            return Handled;
                        };
                        let moved = self.drag.as_mut().and_then(|drag| {
                            drag.update(pointer.id, pointer.position, pointer.raw_position, now_ms)
                        });
                        if let Some(event) = moved {
                            self.emit(context, ExplorerOutput::Touch(event));
                        }
                        Handled
                    }
                    PointerPhase::Up => {
                        let Some(pointer) = self.release(&sample) else {
                            return Handled;
                        };
                        let Some(mut drag) = self.drag.take() else {
                            return Transition(State::awaiting_release());
                        };
                        if pointer.id != drag.dragging_id() {
                            if drag.tracks(pointer.id) {
                                drag.release_anchor();
                            }
                            self.drag = Some(drag);
                            return Handled;
                        }
                        let up = drag.lift(now_ms, pointer.position, pointer.raw_position);
                        self.emit(context, ExplorerOutput::Touch(up));
                        if self.pointers.is_empty() {
                            self.finish_session(context, now_ms, GestureResult::Completed)
                        } else {
                            Transition(State::awaiting_release())
                        }
                    }
                    PointerPhase::Cancel => self.abort_session(context, now_ms),
                }
            }
            ExplorerEvent::Timer(_) => Handled,
            ExplorerEvent::Interrupt { now_ms } => self.abort_session(context, *now_ms),
        }
    }

    #[state]
    fn delegating(&mut self, context: &mut DispatchContext, event: &ExplorerEvent) -> Outcome<State> {
        match event {
            ExplorerEvent::Pointer(input) => {
                let sample = input.sample;
                let now_ms = sample.receipt_ms;
                match sample.phase {
                    PointerPhase::Down => {
                        let pointer = self.press(&sample);
                        let action = if self.pointers.len() == 1 {
                            MotionAction::Down
                        } else {
                            MotionAction::PointerDown(pointer.id)
                        };
                        self.emit(context, ExplorerOutput::Touch(self.motion(action, now_ms)));
                        Handled
                    }
                    PointerPhase::Move => {
                        if self.update_pointer(&sample).is_some() {
                            self.emit(
                                context,
                                ExplorerOutput::Touch(self.motion(MotionAction::Move, now_ms)),
                            );
                        }
                        Handled
                    }
                    PointerPhase::Up => {
                        if self.update_pointer(&sample).is_none() {
                            return Handled;
                        }
                        let action = if self.pointers.len() == 1 {
                            MotionAction::Up
                        } else {
                            MotionAction::PointerUp(sample.pointer_id)
                        };
                        let event = self.motion(action, now_ms);
                        let _ = self.release(&sample);
                        self.emit(context, ExplorerOutput::Touch(event));
                        if self.pointers.is_empty() {
                            self.delegated = false;
                            self.finish_session(context, now_ms, GestureResult::Completed)
                        } else {
                            Handled
                        }
                    }
                    PointerPhase::Cancel => self.abort_session(context, now_ms),
                }
            }
            ExplorerEvent::Timer(_) => Handled,
            ExplorerEvent::Interrupt { now_ms } => self.abort_session(context, *now_ms),
        }
    }

    #[state]
    fn awaiting_release(
        &mut self,
        context: &mut DispatchContext,
        event: &ExplorerEvent,
    ) -> Outcome<State> {
        match event {
            ExplorerEvent::Pointer(input) => {
                let sample = input.sample;
                match sample.phase {
                    PointerPhase::Down => {
                        self.press(&sample);
                        Handled
                    }
                    PointerPhase::Move => {
                        let _ = self.update_pointer(&sample);
                        Handled
                    }
                    PointerPhase::Up => {
                        let _ = self.release(&sample);
                        if self.pointers.is_empty() {
                            self.finish_session(context, sample.receipt_ms, GestureResult::Completed)
                        } else {
                            Handled
                        }
                    }
                    PointerPhase::Cancel => self.abort_session(context, sample.receipt_ms),
                }
            }
            ExplorerEvent::Timer(_) => Handled,
            ExplorerEvent::Interrupt { now_ms } => self.abort_session(context, *now_ms),
        }
    }
}
