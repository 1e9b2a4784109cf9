use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{
    error::SinkError,
    types::{
        AccessibilityEventRecord, AccessibilityEventType, AccessibilityGestureEvent, DisplayId,
        ExplorerOutput, GestureResult, MotionAction, MotionEvent, NodeId, Point,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeAction {
    Click,
    LongClick,
    AccessibilityFocus,
}

/// Externally owned view hierarchy. Nodes are addressed by id only; a node
/// may disappear between two calls.
pub trait NodeTree {
    fn node_at(&self, display_id: DisplayId, position: Point) -> Option<NodeId>;

    fn contains(&self, node: NodeId) -> bool;

    /// Node handles raw touch itself and opts out of exploration.
    fn delegates_touch(&self, _node: NodeId) -> bool {
        false
    }

    /// Returns false when the node rejects the action.
    fn perform_action(&self, node: NodeId, action: NodeAction) -> bool;
}

/// Consumer of everything a display produces.
pub trait OutputSink {
    fn accessibility_event(&mut self, record: &AccessibilityEventRecord) -> Result<(), SinkError>;

    fn touch_event(&mut self, event: &MotionEvent) -> Result<(), SinkError>;

    fn hover_event(&mut self, event: &MotionEvent) -> Result<(), SinkError>;

    fn gesture(&mut self, gesture: &AccessibilityGestureEvent) -> Result<(), SinkError>;
}

/// Hands outputs to the sink in order. Failures are logged and skipped;
/// returns how many deliveries failed.
pub fn deliver_outputs(
    display_id: DisplayId,
    sink: &mut dyn OutputSink,
    outputs: &[ExplorerOutput],
) -> usize {
    let mut failed = 0;
    for output in outputs {
        let delivered = match output {
            ExplorerOutput::Accessibility(record) => sink.accessibility_event(record),
            ExplorerOutput::Touch(event) => sink.touch_event(event),
            ExplorerOutput::Hover(event) => sink.hover_event(event),
            ExplorerOutput::SessionEnd {
                result: GestureResult::Discrete(gesture),
                ..
            } => sink.gesture(gesture),
            ExplorerOutput::SessionEnd { .. } => Ok(()),
        };
        if let Err(err) = delivered {
            failed += 1;
            log::warn!("display {display_id} sink rejected output: {err}");
        }
    }
    failed
}

#[derive(Clone, Debug, PartialEq)]
pub enum LoggedEvent {
    Accessibility(AccessibilityEventRecord),
    Touch(MotionEvent),
    Hover(MotionEvent),
    Gesture(AccessibilityGestureEvent),
}

/// Recording sink. Clones share one log, so a clone can be handed to a
/// worker while this handle is inspected.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<LoggedEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LoggedEvent> {
        self.lock().clone()
    }

    pub fn accessibility_types(&self) -> Vec<AccessibilityEventType> {
        self.lock()
            .iter()
            .filter_map(|entry| match entry {
                LoggedEvent::Accessibility(record) => Some(record.event_type),
                _ => None,
            })
            .collect()
    }

    pub fn touch_events(&self) -> Vec<MotionEvent> {
        self.lock()
            .iter()
            .filter_map(|entry| match entry {
                LoggedEvent::Touch(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn touch_actions(&self) -> Vec<MotionAction> {
        self.touch_events().iter().map(|event| event.action).collect()
    }

    pub fn hover_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|entry| matches!(entry, LoggedEvent::Hover(_)))
            .count()
    }

    pub fn gestures(&self) -> Vec<AccessibilityGestureEvent> {
        self.lock()
            .iter()
            .filter_map(|entry| match entry {
                LoggedEvent::Gesture(gesture) => Some(*gesture),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn record(&self, entry: LoggedEvent) -> Result<(), SinkError> {
        self.lock().push(entry);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LoggedEvent>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OutputSink for EventLog {
    fn accessibility_event(&mut self, record: &AccessibilityEventRecord) -> Result<(), SinkError> {
        self.record(LoggedEvent::Accessibility(*record))
    }

    fn touch_event(&mut self, event: &MotionEvent) -> Result<(), SinkError> {
        self.record(LoggedEvent::Touch(event.clone()))
    }

    fn hover_event(&mut self, event: &MotionEvent) -> Result<(), SinkError> {
        self.record(LoggedEvent::Hover(event.clone()))
    }

    fn gesture(&mut self, gesture: &AccessibilityGestureEvent) -> Result<(), SinkError> {
        self.record(LoggedEvent::Gesture(*gesture))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeBounds {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl NodeBounds {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn contains(&self, position: Point) -> bool {
        position.x >= self.left
            && position.x < self.right
            && position.y >= self.top
            && position.y < self.bottom
    }
}

#[derive(Clone, Copy, Debug)]
struct StaticNode {
    id: NodeId,
    display_id: DisplayId,
    bounds: NodeBounds,
    clickable: bool,
    delegates_touch: bool,
}

/// Fixed set of rectangular nodes; later nodes sit on top. Performed
/// actions are recorded.
#[derive(Debug, Default)]
pub struct StaticNodeTree {
    nodes: Vec<StaticNode>,
    performed: Mutex<Vec<(NodeId, NodeAction)>>,
}

impl StaticNodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, id: NodeId, display_id: DisplayId, bounds: NodeBounds) -> Self {
        self.nodes.push(StaticNode {
            id,
            display_id,
            bounds,
            clickable: true,
            delegates_touch: false,
        });
        self
    }

    /// Node that accepts no click or long click.
    pub fn with_inert_node(mut self, id: NodeId, display_id: DisplayId, bounds: NodeBounds) -> Self {
        self.nodes.push(StaticNode {
            id,
            display_id,
            bounds,
            clickable: false,
            delegates_touch: false,
        });
        self
    }

    pub fn with_delegating_node(mut self, id: NodeId, display_id: DisplayId, bounds: NodeBounds) -> Self {
        self.nodes.push(StaticNode {
            id,
            display_id,
            bounds,
            clickable: true,
            delegates_touch: true,
        });
        self
    }

    /// Drops `id` from the tree, as when a window closes under the finger.
    pub fn remove_node(&mut self, id: NodeId) {
        self.nodes.retain(|node| node.id != id);
    }

    pub fn performed(&self) -> Vec<(NodeId, NodeAction)> {
        self.performed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn find(&self, node: NodeId) -> Option<&StaticNode> {
        self.nodes.iter().find(|candidate| candidate.id == node)
    }
}

impl NodeTree for StaticNodeTree {
    fn node_at(&self, display_id: DisplayId, position: Point) -> Option<NodeId> {
        self.nodes
            .iter()
            .rev()
            .find(|node| node.display_id == display_id && node.bounds.contains(position))
            .map(|node| node.id)
    }

    fn contains(&self, node: NodeId) -> bool {
        self.find(node).is_some()
    }

    fn delegates_touch(&self, node: NodeId) -> bool {
        self.find(node).is_some_and(|node| node.delegates_touch)
    }

    fn perform_action(&self, node: NodeId, action: NodeAction) -> bool {
        let Some(found) = self.find(node) else {
            return false;
        };
        let accepted = match action {
            NodeAction::AccessibilityFocus => true,
            NodeAction::Click | NodeAction::LongClick => found.clickable,
        };
        if accepted {
            self.performed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((node, action));
        }
        accepted
    }
}
