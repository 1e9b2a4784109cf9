#![allow(dead_code)]

use touch_explorer::{
    touch::{integration::NodeBounds, stroke::DEFAULT_FRAME_INTERVAL_MS},
    AccessibilityEventType, ExplorerConfig, ExplorerOutput, GestureDescription, GestureResult,
    MotionAction, MotionEvent, NodeId, RawPointerSample, StaticNodeTree, TouchExplorer,
};

pub const INCH_PX: f32 = 420.0;
pub const SCREEN_WIDTH: f32 = 1080.0;
pub const SCREEN_HEIGHT: f32 = 2280.0;
pub const VIEW: NodeId = NodeId(1);

/// Long enough for every timer of a finished gesture to fire.
const SETTLE_MS: u64 = 5_000;

pub fn full_screen() -> NodeBounds {
    NodeBounds::new(0.0, 0.0, SCREEN_WIDTH, SCREEN_HEIGHT)
}

pub struct Harness {
    pub explorer: TouchExplorer,
    pub tree: StaticNodeTree,
    pub outputs: Vec<ExplorerOutput>,
    pub now_ms: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self::on_display(0, ExplorerConfig::default())
    }

    pub fn with_config(config: ExplorerConfig) -> Self {
        Self::on_display(0, config)
    }

    pub fn on_display(display_id: u32, config: ExplorerConfig) -> Self {
        let tree = StaticNodeTree::new().with_node(VIEW, display_id, full_screen());
        Self::with_tree(display_id, config, tree)
    }

    pub fn with_tree(display_id: u32, config: ExplorerConfig, tree: StaticNodeTree) -> Self {
        Self {
            explorer: TouchExplorer::new(display_id, config),
            tree,
            outputs: Vec::new(),
            now_ms: 1_000,
        }
    }

    pub fn focus(&mut self, node: NodeId) {
        self.explorer
            .set_accessibility_focus(node, self.now_ms, &self.tree)
            .expect("node should take accessibility focus");
    }

    /// Records the view taking input focus, as a test does before touching.
    pub fn input_focus(&mut self, node: NodeId) {
        let output = self.explorer.input_focused(node, self.now_ms);
        self.outputs.push(output);
    }

    pub fn send(&mut self, at_ms: u64, samples: &[RawPointerSample]) -> Vec<touch_explorer::TouchError> {
        self.now_ms = self.now_ms.max(at_ms);
        let batch = self.explorer.process(at_ms, samples, &self.tree);
        self.outputs.extend(batch.outputs);
        batch.rejected
    }

    pub fn advance_to(&mut self, at_ms: u64) {
        self.now_ms = self.now_ms.max(at_ms);
        let batch = self.explorer.advance_to(at_ms, &self.tree);
        self.outputs.extend(batch.outputs);
    }

    pub fn interrupt(&mut self) {
        let batch = self.explorer.interrupt(self.now_ms);
        self.outputs.extend(batch.outputs);
    }

    /// Plays the gesture frame by frame starting now, then lets every
    /// pending timer fire.
    pub fn play(&mut self, gesture: &GestureDescription) {
        let base_ms = self.now_ms;
        for frame in gesture.frames(DEFAULT_FRAME_INTERVAL_MS) {
            let at_ms = base_ms + frame.offset_ms;
            let samples: Vec<_> = frame
                .samples
                .iter()
                .map(|sample| RawPointerSample {
                    event_time_ms: at_ms,
                    ..*sample
                })
                .collect();
            let rejected = self.send(at_ms, &samples);
            assert!(rejected.is_empty(), "rejected samples: {rejected:?}");
        }
        self.settle();
    }

    pub fn settle(&mut self) {
        let at_ms = self.now_ms + SETTLE_MS;
        self.advance_to(at_ms);
    }

    pub fn accessibility_types(&self) -> Vec<AccessibilityEventType> {
        self.outputs
            .iter()
            .filter_map(ExplorerOutput::accessibility_type)
            .collect()
    }

    pub fn touch_events(&self) -> Vec<MotionEvent> {
        self.outputs
            .iter()
            .filter_map(|output| match output {
                ExplorerOutput::Touch(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forwarded touch actions with runs of moves collapsed.
    pub fn touch_shape(&self) -> Vec<MotionAction> {
        let mut shape: Vec<MotionAction> = Vec::new();
        for event in self.touch_events() {
            if event.action == MotionAction::Move && shape.last() == Some(&MotionAction::Move) {
                continue;
            }
            shape.push(event.action);
        }
        shape
    }

    pub fn hover_count(&self) -> usize {
        self.outputs
            .iter()
            .filter(|output| matches!(output, ExplorerOutput::Hover(_)))
            .count()
    }

    pub fn session_results(&self) -> Vec<GestureResult> {
        self.outputs
            .iter()
            .filter_map(|output| match output {
                ExplorerOutput::SessionEnd { result, .. } => Some(*result),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.outputs.clear();
    }
}

/// Every interaction opens with `TOUCH_INTERACTION_START`, closes with
/// `TOUCH_INTERACTION_END`, and pairs every bracket in between.
pub fn assert_bracketed(types: &[AccessibilityEventType]) {
    use AccessibilityEventType as A;

    let mut in_session = false;
    let mut open: Vec<AccessibilityEventType> = Vec::new();
    for (idx, kind) in types.iter().copied().enumerate() {
        match kind {
            A::TouchInteractionStart => {
                assert!(!in_session, "nested interaction at {idx}: {types:?}");
                in_session = true;
            }
            A::TouchInteractionEnd => {
                assert!(in_session, "end without start at {idx}: {types:?}");
                assert!(open.is_empty(), "unclosed {open:?} at {idx}: {types:?}");
                in_session = false;
            }
            A::TouchExplorationGestureStart | A::GestureDetectionStart | A::ViewHoverEnter => {
                assert!(in_session, "{kind:?} outside interaction: {types:?}");
                open.push(kind);
            }
            A::TouchExplorationGestureEnd | A::GestureDetectionEnd | A::ViewHoverExit => {
                let opener = match kind {
                    A::TouchExplorationGestureEnd => A::TouchExplorationGestureStart,
                    A::GestureDetectionEnd => A::GestureDetectionStart,
                    _ => A::ViewHoverEnter,
                };
                let pos = open
                    .iter()
                    .rposition(|candidate| *candidate == opener)
                    .unwrap_or_else(|| panic!("{kind:?} without {opener:?}: {types:?}"));
                open.remove(pos);
            }
            _ => {}
        }
    }
    assert!(!in_session, "interaction left open: {types:?}");
}
