pub mod config;
mod core;
pub mod drag;
pub mod error;
pub mod integration;
pub mod normalize;
pub mod path;
pub mod stroke;
pub mod tap;
pub mod tasks;
pub mod timers;
pub mod types;

use self::{
    config::ExplorerConfig,
    core::{CoreOp, CoreOutput, ExplorerCore, PointerInput},
    error::TouchError,
    integration::{NodeAction, NodeTree},
    normalize::PointerNormalizer,
    tap::ActivationKind,
    timers::TimerQueue,
    types::{
        AccessibilityEventRecord, AccessibilityEventType, DisplayId, ExplorerMode, ExplorerOutput,
        NodeId, RawPointerSample,
    },
};

/// Everything one call into the explorer produced, in emission order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExplorerBatch {
    pub outputs: Vec<ExplorerOutput>,
    pub rejected: Vec<TouchError>,
}

impl ExplorerBatch {
    pub fn accessibility_types(&self) -> Vec<AccessibilityEventType> {
        self.outputs
            .iter()
            .filter_map(ExplorerOutput::accessibility_type)
            .collect()
    }

    pub fn append(&mut self, other: ExplorerBatch) {
        self.outputs.extend(other.outputs);
        self.rejected.extend(other.rejected);
    }
}

/// Touch exploration for one display: normalizes raw samples, runs the
/// interaction state machine, owns its timers and performs activations on
/// the accessibility focus.
pub struct TouchExplorer {
    display_id: DisplayId,
    config: ExplorerConfig,
    normalizer: PointerNormalizer,
    timers: TimerQueue,
    core: ExplorerCore,
    accessibility_focus: Option<NodeId>,
}

impl TouchExplorer {
    pub fn new(display_id: DisplayId, config: ExplorerConfig) -> Self {
        Self {
            display_id,
            config,
            normalizer: PointerNormalizer::new(display_id),
            timers: TimerQueue::new(),
            core: ExplorerCore::new(display_id, config),
            accessibility_focus: None,
        }
    }

    pub fn display_id(&self) -> DisplayId {
        self.display_id
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn mode(&self) -> ExplorerMode {
        self.core.mode()
    }

    pub fn accessibility_focus(&self) -> Option<NodeId> {
        self.accessibility_focus
    }

    /// Earliest armed timer, for the worker's sleep.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// Feeds one batch of raw samples received at `receipt_ms`. Timers due
    /// strictly before the receipt time fire first.
    pub fn process(
        &mut self,
        receipt_ms: u64,
        samples: &[RawPointerSample],
        tree: &dyn NodeTree,
    ) -> ExplorerBatch {
        let normalized = self.normalizer.normalize(receipt_ms, samples);
        let mut batch = ExplorerBatch {
            outputs: Vec::new(),
            rejected: normalized.rejected,
        };

        for sample in normalized.samples {
            if sample.receipt_ms > 0 {
                self.fire_timers(sample.receipt_ms - 1, tree, &mut batch);
            }
            let target = tree.node_at(self.display_id, sample.position);
            let delegates_touch = target.is_some_and(|node| tree.delegates_touch(node));
            let output = self.core.pointer(PointerInput {
                sample,
                target,
                delegates_touch,
            });
            self.apply(output, Some(tree), &mut batch);
        }
        batch
    }

    /// Fires every timer due at or before `now_ms`.
    pub fn advance_to(&mut self, now_ms: u64, tree: &dyn NodeTree) -> ExplorerBatch {
        let mut batch = ExplorerBatch::default();
        self.fire_timers(now_ms, tree, &mut batch);
        batch
    }

    /// Platform interrupt: the open session ends as cancelled and every
    /// pointer is forgotten.
    pub fn interrupt(&mut self, now_ms: u64) -> ExplorerBatch {
        self.normalizer.reset();
        let mut batch = ExplorerBatch::default();
        let output = self.core.interrupt(now_ms);
        self.apply(output, None, &mut batch);
        self.timers.clear();
        batch
    }

    /// Moves accessibility focus to `node`; activations land there.
    pub fn set_accessibility_focus(
        &mut self,
        node: NodeId,
        now_ms: u64,
        tree: &dyn NodeTree,
    ) -> Result<ExplorerOutput, TouchError> {
        if !tree.contains(node) {
            return Err(TouchError::UnknownNode(node));
        }
        if !tree.perform_action(node, NodeAction::AccessibilityFocus) {
            return Err(TouchError::ActionRejected(node));
        }
        self.accessibility_focus = Some(node);
        Ok(self.record(AccessibilityEventType::ViewAccessibilityFocused, now_ms, Some(node)))
    }

    /// Reports that `node` took input focus.
    pub fn input_focused(&self, node: NodeId, now_ms: u64) -> ExplorerOutput {
        self.record(AccessibilityEventType::ViewFocused, now_ms, Some(node))
    }

    fn fire_timers(&mut self, limit_ms: u64, tree: &dyn NodeTree, batch: &mut ExplorerBatch) {
        while let Some(due) = self.timers.pop_due(limit_ms) {
            match due {
                Ok(due) => {
                    let output = self.core.timer(due);
                    self.apply(output, Some(tree), batch);
                }
                Err(err) => log::trace!("display {}: {err}", self.display_id),
            }
        }
    }

    fn apply(&mut self, output: CoreOutput, tree: Option<&dyn NodeTree>, batch: &mut ExplorerBatch) {
        for op in output.ops {
            match op {
                CoreOp::Emit(output) => batch.outputs.push(output),
                CoreOp::ArmTimer {
                    kind,
                    session,
                    deadline_ms,
                } => self.timers.arm(session, kind, deadline_ms),
                CoreOp::CancelTimer(kind) => self.timers.cancel(kind),
                CoreOp::CancelAllTimers => self.timers.cancel_all(),
                CoreOp::Activate { kind, now_ms } => {
                    let Some(tree) = tree else {
                        log::debug!("display {} dropped {kind:?} without node tree", self.display_id);
                        continue;
                    };
                    if let Some(record) = self.activate(kind, now_ms, tree) {
                        batch.outputs.push(record);
                    }
                }
            }
        }
    }

    fn activate(&mut self, kind: ActivationKind, now_ms: u64, tree: &dyn NodeTree) -> Option<ExplorerOutput> {
        let Some(node) = self.accessibility_focus else {
            log::debug!("display {} {kind:?} ignored, nothing focused", self.display_id);
            return None;
        };
        if !tree.contains(node) {
            log::debug!("display {}: {}", self.display_id, TouchError::UnknownNode(node));
            self.accessibility_focus = None;
            return None;
        }
        let (action, event_type) = match kind {
            ActivationKind::Click => (NodeAction::Click, AccessibilityEventType::ViewClicked),
            ActivationKind::LongClick => (NodeAction::LongClick, AccessibilityEventType::ViewLongClicked),
        };
        if !tree.perform_action(node, action) {
            log::debug!("display {}: {}", self.display_id, TouchError::ActionRejected(node));
            return None;
        }
        Some(self.record(event_type, now_ms, Some(node)))
    }

    fn record(&self, event_type: AccessibilityEventType, now_ms: u64, node: Option<NodeId>) -> ExplorerOutput {
        ExplorerOutput::Accessibility(AccessibilityEventRecord {
            event_type,
            display_id: self.display_id,
            event_time_ms: now_ms,
            node,
        })
    }
}
