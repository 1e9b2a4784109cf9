//! Touch exploration and gesture dispatch for accessibility services.
//!
//! Raw multi-pointer input of each display is turned into hover exploration
//! events, discrete path gestures, tap activations of the accessibility
//! focus, or forwarded touch. [`touch::TouchExplorer`] is the synchronous
//! per-display engine; [`touch::tasks::TouchDispatcher`] runs one tokio
//! worker per display on top of it.

pub mod touch;

pub use touch::{
    config::{load_config, parse_config, validate_config, ExplorerConfig},
    error::{ConfigError, DispatchError, GestureBuildError, SinkError, TouchError},
    integration::{deliver_outputs, EventLog, NodeAction, NodeTree, OutputSink, StaticNodeTree},
    stroke::{GestureDescription, StrokeDescription},
    tasks::{DisplayVisibility, TouchDispatcher},
    types::{
        AccessibilityEventRecord, AccessibilityEventType, AccessibilityGestureEvent, ExplorerMode,
        ExplorerOutput, GestureId, GestureResult, MotionAction, MotionEvent, NodeId, Point,
        PointerPhase, RawPointerSample,
    },
    ExplorerBatch, TouchExplorer,
};
