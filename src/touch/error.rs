use std::{io, path::PathBuf};

use thiserror::Error;

use super::{
    timers::TimerKind,
    types::{DisplayId, NodeId, PointerId, SessionId},
};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TouchError {
    #[error("pointer {pointer_id} is not down on display {display_id}")]
    InvalidPointerReference {
        display_id: DisplayId,
        pointer_id: PointerId,
    },
    #[error("pointer {pointer_id} is already down on display {display_id}")]
    DuplicatePointerDown {
        display_id: DisplayId,
        pointer_id: PointerId,
    },
    #[error("sample for display {actual} routed to display {expected}")]
    DisplayMismatch {
        expected: DisplayId,
        actual: DisplayId,
    },
    #[error("display {display_id} already tracks {capacity} pointers")]
    PointerCapacity {
        display_id: DisplayId,
        capacity: usize,
    },
    #[error("{kind:?} timer of session {session} was cancelled before it fired")]
    TimerRaceDiscarded { session: SessionId, kind: TimerKind },
    #[error("session {session} on display {display_id} was interrupted")]
    InterruptedSession {
        display_id: DisplayId,
        session: SessionId,
    },
    #[error("node {0} is not in the accessibility tree")]
    UnknownNode(NodeId),
    #[error("node {0} rejected the action")]
    ActionRejected(NodeId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GestureBuildError {
    #[error("stroke path must contain at least one point")]
    EmptyPath,
    #[error("stroke duration must be > 0")]
    ZeroDuration,
    #[error("gesture must contain at least one stroke")]
    NoStrokes,
    #[error("gesture exceeds {0} simultaneous strokes")]
    TooManyStrokes(usize),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("sink is closed")]
    Closed,
    #[error("sink rejected output: {0}")]
    Rejected(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("display {0} is not attached")]
    UnknownDisplay(DisplayId),
    #[error("display {0} is already attached")]
    DisplayAlreadyAttached(DisplayId),
    #[error("worker for display {0} has stopped")]
    WorkerStopped(DisplayId),
}
