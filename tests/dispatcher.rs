use std::{sync::Arc, time::Duration};

use touch_explorer::{
    touch::{
        integration::NodeBounds,
        stroke::{double_tap, long_click, swipe},
    },
    AccessibilityEventType as A, DispatchError, DisplayVisibility, EventLog, ExplorerConfig,
    GestureId, GestureResult, NodeAction, NodeId, Point, PointerPhase, RawPointerSample,
    StaticNodeTree, TouchDispatcher, TouchError,
};

const VIEW: NodeId = NodeId(1);
const CENTER: Point = Point::new(540.0, 1140.0);

fn tree() -> Arc<StaticNodeTree> {
    let screen = NodeBounds::new(0.0, 0.0, 1080.0, 2280.0);
    Arc::new(
        StaticNodeTree::new()
            .with_node(VIEW, 0, screen)
            .with_node(VIEW, 1, screen),
    )
}

fn dispatcher_with(tree: &Arc<StaticNodeTree>) -> (TouchDispatcher, EventLog) {
    let mut dispatcher = TouchDispatcher::new(ExplorerConfig::default(), tree.clone());
    let log = EventLog::new();
    dispatcher
        .attach_display(0, log.clone(), DisplayVisibility::Public)
        .expect("display 0 attaches");
    (dispatcher, log)
}

#[tokio::test(start_paused = true)]
async fn injected_swipe_resolves_with_gesture() {
    let (dispatcher, log) = dispatcher_with(&tree());
    let gesture = swipe(0, CENTER, CENTER.offset(420.0, 0.0), 400).expect("valid swipe");

    let result = dispatcher
        .dispatch_gesture(gesture)
        .await
        .expect("dispatch accepted")
        .await
        .expect("worker replies");

    match result {
        GestureResult::Discrete(event) => assert_eq!(event.gesture, GestureId::SwipeRight),
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(log.gestures().len(), 1);
    assert_eq!(
        log.accessibility_types(),
        vec![
            A::TouchInteractionStart,
            A::GestureDetectionStart,
            A::GestureDetectionEnd,
            A::TouchInteractionEnd,
        ]
    );
    dispatcher.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn injected_double_tap_clicks_focus() {
    let tree = tree();
    let (dispatcher, log) = dispatcher_with(&tree);
    dispatcher
        .set_accessibility_focus(0, VIEW)
        .await
        .expect("worker running")
        .expect("node takes focus");

    let result = dispatcher
        .dispatch_gesture(double_tap(0, CENTER).expect("valid double tap"))
        .await
        .expect("dispatch accepted")
        .await
        .expect("worker replies");

    assert_eq!(result, GestureResult::Completed);
    assert_eq!(
        log.accessibility_types(),
        vec![
            A::ViewAccessibilityFocused,
            A::TouchInteractionStart,
            A::TouchInteractionEnd,
            A::ViewClicked,
        ]
    );
    assert!(tree.performed().contains(&(VIEW, NodeAction::Click)));
    dispatcher.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn private_display_cancels_injection() {
    let mut dispatcher = TouchDispatcher::new(ExplorerConfig::default(), tree());
    let log = EventLog::new();
    dispatcher
        .attach_display(1, log.clone(), DisplayVisibility::Private)
        .expect("display 1 attaches");

    let result = dispatcher
        .dispatch_gesture(double_tap(1, CENTER).expect("valid double tap"))
        .await
        .expect("dispatch accepted")
        .await
        .expect("reply sent");

    assert_eq!(result, GestureResult::Cancelled);
    assert!(log.entries().is_empty());
    dispatcher.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unknown_display_is_rejected() {
    let (dispatcher, _log) = dispatcher_with(&tree());

    let err = dispatcher
        .dispatch_gesture(double_tap(9, CENTER).expect("valid double tap"))
        .await
        .expect_err("display 9 is not attached");
    assert_eq!(err, DispatchError::UnknownDisplay(9));

    let err = dispatcher
        .send_samples(9, Vec::new())
        .await
        .expect_err("display 9 is not attached");
    assert_eq!(err, DispatchError::UnknownDisplay(9));
    dispatcher.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn display_attaches_once() {
    let (mut dispatcher, _log) = dispatcher_with(&tree());
    let err = dispatcher
        .attach_display(0, EventLog::new(), DisplayVisibility::Public)
        .expect_err("display 0 is taken");
    assert_eq!(err, DispatchError::DisplayAlreadyAttached(0));
    dispatcher.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn newer_dispatch_cancels_pending_one() {
    let config = ExplorerConfig::default();
    let (dispatcher, _log) = dispatcher_with(&tree());

    let first = dispatcher
        .dispatch_gesture(long_click(0, CENTER, &config).expect("valid long click"))
        .await
        .expect("dispatch accepted");
    let second = dispatcher
        .dispatch_gesture(swipe(0, CENTER, CENTER.offset(0.0, -420.0), 400).expect("valid swipe"))
        .await
        .expect("dispatch accepted");

    assert_eq!(first.await.expect("reply sent"), GestureResult::Cancelled);
    match second.await.expect("reply sent") {
        GestureResult::Discrete(event) => assert_eq!(event.gesture, GestureId::SwipeUp),
        other => panic!("unexpected result {other:?}"),
    }
    dispatcher.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn interrupt_cancels_injection_and_closes_session() {
    let config = ExplorerConfig::default();
    let (dispatcher, log) = dispatcher_with(&tree());

    let pending = dispatcher
        .dispatch_gesture(long_click(0, CENTER, &config).expect("valid long click"))
        .await
        .expect("dispatch accepted");
    tokio::time::sleep(Duration::from_millis(350)).await;
    dispatcher.interrupt(0).await.expect("display attached");

    assert_eq!(pending.await.expect("reply sent"), GestureResult::Cancelled);
    assert_eq!(
        log.accessibility_types(),
        vec![
            A::TouchInteractionStart,
            A::TouchExplorationGestureStart,
            A::ViewHoverEnter,
            A::ViewHoverExit,
            A::TouchExplorationGestureEnd,
            A::TouchInteractionEnd,
        ]
    );
    dispatcher.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn real_samples_drive_exploration_timers() {
    let (dispatcher, log) = dispatcher_with(&tree());
    let down = RawPointerSample::new(0, 0, PointerPhase::Down, CENTER, dispatcher.now_ms());
    dispatcher
        .send_samples(0, vec![down])
        .await
        .expect("display attached");

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
        log.accessibility_types(),
        vec![
            A::TouchInteractionStart,
            A::TouchExplorationGestureStart,
            A::ViewHoverEnter,
        ]
    );

    dispatcher.shutdown().await;
    assert_eq!(log.accessibility_types().last(), Some(&A::TouchInteractionEnd));
}

#[tokio::test(start_paused = true)]
async fn focus_on_missing_node_is_reported() {
    let (dispatcher, log) = dispatcher_with(&tree());

    let focused = dispatcher
        .set_accessibility_focus(0, NodeId(42))
        .await
        .expect("worker running");
    assert_eq!(focused, Err(TouchError::UnknownNode(NodeId(42))));
    assert!(log.entries().is_empty());
    dispatcher.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_injection() {
    let config = ExplorerConfig::default();
    let (dispatcher, _log) = dispatcher_with(&tree());

    let pending = dispatcher
        .dispatch_gesture(long_click(0, CENTER, &config).expect("valid long click"))
        .await
        .expect("dispatch accepted");
    dispatcher.shutdown().await;

    assert_eq!(pending.await.expect("reply sent"), GestureResult::Cancelled);
}
