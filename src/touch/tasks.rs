use std::{collections::HashMap, collections::VecDeque, sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{sleep_until, Instant},
};

use super::{
    config::ExplorerConfig,
    error::{DispatchError, TouchError},
    integration::{deliver_outputs, NodeTree, OutputSink},
    stroke::{GestureDescription, GestureFrame, DEFAULT_FRAME_INTERVAL_MS},
    types::{DisplayId, ExplorerMode, ExplorerOutput, GestureResult, NodeId, RawPointerSample},
    ExplorerBatch, TouchExplorer,
};

const COMMAND_QUEUE_DEPTH: usize = 64;

pub type SharedNodeTree = Arc<dyn NodeTree + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayVisibility {
    Public,
    /// Gesture dispatch is refused.
    Private,
}

enum DisplayCommand {
    Samples(Vec<RawPointerSample>),
    Interrupt,
    Dispatch {
        gesture: GestureDescription,
        reply: oneshot::Sender<GestureResult>,
    },
    Focus {
        node: NodeId,
        reply: oneshot::Sender<Result<(), TouchError>>,
    },
    Shutdown,
}

struct DisplayHandle {
    commands: mpsc::Sender<DisplayCommand>,
    visibility: DisplayVisibility,
    task: JoinHandle<()>,
}

/// Owns one worker task per attached display and routes input, gesture
/// injection and focus changes to it.
pub struct TouchDispatcher {
    config: ExplorerConfig,
    tree: SharedNodeTree,
    origin: Instant,
    displays: HashMap<DisplayId, DisplayHandle>,
}

impl TouchDispatcher {
    pub fn new(config: ExplorerConfig, tree: SharedNodeTree) -> Self {
        Self {
            config,
            tree,
            origin: Instant::now(),
            displays: HashMap::new(),
        }
    }

    /// Milliseconds since the dispatcher was created; the time base of
    /// every worker.
    pub fn now_ms(&self) -> u64 {
        elapsed_ms(self.origin)
    }

    pub fn attach_display<S>(
        &mut self,
        display_id: DisplayId,
        sink: S,
        visibility: DisplayVisibility,
    ) -> Result<(), DispatchError>
    where
        S: OutputSink + Send + 'static,
    {
        if self.displays.contains_key(&display_id) {
            return Err(DispatchError::DisplayAlreadyAttached(display_id));
        }
        let (commands, inbox) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let worker = DisplayWorker {
            explorer: TouchExplorer::new(display_id, self.config),
            tree: Arc::clone(&self.tree),
            sink: Box::new(sink),
            origin: self.origin,
            injection: None,
        };
        let task = tokio::spawn(worker.run(inbox));
        log::debug!("display {display_id} attached ({visibility:?})");
        self.displays.insert(
            display_id,
            DisplayHandle {
                commands,
                visibility,
                task,
            },
        );
        Ok(())
    }

    pub async fn send_samples(
        &self,
        display_id: DisplayId,
        samples: Vec<RawPointerSample>,
    ) -> Result<(), DispatchError> {
        self.send(display_id, DisplayCommand::Samples(samples)).await
    }

    pub async fn interrupt(&self, display_id: DisplayId) -> Result<(), DispatchError> {
        self.send(display_id, DisplayCommand::Interrupt).await
    }

    pub async fn interrupt_all(&self) {
        for (display_id, handle) in &self.displays {
            if handle.commands.send(DisplayCommand::Interrupt).await.is_err() {
                log::warn!("display {display_id} worker stopped before interrupt");
            }
        }
    }

    /// Injects `gesture` on its display. The receiver resolves exactly once
    /// with the result of the session the gesture produced.
    pub async fn dispatch_gesture(
        &self,
        gesture: GestureDescription,
    ) -> Result<oneshot::Receiver<GestureResult>, DispatchError> {
        let display_id = gesture.display_id();
        let handle = self
            .displays
            .get(&display_id)
            .ok_or(DispatchError::UnknownDisplay(display_id))?;

        let (reply, result) = oneshot::channel();
        if handle.visibility == DisplayVisibility::Private {
            log::debug!("display {display_id} is private, gesture cancelled");
            let _ = reply.send(GestureResult::Cancelled);
            return Ok(result);
        }
        handle
            .commands
            .send(DisplayCommand::Dispatch { gesture, reply })
            .await
            .map_err(|_| DispatchError::WorkerStopped(display_id))?;
        Ok(result)
    }

    pub async fn set_accessibility_focus(
        &self,
        display_id: DisplayId,
        node: NodeId,
    ) -> Result<Result<(), TouchError>, DispatchError> {
        let (reply, result) = oneshot::channel();
        self.send(display_id, DisplayCommand::Focus { node, reply })
            .await?;
        result
            .await
            .map_err(|_| DispatchError::WorkerStopped(display_id))
    }

    /// Stops every worker; open sessions end as cancelled.
    pub async fn shutdown(self) {
        for (display_id, handle) in self.displays {
            if handle.commands.send(DisplayCommand::Shutdown).await.is_err() {
                log::warn!("display {display_id} worker already stopped");
            }
            if let Err(err) = handle.task.await {
                log::warn!("display {display_id} worker failed: {err}");
            }
        }
    }

    async fn send(&self, display_id: DisplayId, command: DisplayCommand) -> Result<(), DispatchError> {
        let handle = self
            .displays
            .get(&display_id)
            .ok_or(DispatchError::UnknownDisplay(display_id))?;
        handle
            .commands
            .send(command)
            .await
            .map_err(|_| DispatchError::WorkerStopped(display_id))
    }
}

struct Injection {
    base_ms: u64,
    frames: VecDeque<GestureFrame>,
    reply: oneshot::Sender<GestureResult>,
}

impl Injection {
    fn next_frame_ms(&self) -> Option<u64> {
        self.frames.front().map(|frame| self.base_ms + frame.offset_ms)
    }
}

struct DisplayWorker {
    explorer: TouchExplorer,
    tree: SharedNodeTree,
    sink: Box<dyn OutputSink + Send>,
    origin: Instant,
    injection: Option<Injection>,
}

impl DisplayWorker {
    async fn run(mut self, mut inbox: mpsc::Receiver<DisplayCommand>) {
        let display_id = self.explorer.display_id();
        loop {
            let wake_ms = self.next_wake_ms();
            let wake_at = self.origin + Duration::from_millis(wake_ms.unwrap_or(0));

            let command = tokio::select! {
                biased;
                command = inbox.recv() => match command {
                    Some(command) => Some(command),
                    None => break,
                },
                _ = sleep_until(wake_at), if wake_ms.is_some() => None,
            };

            let now_ms = elapsed_ms(self.origin);
            match command {
                Some(DisplayCommand::Shutdown) => {
                    self.interrupt(now_ms);
                    break;
                }
                Some(command) => self.handle(command, now_ms),
                None => {}
            }
            self.run_due(now_ms);
        }
        log::debug!("display {display_id} worker stopped");
    }

    fn next_wake_ms(&self) -> Option<u64> {
        let frame = self.injection.as_ref().and_then(Injection::next_frame_ms);
        match (self.explorer.next_deadline(), frame) {
            (Some(timer), Some(frame)) => Some(timer.min(frame)),
            (timer, frame) => timer.or(frame),
        }
    }

    fn handle(&mut self, command: DisplayCommand, now_ms: u64) {
        match command {
            DisplayCommand::Samples(samples) => {
                if self.injection.is_some() {
                    log::debug!(
                        "display {} real touch interrupts injected gesture",
                        self.explorer.display_id()
                    );
                    self.interrupt(now_ms);
                }
                let batch = self.explorer.process(now_ms, &samples, self.tree.as_ref());
                self.deliver(batch);
            }
            DisplayCommand::Interrupt => self.interrupt(now_ms),
            DisplayCommand::Dispatch { gesture, reply } => {
                if self.injection.is_some() || self.explorer.mode() != ExplorerMode::Idle {
                    self.interrupt(now_ms);
                }
                self.injection = Some(Injection {
                    base_ms: now_ms,
                    frames: gesture.frames(DEFAULT_FRAME_INTERVAL_MS).into(),
                    reply,
                });
            }
            DisplayCommand::Focus { node, reply } => {
                let focused = self
                    .explorer
                    .set_accessibility_focus(node, now_ms, self.tree.as_ref())
                    .map(|output| {
                        self.deliver(ExplorerBatch {
                            outputs: vec![output],
                            rejected: Vec::new(),
                        })
                    });
                let _ = reply.send(focused);
            }
            DisplayCommand::Shutdown => {}
        }
    }

    /// Plays injected frames and timers due by `now_ms`.
    fn run_due(&mut self, now_ms: u64) {
        while let Some(frame_ms) = self.injection.as_ref().and_then(Injection::next_frame_ms) {
            if frame_ms > now_ms {
                break;
            }
            let Some(frame) = self.injection.as_mut().and_then(|i| i.frames.pop_front()) else {
                break;
            };
            let samples: Vec<RawPointerSample> = frame
                .samples
                .iter()
                .map(|sample| RawPointerSample {
                    event_time_ms: frame_ms,
                    ..*sample
                })
                .collect();
            let batch = self.explorer.process(frame_ms, &samples, self.tree.as_ref());
            self.deliver(batch);
        }

        let batch = self.explorer.advance_to(now_ms, self.tree.as_ref());
        self.deliver(batch);
    }

    fn interrupt(&mut self, now_ms: u64) {
        let batch = self.explorer.interrupt(now_ms);
        self.deliver(batch);
        if let Some(injection) = self.injection.take() {
            let _ = injection.reply.send(GestureResult::Cancelled);
        }
    }

    fn deliver(&mut self, batch: ExplorerBatch) {
        let display_id = self.explorer.display_id();
        deliver_outputs(display_id, self.sink.as_mut(), &batch.outputs);

        let session_result = batch.outputs.iter().find_map(|output| match output {
            ExplorerOutput::SessionEnd { result, .. } => Some(*result),
            _ => None,
        });
        let injection_done = self
            .injection
            .as_ref()
            .is_some_and(|injection| injection.frames.is_empty());
        let result = match session_result {
            Some(result) => Some(result),
            None if injection_done
                && self.explorer.mode() == ExplorerMode::Idle
                && self.explorer.next_deadline().is_none() =>
            {
                Some(GestureResult::Completed)
            }
            None => None,
        };
        if let Some(result) = result {
            if let Some(injection) = self.injection.take() {
                log::debug!("display {display_id} injected gesture resolved: {result:?}");
                let _ = injection.reply.send(result);
            }
        }
    }
}

fn elapsed_ms(origin: Instant) -> u64 {
    Instant::now().saturating_duration_since(origin).as_millis() as u64
}
