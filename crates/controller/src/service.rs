use crate::config::SessionConfig;
use crate::errors::{AcquisitionError, SessionError, StartError};
use crate::finalize::{Collaborators, SessionOutcome};
use crate::metrics::SessionMetrics;
use crate::permission::{PermissionGate, PermissionStatus};
use crate::ports::{
    BatchUploader, DraftStore, FileStore, FrameSource, PermissionRequester, SubjectIdentity,
};
use crate::state_machine::{FrameDisposition, SessionContext, SessionLimits, SessionState};
use crate::timers::{ActiveTimers, TimerEvent, next_timer};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, oneshot, watch};

const COMMAND_CAPACITY: usize = 32;

/// The concrete collaborators a controller is built from.
pub struct Ports<F, U, S, D> {
    pub frame_source: F,
    pub uploader: U,
    pub file_store: S,
    pub draft_store: D,
}

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub epoch: u64,
    pub prompt_index: usize,
    pub prompt: String,
    pub countdown_secs: u32,
    /// Successful captures only; failed attempts are in `dropped_frames`.
    pub captured_frames: usize,
    pub dropped_frames: u32,
    pub busy: bool,
    pub camera_ready: bool,
    pub permission: PermissionStatus,
}

/// A session that began. `outcome` resolves once it is back to idle.
#[derive(Debug)]
pub struct Started {
    pub epoch: u64,
    pub outcome: oneshot::Receiver<SessionOutcome>,
}

impl Started {
    /// `None` only if the controller went away mid-session.
    pub async fn wait(self) -> Option<SessionOutcome> {
        self.outcome.await.ok()
    }
}

enum Command {
    Start {
        subject_id: String,
        subject_name: String,
        reply: oneshot::Sender<Result<Started, StartError>>,
    },
    Stop {
        reply: oneshot::Sender<bool>,
    },
    SetCameraReady(bool),
    SetPermission(PermissionStatus),
    Permission {
        reply: oneshot::Sender<PermissionStatus>,
    },
}

enum Event {
    FrameAcquired {
        epoch: u64,
        result: Result<PathBuf, AcquisitionError>,
    },
    Finalized {
        epoch: u64,
        outcome: SessionOutcome,
    },
}

/// Cheap to clone; every clone talks to the same controller.
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl ControllerHandle {
    pub async fn start_session(
        &self,
        subject_id: &str,
        subject_name: &str,
    ) -> Result<Started, StartError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Start {
                subject_id: subject_id.to_string(),
                subject_name: subject_name.to_string(),
                reply,
            })
            .await
            .map_err(|_| StartError::ControllerClosed)?;
        response.await.map_err(|_| StartError::ControllerClosed)?
    }

    /// Ends the running capture early. Returns whether this call was the one
    /// that ended it; a no-op outside capture.
    pub async fn stop_session(&self) -> bool {
        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::Stop { reply }).await.is_err() {
            tracing::debug!("Stop requested after controller shut down");
            return false;
        }
        response.await.unwrap_or(false)
    }

    pub async fn set_camera_ready(&self, ready: bool) {
        if self
            .commands
            .send(Command::SetCameraReady(ready))
            .await
            .is_err()
        {
            tracing::debug!("Camera readiness update after controller shut down");
        }
    }

    pub async fn set_permission(&self, status: PermissionStatus) {
        if self
            .commands
            .send(Command::SetPermission(status))
            .await
            .is_err()
        {
            tracing::debug!("Permission update after controller shut down");
        }
    }

    /// Permission as the controller holds it, after every update sent before
    /// this call. `None` once the controller has shut down.
    pub async fn permission(&self) -> Option<PermissionStatus> {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::Permission { reply }).await.ok()?;
        response.await.ok()
    }

    /// Asks for camera permission unless it is already granted or blocked.
    pub async fn ensure_permission<P: PermissionRequester>(
        &self,
        requester: &P,
    ) -> PermissionStatus {
        let Some(current) = self.permission().await else {
            tracing::debug!("Permission check after controller shut down");
            return self.snapshot().permission;
        };
        match current {
            PermissionStatus::Granted => current,
            PermissionStatus::Blocked => {
                tracing::warn!("Camera permission blocked; it must be enabled in system settings");
                current
            }
            PermissionStatus::NotDetermined | PermissionStatus::Denied => {
                let status = requester.request_camera_permission().await;
                tracing::info!(?status, "Camera permission requested");
                self.set_permission(status).await;
                status
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }
}

/// Capture session controller. Owns the session record and its timers; every
/// command, timer tick and collaborator completion is handled on one task, one
/// at a time.
pub struct CaptureController<F, U, S, D> {
    config: Arc<SessionConfig>,
    ports: Collaborators<F, U, S, D>,
    context: SessionContext,
    timers: Option<ActiveTimers>,
    gate: PermissionGate,
    pending_outcome: Option<oneshot::Sender<SessionOutcome>>,
    commands: mpsc::Receiver<Command>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    snapshot: watch::Sender<SessionSnapshot>,
    metrics: SessionMetrics,
}

impl<F, U, S, D> CaptureController<F, U, S, D>
where
    F: FrameSource,
    U: BatchUploader,
    S: FileStore,
    D: DraftStore,
{
    pub fn new(
        config: SessionConfig,
        ports: Ports<F, U, S, D>,
    ) -> anyhow::Result<(Self, ControllerHandle)> {
        config.validate()?;

        let context = SessionContext::new(SessionLimits {
            max_batch_frames: config.max_batch_frames,
            total_prompts: config.total_prompts(),
            countdown_secs: config.prompt_countdown_secs(),
        });
        let gate = PermissionGate::default();

        let (commands_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot, snapshot_rx) = watch::channel(build_snapshot(&config, &context, &gate));

        let controller = Self {
            config: Arc::new(config),
            ports: Collaborators {
                source: Arc::new(Mutex::new(ports.frame_source)),
                uploader: Arc::new(ports.uploader),
                files: Arc::new(ports.file_store),
                drafts: Arc::new(ports.draft_store),
            },
            context,
            timers: None,
            gate,
            pending_outcome: None,
            commands,
            events_tx,
            events_rx,
            snapshot,
            metrics: SessionMetrics::new("controller"),
        };

        let handle = ControllerHandle {
            commands: commands_tx,
            snapshot: snapshot_rx,
        };
        Ok((controller, handle))
    }

    /// Builds the controller and runs it on the current Tokio runtime.
    pub fn spawn(
        config: SessionConfig,
        ports: Ports<F, U, S, D>,
    ) -> anyhow::Result<ControllerHandle> {
        let (controller, handle) = Self::new(config, ports)?;
        tokio::spawn(controller.run());
        Ok(handle)
    }

    /// Runs until every handle is dropped and any running session has been
    /// finalized.
    pub async fn run(mut self) {
        tracing::info!(
            frame_interval_ms = self.config.frame_interval.as_millis() as u64,
            prompt_duration_ms = self.config.prompt_duration.as_millis() as u64,
            max_batch_frames = self.config.max_batch_frames,
            prompts = self.config.total_prompts(),
            "Capture controller started"
        );

        let mut commands_open = true;

        loop {
            if !commands_open && self.context.current_state() == SessionState::Idle {
                break;
            }

            tokio::select! {
                biased;
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        commands_open = false;
                        self.trigger_finalize("controller shutdown");
                    }
                },
                event = next_timer(&mut self.timers) => self.handle_timer(event),
            }

            self.publish();
        }

        tracing::info!("Capture controller stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start {
                subject_id,
                subject_name,
                reply,
            } => {
                let result = self.start(&subject_id, &subject_name);
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "Capture session not started");
                }
                let _ = reply.send(result);
            }
            Command::Stop { reply } => {
                let _ = reply.send(self.trigger_finalize("manual stop"));
            }
            Command::SetCameraReady(ready) => {
                tracing::debug!(ready, "Camera readiness changed");
                self.gate.set_device_ready(ready);
            }
            Command::SetPermission(status) => {
                tracing::debug!(?status, "Camera permission changed");
                self.gate.set_permission(status);
            }
            Command::Permission { reply } => {
                let _ = reply.send(self.gate.permission());
            }
        }
    }

    fn start(&mut self, subject_id: &str, subject_name: &str) -> Result<Started, StartError> {
        let state = self.context.current_state();
        if state != SessionState::Idle {
            return Err(StartError::SessionInProgress(state.as_str()));
        }
        self.gate.check().map_err(StartError::CameraNotReady)?;
        let subject =
            SubjectIdentity::new(subject_id, subject_name).ok_or(StartError::MissingIdentity)?;

        let epoch = self.context.begin(subject)?;
        self.timers = Some(ActiveTimers::start(&self.config));

        let (outcome_tx, outcome) = oneshot::channel();
        self.pending_outcome = Some(outcome_tx);

        tracing::info!(
            epoch,
            subject_id = subject_id.trim(),
            deadline_ms = self.config.session_deadline().as_millis() as u64,
            "Capture session started"
        );
        Ok(Started { epoch, outcome })
    }

    fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Countdown => {
                self.context.tick_countdown();
            }
            TimerEvent::PromptElapsed => {
                if let Some(index) = self.context.advance_prompt() {
                    tracing::debug!(index, prompt = self.config.prompt(index), "Prompt advanced");
                }
            }
            TimerEvent::Deadline => {
                self.trigger_finalize("deadline elapsed");
            }
            TimerEvent::Acquire => self.acquire_tick(),
        }
    }

    fn acquire_tick(&mut self) {
        let Some(epoch) = self.context.begin_acquisition() else {
            tracing::trace!("Acquisition tick skipped");
            return;
        };

        let source = Arc::clone(&self.ports.source);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let attempt = tokio::spawn(async move {
                let mut source = source.lock().await;
                source.acquire_frame().await
            });
            let result = match attempt.await {
                Ok(result) => result,
                Err(e) => Err(AcquisitionError::TaskFailed(e.to_string())),
            };
            let _ = events.send(Event::FrameAcquired { epoch, result });
        });
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::FrameAcquired {
                epoch,
                result: Ok(path),
            } => match self.context.record_frame(epoch, path) {
                FrameDisposition::Appended {
                    captured,
                    cap_reached,
                } => {
                    self.metrics.frame_captured();
                    tracing::debug!(epoch, captured, "Frame captured");
                    if cap_reached {
                        self.trigger_finalize("batch full");
                    }
                }
                FrameDisposition::Discarded(path) => {
                    tracing::debug!(epoch, path = %path.display(), "Discarding stale frame");
                    let files = Arc::clone(&self.ports.files);
                    tokio::spawn(async move {
                        let _ = files.delete(&path).await;
                    });
                }
            },
            Event::FrameAcquired {
                epoch,
                result: Err(e),
            } => {
                if self.context.record_failure(epoch) {
                    self.metrics.frame_dropped();
                    tracing::warn!(epoch, error = %e, "Frame acquisition failed; continuing");
                } else {
                    tracing::debug!(epoch, error = %e, "Stale acquisition failure ignored");
                }
            }
            Event::Finalized { epoch, outcome } => {
                if !self.context.finish(epoch) {
                    tracing::warn!(epoch, "Finalize completion for an unknown session");
                    return;
                }
                self.metrics.session_finished(outcome.label());
                tracing::info!(
                    epoch,
                    outcome = outcome.label(),
                    "Capture session closed"
                );
                // Idle must be observable before the caller hears the outcome.
                self.publish();
                if let Some(reply) = self.pending_outcome.take() {
                    let _ = reply.send(outcome);
                }
            }
        }
    }

    /// First trigger wins; later ones (and triggers outside capture) are no-ops.
    fn trigger_finalize(&mut self, reason: &'static str) -> bool {
        let Some(batch) = self.context.begin_finalize() else {
            return false;
        };
        self.timers = None;

        tracing::info!(
            epoch = batch.epoch,
            reason,
            frames = batch.paths.len(),
            "Capture stopped"
        );

        let ports = self.ports.clone();
        let config = Arc::clone(&self.config);
        let metrics = self.metrics.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let epoch = batch.epoch;
            let subject = batch.subject.clone();
            let job = tokio::spawn(async move { ports.finalize(batch, &config, &metrics).await });
            let outcome = match job.await {
                Ok(outcome) => outcome,
                Err(e) => SessionOutcome::Failed {
                    subject,
                    error: SessionError::FinalizeFailed(e.to_string()),
                },
            };
            let _ = events.send(Event::Finalized { epoch, outcome });
        });
        true
    }

    fn publish(&self) {
        debug_assert_eq!(
            self.timers.is_some(),
            self.context.current_state() == SessionState::Capturing,
            "timers must run exactly while capturing"
        );
        let next = build_snapshot(&self.config, &self.context, &self.gate);
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

fn build_snapshot(
    config: &SessionConfig,
    context: &SessionContext,
    gate: &PermissionGate,
) -> SessionSnapshot {
    let state = context.current_state();
    SessionSnapshot {
        state,
        epoch: context.epoch(),
        prompt_index: context.prompt_index(),
        prompt: config.prompt(context.prompt_index()).to_string(),
        countdown_secs: context.countdown_secs(),
        captured_frames: context.captured_count(),
        dropped_frames: context.dropped_frames(),
        busy: state == SessionState::Finalizing,
        camera_ready: gate.device_ready(),
        permission: gate.permission(),
    }
}
