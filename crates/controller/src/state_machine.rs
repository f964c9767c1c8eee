use crate::errors::StartError;
use crate::ports::SubjectIdentity;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Capturing,
    Finalizing,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Capturing => "capturing",
            SessionState::Finalizing => "finalizing",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub max_batch_frames: usize,
    pub total_prompts: usize,
    pub countdown_secs: u32,
}

/// Everything finalize needs, moved out of the context in one step so that no
/// later tick can touch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeBatch {
    pub epoch: u64,
    pub subject: SubjectIdentity,
    pub paths: Vec<PathBuf>,
    pub dropped_frames: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameDisposition {
    Appended { captured: usize, cap_reached: bool },
    /// The completion belongs to an older session or arrived after capture
    /// ended; the frame is not part of any batch.
    Discarded(PathBuf),
}

/// Session record owned by the controller. Pure state transitions, no I/O and
/// no clocks: the service feeds it timer ticks and acquisition results.
#[derive(Debug)]
pub struct SessionContext {
    limits: SessionLimits,
    state: SessionState,
    epoch: u64,
    prompt_index: usize,
    countdown_secs: u32,
    frame_paths: Vec<PathBuf>,
    dropped_frames: u32,
    acquiring: bool,
    subject: Option<SubjectIdentity>,
}

impl SessionContext {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            limits,
            state: SessionState::Idle,
            epoch: 0,
            prompt_index: 0,
            countdown_secs: limits.countdown_secs,
            frame_paths: Vec::with_capacity(limits.max_batch_frames),
            dropped_frames: 0,
            acquiring: false,
            subject: None,
        }
    }

    pub fn current_state(&self) -> SessionState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn prompt_index(&self) -> usize {
        self.prompt_index
    }

    pub fn countdown_secs(&self) -> u32 {
        self.countdown_secs
    }

    pub fn captured_count(&self) -> usize {
        self.frame_paths.len()
    }

    pub fn dropped_frames(&self) -> u32 {
        self.dropped_frames
    }

    pub fn is_acquiring_frame(&self) -> bool {
        self.acquiring
    }

    pub fn subject(&self) -> Option<&SubjectIdentity> {
        self.subject.as_ref()
    }

    /// Idle -> Capturing. Returns the new session's epoch.
    pub fn begin(&mut self, subject: SubjectIdentity) -> Result<u64, StartError> {
        if self.state != SessionState::Idle {
            return Err(StartError::SessionInProgress(self.state.as_str()));
        }

        self.epoch += 1;
        self.state = SessionState::Capturing;
        self.prompt_index = 0;
        self.countdown_secs = self.limits.countdown_secs;
        self.frame_paths.clear();
        self.dropped_frames = 0;
        self.acquiring = false;
        self.subject = Some(subject);
        Ok(self.epoch)
    }

    /// Claims the acquisition slot for one tick. `None` means skip this tick.
    pub fn begin_acquisition(&mut self) -> Option<u64> {
        if self.acquiring
            || self.state != SessionState::Capturing
            || self.frame_paths.len() >= self.limits.max_batch_frames
        {
            return None;
        }
        self.acquiring = true;
        Some(self.epoch)
    }

    pub fn record_frame(&mut self, epoch: u64, path: PathBuf) -> FrameDisposition {
        if epoch != self.epoch {
            return FrameDisposition::Discarded(path);
        }
        self.acquiring = false;

        if self.state != SessionState::Capturing
            || self.frame_paths.len() >= self.limits.max_batch_frames
        {
            return FrameDisposition::Discarded(path);
        }

        self.frame_paths.push(path);
        let captured = self.frame_paths.len();
        FrameDisposition::Appended {
            captured,
            cap_reached: captured == self.limits.max_batch_frames,
        }
    }

    /// Returns true when the failure counted against the current session.
    pub fn record_failure(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.acquiring = false;

        if self.state != SessionState::Capturing {
            return false;
        }
        self.dropped_frames += 1;
        true
    }

    /// Prompt-rotation tick. Returns the new index when it advanced.
    pub fn advance_prompt(&mut self) -> Option<usize> {
        if self.state != SessionState::Capturing
            || self.prompt_index + 1 >= self.limits.total_prompts
        {
            return None;
        }
        self.prompt_index += 1;
        Some(self.prompt_index)
    }

    /// Countdown tick, wrapping to the full per-prompt duration.
    pub fn tick_countdown(&mut self) -> u32 {
        if self.state == SessionState::Capturing {
            self.countdown_secs = if self.countdown_secs <= 1 {
                self.limits.countdown_secs
            } else {
                self.countdown_secs - 1
            };
        }
        self.countdown_secs
    }

    /// Capturing -> Finalizing. Only the first caller gets the batch.
    pub fn begin_finalize(&mut self) -> Option<FinalizeBatch> {
        if self.state != SessionState::Capturing {
            return None;
        }
        let Some(subject) = self.subject.clone() else {
            self.state = SessionState::Idle;
            return None;
        };
        self.state = SessionState::Finalizing;

        let mut paths = std::mem::take(&mut self.frame_paths);
        paths.truncate(self.limits.max_batch_frames);

        Some(FinalizeBatch {
            epoch: self.epoch,
            subject,
            paths,
            dropped_frames: self.dropped_frames,
        })
    }

    /// Finalizing -> Idle for the given session. Everything resets.
    pub fn finish(&mut self, epoch: u64) -> bool {
        if self.state != SessionState::Finalizing || epoch != self.epoch {
            return false;
        }
        self.state = SessionState::Idle;
        self.prompt_index = 0;
        self.countdown_secs = self.limits.countdown_secs;
        self.frame_paths.clear();
        self.dropped_frames = 0;
        self.acquiring = false;
        self.subject = None;
        true
    }
}
