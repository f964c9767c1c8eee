use controller::{SessionConfig, SessionSnapshot, SessionState};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    Started { prompt: String },
    Uploading { frames: usize },
    Pose { prompt: String, step: usize },
    Captured { frames: usize },
    Countdown { seconds: u32 },
}

/// One line per prompt change and per captured frame; the terminal stand-in
/// for the capture screen.
pub fn follow(
    rx: watch::Receiver<SessionSnapshot>,
    config: SessionConfig,
) -> impl Future<Output = ()> + Send {
    let total = config.total_prompts();
    let max_frames = config.max_batch_frames;
    follow_with(rx, move |update| log_update(update, total, max_frames))
}

/// The baseline is taken when this is called, so changes published before
/// the returned future first runs are still reported.
pub fn follow_with<H>(
    mut rx: watch::Receiver<SessionSnapshot>,
    mut on_update: H,
) -> impl Future<Output = ()> + Send
where
    H: FnMut(Update) + Send,
{
    let mut last = rx.borrow_and_update().clone();

    async move {
        while rx.changed().await.is_ok() {
            let snap = rx.borrow_and_update().clone();
            for update in changes(&last, &snap) {
                on_update(update);
            }
            last = snap;
        }
    }
}

fn changes(prev: &SessionSnapshot, next: &SessionSnapshot) -> Vec<Update> {
    if next.state != prev.state {
        return match next.state {
            SessionState::Capturing => vec![Update::Started {
                prompt: next.prompt.clone(),
            }],
            SessionState::Finalizing => vec![Update::Uploading {
                frames: prev.captured_frames,
            }],
            SessionState::Idle => Vec::new(),
        };
    }
    if next.state != SessionState::Capturing {
        return Vec::new();
    }

    let mut updates = Vec::new();
    if next.prompt_index != prev.prompt_index {
        updates.push(Update::Pose {
            prompt: next.prompt.clone(),
            step: next.prompt_index + 1,
        });
    }
    if next.captured_frames != prev.captured_frames {
        updates.push(Update::Captured {
            frames: next.captured_frames,
        });
    }
    if next.countdown_secs != prev.countdown_secs {
        updates.push(Update::Countdown {
            seconds: next.countdown_secs,
        });
    }
    updates
}

fn log_update(update: Update, total: usize, max_frames: usize) {
    match update {
        Update::Started { prompt } => tracing::info!(
            prompt = %prompt,
            step = 1,
            total,
            "Recording started, follow the prompts"
        ),
        Update::Uploading { frames } => tracing::info!(frames, "Uploading frames"),
        Update::Pose { prompt, step } => {
            tracing::info!(prompt = %prompt, step, total, "Next pose")
        }
        Update::Captured { frames } => {
            tracing::info!(captured = frames, max_frames, "Frame captured")
        }
        Update::Countdown { seconds } => tracing::debug!(seconds, "Countdown"),
    }
}
