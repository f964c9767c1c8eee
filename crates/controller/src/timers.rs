use crate::config::SessionConfig;
use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep, interval_at, sleep_until};

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Countdown,
    PromptElapsed,
    Deadline,
    Acquire,
}

/// The four timers of one capture session. They exist together or not at all;
/// dropping the value cancels every one of them.
#[derive(Debug)]
pub struct ActiveTimers {
    countdown: Interval,
    prompt: Interval,
    deadline: Pin<Box<Sleep>>,
    acquisition: Interval,
}

impl ActiveTimers {
    pub fn start(config: &SessionConfig) -> Self {
        let now = Instant::now();

        let mut countdown = interval_at(now + COUNTDOWN_PERIOD, COUNTDOWN_PERIOD);
        countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut prompt = interval_at(now + config.prompt_duration, config.prompt_duration);
        prompt.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip, not burst: a slow acquisition already holds the slot, so
        // catching up on missed ticks would only produce skipped ticks.
        let mut acquisition = interval_at(now + config.settle_delay, config.frame_interval);
        acquisition.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Self {
            countdown,
            prompt,
            deadline: Box::pin(sleep_until(now + config.session_deadline())),
            acquisition,
        }
    }

    /// Waits for whichever timer fires next. The deadline wins ties so a
    /// session never runs a tick past its end.
    pub async fn next(&mut self) -> TimerEvent {
        tokio::select! {
            biased;
            _ = &mut self.deadline => TimerEvent::Deadline,
            _ = self.prompt.tick() => TimerEvent::PromptElapsed,
            _ = self.countdown.tick() => TimerEvent::Countdown,
            _ = self.acquisition.tick() => TimerEvent::Acquire,
        }
    }
}

/// Next event of the running session's timers; never resolves when there is
/// no session.
pub async fn next_timer(timers: &mut Option<ActiveTimers>) -> TimerEvent {
    match timers {
        Some(timers) => timers.next().await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig {
            frame_interval: Duration::from_millis(900),
            prompt_duration: Duration::from_millis(2_000),
            settle_delay: Duration::from_millis(300),
            prompts: vec!["a".into(), "b".into()],
            ..SessionConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_in_schedule_order() {
        let start = Instant::now();
        let mut timers = ActiveTimers::start(&config());

        let mut events = Vec::new();
        loop {
            let event = timers.next().await;
            events.push((event, (Instant::now() - start).as_millis() as u64));
            if event == TimerEvent::Deadline {
                break;
            }
        }

        assert_eq!(events[0], (TimerEvent::Acquire, 300));
        assert_eq!(events[1], (TimerEvent::Countdown, 1_000));
        assert_eq!(events[2], (TimerEvent::Acquire, 1_200));
        assert!(events.contains(&(TimerEvent::PromptElapsed, 2_000)));
        assert_eq!(events.last(), Some(&(TimerEvent::Deadline, 4_000)));
        assert_eq!(
            events
                .iter()
                .filter(|(e, _)| *e == TimerEvent::Deadline)
                .count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn no_timers_never_fire() {
        let mut timers = None;
        let fired =
            tokio::time::timeout(Duration::from_secs(3_600), next_timer(&mut timers)).await;
        assert!(fired.is_err());
    }
}
