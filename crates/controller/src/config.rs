use common::{env_opt, env_or};
use std::time::Duration;

pub const DEFAULT_FACE_PROMPTS: [&str; 6] = [
    "Look straight",
    "Turn left",
    "Turn right",
    "Look up",
    "Look down",
    "Smile",
];

/// Largest batch the recognition service accepts in one submission.
pub const DEFAULT_MAX_BATCH_FRAMES: usize = 20;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub frame_interval: Duration,
    pub prompt_duration: Duration,
    /// Delay before the first acquisition tick so the device can settle.
    pub settle_delay: Duration,
    pub max_batch_frames: usize,
    pub prompts: Vec<String>,
    pub upload_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(900),
            prompt_duration: Duration::from_millis(6_000),
            settle_delay: Duration::from_millis(300),
            max_batch_frames: DEFAULT_MAX_BATCH_FRAMES,
            prompts: DEFAULT_FACE_PROMPTS.iter().map(|p| p.to_string()).collect(),
            upload_timeout: Duration::from_secs(180),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let frame_interval_ms = env_or("FRAME_INTERVAL_MS", 900u64);
        let prompt_duration_ms = env_or("PROMPT_DURATION_MS", 6_000u64);
        let settle_delay_ms = env_or("SETTLE_DELAY_MS", 300u64);
        let upload_timeout_ms = env_or("UPLOAD_TIMEOUT_MS", 180_000u64);
        let max_batch_frames = env_or("MAX_BATCH_FRAMES", DEFAULT_MAX_BATCH_FRAMES);

        let prompts = env_opt("FACE_PROMPTS")
            .map(|raw| {
                raw.split('|')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|p| !p.is_empty())
            .unwrap_or(defaults.prompts);

        let config = Self {
            frame_interval: Duration::from_millis(frame_interval_ms),
            prompt_duration: Duration::from_millis(prompt_duration_ms),
            settle_delay: Duration::from_millis(settle_delay_ms),
            max_batch_frames,
            prompts,
            upload_timeout: Duration::from_millis(upload_timeout_ms),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.frame_interval.is_zero(), "frame interval must be non-zero");
        anyhow::ensure!(!self.prompt_duration.is_zero(), "prompt duration must be non-zero");
        anyhow::ensure!(self.max_batch_frames > 0, "max batch frames must be at least 1");
        anyhow::ensure!(!self.prompts.is_empty(), "at least one face prompt is required");
        Ok(())
    }

    pub fn total_prompts(&self) -> usize {
        self.prompts.len()
    }

    /// Wall-clock length of a session that is neither stopped nor capped.
    pub fn session_deadline(&self) -> Duration {
        self.prompt_duration
            .saturating_mul(self.prompts.len().try_into().unwrap_or(u32::MAX))
    }

    /// Per-prompt countdown shown to the user, in whole seconds (at least 1).
    pub fn prompt_countdown_secs(&self) -> u32 {
        (self.prompt_duration.as_millis() / 1_000).max(1) as u32
    }

    pub fn prompt(&self, index: usize) -> &str {
        self.prompts
            .get(index)
            .or_else(|| self.prompts.last())
            .map(String::as_str)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env() {
        for key in [
            "FRAME_INTERVAL_MS",
            "PROMPT_DURATION_MS",
            "SETTLE_DELAY_MS",
            "UPLOAD_TIMEOUT_MS",
            "MAX_BATCH_FRAMES",
            "FACE_PROMPTS",
        ] {
            unsafe { env::remove_var(key) };
        }
    }

    #[test]
    fn default_deadline_covers_every_prompt() {
        let config = SessionConfig::default();
        assert_eq!(config.total_prompts(), 6);
        assert_eq!(config.session_deadline(), Duration::from_millis(36_000));
        assert_eq!(config.prompt_countdown_secs(), 6);
    }

    #[test]
    fn prompt_lookup_clamps_to_last() {
        let config = SessionConfig::default();
        assert_eq!(config.prompt(0), "Look straight");
        assert_eq!(config.prompt(5), "Smile");
        assert_eq!(config.prompt(99), "Smile");
    }

    #[test]
    fn sub_second_prompt_still_counts_down_from_one() {
        let config = SessionConfig {
            prompt_duration: Duration::from_millis(400),
            ..SessionConfig::default()
        };
        assert_eq!(config.prompt_countdown_secs(), 1);
    }

    #[test]
    #[serial]
    fn from_env_uses_defaults() {
        clear_env();
        let config = SessionConfig::from_env().unwrap();
        assert_eq!(config.frame_interval, Duration::from_millis(900));
        assert_eq!(config.max_batch_frames, 20);
        assert_eq!(config.prompts.len(), 6);
    }

    #[test]
    #[serial]
    fn from_env_reads_overrides() {
        clear_env();
        unsafe {
            env::set_var("FRAME_INTERVAL_MS", "500");
            env::set_var("PROMPT_DURATION_MS", "10000");
            env::set_var("MAX_BATCH_FRAMES", "12");
            env::set_var("FACE_PROMPTS", "Look straight | Blink ||");
        }

        let config = SessionConfig::from_env().unwrap();
        assert_eq!(config.frame_interval, Duration::from_millis(500));
        assert_eq!(config.session_deadline(), Duration::from_millis(20_000));
        assert_eq!(config.max_batch_frames, 12);
        assert_eq!(config.prompts, vec!["Look straight", "Blink"]);
        clear_env();
    }

    #[test]
    #[serial]
    fn from_env_rejects_zero_cap() {
        clear_env();
        unsafe { env::set_var("MAX_BATCH_FRAMES", "0") };
        assert!(SessionConfig::from_env().is_err());
        clear_env();
    }
}
