use crate::profile::ATTEMPT_COUNT;
use crate::swap::FileSwapPlan;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_ENCODER: &str = "ffmpeg";
pub const DEFAULT_CODEC: &str = "libx264";
pub const DEFAULT_PRESET: &str = "slower";

/// Knobs for a single shrink run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShrinkConfig {
    /// Stream encoder output to the terminal instead of showing a spinner.
    pub verbose: bool,
    /// Stop after the first attempt whatever its result.
    pub single_attempt: bool,
    /// Upper bound on attempts, clamped to the profile table.
    pub max_attempts: usize,
    /// Emit only the machine-readable summary.
    pub json: bool,
    /// Encoder executable, looked up on PATH.
    pub encoder: String,
    pub codec: String,
    pub preset: String,
    /// Per-attempt limit on the encoder. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl ShrinkConfig {
    /// Whether attempts should show a spinner.
    pub fn spinner(&self) -> bool {
        !self.verbose && !self.json
    }
}

impl Default for ShrinkConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            single_attempt: false,
            max_attempts: ATTEMPT_COUNT,
            json: false,
            encoder: DEFAULT_ENCODER.to_string(),
            codec: DEFAULT_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            timeout: None,
        }
    }
}

/// Everything one run shares between the policy engine and the swap.
#[derive(Debug)]
pub struct RunContext {
    pub config: ShrinkConfig,
    pub plan: FileSwapPlan,
    pub cancel: CancellationToken,
    pub started: Instant,
}

impl RunContext {
    pub fn new(config: ShrinkConfig, source: impl Into<PathBuf>) -> Self {
        Self {
            config,
            plan: FileSwapPlan::new(source),
            cancel: CancellationToken::new(),
            started: Instant::now(),
        }
    }

    pub fn source(&self) -> &std::path::Path {
        &self.plan.original
    }

    pub fn temp_output(&self) -> &std::path::Path {
        &self.plan.temp_output
    }

    /// Attempts this run may make, counting the first.
    pub fn attempt_limit(&self) -> usize {
        if self.config.single_attempt {
            1
        } else {
            self.config.max_attempts.clamp(1, ATTEMPT_COUNT)
        }
    }
}
