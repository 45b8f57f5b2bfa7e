use crate::config::{ShrinkConfig, DEFAULT_CODEC, DEFAULT_ENCODER, DEFAULT_PRESET};
use crate::profile::ATTEMPT_COUNT;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Shrink a video in place by re-encoding it with ffmpeg, retrying with
/// harsher settings until the result is smaller than the original.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Video file to shrink. The original is kept as `<name>_original.<ext>`.
    pub input: PathBuf,
    /// Show ffmpeg's own logs instead of a spinner.
    #[arg(long)]
    pub logs: bool,
    /// Make a single attempt whatever its result.
    #[arg(long = "one-try")]
    pub one_try: bool,
    /// Print only a JSON summary on stdout.
    #[arg(long)]
    pub json: bool,
    /// Encoder executable, resolved on PATH.
    #[arg(long, env = "VSHRINK_ENCODER", default_value = DEFAULT_ENCODER)]
    pub encoder: String,
    /// Video codec passed to the encoder.
    #[arg(long, default_value = DEFAULT_CODEC)]
    pub codec: String,
    /// Encoder preset.
    #[arg(long, default_value = DEFAULT_PRESET)]
    pub preset: String,
    /// Most attempts to make, each with a more aggressive profile.
    #[arg(long, default_value_t = ATTEMPT_COUNT as u8, value_parser = clap::value_parser!(u8).range(1..=ATTEMPT_COUNT as i64))]
    pub max_attempts: u8,
    /// Give up on an attempt after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl Cli {
    pub fn config(&self) -> ShrinkConfig {
        ShrinkConfig {
            verbose: self.logs,
            single_attempt: self.one_try,
            max_attempts: usize::from(self.max_attempts),
            json: self.json,
            encoder: self.encoder.clone(),
            codec: self.codec.clone(),
            preset: self.preset.clone(),
            timeout: self.timeout.map(Duration::from_secs),
        }
    }
}
