//! Running the external encoder for one attempt.

use crate::config::RunContext;
use crate::error::{Result, ShrinkError};
use crate::profile::EncodingAttempt;
use std::ffi::OsString;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Produces the temporary output for one attempt.
///
/// The policy engine measures the file afterwards; an encoder only has to
/// write it to `ctx.temp_output()` or fail.
pub trait Encoder {
    fn encode(
        &mut self,
        ctx: &RunContext,
        attempt: &EncodingAttempt,
    ) -> impl Future<Output = Result<()>>;
}

/// Argument list for one ffmpeg run.
#[derive(Debug, Clone)]
pub struct EncoderArgs {
    input: PathBuf,
    output: PathBuf,
    codec: String,
    preset: String,
    quiet: bool,
}

impl EncoderArgs {
    pub fn new(input: &Path, output: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            codec: crate::config::DEFAULT_CODEC.to_string(),
            preset: crate::config::DEFAULT_PRESET.to_string(),
            quiet: true,
        }
    }

    pub fn with_codec(mut self, codec: &str) -> Self {
        self.codec = codec.to_string();
        self
    }

    pub fn with_preset(mut self, preset: &str) -> Self {
        self.preset = preset.to_string();
        self
    }

    /// Hide the banner and everything below errors.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn build(&self, attempt: &EncodingAttempt) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        // global options go before the input or ffmpeg ignores them
        if self.quiet {
            args.extend(["-hide_banner", "-loglevel", "error"].map(OsString::from));
        }

        let encode: [OsString; 14] = [
            "-i".into(),
            self.input.clone().into_os_string(),
            "-vcodec".into(),
            self.codec.clone().into(),
            "-preset".into(),
            self.preset.clone().into(),
            "-crf".into(),
            attempt.crf.to_string().into(),
            "-r".into(),
            attempt.frame_rate.to_string().into(),
            "-b".into(),
            format!("{}k", attempt.bitrate_kbps).into(),
            "-y".into(),
            self.output.clone().into_os_string(),
        ];
        args.extend(encode);

        args
    }
}

/// ffmpeg found on the search path.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: PathBuf,
}

impl FfmpegEncoder {
    /// Resolve `name` on PATH before any attempt is made.
    pub fn locate(name: &str) -> Result<Self> {
        let program = which::which(name).map_err(|source| ShrinkError::EncoderNotFound {
            name: name.to_string(),
            source,
        })?;
        info!("Found {} at {:?}", name, program);
        Ok(Self { program })
    }
}

enum Waited {
    Exited(io::Result<ExitStatus>),
    Cancelled,
    TimedOut(Duration),
}

impl Encoder for FfmpegEncoder {
    async fn encode(&mut self, ctx: &RunContext, attempt: &EncodingAttempt) -> Result<()> {
        let config = &ctx.config;
        let args = EncoderArgs::new(ctx.source(), ctx.temp_output())
            .with_codec(&config.codec)
            .with_preset(&config.preset)
            .with_quiet(!config.verbose)
            .build(attempt);

        debug!(program = ?self.program, ?args, "spawning encoder");

        let stdout = if config.verbose && !config.json {
            Stdio::inherit()
        } else {
            Stdio::null()
        };
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(ShrinkError::EncoderSpawn)?;

        debug!("Encoder spawned with PID: {:?}", child.id());

        let waited = tokio::select! {
            status = child.wait() => Waited::Exited(status),
            _ = ctx.cancel.cancelled() => Waited::Cancelled,
            limit = deadline(config.timeout) => Waited::TimedOut(limit),
        };

        match waited {
            Waited::Exited(status) => {
                let status = status.map_err(ShrinkError::EncoderSpawn)?;
                if status.success() {
                    Ok(())
                } else if ctx.cancel.is_cancelled() {
                    // Ctrl+C reaches the whole process group, ffmpeg included
                    Err(ShrinkError::Interrupted)
                } else {
                    Err(ShrinkError::EncoderFailed { status })
                }
            }
            Waited::Cancelled => {
                stop(&mut child).await;
                Err(ShrinkError::Interrupted)
            }
            Waited::TimedOut(limit) => {
                stop(&mut child).await;
                Err(ShrinkError::EncoderTimeout(limit))
            }
        }
    }
}

/// Resolves after `limit`, or never.
async fn deadline(limit: Option<Duration>) -> Duration {
    match limit {
        Some(limit) => {
            tokio::time::sleep(limit).await;
            limit
        }
        None => std::future::pending().await,
    }
}

// Kill and reap so nothing is still writing the temp file afterwards.
async fn stop(child: &mut Child) {
    debug!("killing encoder PID {:?}", child.id());
    if let Err(e) = child.kill().await {
        warn!("could not kill encoder: {}", e);
    }
}
