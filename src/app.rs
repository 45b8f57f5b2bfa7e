//! One shrink run from source path to swapped file.

use crate::config::{RunContext, ShrinkConfig};
use crate::encoder::{Encoder, FfmpegEncoder};
use crate::error::{ErrorKind, Result, ShrinkError};
use crate::policy::{decide_policy, size_mb, validate_outcome, PolicyOutcome, Verdict};
use crate::report::{percentage_reduction, Reporter, StatusEvent, Summary};
use crate::swap::RollbackOutcome;
use std::fs;
use std::path::Path;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Size in bytes of the file to shrink. Directories are rejected.
pub fn inspect_source(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).map_err(|source| ShrinkError::SourceMissing {
        path: path.to_path_buf(),
        source,
    })?;
    if metadata.is_dir() {
        return Err(ShrinkError::SourceIsDirectory(path.to_path_buf()));
    }
    Ok(metadata.len())
}

/// Validate the input, find the encoder, and shrink `source` in place while
/// listening for Ctrl+C / SIGTERM.
pub async fn execute<R>(config: ShrinkConfig, source: &Path, reporter: &mut R) -> Result<Summary>
where
    R: Reporter + ?Sized,
{
    let ctx = RunContext::new(config, source);
    let original_bytes = inspect_source(ctx.source())?;
    let mut encoder = FfmpegEncoder::locate(&ctx.config.encoder)?;

    let listener = listen_for_interrupt(ctx.cancel.clone());
    let outcome = shrink(&ctx, original_bytes, &mut encoder, reporter).await;
    listener.abort();
    outcome
}

/// Run the attempt loop and, if the result is acceptable, swap it in.
///
/// Interruption removes the temporary output. A result larger than the
/// original is discarded. Encoder failures leave the output for inspection.
pub async fn shrink<E, R>(
    ctx: &RunContext,
    original_bytes: u64,
    encoder: &mut E,
    reporter: &mut R,
) -> Result<Summary>
where
    E: Encoder,
    R: Reporter + ?Sized,
{
    let original_mb = size_mb(original_bytes);
    info!(source = %ctx.source().display(), original_mb, "starting compression");

    let (outcome, verdict) = match compress(ctx, encoder, reporter, original_bytes).await {
        Ok(checked) => checked,
        Err(err) => return Err(abandon(ctx, reporter, err)),
    };

    if verdict == Verdict::Unchanged {
        reporter.event(&StatusEvent::Unchanged {
            single_attempt: ctx.config.single_attempt,
        });
    }

    let paths = ctx.plan.clone().commit()?;
    let elapsed = ctx.started.elapsed();

    Ok(Summary {
        final_size: outcome.result.output_bytes,
        original_size: original_bytes,
        percentage_reduction: percentage_reduction(original_bytes, outcome.result.output_bytes),
        file_path: paths.compressed,
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        attempts: outcome.attempts_used,
        original_mb,
        final_mb: outcome.result.size_mb,
        backup_path: paths.backup,
    })
}

async fn compress<E, R>(
    ctx: &RunContext,
    encoder: &mut E,
    reporter: &mut R,
    original_bytes: u64,
) -> Result<(PolicyOutcome, Verdict)>
where
    E: Encoder,
    R: Reporter + ?Sized,
{
    let outcome = decide_policy(ctx, encoder, reporter, size_mb(original_bytes)).await?;
    let verdict = validate_outcome(original_bytes, &outcome)?;
    // a signal that lands after the last attempt still aborts before the swap
    if ctx.cancel.is_cancelled() {
        return Err(ShrinkError::Interrupted);
    }
    Ok((outcome, verdict))
}

// Decide what happens to the temporary output when a run fails.
fn abandon<R>(ctx: &RunContext, reporter: &mut R, err: ShrinkError) -> ShrinkError
where
    R: Reporter + ?Sized,
{
    // the encoder may die of the same signal before the token is seen
    let err = if ctx.cancel.is_cancelled() {
        debug!("treating `{}` as interruption", err);
        ShrinkError::Interrupted
    } else {
        err
    };

    match err.kind() {
        ErrorKind::Interruption => {
            let outcome = ctx.plan.rollback();
            reporter.event(&StatusEvent::Interrupted(&outcome));
        }
        ErrorKind::PostCondition => {
            if let RollbackOutcome::Failed(path, e) = ctx.plan.rollback() {
                warn!("could not discard {}: {}", path.display(), e);
            }
        }
        _ => {
            if ctx.temp_output().exists() {
                warn!(
                    "leaving {} in place for inspection",
                    ctx.temp_output().display()
                );
            }
        }
    }
    err
}

/// Cancel `token` on the first Ctrl+C (or SIGTERM on unix).
pub fn listen_for_interrupt(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if wait_for_signal().await {
            info!("interrupt received, stopping");
            token.cancel();
        }
    })
}

// false when no handler could be installed
#[cfg(unix)]
async fn wait_for_signal() -> bool {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                res = tokio::signal::ctrl_c() => ctrl_c_received(res),
                _ = terminate.recv() => true,
            }
        }
        Err(e) => {
            warn!("cannot listen for SIGTERM: {}", e);
            ctrl_c_received(tokio::signal::ctrl_c().await)
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> bool {
    ctrl_c_received(tokio::signal::ctrl_c().await)
}

fn ctrl_c_received(res: std::io::Result<()>) -> bool {
    match res {
        Ok(()) => true,
        Err(e) => {
            debug!("cannot listen for Ctrl+C: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn inspect_rejects_missing_and_directories() {
        let dir = tempdir().unwrap();

        let missing = inspect_source(&dir.path().join("nope.mp4")).unwrap_err();
        assert!(matches!(missing, ShrinkError::SourceMissing { .. }));
        assert_eq!(missing.exit_code(), 2);

        let is_dir = inspect_source(dir.path()).unwrap_err();
        assert!(matches!(is_dir, ShrinkError::SourceIsDirectory(_)));
    }

    #[test]
    fn inspect_returns_size() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.mp4");
        fs::write(&file, vec![0u8; 2048]).unwrap();
        assert_eq!(inspect_source(&file).unwrap(), 2048);
    }

    #[tokio::test]
    async fn listener_can_be_aborted_without_cancelling() {
        let token = CancellationToken::new();
        let handle = listen_for_interrupt(token.clone());
        handle.abort();
        let _ = handle.await;
        assert!(!token.is_cancelled());
    }
}
