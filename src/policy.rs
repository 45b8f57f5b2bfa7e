//! The attempt loop: encode, measure, and escalate until the output is
//! small enough or the profiles run out.

use crate::config::RunContext;
use crate::encoder::Encoder;
use crate::error::{Result, ShrinkError};
use crate::profile::EncodingAttempt;
use crate::report::{Reporter, StatusEvent};
use std::fs;
use tracing::{debug, info};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Size in MB, rounded to two decimals.
pub fn size_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}

/// Measured output of one attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionResult {
    pub attempt_index: usize,
    pub output_bytes: u64,
    pub size_mb: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyOutcome {
    pub result: CompressionResult,
    pub attempts_used: usize,
}

/// What the post-loop check concluded about a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Reduced,
    /// Same size as the original; the swap still goes ahead.
    Unchanged,
}

/// Run one encoder pass and measure what it wrote.
pub async fn run_attempt<E, R>(
    ctx: &RunContext,
    encoder: &mut E,
    reporter: &mut R,
    attempt: &EncodingAttempt,
) -> Result<CompressionResult>
where
    E: Encoder,
    R: Reporter + ?Sized,
{
    if ctx.cancel.is_cancelled() {
        return Err(ShrinkError::Interrupted);
    }

    debug!(
        index = attempt.index,
        crf = attempt.crf,
        frame_rate = attempt.frame_rate,
        bitrate_kbps = attempt.bitrate_kbps,
        "starting attempt"
    );
    reporter.event(&StatusEvent::AttemptStarted {
        attempt,
        limit: ctx.attempt_limit(),
    });
    encoder.encode(ctx, attempt).await?;

    let output = ctx.temp_output();
    let output_bytes = fs::metadata(output)
        .map_err(|source| ShrinkError::OutputUnreadable {
            path: output.to_path_buf(),
            source,
        })?
        .len();

    let result = CompressionResult {
        attempt_index: attempt.index,
        output_bytes,
        size_mb: size_mb(output_bytes),
    };
    reporter.event(&StatusEvent::AttemptFinished(&result));
    debug!(index = attempt.index, size_mb = result.size_mb, "attempt finished");
    Ok(result)
}

/// Run attempts until one clears its threshold or the limit is reached.
///
/// Attempt `i` is accepted when its output is at most
/// `original_mb * (1 - 0.05 * i)`, so attempt 0 only fails by not shrinking
/// at all. In single-attempt mode the first result is taken as is.
pub async fn decide_policy<E, R>(
    ctx: &RunContext,
    encoder: &mut E,
    reporter: &mut R,
    original_mb: f64,
) -> Result<PolicyOutcome>
where
    E: Encoder,
    R: Reporter + ?Sized,
{
    let limit = ctx.attempt_limit();
    let mut attempt = EncodingAttempt::first();
    let mut result = run_attempt(ctx, encoder, reporter, &attempt).await?;

    loop {
        let threshold_mb = attempt.acceptance_threshold(original_mb);
        if result.size_mb <= threshold_mb {
            debug!(index = attempt.index, threshold_mb, "size target met");
            break;
        }

        let next = match attempt.escalate() {
            Some(next) if next.index < limit => next,
            _ => {
                info!(
                    attempts = attempt.index + 1,
                    size_mb = result.size_mb,
                    "no attempts left, keeping last result"
                );
                break;
            }
        };

        reporter.event(&StatusEvent::Escalating {
            result: &result,
            threshold_mb,
            next: &next,
        });
        attempt = next;
        result = run_attempt(ctx, encoder, reporter, &attempt).await?;
    }

    Ok(PolicyOutcome {
        attempts_used: result.attempt_index + 1,
        result,
    })
}

/// Reject outputs that grew; flag outputs that did not shrink.
///
/// Compares exact byte counts; rounded MB only drives escalation.
pub fn validate_outcome(original_bytes: u64, outcome: &PolicyOutcome) -> Result<Verdict> {
    let final_bytes = outcome.result.output_bytes;
    if final_bytes > original_bytes {
        Err(ShrinkError::LargerOutput {
            original_mb: size_mb(original_bytes),
            final_mb: outcome.result.size_mb,
        })
    } else if final_bytes == original_bytes {
        Ok(Verdict::Unchanged)
    } else {
        Ok(Verdict::Reduced)
    }
}
