#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};
use tempfile::{tempdir, TempDir};
use vshrink::app::shrink;
use vshrink::profile::EncodingAttempt;
use vshrink::{Encoder, FfmpegEncoder, JsonReporter, RunContext, ShrinkConfig, ShrinkError};

/// Fake ffmpeg: writes `payload` to its last argument, records its pid,
/// then runs `tail`.
fn fake_encoder(dir: &Path, payload: &str, tail: &str) -> (PathBuf, PathBuf) {
    let script = dir.join("fake-ffmpeg");
    let pid_file = dir.join("encoder.pid");
    let body = format!(
        "#!/bin/sh\nfor last; do :; done\nprintf '{payload}' > \"$last\"\necho $$ > '{pid}'\n{tail}\n",
        pid = pid_file.display(),
    );
    fs::write(&script, body).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    (script, pid_file)
}

fn setup(config: ShrinkConfig) -> (TempDir, PathBuf, RunContext) {
    let dir = tempdir().unwrap();
    let source = dir.path().join("clip.mp4");
    fs::write(&source, vec![7u8; 4096]).unwrap();
    let ctx = RunContext::new(config, &source);
    (dir, source, ctx)
}

fn process_alive(pid_file: &Path) -> bool {
    let pid = fs::read_to_string(pid_file).unwrap();
    Command::new("sh")
        .arg("-c")
        .arg(format!("kill -0 {} 2>/dev/null", pid.trim()))
        .status()
        .unwrap()
        .success()
}

async fn wait_for(path: &Path) {
    let started = Instant::now();
    while !path.exists() {
        assert!(started.elapsed() < Duration::from_secs(10), "encoder never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn real_child_output_is_measured_and_swapped() {
    let (dir, source, ctx) = setup(ShrinkConfig::default());
    let (script, _pid) = fake_encoder(dir.path(), "tiny", "exit 0");
    let mut encoder = FfmpegEncoder::locate(script.to_str().unwrap()).unwrap();

    let summary = shrink(&ctx, 4096, &mut encoder, &mut JsonReporter)
        .await
        .unwrap();

    assert_eq!(fs::read(&source).unwrap(), b"tiny");
    assert_eq!(summary.final_size, 4);
    assert_eq!(summary.attempts, 1);
}

#[tokio::test]
async fn nonzero_exit_is_an_encoder_failure() {
    let (dir, _source, ctx) = setup(ShrinkConfig::default());
    let (script, _pid) = fake_encoder(dir.path(), "x", "exit 3");
    let mut encoder = FfmpegEncoder::locate(script.to_str().unwrap()).unwrap();

    let err = encoder
        .encode(&ctx, &EncodingAttempt::first())
        .await
        .unwrap_err();

    assert!(matches!(err, ShrinkError::EncoderFailed { status } if status.code() == Some(3)));
}

#[tokio::test]
async fn cancelling_kills_and_reaps_the_child() {
    let (dir, _source, ctx) = setup(ShrinkConfig::default());
    let (script, pid_file) = fake_encoder(dir.path(), "partial", "exec sleep 30");
    let mut encoder = FfmpegEncoder::locate(script.to_str().unwrap()).unwrap();

    let token = ctx.cancel.clone();
    let watched = pid_file.clone();
    tokio::spawn(async move {
        wait_for(&watched).await;
        token.cancel();
    });

    let started = Instant::now();
    let err = encoder
        .encode(&ctx, &EncodingAttempt::first())
        .await
        .unwrap_err();

    assert!(matches!(err, ShrinkError::Interrupted));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!process_alive(&pid_file));
}

#[tokio::test]
async fn interrupted_run_removes_output_after_child_is_gone() {
    let (dir, source, ctx) = setup(ShrinkConfig::default());
    let (script, pid_file) = fake_encoder(dir.path(), "partial", "exec sleep 30");
    let mut encoder = FfmpegEncoder::locate(script.to_str().unwrap()).unwrap();

    let token = ctx.cancel.clone();
    let watched = pid_file.clone();
    tokio::spawn(async move {
        wait_for(&watched).await;
        token.cancel();
    });

    let err = shrink(&ctx, 4096, &mut encoder, &mut JsonReporter)
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 130);
    assert!(!process_alive(&pid_file));
    assert!(!ctx.temp_output().exists());
    assert_eq!(fs::read(&source).unwrap(), vec![7u8; 4096]);
    assert!(!dir.path().join("clip_original.mp4").exists());
}

#[tokio::test]
async fn slow_encoder_hits_the_timeout() {
    let config = ShrinkConfig {
        timeout: Some(Duration::from_millis(300)),
        ..ShrinkConfig::default()
    };
    let (dir, _source, ctx) = setup(config);
    let (script, pid_file) = fake_encoder(dir.path(), "partial", "exec sleep 30");
    let mut encoder = FfmpegEncoder::locate(script.to_str().unwrap()).unwrap();

    let err = encoder
        .encode(&ctx, &EncodingAttempt::first())
        .await
        .unwrap_err();

    assert!(matches!(err, ShrinkError::EncoderTimeout(limit) if limit == Duration::from_millis(300)));
    assert_eq!(err.exit_code(), 4);
    assert!(!process_alive(&pid_file));
    assert!(!ctx.cancel.is_cancelled());
}
