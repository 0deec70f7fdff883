use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::command::build_transcode_args;
use crate::config::AppConfig;
use crate::media::MediaFile;
use crate::plan::{plan_file, JobOptions, Preset};
use crate::probe::MediaProbe;
use crate::progress::ProgressTracker;
use crate::verify::Verifier;

/// Terminal status of one encode attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingStatus {
    /// Nothing to do; every stream was already in shape.
    Skipped,
    Success,
    Failed,
    /// Output verified below the VMAF threshold.
    LowQuality,
    /// Output not smaller than the original.
    LargeSize,
}

impl fmt::Display for EncodingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EncodingStatus::Skipped => "skipped",
            EncodingStatus::Success => "success",
            EncodingStatus::Failed => "failed",
            EncodingStatus::LowQuality => "low quality",
            EncodingStatus::LargeSize => "larger than original",
        };
        f.write_str(s)
    }
}

/// Raised when the user interrupts an in-flight encode. The scheduler
/// downcasts to this to stop the whole batch instead of recording a
/// failure.
#[derive(Debug, Error)]
#[error("encoding interrupted")]
pub struct Interrupted;

/// One file's journey from plan to verified replacement.
pub struct EncodeJob {
    media: MediaFile,
    opts: JobOptions,
    cfg: AppConfig,
    probe: MediaProbe,
    verifier: Verifier,
    tmp_path: PathBuf,
    final_path: PathBuf,
    last_score: Option<f64>,
}

const STDERR_TAIL_LINES: usize = 40;

impl EncodeJob {
    pub fn new(media: MediaFile, opts: JobOptions, cfg: &AppConfig) -> Result<Self> {
        let output_dir = match &opts.output_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).with_context(|| {
                    format!("Failed to create output directory {}", dir.display())
                })?;
                dir.clone()
            }
            None => media.parent_dir().to_path_buf(),
        };

        let (crf, preset) = effective_first_stream_params(&media, &opts, cfg);
        let suffix = format!("_{}_crf-{}_preset-{}", opts.codec.produces(), crf, preset);
        let tmp_path = unique_path(&output_dir, media.file_stem(), &suffix, None);
        let final_path = unique_path(&output_dir, media.file_stem(), "", Some(&media.path));

        Ok(Self {
            probe: MediaProbe::new(&cfg.general.ffprobe_bin),
            verifier: Verifier::new(&cfg.general.ffmpeg_bin),
            media,
            opts,
            cfg: cfg.clone(),
            tmp_path,
            final_path,
            last_score: None,
        })
    }

    /// Where the output lives after a successful run.
    pub fn output_path(&self) -> &Path {
        if self.opts.delete_original {
            &self.final_path
        } else {
            &self.tmp_path
        }
    }

    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    /// VMAF score from the verification step, when one ran.
    pub fn last_score(&self) -> Option<f64> {
        self.last_score
    }

    /// Run the encode to completion.
    ///
    /// Returns Ok with a terminal status for all per-file outcomes;
    /// an Err carrying [`Interrupted`] means the user cancelled and
    /// the batch should stop.
    pub async fn run(&mut self) -> Result<EncodingStatus> {
        let plan = plan_file(&self.media, &self.opts, &self.cfg);
        let args = match build_transcode_args(
            &self.media,
            &plan,
            self.opts.codec,
            &self.cfg,
            &self.tmp_path,
        ) {
            Some(args) => args,
            None => {
                info!("{}: already efficient, skipping", self.media.file_name());
                return Ok(EncodingStatus::Skipped);
            }
        };

        debug!("ffmpeg {}", args.join(" "));
        info!(
            "{}: encoding with {}",
            self.media.file_name(),
            self.opts.codec.encoder_name()
        );

        if !self.execute_ffmpeg(&args).await? {
            return Ok(EncodingStatus::Failed);
        }

        if self.opts.verify {
            if let Some(status) = self.verify_output().await? {
                return Ok(status);
            }
        }

        if self.opts.check_size {
            let original = tokio::fs::metadata(&self.media.path).await?.len();
            let encoded = tokio::fs::metadata(&self.tmp_path).await?.len();
            if encoded >= original {
                warn!(
                    "{}: output is {} bytes, original {} bytes, discarding",
                    self.media.file_name(),
                    encoded,
                    original
                );
                self.discard_tmp().await;
                return Ok(EncodingStatus::LargeSize);
            }
        }

        self.replace_original().await
    }

    /// Spawn ffmpeg and stream progress until it exits. Ok(true) on a
    /// clean exit, Ok(false) on a nonzero status, Err on interrupt or
    /// an environment failure.
    async fn execute_ffmpeg(&mut self, args: &[String]) -> Result<bool> {
        let mut child = Command::new(&self.cfg.general.ffmpeg_bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to spawn {}",
                    self.cfg.general.ffmpeg_bin.display()
                )
            })?;

        let stdout = child
            .stdout
            .take()
            .context("ffmpeg stdout was not captured")?;
        let stderr = child.stderr.take();

        // Keep only the tail; a long encode writes a lot of noise
        // before the line that matters.
        let stderr_task = tokio::spawn(async move {
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let mut tracker =
            ProgressTracker::new(self.media.duration(), self.media.total_frames());
        let mut last_logged = 0.0_f64;
        let mut lines = BufReader::new(stdout).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(percent) = tracker.update(&line) {
                            if percent - last_logged >= 1.0 || percent >= 100.0 {
                                last_logged = percent;
                                match tracker.speed() {
                                    Some(speed) => info!(
                                        "{}: {:.1}% (speed {})",
                                        self.media.file_name(), percent, speed
                                    ),
                                    None => info!(
                                        "{}: {:.1}%",
                                        self.media.file_name(), percent
                                    ),
                                }
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("lost ffmpeg progress stream: {}", e);
                        break;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    warn!("interrupt received, stopping {}", self.media.file_name());
                    let _ = child.kill().await;
                    stderr_task.abort();
                    self.discard_tmp().await;
                    return Err(Interrupted.into());
                }
            }
        }

        let status = child.wait().await.context("failed to wait for ffmpeg")?;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            error!(
                "{}: ffmpeg exited with {}\n{}",
                self.media.file_name(),
                status,
                stderr_tail
            );
            self.discard_tmp().await;
            return Ok(false);
        }
        Ok(true)
    }

    /// Post-encode quality gate. Returns Some(status) when the output
    /// was rejected, None when it passed.
    ///
    /// Failures here never delete the temporary output: it may be the
    /// only surviving copy of the work, and the operator can inspect
    /// or rescue it by hand.
    async fn verify_output(&mut self) -> Result<Option<EncodingStatus>> {
        if let Err(e) = self.probe.probe(&self.tmp_path).await {
            error!(
                "{}: encoded output is unreadable ({}), left at {}",
                self.media.file_name(),
                e,
                self.tmp_path.display()
            );
            return Ok(Some(EncodingStatus::Failed));
        }

        let score = match self
            .verifier
            .vmaf_score(&self.media.path, &self.tmp_path)
            .await
        {
            Ok(score) => score,
            Err(e) => {
                error!("{}: verification failed: {:#}", self.media.file_name(), e);
                return Ok(Some(EncodingStatus::Failed));
            }
        };
        self.last_score = Some(score);

        if score < self.opts.delete_threshold {
            warn!(
                "{}: VMAF {:.2} below threshold {:.2}, keeping original \
                 (candidate left at {})",
                self.media.file_name(),
                score,
                self.opts.delete_threshold,
                self.tmp_path.display()
            );
            return Ok(Some(EncodingStatus::LowQuality));
        }
        info!("{}: VMAF {:.2}", self.media.file_name(), score);
        Ok(None)
    }

    async fn replace_original(&self) -> Result<EncodingStatus> {
        if !self.opts.delete_original {
            info!(
                "{}: done, output at {}",
                self.media.file_name(),
                self.tmp_path.display()
            );
            return Ok(EncodingStatus::Success);
        }

        // Same-path replacement: remove the source first so the
        // rename below can take its place.
        if let Err(e) = tokio::fs::remove_file(&self.media.path).await {
            error!(
                "{}: could not remove original ({}), output left at {}",
                self.media.file_name(),
                e,
                self.tmp_path.display()
            );
            return Ok(EncodingStatus::Failed);
        }
        if let Err(e) = tokio::fs::rename(&self.tmp_path, &self.final_path).await {
            error!(
                "{}: original removed but rename failed ({}), output left at {}",
                self.media.file_name(),
                e,
                self.tmp_path.display()
            );
            return Ok(EncodingStatus::Failed);
        }
        info!(
            "{}: replaced with {}",
            self.media.file_name(),
            self.final_path.display()
        );
        Ok(EncodingStatus::Success)
    }

    async fn discard_tmp(&self) {
        match tokio::fs::remove_file(&self.tmp_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "could not remove partial output {}: {}",
                self.tmp_path.display(),
                e
            ),
        }
    }
}

/// Build `{stem}{suffix}.mp4` under `dir`, appending a counter until
/// the name is free. When the candidate equals `replaces` it is kept
/// as-is: an mp4 source that will be deleted can hand its own name to
/// the output.
fn unique_path(dir: &Path, stem: &str, suffix: &str, replaces: Option<&Path>) -> PathBuf {
    let candidate = dir.join(format!("{}{}.mp4", stem, suffix));
    if replaces == Some(candidate.as_path()) {
        return candidate;
    }
    if !candidate.exists() {
        return candidate;
    }
    let mut counter = 1;
    loop {
        let numbered = dir.join(format!("{}{}_{}.mp4", stem, suffix, counter));
        if !numbered.exists() {
            return numbered;
        }
        counter += 1;
    }
}

/// Effective CRF/preset of the first video stream, used only to name
/// the temporary output so reruns with different settings never
/// collide.
fn effective_first_stream_params(
    media: &MediaFile,
    opts: &JobOptions,
    cfg: &AppConfig,
) -> (u32, Preset) {
    let bucket = media
        .video
        .first()
        .map(|s| {
            s.resolution_or_default(
                cfg.general.resolution_tolerance,
                cfg.general.default_resolution,
            )
        })
        .unwrap_or(cfg.general.default_resolution);

    let (table_crf, table_preset) = match opts.codec {
        crate::plan::Codec::Hevc => (
            cfg.hevc.crf.get(bucket),
            Preset::Named(cfg.hevc.preset.get(bucket)),
        ),
        crate::plan::Codec::SvtAv1 => (
            cfg.svt_av1.crf.get(bucket),
            Preset::Speed(cfg.svt_av1.preset.get(bucket)),
        ),
        crate::plan::Codec::LibaomAv1 => (
            cfg.libaom.crf.get(bucket),
            Preset::Speed(cfg.libaom.cpu_used.get(bucket)),
        ),
    };
    (
        opts.codec.clamp_crf(opts.crf.unwrap_or(table_crf)),
        opts.preset.clone().unwrap_or(table_preset),
    )
}
