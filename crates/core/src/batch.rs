use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use humansize::{format_size, BINARY};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::config::AppConfig;
use crate::job::{EncodeJob, EncodingStatus, Interrupted};
use crate::media::Resolution;
use crate::plan::JobOptions;
use crate::probe::MediaProbe;

/// Container extensions considered for batch processing.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ts", "m2ts", "vob",
    "3gp", "ogv",
];

/// Parse a human size like "100MB", "1.5gb" or "4096" into bytes.
/// Units are powers of 1024.
pub fn parse_size(raw: &str) -> Result<u64> {
    let s = raw.trim().to_lowercase();
    if s.is_empty() {
        bail!("empty size");
    }
    let split = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    let value: f64 = num
        .parse()
        .with_context(|| format!("invalid size number in '{}'", raw))?;
    let multiplier: u64 = match unit.trim() {
        "" | "b" => 1,
        "k" | "kb" => 1 << 10,
        "m" | "mb" => 1 << 20,
        "g" | "gb" => 1 << 30,
        "t" | "tb" => 1 << 40,
        other => bail!("unknown size unit '{}' in '{}'", other, raw),
    };
    Ok((value * multiplier as f64) as u64)
}

/// A queued file descriptor. Stream details are re-probed when the
/// job is dequeued, so a state file written by one run stays valid
/// even when files change in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub path: PathBuf,
    pub size: u64,
}

impl Ord for QueuedJob {
    // Largest file first; ties broken by path so pop order is
    // deterministic.
    fn cmp(&self, other: &Self) -> Ordering {
        self.size
            .cmp(&other.size)
            .then_with(|| other.path.cmp(&self.path))
    }
}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Everything a batch run needs to survive a crash, persisted as JSON
/// after every job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchState {
    pub directory: PathBuf,
    #[serde(default)]
    pub min_size_bytes: u64,
    #[serde(default)]
    pub min_resolution: Option<Resolution>,
    #[serde(default)]
    pub succeeded: BTreeSet<PathBuf>,
    #[serde(default)]
    pub failed: BTreeSet<PathBuf>,
    /// Path -> human-readable reason.
    #[serde(default)]
    pub skipped: BTreeMap<PathBuf, String>,
    /// Files whose encode was rejected by policy (low quality, output
    /// too large). Terminal: re-encoding would hit the same outcome,
    /// so rescans leave them alone.
    #[serde(default)]
    pub rejected: BTreeSet<PathBuf>,
    #[serde(default)]
    pub queue: Vec<QueuedJob>,
    #[serde(default)]
    pub total_original_bytes: u64,
    #[serde(default)]
    pub total_encoded_bytes: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BatchState {
    fn new(directory: PathBuf, min_size_bytes: u64, min_resolution: Option<Resolution>) -> Self {
        Self {
            directory,
            min_size_bytes,
            min_resolution,
            succeeded: BTreeSet::new(),
            failed: BTreeSet::new(),
            skipped: BTreeMap::new(),
            rejected: BTreeSet::new(),
            queue: Vec::new(),
            total_original_bytes: 0,
            total_encoded_bytes: 0,
            updated_at: None,
        }
    }

    /// Whether a path has already reached a terminal outcome and must
    /// not be queued again by a rescan.
    pub fn processed(&self, path: &Path) -> bool {
        self.succeeded.contains(path)
            || self.failed.contains(path)
            || self.rejected.contains(path)
    }
}

/// Whether a persisted state can seed this run without rescanning.
fn can_resume(
    prev: &BatchState,
    directory: &Path,
    min_size_bytes: u64,
    min_resolution: Option<Resolution>,
) -> bool {
    prev.directory == directory
        && prev.min_size_bytes == min_size_bytes
        && prev.min_resolution == min_resolution
        && !prev.queue.is_empty()
}

/// Per-directory state file name, keyed by a short digest of the
/// directory path so unrelated batches never collide.
pub fn state_file_path(state_dir: &Path, directory: &Path) -> PathBuf {
    let digest = Sha256::digest(directory.to_string_lossy().as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    state_dir.join(format!("recode_state_{}.json", &hex[..8]))
}

fn load_state(path: &Path) -> Option<BatchState> {
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("could not read state file {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!(
                "state file {} is unreadable ({}), starting over",
                path.display(),
                e
            );
            None
        }
    }
}

/// Write the state file atomically: a crash mid-write leaves the
/// previous state intact.
fn save_state(path: &Path, state: &mut BatchState) -> Result<()> {
    state.updated_at = Some(Utc::now());
    let json = serde_json::to_string_pretty(state).context("failed to serialize batch state")?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .with_context(|| format!("Failed to write state file {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace state file {}", path.display()))?;
    Ok(())
}

/// Totals for one scheduler run (not the whole lifetime of the
/// directory, which lives in [`BatchState`]).
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchSummary {
    pub queued_at_start: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub low_quality: usize,
    pub large_size: usize,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.skipped + self.low_quality + self.large_size
    }
}

/// Drives a directory's queue to completion, largest files first,
/// checkpointing after every job.
pub struct BatchScheduler {
    cfg: AppConfig,
    opts: JobOptions,
    probe: MediaProbe,
    state_path: PathBuf,
    state: BatchState,
    heap: BinaryHeap<QueuedJob>,
}

impl BatchScheduler {
    pub async fn new(
        directory: PathBuf,
        min_size_bytes: u64,
        min_resolution: Option<Resolution>,
        force_reset: bool,
        opts: JobOptions,
        cfg: AppConfig,
    ) -> Result<Self> {
        let directory = std::fs::canonicalize(&directory)
            .with_context(|| format!("Cannot access directory {}", directory.display()))?;
        let state_path = state_file_path(&cfg.general.state_dir, &directory);
        let probe = MediaProbe::new(&cfg.general.ffprobe_bin);

        let previous = if force_reset {
            if state_path.exists() {
                info!("discarding previous state for {}", directory.display());
            }
            None
        } else {
            load_state(&state_path)
        };

        let mut scheduler = if let Some(prev) = previous
            .filter(|p| can_resume(p, &directory, min_size_bytes, min_resolution))
        {
            info!(
                "resuming batch for {} with {} queued file(s)",
                directory.display(),
                prev.queue.len()
            );
            let heap = prev.queue.iter().cloned().collect();
            Self {
                cfg,
                opts,
                probe,
                state_path,
                state: prev,
                heap,
            }
        } else {
            let mut state = BatchState::new(directory.clone(), min_size_bytes, min_resolution);
            // A changed filter or an exhausted queue means a fresh
            // scan, but files already processed stay processed.
            if let Some(prev) = load_state(&state_path).filter(|_| !force_reset) {
                state.succeeded = prev.succeeded;
                state.failed = prev.failed;
                state.rejected = prev.rejected;
                state.total_original_bytes = prev.total_original_bytes;
                state.total_encoded_bytes = prev.total_encoded_bytes;
                // Rejection reasons survive the rescan so the report
                // stays complete; other skip reasons are recomputed.
                state.skipped = prev
                    .skipped
                    .into_iter()
                    .filter(|(path, _)| state.rejected.contains(path))
                    .collect();
            }
            let mut scheduler = Self {
                cfg,
                opts,
                probe,
                state_path,
                state,
                heap: BinaryHeap::new(),
            };
            scheduler.scan().await?;
            scheduler
        };

        scheduler.checkpoint()?;
        Ok(scheduler)
    }

    pub fn queue_len(&self) -> usize {
        self.heap.len()
    }

    pub fn state(&self) -> &BatchState {
        &self.state
    }

    /// Walk the directory and queue every eligible video file.
    async fn scan(&mut self) -> Result<()> {
        info!("scanning {}", self.state.directory.display());
        let mut candidates = Vec::new();
        for entry in WalkDir::new(&self.state.directory).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("scan error: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let ext = match path.extension().and_then(|e| e.to_str()) {
                Some(e) => e.to_lowercase(),
                None => continue,
            };
            if !VIDEO_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }
            // Leftover encode candidates from a rejected run are not
            // inputs.
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            if stem.contains("_crf-") && stem.contains("_preset-") {
                debug!("ignoring encode artifact {}", path.display());
                continue;
            }
            if self.state.processed(path) {
                continue;
            }
            candidates.push(path.to_path_buf());
        }

        for path in candidates {
            let size = match std::fs::metadata(&path) {
                Ok(m) => m.len(),
                Err(e) => {
                    warn!("cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };
            if size < self.state.min_size_bytes {
                self.state.skipped.insert(
                    path,
                    format!(
                        "below minimum size ({} < {})",
                        format_size(size, BINARY),
                        format_size(self.state.min_size_bytes, BINARY)
                    ),
                );
                continue;
            }
            let media = match self.probe.probe(&path).await {
                Ok(m) => m,
                Err(e) => {
                    debug!("not queuing {}: {}", path.display(), e);
                    self.state.skipped.insert(path, e.to_string());
                    continue;
                }
            };
            if let Some(min) = self.state.min_resolution {
                let best = media.best_resolution(
                    self.cfg.general.resolution_tolerance,
                    self.cfg.general.default_resolution,
                );
                if best < min {
                    self.state
                        .skipped
                        .insert(path, format!("resolution {} below minimum {}", best, min));
                    continue;
                }
            }
            self.heap.push(QueuedJob { path, size });
        }

        info!("queued {} file(s)", self.heap.len());
        Ok(())
    }

    /// Process the queue until it is empty or the user interrupts.
    pub async fn run(&mut self) -> Result<BatchSummary> {
        let mut summary = BatchSummary {
            queued_at_start: self.heap.len(),
            ..Default::default()
        };

        while let Some(queued) = self.heap.pop() {
            info!(
                "next: {} ({}), {} remaining",
                queued.path.display(),
                format_size(queued.size, BINARY),
                self.heap.len()
            );

            let media = match self.probe.probe(&queued.path).await {
                Ok(m) => m,
                Err(e) => {
                    error!("{}: {}", queued.path.display(), e);
                    self.state.failed.insert(queued.path.clone());
                    summary.failed += 1;
                    self.checkpoint()?;
                    continue;
                }
            };

            let mut job = EncodeJob::new(media, self.opts.clone(), &self.cfg)?;
            match job.run().await {
                Ok(EncodingStatus::Success) => {
                    self.state.succeeded.insert(queued.path.clone());
                    self.state.total_original_bytes += queued.size;
                    if let Ok(meta) = tokio::fs::metadata(job.output_path()).await {
                        self.state.total_encoded_bytes += meta.len();
                    }
                    summary.succeeded += 1;
                }
                Ok(EncodingStatus::Failed) => {
                    self.state.failed.insert(queued.path.clone());
                    summary.failed += 1;
                }
                Ok(EncodingStatus::Skipped) => {
                    self.state
                        .skipped
                        .insert(queued.path.clone(), "already in an efficient format".into());
                    summary.skipped += 1;
                }
                Ok(EncodingStatus::LowQuality) => {
                    let reason = match job.last_score() {
                        Some(score) => format!(
                            "VMAF {:.2} below threshold {:.2}",
                            score, self.opts.delete_threshold
                        ),
                        None => "quality below threshold".into(),
                    };
                    self.state.skipped.insert(queued.path.clone(), reason);
                    self.state.rejected.insert(queued.path.clone());
                    summary.low_quality += 1;
                }
                Ok(EncodingStatus::LargeSize) => {
                    self.state.skipped.insert(
                        queued.path.clone(),
                        "encoded output not smaller than original".into(),
                    );
                    self.state.rejected.insert(queued.path.clone());
                    summary.large_size += 1;
                }
                Err(e) if e.is::<Interrupted>() => {
                    // The interrupted file stays queued for next time.
                    self.heap.push(queued);
                    self.checkpoint()?;
                    info!("batch interrupted, {} file(s) left", self.heap.len());
                    return Err(e);
                }
                Err(e) => {
                    error!("{}: {:#}", queued.path.display(), e);
                    self.state.failed.insert(queued.path.clone());
                    summary.failed += 1;
                }
            }
            self.checkpoint()?;
        }

        self.report(&summary);
        Ok(summary)
    }

    fn report(&self, summary: &BatchSummary) {
        // Nothing is dropped silently: every skip reason and every
        // failure makes it into the final report.
        for (path, reason) in &self.state.skipped {
            info!("skipped {}: {}", path.display(), reason);
        }
        for path in &self.state.failed {
            warn!("failed {}", path.display());
        }
        info!(
            "batch finished: {} succeeded, {} failed, {} skipped, \
             {} below quality, {} too large",
            summary.succeeded,
            summary.failed,
            summary.skipped,
            summary.low_quality,
            summary.large_size
        );
        let original = self.state.total_original_bytes;
        let encoded = self.state.total_encoded_bytes;
        if original > 0 && encoded <= original {
            let saved = original - encoded;
            info!(
                "space saved so far: {} ({:.1}% of {})",
                format_size(saved, BINARY),
                saved as f64 / original as f64 * 100.0,
                format_size(original, BINARY)
            );
        }
    }

    /// Persist the current state. A checkpoint that cannot be written
    /// aborts the run; continuing would lose completed work on the
    /// next crash.
    fn checkpoint(&mut self) -> Result<()> {
        if let Some(dir) = self.state_path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory {}", dir.display()))?;
        }
        let mut queue: Vec<QueuedJob> = self.heap.iter().cloned().collect();
        queue.sort_by(|a, b| b.cmp(a));
        self.state.queue = queue;
        save_state(&self.state_path, &mut self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("100MB").unwrap(), 100 * 1024 * 1024);
        assert_eq!(parse_size("1.5gb").unwrap(), (1.5 * 1024.0 * 1024.0 * 1024.0) as u64);
        assert_eq!(parse_size("512 kb").unwrap(), 512 * 1024);
        assert_eq!(parse_size("2tb").unwrap(), 2 << 40);
        assert!(parse_size("").is_err());
        assert!(parse_size("10xb").is_err());
        assert!(parse_size("mb").is_err());
    }

    #[test]
    fn test_queue_orders_largest_first_with_path_tiebreak() {
        let mut heap = BinaryHeap::new();
        heap.push(QueuedJob {
            path: "/v/b.mkv".into(),
            size: 100,
        });
        heap.push(QueuedJob {
            path: "/v/a.mkv".into(),
            size: 100,
        });
        heap.push(QueuedJob {
            path: "/v/c.mkv".into(),
            size: 500,
        });
        assert_eq!(heap.pop().unwrap().path, PathBuf::from("/v/c.mkv"));
        assert_eq!(heap.pop().unwrap().path, PathBuf::from("/v/a.mkv"));
        assert_eq!(heap.pop().unwrap().path, PathBuf::from("/v/b.mkv"));
    }

    #[test]
    fn test_state_file_path_is_stable_and_distinct() {
        let dir = Path::new("/tmp/state");
        let a = state_file_path(dir, Path::new("/videos/a"));
        let b = state_file_path(dir, Path::new("/videos/b"));
        assert_eq!(a, state_file_path(dir, Path::new("/videos/a")));
        assert_ne!(a, b);
        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("recode_state_"));
        assert!(name.ends_with(".json"));
        // 8 hex chars between prefix and extension.
        assert_eq!(name.len(), "recode_state_".len() + 8 + ".json".len());
    }

    #[test]
    fn test_state_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        let mut state = BatchState::new("/videos".into(), 1024, Some(Resolution::R720p));
        state.succeeded.insert("/videos/done.mkv".into());
        state
            .skipped
            .insert("/videos/small.mkv".into(), "below minimum size".into());
        state.rejected.insert("/videos/grainy.mkv".into());
        state.queue.push(QueuedJob {
            path: "/videos/big.mkv".into(),
            size: 5000,
        });
        save_state(&path, &mut state).unwrap();

        let loaded = load_state(&path).unwrap();
        assert_eq!(loaded.directory, PathBuf::from("/videos"));
        assert_eq!(loaded.min_resolution, Some(Resolution::R720p));
        assert!(loaded.succeeded.contains(Path::new("/videos/done.mkv")));
        assert!(loaded.rejected.contains(Path::new("/videos/grainy.mkv")));
        assert_eq!(loaded.queue.len(), 1);
        assert!(loaded.updated_at.is_some());
    }

    #[test]
    fn test_state_tolerates_missing_fields() {
        // A state written by an older build carries only a subset.
        let json = r#"{"directory": "/videos"}"#;
        let state: BatchState = serde_json::from_str(json).unwrap();
        assert_eq!(state.directory, PathBuf::from("/videos"));
        assert!(state.queue.is_empty());
        assert_eq!(state.min_size_bytes, 0);
    }

    #[test]
    fn test_corrupt_state_is_discarded() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_state(&path).is_none());
    }

    use crate::plan::{Codec, JobOptions};

    fn test_config(state_dir: &Path) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.general.state_dir = state_dir.to_path_buf();
        cfg
    }

    #[tokio::test]
    async fn test_min_size_filter_records_reason() {
        let videos = tempfile::tempdir().unwrap();
        let states = tempfile::tempdir().unwrap();
        let small = videos.path().join("small.mkv");
        std::fs::write(&small, vec![0u8; 50 * 1024]).unwrap();

        let scheduler = BatchScheduler::new(
            videos.path().to_path_buf(),
            100 * 1024,
            None,
            false,
            JobOptions::new(Codec::Hevc),
            test_config(states.path()),
        )
        .await
        .unwrap();

        let small = std::fs::canonicalize(&small).unwrap();
        let reason = scheduler.state().skipped.get(&small).expect("skip entry");
        assert!(reason.contains("below minimum size"), "{}", reason);
        assert_eq!(scheduler.queue_len(), 0);
        // The checkpoint landed on disk.
        assert!(state_file_path(states.path(), &scheduler.state().directory).exists());
    }

    #[tokio::test]
    async fn test_rescan_excludes_already_processed_files() {
        let videos = tempfile::tempdir().unwrap();
        let states = tempfile::tempdir().unwrap();
        let done = videos.path().join("done.mkv");
        let fresh = videos.path().join("fresh.mkv");
        std::fs::write(&done, vec![0u8; 10 * 1024]).unwrap();
        std::fs::write(&fresh, vec![0u8; 10 * 1024]).unwrap();

        let dir = std::fs::canonicalize(videos.path()).unwrap();
        let done = std::fs::canonicalize(&done).unwrap();
        let fresh = std::fs::canonicalize(&fresh).unwrap();

        // A previous run finished done.mkv and drained its queue.
        let mut prev = BatchState::new(dir.clone(), 1024, None);
        prev.succeeded.insert(done.clone());
        save_state(&state_file_path(states.path(), &dir), &mut prev).unwrap();

        let scheduler = BatchScheduler::new(
            dir,
            1024,
            None,
            false,
            JobOptions::new(Codec::Hevc),
            test_config(states.path()),
        )
        .await
        .unwrap();

        // The finished file is not reconsidered at all; the other one
        // is either queued or skipped with a probe reason, depending
        // on whether ffprobe is available, but never lost.
        assert!(scheduler.state().succeeded.contains(&done));
        assert!(!scheduler.state().skipped.contains_key(&done));
        let seen = scheduler.queue_len() == 1 || scheduler.state().skipped.contains_key(&fresh);
        assert!(seen);
    }

    #[tokio::test]
    async fn test_rescan_leaves_rejected_files_alone() {
        let videos = tempfile::tempdir().unwrap();
        let states = tempfile::tempdir().unwrap();
        let too_big = videos.path().join("too_big.mkv");
        std::fs::write(&too_big, vec![0u8; 10 * 1024]).unwrap();

        let dir = std::fs::canonicalize(videos.path()).unwrap();
        let too_big = std::fs::canonicalize(&too_big).unwrap();

        // A previous run encoded too_big.mkv, got a larger output, and
        // drained its queue. Re-encoding would hit the same outcome.
        let mut prev = BatchState::new(dir.clone(), 1024, None);
        prev.rejected.insert(too_big.clone());
        prev.skipped.insert(
            too_big.clone(),
            "encoded output not smaller than original".into(),
        );
        save_state(&state_file_path(states.path(), &dir), &mut prev).unwrap();

        let scheduler = BatchScheduler::new(
            dir,
            1024,
            None,
            false,
            JobOptions::new(Codec::Hevc),
            test_config(states.path()),
        )
        .await
        .unwrap();

        assert_eq!(scheduler.queue_len(), 0);
        assert!(scheduler.state().rejected.contains(&too_big));
        // The reason survives the re-scan so the final report still
        // explains why the file was passed over.
        assert_eq!(
            scheduler.state().skipped.get(&too_big).map(String::as_str),
            Some("encoded output not smaller than original")
        );
    }

    #[tokio::test]
    async fn test_force_reset_discards_previous_results() {
        let videos = tempfile::tempdir().unwrap();
        let states = tempfile::tempdir().unwrap();
        let dir = std::fs::canonicalize(videos.path()).unwrap();

        let mut prev = BatchState::new(dir.clone(), 1024, None);
        prev.succeeded.insert(dir.join("gone.mkv"));
        prev.total_original_bytes = 999;
        save_state(&state_file_path(states.path(), &dir), &mut prev).unwrap();

        let scheduler = BatchScheduler::new(
            dir,
            1024,
            None,
            true,
            JobOptions::new(Codec::Hevc),
            test_config(states.path()),
        )
        .await
        .unwrap();

        assert!(scheduler.state().succeeded.is_empty());
        assert_eq!(scheduler.state().total_original_bytes, 0);
    }

    #[test]
    fn test_can_resume_matches_parameters() {
        let mut prev = BatchState::new("/videos".into(), 1024, None);
        prev.queue.push(QueuedJob {
            path: "/videos/a.mkv".into(),
            size: 10,
        });
        assert!(can_resume(&prev, Path::new("/videos"), 1024, None));
        // Any changed filter forces a re-scan.
        assert!(!can_resume(&prev, Path::new("/videos"), 2048, None));
        assert!(!can_resume(
            &prev,
            Path::new("/videos"),
            1024,
            Some(Resolution::R720p)
        ));
        assert!(!can_resume(&prev, Path::new("/other"), 1024, None));
        // An empty queue means there is nothing to resume.
        prev.queue.clear();
        assert!(!can_resume(&prev, Path::new("/videos"), 1024, None));
    }
}
