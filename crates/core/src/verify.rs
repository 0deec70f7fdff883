use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use log::debug;
use tokio::process::Command;

/// Runs full-reference VMAF comparisons through ffmpeg's libvmaf filter.
#[derive(Debug, Clone)]
pub struct Verifier {
    ffmpeg_bin: PathBuf,
}

impl Verifier {
    pub fn new(ffmpeg_bin: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }

    /// Compare an encoded file against its reference and return the
    /// pooled VMAF score (0-100, higher is closer to the reference).
    pub async fn vmaf_score(&self, reference: &Path, encoded: &Path) -> Result<f64> {
        let output = Command::new(&self.ffmpeg_bin)
            .arg("-i")
            .arg(reference)
            .arg("-i")
            .arg(encoded)
            .arg("-filter_complex")
            .arg("[0:v][1:v]libvmaf")
            .arg("-f")
            .arg("null")
            .arg("-")
            .stdin(Stdio::null())
            .output()
            .await
            .context("failed to run ffmpeg for VMAF comparison")?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            bail!(
                "VMAF comparison of {} failed ({}): {}",
                encoded.display(),
                output.status,
                tail(&stderr, 400)
            );
        }

        match parse_vmaf_score(&stderr) {
            Some(score) => {
                debug!("VMAF for {}: {:.2}", encoded.display(), score);
                Ok(score)
            }
            None => bail!(
                "no VMAF score in ffmpeg output for {}",
                encoded.display()
            ),
        }
    }
}

/// Extract the pooled score from libvmaf's log line, e.g.
/// `[Parsed_libvmaf_0 @ 0x...] VMAF score: 95.437651`.
pub fn parse_vmaf_score(text: &str) -> Option<f64> {
    let marker = "VMAF score:";
    let start = text.rfind(marker)? + marker.len();
    let rest = text[start..].trim_start();
    let end = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

fn tail(text: &str, max: usize) -> &str {
    let trimmed = text.trim_end();
    match trimmed.char_indices().nth_back(max.saturating_sub(1)) {
        Some((idx, _)) => &trimmed[idx..],
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vmaf_score() {
        let stderr = "\
            frame= 2400 fps= 48 q=-0.0 Lsize=N/A time=00:01:40.00\n\
            [Parsed_libvmaf_0 @ 0x5595d8] VMAF score: 95.437651\n";
        assert_eq!(parse_vmaf_score(stderr), Some(95.437651));
    }

    #[test]
    fn test_parse_vmaf_score_integer() {
        assert_eq!(parse_vmaf_score("VMAF score: 100"), Some(100.0));
    }

    #[test]
    fn test_parse_vmaf_score_takes_last_occurrence() {
        let stderr = "VMAF score: 12.5\nsecond pass\nVMAF score: 93.2\n";
        assert_eq!(parse_vmaf_score(stderr), Some(93.2));
    }

    #[test]
    fn test_parse_vmaf_score_missing() {
        assert_eq!(parse_vmaf_score("no score here"), None);
        assert_eq!(parse_vmaf_score("VMAF score: "), None);
    }

    #[test]
    fn test_tail_truncates_long_output() {
        let text = "a".repeat(1000);
        assert_eq!(tail(&text, 400).len(), 400);
        assert_eq!(tail("short", 400), "short");
    }
}
