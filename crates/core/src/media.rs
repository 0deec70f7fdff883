use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical resolution buckets used for default parameter lookup.
///
/// Ordering follows pixel area, so buckets can be compared directly
/// when applying a minimum-resolution filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "360p")]
    R360p,
    #[serde(rename = "480p")]
    R480p,
    #[serde(rename = "720p")]
    R720p,
    #[serde(rename = "1080p")]
    R1080p,
    #[serde(rename = "2k")]
    R2k,
    #[serde(rename = "4k")]
    R4k,
}

impl Resolution {
    /// Nominal pixel area of the bucket.
    pub fn pixel_area(&self) -> u64 {
        match self {
            Resolution::R4k => 3840 * 2160,
            Resolution::R2k => 2560 * 1440,
            Resolution::R1080p => 1920 * 1080,
            Resolution::R720p => 1280 * 720,
            Resolution::R480p => 640 * 480,
            Resolution::R360p => 480 * 360,
        }
    }

    /// Buckets from largest to smallest.
    pub fn all() -> [Resolution; 6] {
        [
            Resolution::R4k,
            Resolution::R2k,
            Resolution::R1080p,
            Resolution::R720p,
            Resolution::R480p,
            Resolution::R360p,
        ]
    }

    /// Map a pixel area to its bucket. A stream matches the first
    /// bucket whose area it reaches, within `tolerance` (fractional).
    pub fn from_pixel_area(pixels: u64, tolerance: f64) -> Option<Resolution> {
        for res in Resolution::all() {
            let standard = res.pixel_area() as f64;
            let diff = (pixels as f64 - standard).abs();
            if diff <= standard * tolerance || pixels as f64 >= standard {
                return Some(res);
            }
        }
        None
    }

    pub fn label(&self) -> &'static str {
        match self {
            Resolution::R4k => "4k",
            Resolution::R2k => "2k",
            Resolution::R1080p => "1080p",
            Resolution::R720p => "720p",
            Resolution::R480p => "480p",
            Resolution::R360p => "360p",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "4k" | "2160p" => Ok(Resolution::R4k),
            "2k" | "1440p" => Ok(Resolution::R2k),
            "1080p" => Ok(Resolution::R1080p),
            "720p" => Ok(Resolution::R720p),
            "480p" => Ok(Resolution::R480p),
            "360p" => Ok(Resolution::R360p),
            other => Err(format!(
                "unknown resolution '{}', expected one of: 4k, 2k, 1080p, 720p, 480p, 360p",
                other
            )),
        }
    }
}

/// A usable video stream as reported by the probe.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoStream {
    /// Stream index in the container.
    pub index: u32,
    /// Zero-based index among video streams, as ffmpeg maps them (`0:v:N`).
    pub out_index: usize,
    pub codec: String,
    /// Container codec tag (e.g. "hev1"), when reported.
    pub tag: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    pub pix_fmt: Option<String>,
}

impl VideoStream {
    /// Resolve this stream's resolution bucket, falling back to
    /// `default` when dimensions are unknown or fit no bucket.
    pub fn resolution_or_default(&self, tolerance: f64, default: Resolution) -> Resolution {
        match (self.width, self.height) {
            (Some(w), Some(h)) => {
                Resolution::from_pixel_area(w as u64 * h as u64, tolerance).unwrap_or(default)
            }
            _ => default,
        }
    }

    /// Mapping prefix for this stream: `-map 0:v:<out> -c:v:<new>`.
    pub fn map_args(&self, new_index: usize) -> Vec<String> {
        vec![
            "-map".to_string(),
            format!("0:v:{}", self.out_index),
            format!("-c:v:{}", new_index),
        ]
    }
}

/// An audio stream as reported by the probe.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioStream {
    pub codec: Option<String>,
    /// Zero-based index among audio streams (`0:a:N`).
    pub out_index: usize,
    /// Stream index in the container.
    pub index: u32,
    /// Bit rate in bits per second.
    pub bit_rate: Option<u64>,
    pub sample_rate: Option<u32>,
}

impl AudioStream {
    pub fn map_args(&self, new_index: usize) -> Vec<String> {
        vec![
            "-map".to_string(),
            format!("0:a:{}", self.out_index),
            format!("-c:a:{}", new_index),
        ]
    }
}

/// A media file with at least one usable video stream.
///
/// Constructed by the probe when a file is dequeued (or when a fresh
/// encode output is verified) and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub path: PathBuf,
    pub video: Vec<VideoStream>,
    pub audio: Vec<AudioStream>,
}

impl MediaFile {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("<non-utf8>")
    }

    pub fn file_stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("output")
    }

    /// Duration of the first video stream, when known.
    pub fn duration(&self) -> Option<f64> {
        self.video.first().and_then(|v| v.duration)
    }

    /// Estimated total frame count of the first video stream.
    pub fn total_frames(&self) -> Option<u64> {
        let stream = self.video.first()?;
        let duration = stream.duration?;
        let rate = stream.frame_rate?;
        if duration <= 0.0 || rate <= 0.0 {
            return None;
        }
        Some((duration * rate).round() as u64)
    }

    /// The highest resolution bucket across all video streams.
    pub fn best_resolution(&self, tolerance: f64, default: Resolution) -> Resolution {
        self.video
            .iter()
            .map(|v| v.resolution_or_default(tolerance, default))
            .max()
            .unwrap_or(default)
    }

    pub fn parent_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn stream(width: u32, height: u32) -> VideoStream {
        VideoStream {
            index: 0,
            out_index: 0,
            codec: "h264".to_string(),
            tag: None,
            width: Some(width),
            height: Some(height),
            frame_rate: Some(24.0),
            duration: Some(600.0),
            pix_fmt: Some("yuv420p".to_string()),
        }
    }

    #[test]
    fn test_exact_resolutions_bucket() {
        let cases = [
            (3840, 2160, Resolution::R4k),
            (2560, 1440, Resolution::R2k),
            (1920, 1080, Resolution::R1080p),
            (1280, 720, Resolution::R720p),
            (640, 480, Resolution::R480p),
            (480, 360, Resolution::R360p),
        ];
        for (w, h, expected) in cases {
            assert_eq!(
                stream(w, h).resolution_or_default(0.05, Resolution::R1080p),
                expected,
                "{}x{}",
                w,
                h
            );
        }
    }

    #[test]
    fn test_unknown_dimensions_fall_back_to_default() {
        let mut s = stream(0, 0);
        s.width = None;
        s.height = None;
        assert_eq!(
            s.resolution_or_default(0.05, Resolution::R1080p),
            Resolution::R1080p
        );
    }

    #[test]
    fn test_near_match_within_tolerance() {
        // 1916x1076 is within 5% of the 1080p pixel area.
        assert_eq!(
            stream(1916, 1076).resolution_or_default(0.05, Resolution::R1080p),
            Resolution::R1080p
        );
    }

    #[test]
    fn test_tiny_area_falls_through_to_default() {
        assert_eq!(
            stream(160, 120).resolution_or_default(0.05, Resolution::R1080p),
            Resolution::R1080p
        );
    }

    #[test]
    fn test_resolution_ordering() {
        assert!(Resolution::R4k > Resolution::R1080p);
        assert!(Resolution::R360p < Resolution::R480p);
    }

    #[test]
    fn test_resolution_from_str() {
        assert_eq!("1080p".parse::<Resolution>().unwrap(), Resolution::R1080p);
        assert_eq!("4K".parse::<Resolution>().unwrap(), Resolution::R4k);
        assert!("1081p".parse::<Resolution>().is_err());
    }

    proptest! {
        /// Bucketing is idempotent: a stream at a bucket's nominal
        /// dimensions maps back to the same bucket.
        #[test]
        fn test_bucketing_idempotent(res in prop_oneof![
            Just(Resolution::R4k),
            Just(Resolution::R2k),
            Just(Resolution::R1080p),
            Just(Resolution::R720p),
            Just(Resolution::R480p),
            Just(Resolution::R360p),
        ]) {
            let bucket = Resolution::from_pixel_area(res.pixel_area(), 0.05);
            prop_assert_eq!(bucket, Some(res));
        }

        /// Larger pixel areas never map to a smaller bucket.
        #[test]
        fn test_bucketing_monotonic(
            a in 100_000u64..12_000_000,
            b in 100_000u64..12_000_000,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let lo_bucket = Resolution::from_pixel_area(lo, 0.0);
            let hi_bucket = Resolution::from_pixel_area(hi, 0.0);
            if let (Some(l), Some(h)) = (lo_bucket, hi_bucket) {
                prop_assert!(h >= l);
            }
        }
    }

    #[test]
    fn test_total_frames() {
        let media = MediaFile {
            path: PathBuf::from("/tmp/a.mkv"),
            video: vec![stream(1920, 1080)],
            audio: vec![],
        };
        assert_eq!(media.total_frames(), Some(14400));
    }
}
