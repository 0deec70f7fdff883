use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;

use crate::media::{AudioStream, MediaFile, VideoStream};

/// Codecs that mark a "video" stream as an embedded still image
/// (cover art, thumbnails). Such streams are never transcode targets.
pub const STILL_IMAGE_CODECS: &[&str] = &[
    "png", "mjpeg", "bmp", "gif", "tiff", "jpegxl", "webp", "heif", "avif",
];

#[derive(Debug, Error)]
pub enum ProbeError {
    /// The file has no video stream left after filtering out still
    /// images and degenerate streams. Not retryable.
    #[error("no usable video stream in {0}")]
    NoVideoStream(PathBuf),
    #[error("ffprobe exited with an error for {path}: {detail}")]
    Tool { path: PathBuf, detail: String },
    #[error("unparsable ffprobe output for {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to run ffprobe: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    #[serde(default)]
    streams: Vec<RawStream>,
}

#[derive(Debug, Deserialize)]
struct RawStream {
    index: Option<u32>,
    codec_name: Option<String>,
    codec_tag_string: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    pix_fmt: Option<String>,
    bit_rate: Option<String>,
    sample_rate: Option<String>,
}

/// Thin async wrapper over the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct MediaProbe {
    ffprobe_bin: PathBuf,
}

impl MediaProbe {
    pub fn new(ffprobe_bin: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    /// Probe a file and build its stream model.
    ///
    /// Video and audio streams are fetched with two selective
    /// invocations so the per-type output indices (`0:v:N`, `0:a:N`)
    /// line up with ffmpeg's mapping.
    pub async fn probe(&self, path: &Path) -> Result<MediaFile, ProbeError> {
        let video_raw = self
            .run_ffprobe(
                path,
                "v",
                "stream=index,codec_name,codec_tag_string,width,height,\
                 r_frame_rate,nb_frames,duration,pix_fmt",
            )
            .await?;
        let audio_raw = self
            .run_ffprobe(path, "a", "stream=index,codec_name,bit_rate,sample_rate")
            .await?;

        let video = usable_video_streams(&video_raw.streams);
        if video.is_empty() {
            return Err(ProbeError::NoVideoStream(path.to_path_buf()));
        }
        let audio = audio_streams(&audio_raw.streams);

        Ok(MediaFile {
            path: path.to_path_buf(),
            video,
            audio,
        })
    }

    async fn run_ffprobe(
        &self,
        path: &Path,
        selector: &str,
        entries: &str,
    ) -> Result<RawOutput, ProbeError> {
        let output = Command::new(&self.ffprobe_bin)
            .arg("-v")
            .arg("error")
            .arg("-select_streams")
            .arg(selector)
            .arg("-show_entries")
            .arg(entries)
            .arg("-of")
            .arg("json")
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProbeError::Tool {
                path: path.to_path_buf(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|source| ProbeError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Parse an ffprobe rational like "30000/1001" into frames per second.
///
/// Returns `None` for degenerate rates: a zero denominator, a zero
/// rate, or the 1:1 rate ffprobe reports for attached pictures.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let (num, den) = match raw.split_once('/') {
        Some((n, d)) => (n.trim().parse::<f64>().ok()?, d.trim().parse::<f64>().ok()?),
        None => (raw.trim().parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 || num == 0.0 {
        return None;
    }
    if (num - den).abs() < f64::EPSILON {
        return None;
    }
    Some(num / den)
}

fn usable_video_streams(raw: &[RawStream]) -> Vec<VideoStream> {
    let mut streams = Vec::new();
    for (out_index, s) in raw.iter().enumerate() {
        let index = match s.index {
            Some(i) => i,
            None => continue,
        };
        let codec = match &s.codec_name {
            Some(c) => c.to_lowercase(),
            None => continue,
        };
        if STILL_IMAGE_CODECS.contains(&codec.as_str()) {
            continue;
        }
        // Single-frame streams are cover art even when the codec is
        // a real video codec.
        if s.nb_frames.as_deref() == Some("1") {
            continue;
        }
        let frame_rate = s.r_frame_rate.as_deref().and_then(parse_frame_rate);
        if s.r_frame_rate.is_some() && frame_rate.is_none() {
            continue;
        }
        streams.push(VideoStream {
            index,
            out_index,
            codec,
            tag: s
                .codec_tag_string
                .as_deref()
                .filter(|t| !t.is_empty() && *t != "[0][0][0][0]")
                .map(|t| t.to_lowercase()),
            width: s.width,
            height: s.height,
            frame_rate,
            duration: s.duration.as_deref().and_then(|d| d.parse().ok()),
            pix_fmt: s.pix_fmt.clone(),
        });
    }
    streams
}

fn audio_streams(raw: &[RawStream]) -> Vec<AudioStream> {
    raw.iter()
        .enumerate()
        .filter_map(|(out_index, s)| {
            Some(AudioStream {
                codec: s.codec_name.as_deref().map(|c| c.to_lowercase()),
                out_index,
                index: s.index?,
                bit_rate: s.bit_rate.as_deref().and_then(|b| b.parse().ok()),
                sample_rate: s.sample_rate.as_deref().and_then(|r| r.parse().ok()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate_rational() {
        let rate = parse_frame_rate("30000/1001").unwrap();
        assert!((rate - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        assert_eq!(parse_frame_rate("24"), Some(24.0));
    }

    #[test]
    fn test_parse_frame_rate_degenerate() {
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("1/1"), None);
        assert_eq!(parse_frame_rate("0/1"), None);
        assert_eq!(parse_frame_rate("garbage"), None);
    }

    fn raw_video(index: u32, codec: &str) -> RawStream {
        RawStream {
            index: Some(index),
            codec_name: Some(codec.to_string()),
            codec_tag_string: None,
            width: Some(1920),
            height: Some(1080),
            r_frame_rate: Some("24/1".to_string()),
            nb_frames: None,
            duration: Some("120.5".to_string()),
            pix_fmt: Some("yuv420p".to_string()),
            bit_rate: None,
            sample_rate: None,
        }
    }

    #[test]
    fn test_still_image_streams_are_filtered() {
        let raw = vec![raw_video(0, "mjpeg"), raw_video(1, "h264")];
        let streams = usable_video_streams(&raw);
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].codec, "h264");
        // Output index counts all video streams, including the
        // filtered cover art, to match ffmpeg's 0:v:N numbering.
        assert_eq!(streams[0].out_index, 1);
        assert_eq!(streams[0].index, 1);
    }

    #[test]
    fn test_single_frame_stream_is_filtered() {
        let mut cover = raw_video(0, "h264");
        cover.nb_frames = Some("1".to_string());
        assert!(usable_video_streams(&[cover]).is_empty());
    }

    #[test]
    fn test_degenerate_frame_rate_is_filtered() {
        let mut still = raw_video(0, "h264");
        still.r_frame_rate = Some("1/1".to_string());
        assert!(usable_video_streams(&[still]).is_empty());
    }

    #[test]
    fn test_missing_index_is_filtered() {
        let mut broken = raw_video(0, "h264");
        broken.index = None;
        assert!(usable_video_streams(&[broken]).is_empty());
    }

    #[test]
    fn test_video_stream_fields() {
        let mut raw = raw_video(0, "HEVC");
        raw.codec_name = Some("hevc".to_string());
        raw.codec_tag_string = Some("hev1".to_string());
        let streams = usable_video_streams(&[raw]);
        assert_eq!(streams[0].codec, "hevc");
        assert_eq!(streams[0].tag.as_deref(), Some("hev1"));
        assert_eq!(streams[0].duration, Some(120.5));
    }

    #[test]
    fn test_audio_streams() {
        let mut raw = raw_video(2, "aac");
        raw.bit_rate = Some("192000".to_string());
        raw.sample_rate = Some("48000".to_string());
        let streams = audio_streams(&[raw]);
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].codec.as_deref(), Some("aac"));
        assert_eq!(streams[0].bit_rate, Some(192_000));
        assert_eq!(streams[0].sample_rate, Some(48_000));
        assert_eq!(streams[0].out_index, 0);
    }

    #[test]
    fn test_raw_output_parses_ffprobe_json() {
        let json = r#"{
            "streams": [
                {
                    "index": 0,
                    "codec_name": "h264",
                    "width": 1280,
                    "height": 720,
                    "r_frame_rate": "30000/1001",
                    "duration": "60.000000",
                    "pix_fmt": "yuv420p"
                }
            ]
        }"#;
        let raw: RawOutput = serde_json::from_str(json).unwrap();
        let streams = usable_video_streams(&raw.streams);
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].width, Some(1280));
    }
}
