use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::media::{AudioStream, MediaFile, VideoStream};

/// Codecs considered already space-efficient. Files whose video
/// streams all use one of these are copied rather than re-encoded.
pub const EFFICIENT_CODECS: &[&str] = &["av1", "hevc", "vp9", "vvc", "theora"];

/// Audio codecs passed through untouched.
pub const AUDIO_COPY_CODECS: &[&str] = &["aac", "mp3", "ac3"];

/// Target video encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Codec {
    Hevc,
    SvtAv1,
    LibaomAv1,
}

impl Codec {
    pub fn encoder_name(&self) -> &'static str {
        match self {
            Codec::Hevc => "libx265",
            Codec::SvtAv1 => "libsvtav1",
            Codec::LibaomAv1 => "libaom-av1",
        }
    }

    /// The codec name this encoder produces, as ffprobe reports it.
    pub fn produces(&self) -> &'static str {
        match self {
            Codec::Hevc => "hevc",
            Codec::SvtAv1 | Codec::LibaomAv1 => "av1",
        }
    }

    pub fn max_crf(&self) -> u32 {
        match self {
            Codec::Hevc => 51,
            Codec::SvtAv1 | Codec::LibaomAv1 => 63,
        }
    }

    pub fn clamp_crf(&self, crf: u32) -> u32 {
        crf.min(self.max_crf())
    }

    /// Upper bound of the numeric speed setting (-preset / -cpu-used).
    pub fn max_speed(&self) -> u32 {
        match self {
            Codec::Hevc => 0,
            Codec::SvtAv1 => 13,
            Codec::LibaomAv1 => 8,
        }
    }

    /// Validate a user-supplied preset string for this encoder.
    pub fn parse_preset(&self, raw: &str) -> Result<Preset, String> {
        match self {
            Codec::Hevc => {
                if HEVC_PRESETS.contains(&raw) {
                    Ok(Preset::Named(raw.to_string()))
                } else {
                    Err(format!(
                        "invalid libx265 preset '{}', expected one of: {}",
                        raw,
                        HEVC_PRESETS.join(", ")
                    ))
                }
            }
            Codec::SvtAv1 | Codec::LibaomAv1 => {
                let speed: u32 = raw
                    .parse()
                    .map_err(|_| format!("invalid numeric preset '{}'", raw))?;
                if speed > self.max_speed() {
                    return Err(format!(
                        "preset {} out of range 0-{} for {}",
                        speed,
                        self.max_speed(),
                        self.encoder_name()
                    ));
                }
                Ok(Preset::Speed(speed))
            }
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoder_name())
    }
}

const HEVC_PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

/// An encoder speed setting: libx265 takes names, the AV1 encoders
/// take numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preset {
    Named(String),
    Speed(u32),
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preset::Named(name) => f.write_str(name),
            Preset::Speed(n) => write!(f, "{}", n),
        }
    }
}

/// Named denoise strength, rendered as an nlmeans filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Denoise {
    Light,
    Mild,
    Moderate,
    Heavy,
}

impl Denoise {
    pub fn filter(&self) -> &'static str {
        match self {
            Denoise::Light => "nlmeans=s=1.0:p=3:r=7",
            Denoise::Mild => "nlmeans=s=1.5:p=5:r=9",
            Denoise::Moderate => "nlmeans=s=2.5:p=7:r=11",
            Denoise::Heavy => "nlmeans=s=4.0:p=9:r=15",
        }
    }
}

impl FromStr for Denoise {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Denoise::Light),
            "mild" => Ok(Denoise::Mild),
            "moderate" => Ok(Denoise::Moderate),
            "heavy" => Ok(Denoise::Heavy),
            other => Err(format!(
                "unknown denoise strength '{}', expected light, mild, moderate or heavy",
                other
            )),
        }
    }
}

/// Per-job settings assembled from the CLI surface.
#[derive(Debug, Clone)]
pub struct JobOptions {
    pub codec: Codec,
    /// CRF override; table lookup by resolution bucket when absent.
    pub crf: Option<u32>,
    /// Preset override; table lookup when absent.
    pub preset: Option<Preset>,
    /// Codecs copied instead of re-encoded.
    pub ignore_codecs: BTreeSet<String>,
    pub denoise: Option<Denoise>,
    pub verify: bool,
    pub delete_threshold: f64,
    pub check_size: bool,
    /// Replace the source file on success.
    pub delete_original: bool,
    /// Where the output lands; the source's directory when absent.
    pub output_dir: Option<PathBuf>,
}

impl JobOptions {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            crf: None,
            preset: None,
            ignore_codecs: EFFICIENT_CODECS.iter().map(|c| c.to_string()).collect(),
            denoise: None,
            verify: false,
            delete_threshold: 90.0,
            check_size: true,
            delete_original: false,
            output_dir: None,
        }
    }
}

/// Parameters for one stream's encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParams {
    pub crf: u32,
    pub preset: Preset,
    /// Keyframe interval in frames; None for encoders that keep
    /// their own default.
    pub keyframe_interval: Option<u32>,
    /// Video filter chain, in order.
    pub filters: Vec<String>,
}

/// Decision for a single video stream.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoDirective {
    Copy {
        /// Container tag rewrite applied while copying (hev1 to hvc1).
        retag: Option<&'static str>,
    },
    Encode(EncodeParams),
}

/// Decision for a single audio stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioDirective {
    Copy,
    /// Transcode to AAC at the given target bitrate (e.g. "192k").
    Transcode { bitrate: String },
}

/// Full per-file plan, positionally aligned with the media's
/// video and audio stream lists.
#[derive(Debug, Clone)]
pub struct FilePlan {
    pub video: Vec<VideoDirective>,
    pub audio: Vec<AudioDirective>,
}

impl FilePlan {
    /// Whether running ffmpeg would change anything. A plan of plain
    /// copies end to end is a no-op; a retag-only or audio-only plan
    /// is not.
    pub fn needs_work(&self) -> bool {
        let video_work = self
            .video
            .iter()
            .any(|d| !matches!(d, VideoDirective::Copy { retag: None }));
        let audio_work = self
            .audio
            .iter()
            .any(|d| !matches!(d, AudioDirective::Copy));
        video_work || audio_work
    }

    /// Whether any stream is actually re-encoded.
    pub fn any_encode(&self) -> bool {
        self.video
            .iter()
            .any(|d| matches!(d, VideoDirective::Encode(_)))
    }
}

/// Decide what to do with every stream of a file.
pub fn plan_file(media: &MediaFile, opts: &JobOptions, cfg: &AppConfig) -> FilePlan {
    FilePlan {
        video: media
            .video
            .iter()
            .map(|s| plan_video_stream(s, opts, cfg))
            .collect(),
        audio: media.audio.iter().map(plan_audio_stream).collect(),
    }
}

pub fn plan_video_stream(stream: &VideoStream, opts: &JobOptions, cfg: &AppConfig) -> VideoDirective {
    if opts.ignore_codecs.contains(&stream.codec) {
        return VideoDirective::Copy {
            retag: copy_retag(stream),
        };
    }

    let bucket = stream.resolution_or_default(
        cfg.general.resolution_tolerance,
        cfg.general.default_resolution,
    );
    let frame_rate = stream
        .frame_rate
        .unwrap_or(cfg.general.default_frame_rate);

    let (crf, preset, keyframe_interval) = match opts.codec {
        Codec::Hevc => (
            opts.crf.unwrap_or_else(|| cfg.hevc.crf.get(bucket)),
            opts.preset
                .clone()
                .unwrap_or_else(|| Preset::Named(cfg.hevc.preset.get(bucket))),
            None,
        ),
        Codec::SvtAv1 => (
            opts.crf.unwrap_or_else(|| cfg.svt_av1.crf.get(bucket)),
            opts.preset
                .clone()
                .unwrap_or_else(|| Preset::Speed(cfg.svt_av1.preset.get(bucket))),
            Some((frame_rate * 5.0).round() as u32),
        ),
        Codec::LibaomAv1 => (
            opts.crf.unwrap_or_else(|| cfg.libaom.crf.get(bucket)),
            opts.preset
                .clone()
                .unwrap_or_else(|| Preset::Speed(cfg.libaom.cpu_used.get(bucket))),
            Some((frame_rate * 10.0).round() as u32),
        ),
    };

    let mut filters = Vec::new();
    if let Some(target) = pixel_format_fallback(opts.codec, stream.pix_fmt.as_deref()) {
        warn!(
            "stream {}: pixel format {} not supported by {}, converting to {}",
            stream.index,
            stream.pix_fmt.as_deref().unwrap_or("?"),
            opts.codec.encoder_name(),
            target
        );
        filters.push(format!("format={}", target));
    }
    if let Some(denoise) = opts.denoise {
        filters.push(denoise.filter().to_string());
    }

    VideoDirective::Encode(EncodeParams {
        crf: opts.codec.clamp_crf(crf),
        preset: clamp_preset(opts.codec, preset),
        keyframe_interval,
        filters,
    })
}

fn clamp_preset(codec: Codec, preset: Preset) -> Preset {
    match preset {
        Preset::Speed(n) => Preset::Speed(n.min(codec.max_speed())),
        named => named,
    }
}

fn copy_retag(stream: &VideoStream) -> Option<&'static str> {
    if stream.codec == "hevc" && stream.tag.as_deref() == Some("hev1") {
        Some("hvc1")
    } else {
        None
    }
}

pub fn plan_audio_stream(stream: &AudioStream) -> AudioDirective {
    let copy = stream
        .codec
        .as_deref()
        .map(|c| AUDIO_COPY_CODECS.contains(&c))
        .unwrap_or(false);
    if copy {
        AudioDirective::Copy
    } else {
        let bitrate = match stream.bit_rate {
            Some(bits) if bits >= 1000 => format!("{}k", bits / 1000),
            _ => "128k".to_string(),
        };
        AudioDirective::Transcode { bitrate }
    }
}

/// Pixel formats each encoder accepts. When the source format is
/// outside the list, the closest supported format at the same or
/// higher bit depth is substituted via a format filter.
fn pixel_format_fallback(codec: Codec, pix_fmt: Option<&str>) -> Option<String> {
    let fmt = pix_fmt?;
    let supported: &[&str] = match codec {
        Codec::Hevc => &[
            "yuv420p",
            "yuvj420p",
            "yuv422p",
            "yuvj422p",
            "yuv444p",
            "yuvj444p",
            "yuv420p10le",
            "yuv422p10le",
            "yuv444p10le",
            "yuv420p12le",
            "yuv422p12le",
            "yuv444p12le",
            "gray",
            "gray10le",
            "gray12le",
        ],
        Codec::SvtAv1 => &["yuv420p", "yuv420p10le"],
        Codec::LibaomAv1 => &[
            "yuv420p",
            "yuv422p",
            "yuv444p",
            "yuv420p10le",
            "yuv422p10le",
            "yuv444p10le",
            "yuv420p12le",
            "yuv422p12le",
            "yuv444p12le",
            "gray",
            "gray10le",
            "gray12le",
        ],
    };
    if supported.contains(&fmt) {
        return None;
    }
    let target = if fmt.contains("12") && codec != Codec::SvtAv1 {
        "yuv420p12le"
    } else if fmt.contains("12") || fmt.contains("10") {
        "yuv420p10le"
    } else {
        "yuv420p"
    };
    Some(target.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Resolution;

    fn stream_1080p(codec: &str) -> VideoStream {
        VideoStream {
            index: 0,
            out_index: 0,
            codec: codec.to_string(),
            tag: None,
            width: Some(1920),
            height: Some(1080),
            frame_rate: Some(24.0),
            duration: Some(600.0),
            pix_fmt: Some("yuv420p".to_string()),
        }
    }

    fn opts(codec: Codec) -> JobOptions {
        JobOptions::new(codec)
    }

    #[test]
    fn test_efficient_codec_is_copied() {
        let cfg = AppConfig::default();
        let directive = plan_video_stream(&stream_1080p("av1"), &opts(Codec::Hevc), &cfg);
        assert_eq!(directive, VideoDirective::Copy { retag: None });
    }

    #[test]
    fn test_hev1_copy_gets_retagged() {
        let cfg = AppConfig::default();
        let mut s = stream_1080p("hevc");
        s.tag = Some("hev1".to_string());
        let directive = plan_video_stream(&s, &opts(Codec::Hevc), &cfg);
        assert_eq!(
            directive,
            VideoDirective::Copy {
                retag: Some("hvc1")
            }
        );
    }

    #[test]
    fn test_hevc_encode_uses_bucket_defaults() {
        let cfg = AppConfig::default();
        match plan_video_stream(&stream_1080p("h264"), &opts(Codec::Hevc), &cfg) {
            VideoDirective::Encode(p) => {
                assert_eq!(p.crf, 23);
                assert_eq!(p.preset, Preset::Named("medium".to_string()));
                assert_eq!(p.keyframe_interval, None);
                assert!(p.filters.is_empty());
            }
            other => panic!("expected encode, got {:?}", other),
        }
    }

    #[test]
    fn test_svt_keyframe_interval_from_frame_rate() {
        let cfg = AppConfig::default();
        let mut s = stream_1080p("h264");
        s.frame_rate = Some(29.97);
        match plan_video_stream(&s, &opts(Codec::SvtAv1), &cfg) {
            VideoDirective::Encode(p) => {
                assert_eq!(p.keyframe_interval, Some(150));
                assert_eq!(p.crf, 28);
                assert_eq!(p.preset, Preset::Speed(5));
            }
            other => panic!("expected encode, got {:?}", other),
        }
    }

    #[test]
    fn test_libaom_keyframe_interval_and_defaults() {
        let cfg = AppConfig::default();
        let mut s = stream_1080p("h264");
        s.frame_rate = None;
        match plan_video_stream(&s, &opts(Codec::LibaomAv1), &cfg) {
            VideoDirective::Encode(p) => {
                // Default frame rate of 30 with the 10s window.
                assert_eq!(p.keyframe_interval, Some(300));
                assert_eq!(p.crf, 27);
                assert_eq!(p.preset, Preset::Speed(4));
            }
            other => panic!("expected encode, got {:?}", other),
        }
    }

    #[test]
    fn test_crf_override_is_clamped() {
        let cfg = AppConfig::default();
        let mut o = opts(Codec::Hevc);
        o.crf = Some(99);
        match plan_video_stream(&stream_1080p("h264"), &o, &cfg) {
            VideoDirective::Encode(p) => assert_eq!(p.crf, 51),
            other => panic!("expected encode, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_pixel_format_adds_filter() {
        let cfg = AppConfig::default();
        let mut s = stream_1080p("h264");
        s.pix_fmt = Some("yuv422p10le".to_string());
        match plan_video_stream(&s, &opts(Codec::SvtAv1), &cfg) {
            VideoDirective::Encode(p) => {
                assert_eq!(p.filters, vec!["format=yuv420p10le".to_string()]);
            }
            other => panic!("expected encode, got {:?}", other),
        }
    }

    #[test]
    fn test_denoise_appends_after_format() {
        let cfg = AppConfig::default();
        let mut s = stream_1080p("h264");
        s.pix_fmt = Some("yuv422p10le".to_string());
        let mut o = opts(Codec::SvtAv1);
        o.denoise = Some(Denoise::Moderate);
        match plan_video_stream(&s, &o, &cfg) {
            VideoDirective::Encode(p) => {
                assert_eq!(
                    p.filters,
                    vec![
                        "format=yuv420p10le".to_string(),
                        "nlmeans=s=2.5:p=7:r=11".to_string()
                    ]
                );
            }
            other => panic!("expected encode, got {:?}", other),
        }
    }

    #[test]
    fn test_preset_validation() {
        assert!(Codec::Hevc.parse_preset("medium").is_ok());
        assert!(Codec::Hevc.parse_preset("5").is_err());
        assert_eq!(
            Codec::SvtAv1.parse_preset("8").unwrap(),
            Preset::Speed(8)
        );
        assert!(Codec::SvtAv1.parse_preset("14").is_err());
        assert!(Codec::LibaomAv1.parse_preset("9").is_err());
    }

    #[test]
    fn test_audio_copy_and_transcode() {
        let mut a = AudioStream {
            codec: Some("aac".to_string()),
            out_index: 0,
            index: 1,
            bit_rate: Some(192_000),
            sample_rate: Some(48_000),
        };
        assert_eq!(plan_audio_stream(&a), AudioDirective::Copy);

        a.codec = Some("flac".to_string());
        assert_eq!(
            plan_audio_stream(&a),
            AudioDirective::Transcode {
                bitrate: "192k".to_string()
            }
        );

        a.bit_rate = None;
        assert_eq!(
            plan_audio_stream(&a),
            AudioDirective::Transcode {
                bitrate: "128k".to_string()
            }
        );
    }

    #[test]
    fn test_needs_work_rules() {
        let all_copy = FilePlan {
            video: vec![VideoDirective::Copy { retag: None }],
            audio: vec![AudioDirective::Copy],
        };
        assert!(!all_copy.needs_work());

        let retag_only = FilePlan {
            video: vec![VideoDirective::Copy {
                retag: Some("hvc1"),
            }],
            audio: vec![AudioDirective::Copy],
        };
        assert!(retag_only.needs_work());
        assert!(!retag_only.any_encode());

        let audio_only = FilePlan {
            video: vec![VideoDirective::Copy { retag: None }],
            audio: vec![AudioDirective::Transcode {
                bitrate: "128k".to_string(),
            }],
        };
        assert!(audio_only.needs_work());
    }

    #[test]
    fn test_plan_file_handles_mixed_streams() {
        let cfg = AppConfig::default();
        let media = MediaFile {
            path: "/tmp/x.mkv".into(),
            video: vec![stream_1080p("h264"), stream_1080p("av1")],
            audio: vec![],
        };
        let plan = plan_file(&media, &opts(Codec::SvtAv1), &cfg);
        assert!(matches!(plan.video[0], VideoDirective::Encode(_)));
        assert_eq!(plan.video[1], VideoDirective::Copy { retag: None });
        assert_eq!(
            media.best_resolution(0.05, Resolution::R1080p),
            Resolution::R1080p
        );
    }
}
