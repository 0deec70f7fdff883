use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::AppConfig;
use crate::media::MediaFile;
use crate::plan::{AudioDirective, Codec, EncodeParams, FilePlan, Preset, VideoDirective};

/// Check that the ffmpeg binary is present and runnable.
pub async fn check_ffmpeg_installed(ffmpeg_bin: &Path) -> bool {
    Command::new(ffmpeg_bin)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Compose the full ffmpeg argument list for a planned transcode.
///
/// Returns None when the plan is a no-op (every stream a plain copy),
/// in which case the file is skipped without spawning anything.
pub fn build_transcode_args(
    media: &MediaFile,
    plan: &FilePlan,
    codec: Codec,
    cfg: &AppConfig,
    output: &Path,
) -> Option<Vec<String>> {
    if !plan.needs_work() {
        return None;
    }

    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        media.path.to_string_lossy().into_owned(),
    ];

    for (i, (stream, directive)) in media.video.iter().zip(&plan.video).enumerate() {
        args.extend(stream.map_args(i));
        match directive {
            VideoDirective::Copy { retag } => {
                args.push("copy".to_string());
                if let Some(tag) = retag {
                    args.push("-tag:v".to_string());
                    args.push(tag.to_string());
                }
            }
            VideoDirective::Encode(params) => {
                args.extend(encode_args(codec, params, cfg));
                if !params.filters.is_empty() {
                    args.push(format!("-filter:v:{}", i));
                    args.push(params.filters.join(","));
                }
            }
        }
    }

    for (i, (stream, directive)) in media.audio.iter().zip(&plan.audio).enumerate() {
        args.extend(stream.map_args(i));
        match directive {
            AudioDirective::Copy => args.push("copy".to_string()),
            AudioDirective::Transcode { bitrate } => {
                args.push("aac".to_string());
                args.push(format!("-b:a:{}", i));
                args.push(bitrate.clone());
            }
        }
    }

    args.extend([
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-c:s".to_string(),
        "copy".to_string(),
        "-progress".to_string(),
        "pipe:1".to_string(),
        "-nostats".to_string(),
        output.to_string_lossy().into_owned(),
    ]);

    Some(args)
}

fn encode_args(codec: Codec, params: &EncodeParams, cfg: &AppConfig) -> Vec<String> {
    let mut args = vec![codec.encoder_name().to_string()];
    match codec {
        Codec::Hevc => {
            args.extend([
                "-preset".to_string(),
                params.preset.to_string(),
                // Fresh libx265 output always carries the hvc1 tag so
                // Apple players pick it up.
                "-tag:v".to_string(),
                "hvc1".to_string(),
                "-crf".to_string(),
                params.crf.to_string(),
            ]);
        }
        Codec::SvtAv1 => {
            args.extend([
                "-preset".to_string(),
                speed_of(&params.preset),
                "-crf".to_string(),
                params.crf.to_string(),
            ]);
            if let Some(g) = params.keyframe_interval {
                args.push("-g".to_string());
                args.push(g.to_string());
            }
            args.push("-svtav1-params".to_string());
            args.push(format!(
                "tune={}:fast-decode={}",
                cfg.svt_av1.tune, cfg.svt_av1.fast_decode
            ));
        }
        Codec::LibaomAv1 => {
            args.extend([
                "-cpu-used".to_string(),
                speed_of(&params.preset),
                "-crf".to_string(),
                params.crf.to_string(),
                "-b:v".to_string(),
                "0".to_string(),
                "-row-mt".to_string(),
                "1".to_string(),
            ]);
            if let Some(g) = params.keyframe_interval {
                args.extend([
                    "-g".to_string(),
                    g.to_string(),
                    "-keyint_min".to_string(),
                    g.to_string(),
                ]);
            }
        }
    }
    args
}

fn speed_of(preset: &Preset) -> String {
    match preset {
        Preset::Speed(n) => n.to_string(),
        Preset::Named(name) => name.clone(),
    }
}
