use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{error, info, warn};

use recode_core::{
    batch::BatchScheduler,
    command::check_ffmpeg_installed,
    parse_size,
    plan::EFFICIENT_CODECS,
    AppConfig, Codec, Denoise, EncodeJob, EncodingStatus, Interrupted, JobOptions, MediaProbe,
    Resolution,
};

/// Batch video re-encoder: shrinks libraries to HEVC or AV1, verifies
/// the result, and replaces the originals in place.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory to process recursively, or a single video file
    path: PathBuf,

    /// Minimum file size to consider in batch mode (e.g. 100MB, 1.5GB)
    #[arg(long, default_value = "100MB")]
    min_size: String,

    /// Target encoder
    #[arg(long, value_enum, default_value_t = CodecArg::Hevc)]
    codec: CodecArg,

    /// CRF override; per-resolution defaults apply when omitted
    #[arg(long)]
    crf: Option<u32>,

    /// Preset override (libx265 name, or a number for the AV1 encoders)
    #[arg(long)]
    preset: Option<String>,

    /// Apply an nlmeans denoise pass (light, mild, moderate, heavy)
    #[arg(long)]
    denoise: Option<Denoise>,

    /// SVT-AV1 tune mode override (0 = VQ, 1 = PSNR)
    #[arg(long)]
    tune: Option<u32>,

    /// SVT-AV1 fast-decode level override
    #[arg(long)]
    fast_decode: Option<u32>,

    /// Verify each encode with a VMAF comparison before replacing
    #[arg(long)]
    verify: bool,

    /// Minimum acceptable VMAF score when verifying
    #[arg(long)]
    delete_threshold: Option<f64>,

    /// Reject outputs that are not smaller than the original
    /// (overrides the config value)
    #[arg(long)]
    check_size: Option<bool>,

    /// Replace the source file on success (single-file mode; batch
    /// mode always replaces)
    #[arg(long)]
    delete_origin: bool,

    /// Skip files whose best video stream is below this bucket
    #[arg(long)]
    min_resolution: Option<Resolution>,

    /// Discard any saved batch state and re-scan from scratch
    #[arg(long)]
    force_reset: bool,

    /// Re-encode files already in an efficient codec instead of
    /// copying them (the target codec itself is still copied)
    #[arg(long)]
    reencode_efficient: bool,

    /// Output directory (single-file mode only)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CodecArg {
    /// libx265
    Hevc,
    /// SVT-AV1
    Av1,
    /// libaom-av1
    AomAv1,
}

impl From<CodecArg> for Codec {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::Hevc => Codec::Hevc,
            CodecArg::Av1 => Codec::SvtAv1,
            CodecArg::AomAv1 => Codec::LibaomAv1,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    let mut cfg = AppConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(tune) = args.tune {
        cfg.svt_av1.tune = tune;
    }
    if let Some(fast_decode) = args.fast_decode {
        cfg.svt_av1.fast_decode = fast_decode;
    }

    if !check_ffmpeg_installed(&cfg.general.ffmpeg_bin).await {
        bail!(
            "ffmpeg not found at '{}'; install it or point general.ffmpeg_bin at it",
            cfg.general.ffmpeg_bin.display()
        );
    }

    let codec: Codec = args.codec.into();
    let preset = match &args.preset {
        Some(raw) => Some(codec.parse_preset(raw).map_err(anyhow::Error::msg)?),
        None => None,
    };

    let mut opts = JobOptions::new(codec);
    opts.crf = args.crf;
    opts.preset = preset;
    opts.denoise = args.denoise;
    opts.verify = args.verify || cfg.verify.verify;
    opts.delete_threshold = args.delete_threshold.unwrap_or(cfg.verify.delete_threshold);
    opts.check_size = args.check_size.unwrap_or(cfg.verify.check_size);

    if !args.path.exists() {
        bail!("{} does not exist", args.path.display());
    }

    let exit_code = if args.path.is_file() {
        encode_single(args, opts, cfg).await?
    } else {
        run_batch(args, opts, cfg).await?
    };
    std::process::exit(exit_code);
}

/// Encode one file. The original is kept unless --delete-origin is
/// given, so the default is a safe side-by-side encode.
async fn encode_single(args: Args, mut opts: JobOptions, cfg: AppConfig) -> Result<i32> {
    // Only the target codec is copy-through here; a single file was
    // named on purpose, so other efficient codecs still get encoded.
    opts.ignore_codecs = std::iter::once(opts.codec.produces().to_string()).collect();
    opts.delete_original = args.delete_origin;
    opts.output_dir = args.output.clone();

    let probe = MediaProbe::new(&cfg.general.ffprobe_bin);
    let media = probe
        .probe(&args.path)
        .await
        .with_context(|| format!("Cannot process {}", args.path.display()))?;

    let mut job = EncodeJob::new(media, opts, &cfg)?;
    match job.run().await {
        Ok(EncodingStatus::Success) | Ok(EncodingStatus::Skipped) => Ok(0),
        Ok(status) => {
            error!("{}: {}", args.path.display(), status);
            Ok(1)
        }
        Err(e) if e.is::<Interrupted>() => Ok(130),
        Err(e) => Err(e),
    }
}

/// Process a directory tree, resuming from saved state when possible.
async fn run_batch(args: Args, mut opts: JobOptions, cfg: AppConfig) -> Result<i32> {
    if args.output.is_some() {
        bail!("--output only applies to single-file mode");
    }
    if args.delete_origin {
        warn!("--delete-origin is implied in batch mode");
    }

    opts.delete_original = true;
    opts.ignore_codecs = if args.reencode_efficient {
        std::iter::once(opts.codec.produces().to_string()).collect()
    } else {
        EFFICIENT_CODECS.iter().map(|c| c.to_string()).collect()
    };

    let min_size_bytes = parse_size(&args.min_size)
        .with_context(|| format!("Invalid --min-size '{}'", args.min_size))?;

    info!(
        "batch mode: {} with {} (min size {})",
        args.path.display(),
        opts.codec.encoder_name(),
        args.min_size
    );

    let mut scheduler = BatchScheduler::new(
        args.path,
        min_size_bytes,
        args.min_resolution,
        args.force_reset,
        opts,
        cfg,
    )
    .await?;

    match scheduler.run().await {
        Ok(summary) => {
            if summary.failed > 0 {
                error!("{} file(s) failed", summary.failed);
                Ok(1)
            } else {
                Ok(0)
            }
        }
        Err(e) if e.is::<Interrupted>() => {
            info!("state saved; rerun to pick up where this left off");
            Ok(130)
        }
        Err(e) => Err(e),
    }
}
