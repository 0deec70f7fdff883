use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::media::Resolution;

/// A per-resolution-bucket parameter table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketTable<T> {
    #[serde(rename = "4k")]
    pub r4k: T,
    #[serde(rename = "2k")]
    pub r2k: T,
    #[serde(rename = "1080p")]
    pub r1080p: T,
    #[serde(rename = "720p")]
    pub r720p: T,
    #[serde(rename = "480p")]
    pub r480p: T,
    #[serde(rename = "360p")]
    pub r360p: T,
}

impl<T: Clone> BucketTable<T> {
    pub fn get(&self, res: Resolution) -> T {
        match res {
            Resolution::R4k => self.r4k.clone(),
            Resolution::R2k => self.r2k.clone(),
            Resolution::R1080p => self.r1080p.clone(),
            Resolution::R720p => self.r720p.clone(),
            Resolution::R480p => self.r480p.clone(),
            Resolution::R360p => self.r360p.clone(),
        }
    }
}

/// General pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
    /// Directory where batch state files are stored.
    pub state_dir: PathBuf,
    /// Fractional tolerance when matching a stream to a resolution bucket.
    pub resolution_tolerance: f64,
    /// Bucket used when a stream's dimensions are unknown.
    pub default_resolution: Resolution,
    /// Frame rate used for keyframe-interval math when unknown.
    pub default_frame_rate: f64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            state_dir: PathBuf::from("."),
            resolution_tolerance: 0.05,
            default_resolution: Resolution::R1080p,
            default_frame_rate: 30.0,
        }
    }
}

/// Post-encode verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Run a VMAF comparison after each encode.
    pub verify: bool,
    /// Minimum acceptable VMAF score.
    pub delete_threshold: f64,
    /// Reject outputs that are not smaller than the original.
    pub check_size: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            verify: false,
            delete_threshold: 90.0,
            check_size: true,
        }
    }
}

/// libx265 defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HevcConfig {
    pub preset: BucketTable<String>,
    pub crf: BucketTable<u32>,
}

impl Default for HevcConfig {
    fn default() -> Self {
        Self {
            preset: BucketTable {
                r4k: "slow".to_string(),
                r2k: "slow".to_string(),
                r1080p: "medium".to_string(),
                r720p: "medium".to_string(),
                r480p: "fast".to_string(),
                r360p: "fast".to_string(),
            },
            crf: BucketTable {
                r4k: 25,
                r2k: 24,
                r1080p: 23,
                r720p: 22,
                r480p: 20,
                r360p: 19,
            },
        }
    }
}

/// SVT-AV1 defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SvtAv1Config {
    pub preset: BucketTable<u32>,
    pub crf: BucketTable<u32>,
    /// Encoder tune mode (1 = PSNR, 0 = VQ).
    pub tune: u32,
    /// fast-decode level passed through -svtav1-params.
    pub fast_decode: u32,
}

impl Default for SvtAv1Config {
    fn default() -> Self {
        Self {
            preset: BucketTable {
                r4k: 4,
                r2k: 4,
                r1080p: 5,
                r720p: 5,
                r480p: 6,
                r360p: 6,
            },
            crf: BucketTable {
                r4k: 30,
                r2k: 29,
                r1080p: 28,
                r720p: 27,
                r480p: 25,
                r360p: 24,
            },
            tune: 0,
            fast_decode: 1,
        }
    }
}

/// libaom-av1 defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibaomConfig {
    /// Mapped to -cpu-used.
    pub cpu_used: BucketTable<u32>,
    pub crf: BucketTable<u32>,
}

impl Default for LibaomConfig {
    fn default() -> Self {
        Self {
            cpu_used: BucketTable {
                r4k: 4,
                r2k: 4,
                r1080p: 4,
                r720p: 4,
                r480p: 4,
                r360p: 4,
            },
            crf: BucketTable {
                r4k: 28,
                r2k: 27,
                r1080p: 27,
                r720p: 24,
                r480p: 21,
                r360p: 19,
            },
        }
    }
}

/// Top-level configuration tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub verify: VerifyConfig,
    pub hevc: HevcConfig,
    pub svt_av1: SvtAv1Config,
    pub libaom: LibaomConfig,
}

impl AppConfig {
    /// Load configuration from a file, or return defaults if path is
    /// None or the file doesn't exist. TOML by extension, JSON otherwise.
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path).with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content).with_context(|| {
                        format!("Failed to parse TOML config: {}", config_path.display())
                    })?;
                } else {
                    config = serde_json::from_str(&content).with_context(|| {
                        format!("Failed to parse JSON config: {}", config_path.display())
                    })?;
                }
            }
        }

        Ok(config)
    }
}
