pub mod batch;
pub mod command;
pub mod config;
pub mod job;
pub mod media;
pub mod plan;
pub mod probe;
pub mod progress;
pub mod verify;

pub use batch::{parse_size, BatchScheduler, BatchState, BatchSummary};
pub use config::AppConfig;
pub use job::{EncodeJob, EncodingStatus, Interrupted};
pub use media::{MediaFile, Resolution};
pub use plan::{Codec, Denoise, JobOptions, Preset};
pub use probe::{MediaProbe, ProbeError};
