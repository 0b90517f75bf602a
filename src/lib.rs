pub mod api;
pub mod cli;
pub mod config;
pub mod constants;
pub mod download;
pub mod error;
pub mod feedback;
pub mod files;
pub mod formats;
pub mod logger;
pub mod orchestrator;
pub mod stats;
pub mod utils;

pub use api::{CompressionApi, CompressionResult, HttpCompressionApi, SizeDelta, UploadResponse};
pub use config::{load_config, ClientConfig};
pub use download::{artifact_file_name, BatchDownloader};
pub use error::{Result, TinyImgError};
pub use feedback::{FeedbackClient, FeedbackMessage};
pub use files::{collect_image_files, is_image_file, load_selection, SelectedFile};
pub use formats::{FormatSelector, FormatSet, FormatTag, FormatToggle};
pub use orchestrator::{
    BatchEvent, BatchLimits, BatchProgress, BatchState, FileFailure, FileItem, FileState,
    Orchestrator,
};
pub use stats::{AggregateStats, HttpStatsStore, MemoryStatsStore, StatsDelta, StatsStore};
