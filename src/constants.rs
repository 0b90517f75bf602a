/// Largest file the client will send for compression (10 MiB)
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const MAX_BATCH_FILES: usize = 20;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_SITE_URL: &str = "http://localhost:8000";
pub const DEFAULT_OUTPUT_DIR: &str = "tinyimg-output";

pub const UPLOAD_PATH: &str = "/upload";
pub const DOWNLOAD_ALL_PATH: &str = "/download-all";
pub const STATS_PATH: &str = "/api/stats";
pub const FEEDBACK_PATH: &str = "/api/feedback";

pub const CONFIG_DIR_NAME: &str = ".tinyimg";
pub const CONFIG_FILE_NAME: &str = "config.json";

pub const BUNDLE_FILE_NAME: &str = "images.zip";
pub const FALLBACK_ARTIFACT_NAME: &str = "image";
pub const ARTIFACT_NAME_PARAM: &str = "f";

pub const DISPLAY_NAME_MAX_CHARS: usize = 25;

pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

pub const PROGRESS_BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";
pub const PROGRESS_SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";

// Common output message prefixes
pub const SUCCESS_PREFIX: &str = "✅";
pub const WARNING_PREFIX: &str = "⚠️";
pub const ERROR_PREFIX: &str = "❌";
pub const INFO_PREFIX: &str = "📋";
pub const VERBOSE_PREFIX: &str = "🔍";
