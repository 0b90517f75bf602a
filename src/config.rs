use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_API_URL, DEFAULT_OUTPUT_DIR, DEFAULT_SITE_URL,
    MAX_BATCH_FILES, MAX_FILE_SIZE,
};
use crate::error::{Result, TinyImgError};
use crate::orchestrator::BatchLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Client settings, stored as camelCase JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Base URL of the compression service (`/upload`, `/download-all`)
    pub api_url: String,
    /// Base URL of the site hosting `/api/stats` and `/api/feedback`
    pub site_url: String,
    pub max_file_size: u64,
    pub max_files: Option<usize>,
    pub output_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            max_file_size: MAX_FILE_SIZE,
            max_files: Some(MAX_BATCH_FILES),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl ClientConfig {
    pub fn limits(&self) -> BatchLimits {
        BatchLimits {
            max_file_size: self.max_file_size,
            max_files: self.max_files,
        }
    }

    /// Replace any field the caller supplied
    pub fn with_overrides(
        mut self,
        api_url: Option<String>,
        site_url: Option<String>,
        output_dir: Option<PathBuf>,
    ) -> Self {
        if let Some(api_url) = api_url {
            self.api_url = api_url;
        }
        if let Some(site_url) = site_url {
            self.site_url = site_url;
        }
        if let Some(output_dir) = output_dir {
            self.output_dir = output_dir;
        }
        self
    }

    pub fn validate(self) -> Result<Self> {
        for (field, value) in [("apiUrl", &self.api_url), ("siteUrl", &self.site_url)] {
            url::Url::parse(value)
                .map_err(|e| TinyImgError::InvalidUrl(format!("{} '{}': {}", field, value, e)))?;
        }
        if self.max_file_size == 0 {
            return Err(TinyImgError::Config("maxFileSize must be positive".to_string()));
        }
        Ok(self)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load settings from `path`, or from `~/.tinyimg/config.json` when no path
/// is given. A missing default file yields the defaults; a missing explicit
/// file is an error.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let (config_file, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => match default_config_path() {
            Some(p) => (p, false),
            None => return Ok(ClientConfig::default()),
        },
    };

    if !config_file.exists() {
        if explicit {
            return Err(TinyImgError::FileNotFound(config_file));
        }
        return ClientConfig::default().validate();
    }

    let content = fs::read_to_string(&config_file)?;
    let config: ClientConfig = serde_json::from_str(&content)
        .map_err(|e| TinyImgError::Config(format!("{}: {}", config_file.display(), e)))?;
    config.validate()
}
