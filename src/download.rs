use crate::api::CompressionApi;
use crate::constants::{ARTIFACT_NAME_PARAM, BUNDLE_FILE_NAME, FALLBACK_ARTIFACT_NAME};
use crate::error::{Result, TinyImgError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;
use url::Url;

/// Suggested file name carried in the artifact URL's `f` parameter.
///
/// Only the last path component is kept; anything unusable falls back to `image`.
pub fn artifact_file_name(artifact_url: &str) -> String {
    Url::parse(artifact_url)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == ARTIFACT_NAME_PARAM)
                .map(|(_, value)| value.into_owned())
        })
        .and_then(|name| {
            Path::new(&name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_ARTIFACT_NAME.to_string())
}

/// Write `data` to `dir/name` through a temporary file so a failed write
/// never leaves a partial file behind
pub fn save_bytes(dir: &Path, name: &str, data: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let dest = dir.join(name);
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(&dest).map_err(|e| TinyImgError::Io(e.error))?;
    Ok(dest)
}

/// Clears the busy flag when the download ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Fetches the bundle of a finished batch, one request at a time
pub struct BatchDownloader<A> {
    api: Arc<A>,
    busy: AtomicBool,
}

impl<A: CompressionApi> BatchDownloader<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Request the archive of `artifacts` and save it as `images.zip` in `dest_dir`
    pub async fn download_all(&self, artifacts: &[String], dest_dir: &Path) -> Result<PathBuf> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TinyImgError::DownloadInProgress);
        }
        let _guard = BusyGuard(&self.busy);

        if artifacts.is_empty() {
            return Err(TinyImgError::DownloadFailed(
                "No artifacts to download".to_string(),
            ));
        }

        let outcome = match self.api.download_bundle(artifacts).await {
            Ok(bytes) => save_bytes(dest_dir, BUNDLE_FILE_NAME, &bytes),
            Err(e) => Err(e),
        };
        outcome.map_err(|e| {
            crate::error!("Download all failed: {}", e);
            match e {
                TinyImgError::DownloadFailed(msg) => TinyImgError::DownloadFailed(msg),
                other => TinyImgError::DownloadFailed(other.to_string()),
            }
        })
    }

    /// Fetch one artifact and save it under the name its URL suggests
    pub async fn download_artifact(&self, artifact_url: &str, dest_dir: &Path) -> Result<PathBuf> {
        let name = artifact_file_name(artifact_url);
        let outcome = match self.api.fetch_artifact(artifact_url).await {
            Ok(bytes) => save_bytes(dest_dir, &name, &bytes),
            Err(e) => Err(e),
        };
        outcome.map_err(|e| {
            crate::error!("Download of {} failed: {}", name, e);
            match e {
                TinyImgError::DownloadFailed(msg) => TinyImgError::DownloadFailed(msg),
                other => TinyImgError::DownloadFailed(other.to_string()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_file_name_from_query() {
        assert_eq!(
            artifact_file_name("https://api.example.com/image?f=cat_compressed.webp"),
            "cat_compressed.webp"
        );
        assert_eq!(
            artifact_file_name("https://api.example.com/image?x=1&f=my%20pic.png"),
            "my pic.png"
        );
    }

    #[test]
    fn test_artifact_file_name_fallback() {
        assert_eq!(artifact_file_name("https://api.example.com/image"), "image");
        assert_eq!(artifact_file_name("https://api.example.com/image?f="), "image");
        assert_eq!(artifact_file_name("not a url"), "image");
    }

    #[test]
    fn test_artifact_file_name_strips_directories() {
        assert_eq!(
            artifact_file_name("https://api.example.com/image?f=../../etc/passwd"),
            "passwd"
        );
    }

    #[test]
    fn test_save_bytes_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("nested");
        let path = save_bytes(&dest, "images.zip", b"PK\x03\x04").unwrap();
        assert_eq!(path, dest.join("images.zip"));
        assert_eq!(fs::read(&path).unwrap(), b"PK\x03\x04");

        // Only the final file remains
        let entries = fs::read_dir(&dest).unwrap().count();
        assert_eq!(entries, 1);
    }
}
