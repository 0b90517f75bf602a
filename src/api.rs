//! Client side of the compression service.
//!
//! One multipart upload per file returns a result record per requested format
//! plus the flattened artifact URLs. The bundle endpoint zips a list of those
//! URLs back into a single archive.

use crate::constants::{DOWNLOAD_ALL_PATH, UPLOAD_PATH};
use crate::error::{Result, TinyImgError};
use crate::files::SelectedFile;
use crate::formats::{FormatSet, FormatTag};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// One per-format record as sent by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub saved_bytes: i64,
    pub new_size: u64,
    #[serde(default)]
    pub time: u64,
    pub image_url: String,
    pub format: String,
}

/// Body of a successful upload call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub data: Vec<ResultRecord>,
    pub files: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl UploadResponse {
    /// Check the body against the request and turn it into results.
    ///
    /// The service must return exactly one record and one artifact per
    /// requested format; anything else is a malformed response.
    pub fn into_results(self, formats: &FormatSet) -> Result<Vec<CompressionResult>> {
        let expected = formats.results_per_file();
        if self.data.len() != expected {
            return Err(TinyImgError::MalformedResponse(format!(
                "expected {} result records, got {}",
                expected,
                self.data.len()
            )));
        }
        if self.files.len() != self.data.len() {
            return Err(TinyImgError::MalformedResponse(format!(
                "{} artifact references for {} result records",
                self.files.len(),
                self.data.len()
            )));
        }
        for err in &self.errors {
            crate::verbose!("Service reported: {}", err);
        }
        Ok(self.data.into_iter().map(CompressionResult::from).collect())
    }
}

/// How the compressed size compares with the original
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeDelta {
    Grew,
    Shrank,
    Unchanged,
}

/// Outcome of compressing one file into one format
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionResult {
    /// Original minus new size. Negative when the output grew.
    pub saved_bytes: i64,
    pub new_size_bytes: u64,
    pub elapsed_ms: u64,
    pub artifact_url: String,
    pub format: String,
}

impl CompressionResult {
    pub fn size_delta(&self, original_size: u64) -> SizeDelta {
        match self.new_size_bytes.cmp(&original_size) {
            std::cmp::Ordering::Greater => SizeDelta::Grew,
            std::cmp::Ordering::Less => SizeDelta::Shrank,
            std::cmp::Ordering::Equal => SizeDelta::Unchanged,
        }
    }

    /// Known tag for the result format, if it is one of png/jpg/webp
    pub fn format_tag(&self) -> Option<FormatTag> {
        self.format.parse().ok()
    }
}

impl From<ResultRecord> for CompressionResult {
    fn from(record: ResultRecord) -> Self {
        Self {
            saved_bytes: record.saved_bytes,
            new_size_bytes: record.new_size,
            elapsed_ms: record.time,
            artifact_url: record.image_url,
            format: record.format,
        }
    }
}

#[derive(Debug, Serialize)]
struct BundleRequest<'a> {
    files: &'a [String],
}

/// The compression service as seen by the orchestrator and downloader
pub trait CompressionApi: Send + Sync + 'static {
    /// Compress one file into every requested format
    fn upload(
        &self,
        file: &SelectedFile,
        formats: &FormatSet,
    ) -> impl Future<Output = Result<UploadResponse>> + Send;

    /// Fetch a zip archive holding the given artifacts
    fn download_bundle(&self, artifacts: &[String])
        -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Fetch a single artifact
    fn fetch_artifact(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpCompressionApi {
    client: reqwest::Client,
    upload_url: String,
    download_url: String,
}

impl HttpCompressionApi {
    pub fn new(api_url: &str) -> Self {
        let base = api_url.trim_end_matches('/');
        Self {
            client: reqwest::Client::new(),
            upload_url: format!("{}{}", base, UPLOAD_PATH),
            download_url: format!("{}{}", base, DOWNLOAD_ALL_PATH),
        }
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    pub fn download_url(&self) -> &str {
        &self.download_url
    }

    fn upload_form(file: &SelectedFile, formats: &FormatSet) -> Result<Form> {
        let part = Part::bytes(file.data().to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| TinyImgError::RequestFailed(format!("Invalid MIME type: {}", e)))?;
        let form = Form::new().part("file", part);
        // The service falls back to the file's own format when the field is absent
        if formats.is_empty() {
            Ok(form)
        } else {
            Ok(form.text("formats", formats.to_request_value()))
        }
    }
}

async fn read_success_body(response: reqwest::Response) -> Result<Vec<u8>> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(TinyImgError::RequestFailed(format!(
            "status {}: {}",
            status,
            error_text.trim()
        )));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| TinyImgError::RequestFailed(format!("Failed to read body: {}", e)))?;
    Ok(bytes.to_vec())
}

impl CompressionApi for HttpCompressionApi {
    async fn upload(&self, file: &SelectedFile, formats: &FormatSet) -> Result<UploadResponse> {
        let form = Self::upload_form(file, formats)?;
        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TinyImgError::RequestFailed(format!("Failed to upload: {}", e)))?;

        let body = read_success_body(response).await?;
        serde_json::from_slice(&body).map_err(|e| TinyImgError::MalformedResponse(e.to_string()))
    }

    async fn download_bundle(&self, artifacts: &[String]) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(&self.download_url)
            .json(&BundleRequest { files: artifacts })
            .send()
            .await
            .map_err(|e| TinyImgError::DownloadFailed(e.to_string()))?;

        read_success_body(response)
            .await
            .map_err(|e| TinyImgError::DownloadFailed(e.to_string()))
    }

    async fn fetch_artifact(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TinyImgError::DownloadFailed(e.to_string()))?;

        read_success_body(response)
            .await
            .map_err(|e| TinyImgError::DownloadFailed(e.to_string()))
    }
}
